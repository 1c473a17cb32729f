use spacetimedb::{
    ReducerContext, Identity, Table, Timestamp,
    table, reducer, view,
    client_visibility_filter, Filter,
};

mod backup;
mod content;
mod progression;

use content::{BankGenerator, ContentGenerator, PuzzleKind, QuizQuestion};
use progression::{PassingPolicy, ProgressionError, GATE_COUNT};

// ==================== CONSTANTS ====================

/// Primary key of the singleton config row
const CONFIG_ROW: u8 = 0;

/// Provenance tag stored on every question_history row
const HISTORY_TOPIC: &str = "generated";

// ==================== HELPER FUNCTIONS ====================

/// Session for the calling connection (created by the gateway)
fn get_session(ctx: &ReducerContext) -> Result<Session, ProgressionError> {
    ctx.db
        .session()
        .connection_id()
        .find(&ctx.sender)
        .ok_or_else(|| ProgressionError::NotFound("no session; connect through the gateway first".to_string()))
}

/// Player behind the calling connection
/// This abstracts the session lookup pattern used throughout reducers
fn get_player(ctx: &ReducerContext) -> Result<Player, ProgressionError> {
    let session = get_session(ctx)?;
    ctx.db
        .player()
        .id()
        .find(&session.player_id)
        .ok_or_else(|| ProgressionError::NotFound("player record missing; call connect first".to_string()))
}

/// Sole entry point for reading progression state. Creates the record on
/// first touch; the player-id primary key keeps it one-per-player.
fn get_or_create_state(ctx: &ReducerContext, player_id: &str) -> GameState {
    if let Some(state) = ctx.db.game_state().player_id().find(&player_id.to_string()) {
        return state;
    }
    ctx.db.game_state().insert(GameState {
        player_id: player_id.to_string(),
        current_step: 1,
        current_cycle: 1,
        updated_at: ctx.timestamp,
    })
}

/// Quiz log for (player, cycle), if one exists. At most one live row per
/// pair: this lookup is the only creation guard and reducers run serialized.
fn find_quiz_log(ctx: &ReducerContext, player_id: &str, cycle: u32) -> Option<QuizLog> {
    ctx.db
        .quiz_log()
        .player_id()
        .filter(&player_id.to_string())
        .find(|q| q.cycle == cycle)
}

/// Puzzle log for (player, cycle, step), if one exists
fn find_puzzle_log(ctx: &ReducerContext, player_id: &str, cycle: u32, step: u8) -> Option<PuzzleLog> {
    ctx.db
        .puzzle_log()
        .player_id()
        .filter(&player_id.to_string())
        .find(|p| p.cycle == cycle && p.step == step)
}

/// Prompts this player has already answered correctly; the generator skips
/// them so a mastered question does not come back
fn correctly_answered_prompts(ctx: &ReducerContext, player_id: &str) -> Vec<String> {
    ctx.db
        .question_history()
        .player_id()
        .filter(&player_id.to_string())
        .filter(|h| h.correct)
        .map(|h| h.prompt)
        .collect()
}

/// Write-once insert into question_history. An existing row for the same
/// prompt is never touched again.
fn record_correct_answer(ctx: &ReducerContext, player_id: &str, prompt: &str) {
    let exists = ctx
        .db
        .question_history()
        .player_id()
        .filter(&player_id.to_string())
        .any(|h| h.prompt == prompt);
    if exists {
        return;
    }
    ctx.db.question_history().insert(QuestionHistory {
        id: 0, // auto_inc
        player_id: player_id.to_string(),
        prompt: prompt.to_string(),
        topic: HISTORY_TOPIC.to_string(),
        correct: true,
        answered_at: ctx.timestamp,
    });
}

/// Effective pass rule; AllPass when the config row is missing
fn passing_policy(ctx: &ReducerContext) -> PassingPolicy {
    ctx.db
        .game_config()
        .id()
        .find(&CONFIG_ROW)
        .map(|c| c.passing_policy)
        .unwrap_or(PassingPolicy::AllPass)
}

/// Authorization check for worker-only reducers
fn ensure_worker(ctx: &ReducerContext, action: &str) -> Result<(), String> {
    if ctx.db.authorized_worker().identity().find(&ctx.sender).is_none() {
        log::warn!("Unauthorized {} attempt by {}", action, ctx.sender);
        return Err("unauthorized".to_string());
    }
    Ok(())
}

// ==================== TABLES ====================

/// Session links ephemeral connection to stable player
/// PRIVATE: Links connection identity to player ID (no PII)
#[table(name = session)]
pub struct Session {
    #[primary_key]
    pub connection_id: Identity,

    /// Stable player ID, verified by the gateway
    pub player_id: String,

    /// When this session was created
    pub connected_at: Timestamp,
}

/// Player account
/// PRIVATE: Clients access via my_player view
#[table(name = player)]
#[derive(Clone)]
pub struct Player {
    #[primary_key]
    pub id: String,

    /// Display name
    pub name: String,

    pub created_at: Timestamp,

    /// Last connect or reconnect
    pub last_seen: Timestamp,
}

/// Player persona shown in the hub
/// PRIVATE: Clients access via my_persona view
#[table(name = persona)]
pub struct Persona {
    #[primary_key]
    pub player_id: String,

    /// Persona name, distinct from the account display name
    pub name: String,

    pub avatar_style: String,

    pub avatar_gender: String,

    pub updated_at: Timestamp,
}

/// Progression state, one row per player.
/// The primary key IS the natural key, so a duplicate record can never be
/// inserted behind the lazy-create path.
/// PRIVATE: Clients access via my_game_state view
#[table(name = game_state)]
#[derive(Clone)]
pub struct GameState {
    #[primary_key]
    pub player_id: String,

    /// Gate currently being worked on, 1-based.
    /// GATE_COUNT + 1 means every gate in the cycle is cleared.
    pub current_step: u8,

    /// Playthrough number, starts at 1
    pub current_cycle: u32,

    pub updated_at: Timestamp,
}

/// Generated quiz for one (player, cycle)
/// Public for client subscription; RLS restricts rows to the owner
#[table(name = quiz_log, public)]
#[derive(Clone)]
pub struct QuizLog {
    #[primary_key]
    #[auto_inc]
    pub id: u64,

    #[index(btree)]
    pub player_id: String,

    /// Cycle this quiz belongs to
    pub cycle: u32,

    /// Stored question order; submissions are graded against it
    pub questions: Vec<QuizQuestion>,

    /// Latest graded score
    pub score: u32,

    /// Outcome of the latest submission under the configured pass rule
    pub passed: bool,

    pub created_at: Timestamp,

    /// Set on first submission; None while the quiz is still open
    pub submitted_at: Option<Timestamp>,
}

/// Generated puzzle instance for one (player, cycle, step).
/// Deleted only by reboot_puzzle; regenerated lazily on the next request.
/// Public for client subscription; RLS restricts rows to the owner
#[table(name = puzzle_log, public)]
pub struct PuzzleLog {
    #[primary_key]
    #[auto_inc]
    pub id: u64,

    #[index(btree)]
    pub player_id: String,

    pub cycle: u32,

    /// Gate this puzzle guards, 1-based
    pub step: u8,

    /// Puzzle family; the renderer dispatches on this
    pub kind: PuzzleKind,

    /// Opaque JSON payload, interpreted only by the renderer
    pub data: String,

    pub solved: bool,

    pub created_at: Timestamp,

    pub solved_at: Option<Timestamp>,
}

/// Questions a player has answered, keyed by prompt text.
/// Append-only and write-once: a row is never updated once inserted.
/// PRIVATE: Consulted server-side at generation time
#[table(name = question_history)]
pub struct QuestionHistory {
    #[primary_key]
    #[auto_inc]
    pub id: u64,

    #[index(btree)]
    pub player_id: String,

    /// Question text; the dedup identity within one player's history
    pub prompt: String,

    /// Content provenance tag
    pub topic: String,

    pub correct: bool,

    pub answered_at: Timestamp,
}

/// Hint delivery slot, one per player, overwritten on every request.
/// Carries no progression state.
/// Public for client subscription; RLS restricts rows to the owner
#[table(name = hint_slot, public)]
pub struct HintSlot {
    #[primary_key]
    pub player_id: String,

    pub step: u8,

    pub kind: PuzzleKind,

    pub hint: String,

    pub requested_at: Timestamp,
}

/// Module configuration singleton
#[table(name = game_config, public)]
#[derive(Clone)]
pub struct GameConfig {
    #[primary_key]
    pub id: u8,

    /// Quiz pass rule applied on every submission
    pub passing_policy: PassingPolicy,
}

/// Authorized identities that can call admin and gateway reducers
#[table(name = authorized_worker)]
pub struct AuthorizedWorker {
    #[primary_key]
    pub identity: Identity,
}

// ==================== VIEWS ====================

/// View: Returns only the current user's player data
#[view(name = my_player, public)]
fn my_player(ctx: &spacetimedb::ViewContext) -> Option<Player> {
    let session = ctx.db.session().connection_id().find(ctx.sender)?;
    ctx.db.player().id().find(&session.player_id)
}

/// View: Returns only the current user's progression state
#[view(name = my_game_state, public)]
fn my_game_state(ctx: &spacetimedb::ViewContext) -> Option<GameState> {
    let session = ctx.db.session().connection_id().find(ctx.sender)?;
    ctx.db.game_state().player_id().find(&session.player_id)
}

/// View: Returns only the current user's persona
#[view(name = my_persona, public)]
fn my_persona(ctx: &spacetimedb::ViewContext) -> Option<Persona> {
    let session = ctx.db.session().connection_id().find(ctx.sender)?;
    ctx.db.persona().player_id().find(&session.player_id)
}

// ==================== ROW LEVEL SECURITY ====================

/// RLS Filter: players see only their own quiz logs
#[client_visibility_filter]
const QUIZ_LOG_VISIBILITY: Filter = Filter::Sql(
    "SELECT q.* FROM quiz_log q
     JOIN session s WHERE q.player_id = s.player_id AND s.connection_id = :sender",
);

/// RLS Filter: players see only their own puzzle logs
#[client_visibility_filter]
const PUZZLE_LOG_VISIBILITY: Filter = Filter::Sql(
    "SELECT p.* FROM puzzle_log p
     JOIN session s WHERE p.player_id = s.player_id AND s.connection_id = :sender",
);

/// RLS Filter: players see only their own hint slot
#[client_visibility_filter]
const HINT_SLOT_VISIBILITY: Filter = Filter::Sql(
    "SELECT h.* FROM hint_slot h
     JOIN session s WHERE h.player_id = s.player_id AND s.connection_id = :sender",
);

// ==================== LIFECYCLE REDUCERS ====================

/// Module initialization: authorize the owner and seed default config
#[reducer(init)]
pub fn init(ctx: &ReducerContext) {
    // In init, ctx.sender is the module owner identity
    if ctx.db.authorized_worker().identity().find(&ctx.sender).is_none() {
        ctx.db.authorized_worker().insert(AuthorizedWorker {
            identity: ctx.sender,
        });
    }

    // Keep an operator-set policy across republishes
    if ctx.db.game_config().id().find(&CONFIG_ROW).is_none() {
        ctx.db.game_config().insert(GameConfig {
            id: CONFIG_ROW,
            passing_policy: PassingPolicy::AllPass,
        });
    }

    log::info!("MindGate module initialized");
}

/// Create a verified session for a client identity.
/// Called by the gateway after it has authenticated the player; credentials
/// never enter the module.
#[reducer]
pub fn create_session(ctx: &ReducerContext, client_identity: String, player_id: String) -> Result<(), String> {
    ensure_worker(ctx, "create_session")?;

    let identity = Identity::from_hex(&client_identity)
        .map_err(|_| ProgressionError::Malformed("invalid identity hex string".to_string()))?;

    // Drop stale sessions: same player (unclean reconnect) or same
    // connection (primary-key conflict)
    let stale: Vec<Identity> = ctx
        .db
        .session()
        .iter()
        .filter(|s| s.player_id == player_id || s.connection_id == identity)
        .map(|s| s.connection_id)
        .collect();
    for connection_id in stale {
        ctx.db.session().connection_id().delete(&connection_id);
    }

    ctx.db.session().insert(Session {
        connection_id: identity,
        player_id: player_id.clone(),
        connected_at: ctx.timestamp,
    });

    log::info!("[SESSION] created player:{}", &player_id[..8.min(player_id.len())]);
    Ok(())
}

/// Player connects. The player id comes from the verified session; the
/// display name is client-supplied and only affects their own record.
#[reducer]
pub fn connect(ctx: &ReducerContext, name: String) -> Result<(), String> {
    let session = get_session(ctx)?;
    let player_id = session.player_id;

    let (player, kind) = if let Some(mut existing) = ctx.db.player().id().find(&player_id) {
        existing.name = name;
        existing.last_seen = ctx.timestamp;
        ctx.db.player().id().update(existing.clone());
        (existing, "returning")
    } else {
        let new_player = ctx.db.player().insert(Player {
            id: player_id.clone(),
            name,
            created_at: ctx.timestamp,
            last_seen: ctx.timestamp,
        });
        (new_player, "new")
    };

    // Warm the progression record so the dashboard has state to render
    let state = get_or_create_state(ctx, &player.id);

    let pid = &player.id[..8.min(player.id.len())];
    log::info!(
        "[CONNECT] player=\"{}\" player_id={} type={} step:{} cycle:{}",
        player.name, pid, kind, state.current_step, state.current_cycle
    );
    Ok(())
}

#[reducer(client_disconnected)]
pub fn on_disconnect(ctx: &ReducerContext) {
    if let Some(session) = ctx.db.session().connection_id().find(&ctx.sender) {
        let session_secs = ctx
            .timestamp
            .duration_since(session.connected_at)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        log::info!(
            "[DISCONNECT] player:{} session_min:{:.1}",
            &session.player_id[..8.min(session.player_id.len())],
            session_secs as f32 / 60.0
        );

        // Delete session (ephemeral connection mapping)
        ctx.db.session().connection_id().delete(&ctx.sender);
    }
}

/// Create or update the player's persona
#[reducer]
pub fn save_persona(ctx: &ReducerContext, name: String, style: String, gender: String) -> Result<(), String> {
    let player = get_player(ctx)?;

    let persona = Persona {
        player_id: player.id.clone(),
        name,
        avatar_style: style,
        avatar_gender: gender,
        updated_at: ctx.timestamp,
    };
    if ctx.db.persona().player_id().find(&player.id).is_some() {
        ctx.db.persona().player_id().update(persona);
    } else {
        ctx.db.persona().insert(persona);
    }

    log::info!("[PERSONA] saved player:{}", player.name);
    Ok(())
}

// ==================== PROGRESSION REDUCERS ====================

/// Fetch, or lazily create, the quiz for the player's current cycle.
/// Repeated requests return the stored question set; reloading never
/// re-rolls the questions.
#[reducer]
pub fn request_quiz(ctx: &ReducerContext) -> Result<(), String> {
    let player = get_player(ctx)?;
    let state = get_or_create_state(ctx, &player.id);
    progression::ensure_quiz_stage(state.current_step)?;

    if let Some(existing) = find_quiz_log(ctx, &player.id, state.current_cycle) {
        log::debug!(
            "[QUIZ] reusing quiz:{} player:{} cycle:{}",
            existing.id, player.name, state.current_cycle
        );
        return Ok(());
    }

    let exclude = correctly_answered_prompts(ctx, &player.id);
    let mut generator = BankGenerator::new(ctx.rng());
    let questions = match generator.quiz(state.current_cycle, &exclude) {
        Ok(q) => q,
        Err(e) => {
            log::error!(
                "[QUIZ] generation failed player:{} cycle:{} error:{}",
                player.name, state.current_cycle, e
            );
            return Err(ProgressionError::from(e).into());
        }
    };
    // Nothing persists unless the generator output passes shape validation
    if let Err(e) = progression::validate_quiz(&questions) {
        log::error!(
            "[QUIZ] invalid generator output player:{} cycle:{} error:{}",
            player.name, state.current_cycle, e
        );
        return Err(e.into());
    }

    let quiz = ctx.db.quiz_log().insert(QuizLog {
        id: 0, // auto_inc
        player_id: player.id.clone(),
        cycle: state.current_cycle,
        questions,
        score: 0,
        passed: false,
        created_at: ctx.timestamp,
        submitted_at: None,
    });

    log::info!(
        "[QUIZ] generated quiz:{} player:{} cycle:{} questions:{}",
        quiz.id, player.name, quiz.cycle, quiz.questions.len()
    );
    Ok(())
}

/// Grade a submitted answer sheet against the stored question order.
/// Score update and history inserts commit together or not at all.
#[reducer]
pub fn submit_quiz(ctx: &ReducerContext, quiz_id: u64, answers: Vec<u8>) -> Result<(), String> {
    let player = get_player(ctx)?;

    let mut quiz = match ctx.db.quiz_log().id().find(&quiz_id) {
        Some(q) if q.player_id == player.id => q,
        _ => {
            log::warn!("[QUIZ] submit for unknown quiz:{} player:{}", quiz_id, player.name);
            return Err(ProgressionError::NotFound(format!("quiz {} not found", quiz_id)).into());
        }
    };

    let grade = progression::grade_answers(&quiz.questions, &answers)?;

    // Write-once history for newly-correct answers; feeds generation-time
    // exclusion so a mastered question is not presented again
    for (question, correct) in quiz.questions.iter().zip(&grade.correct) {
        if *correct {
            record_correct_answer(ctx, &player.id, &question.prompt);
        }
    }

    let passed = progression::quiz_passed(&passing_policy(ctx), &grade);

    quiz.score = grade.score;
    quiz.passed = passed;
    quiz.submitted_at = Some(ctx.timestamp);
    ctx.db.quiz_log().id().update(quiz);

    // Passing never advances the step; only a puzzle solve does. The caller
    // is pointed at the puzzle stage for the gate they are standing on.
    let state = get_or_create_state(ctx, &player.id);
    log::info!(
        "[QUIZ] submitted quiz:{} player:{} score:{} correct:{}/{} passed:{} next:puzzle step:{}",
        quiz_id,
        player.name,
        grade.score,
        grade.correct_count(),
        grade.correct.len(),
        passed,
        state.current_step
    );
    Ok(())
}

/// Fetch, or lazily create, the puzzle guarding a gate.
/// Repeated requests return the same instance until it is solved or
/// rebooted.
#[reducer]
pub fn request_puzzle(ctx: &ReducerContext, step: u8) -> Result<(), String> {
    let player = get_player(ctx)?;
    let state = get_or_create_state(ctx, &player.id);
    progression::ensure_gate_open(step, state.current_step)?;

    if let Some(existing) = find_puzzle_log(ctx, &player.id, state.current_cycle, step) {
        log::debug!(
            "[PUZZLE] reusing puzzle:{} player:{} step:{}",
            existing.id, player.name, step
        );
        return Ok(());
    }

    let mut generator = BankGenerator::new(ctx.rng());
    let generated = match generator.puzzle(step, state.current_cycle) {
        Ok(p) => p,
        Err(e) => {
            log::error!(
                "[PUZZLE] generation failed player:{} step:{} error:{}",
                player.name, step, e
            );
            return Err(ProgressionError::from(e).into());
        }
    };
    if let Err(e) = progression::validate_puzzle(&generated) {
        log::error!(
            "[PUZZLE] invalid generator output player:{} step:{} error:{}",
            player.name, step, e
        );
        return Err(e.into());
    }

    let puzzle = ctx.db.puzzle_log().insert(PuzzleLog {
        id: 0, // auto_inc
        player_id: player.id.clone(),
        cycle: state.current_cycle,
        step,
        kind: generated.kind,
        data: generated.data.to_string(),
        solved: false,
        created_at: ctx.timestamp,
        solved_at: None,
    });

    log::info!(
        "[PUZZLE] generated puzzle:{} player:{} cycle:{} step:{} kind:{}",
        puzzle.id, player.name, puzzle.cycle, step, puzzle.kind.tag()
    );
    Ok(())
}

/// Mark a gate's puzzle solved. The step advances here and only here, and
/// only when the solved gate is the one the player is standing on; a
/// duplicate solve call re-marks the log but cannot advance twice.
#[reducer]
pub fn solve_puzzle(ctx: &ReducerContext, step: u8) -> Result<(), String> {
    let player = get_player(ctx)?;
    let mut state = get_or_create_state(ctx, &player.id);
    progression::ensure_valid_step(step)?;

    let mut puzzle = find_puzzle_log(ctx, &player.id, state.current_cycle, step).ok_or_else(|| {
        ProgressionError::NotFound(format!("no puzzle log for step {}; request it first", step))
    })?;

    puzzle.solved = true;
    puzzle.solved_at = Some(ctx.timestamp);
    ctx.db.puzzle_log().id().update(puzzle);

    let next = progression::advance_after_solve(state.current_step, step);
    if next != state.current_step {
        state.current_step = next;
        state.updated_at = ctx.timestamp;
        ctx.db.game_state().player_id().update(state.clone());

        if next > GATE_COUNT {
            log::info!(
                "[GATE] all gates cleared player:{} cycle:{}",
                player.name, state.current_cycle
            );
        } else {
            log::info!("[GATE] cleared step:{} player:{} now:{}", step, player.name, next);
        }
    } else {
        log::debug!(
            "[GATE] repeat solve step:{} player:{} current:{}",
            step, player.name, state.current_step
        );
    }
    Ok(())
}

/// Delete a gate's puzzle instance so the next request regenerates fresh
/// content. Succeeds as a no-op when no instance exists.
#[reducer]
pub fn reboot_puzzle(ctx: &ReducerContext, step: u8) -> Result<(), String> {
    let player = get_player(ctx)?;
    let state = get_or_create_state(ctx, &player.id);
    progression::ensure_valid_step(step)?;

    if let Some(puzzle) = find_puzzle_log(ctx, &player.id, state.current_cycle, step) {
        ctx.db.puzzle_log().id().delete(&puzzle.id);
        log::info!(
            "[PUZZLE] rebooted puzzle:{} player:{} step:{}",
            puzzle.id, player.name, step
        );
    } else {
        log::debug!("[PUZZLE] reboot no-op player:{} step:{}", player.name, step);
    }
    Ok(())
}

/// Stateless hint for an existing puzzle, delivered through the caller's
/// hint slot
#[reducer]
pub fn request_hint(ctx: &ReducerContext, step: u8) -> Result<(), String> {
    let player = get_player(ctx)?;
    let state = get_or_create_state(ctx, &player.id);
    progression::ensure_valid_step(step)?;

    let puzzle = find_puzzle_log(ctx, &player.id, state.current_cycle, step)
        .ok_or_else(|| ProgressionError::NotFound(format!("no puzzle log for step {}", step)))?;

    let mut generator = BankGenerator::new(ctx.rng());
    let hint = generator.hint(step, puzzle.kind);

    let slot = HintSlot {
        player_id: player.id.clone(),
        step,
        kind: puzzle.kind,
        hint,
        requested_at: ctx.timestamp,
    };
    if ctx.db.hint_slot().player_id().find(&player.id).is_some() {
        ctx.db.hint_slot().player_id().update(slot);
    } else {
        ctx.db.hint_slot().insert(slot);
    }

    log::info!("[HINT] served player:{} step:{} kind:{}", player.name, step, puzzle.kind.tag());
    Ok(())
}

/// Begin the next cycle once every gate is cleared. Prior-cycle logs keep
/// their (cycle, step) keys; the new cycle's content generates lazily.
#[reducer]
pub fn start_next_cycle(ctx: &ReducerContext) -> Result<(), String> {
    let player = get_player(ctx)?;
    let mut state = get_or_create_state(ctx, &player.id);

    if state.current_step <= GATE_COUNT {
        return Err(ProgressionError::Locked(format!(
            "cycle {} still has gates to clear",
            state.current_cycle
        ))
        .into());
    }

    state.current_cycle = state.current_cycle.saturating_add(1);
    state.current_step = 1;
    state.updated_at = ctx.timestamp;
    ctx.db.game_state().player_id().update(state.clone());

    log::info!("[CYCLE] started cycle:{} player:{}", state.current_cycle, player.name);
    Ok(())
}

// ==================== ADMIN REDUCERS ====================

/// Switch the quiz pass rule (worker-only)
#[reducer]
pub fn set_passing_policy(ctx: &ReducerContext, policy: PassingPolicy) -> Result<(), String> {
    ensure_worker(ctx, "set_passing_policy")?;

    let config = GameConfig {
        id: CONFIG_ROW,
        passing_policy: policy,
    };
    if ctx.db.game_config().id().find(&CONFIG_ROW).is_some() {
        ctx.db.game_config().id().update(config.clone());
    } else {
        ctx.db.game_config().insert(config.clone());
    }

    log::info!("[ADMIN] passing policy set to {:?}", config.passing_policy);
    Ok(())
}

/// Wipe a player's progression back to gate 1, cycle 1 (worker-only).
/// The player row and persona survive.
#[reducer]
pub fn admin_reset_player(ctx: &ReducerContext, player_id: String) -> Result<(), String> {
    ensure_worker(ctx, "admin_reset_player")?;

    if ctx.db.player().id().find(&player_id).is_none() {
        return Err(ProgressionError::NotFound(format!("player {}", player_id)).into());
    }

    let quiz_ids: Vec<u64> = ctx.db.quiz_log().player_id().filter(&player_id).map(|q| q.id).collect();
    for id in &quiz_ids {
        ctx.db.quiz_log().id().delete(id);
    }

    let puzzle_ids: Vec<u64> = ctx.db.puzzle_log().player_id().filter(&player_id).map(|p| p.id).collect();
    for id in &puzzle_ids {
        ctx.db.puzzle_log().id().delete(id);
    }

    let history_ids: Vec<u64> = ctx
        .db
        .question_history()
        .player_id()
        .filter(&player_id)
        .map(|h| h.id)
        .collect();
    for id in &history_ids {
        ctx.db.question_history().id().delete(id);
    }

    ctx.db.hint_slot().player_id().delete(&player_id);

    let fresh = GameState {
        player_id: player_id.clone(),
        current_step: 1,
        current_cycle: 1,
        updated_at: ctx.timestamp,
    };
    if ctx.db.game_state().player_id().find(&player_id).is_some() {
        ctx.db.game_state().player_id().update(fresh);
    } else {
        ctx.db.game_state().insert(fresh);
    }

    log::info!(
        "[ADMIN] reset player:{} quizzes:{} puzzles:{} history:{}",
        &player_id[..8.min(player_id.len())],
        quiz_ids.len(),
        puzzle_ids.len(),
        history_ids.len()
    );
    Ok(())
}
