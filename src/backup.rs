// Bulk restore reducers for disaster recovery
// Accept JSON arrays exported from the admin panel (TypeScript SDK format)

use spacetimedb::{reducer, ReducerContext, Timestamp, log, Table};
use crate::{Player, GameState, QuestionHistory, authorized_worker};
use crate::{player, game_state, question_history};
use serde_json::Value;

use crate::progression::GATE_COUNT;

/// Parse Timestamp from SDK JSON format:
/// {"__timestamp_micros_since_unix_epoch__": "123456"}
/// RFC 3339 strings from hand-edited exports are accepted too.
fn parse_timestamp_json(val: &Value) -> Result<Timestamp, String> {
    if let Some(s) = val.as_str() {
        let parsed = chrono::DateTime::parse_from_rfc3339(s)
            .map_err(|e| format!("Invalid RFC 3339 timestamp: {}", e))?;
        return Ok(Timestamp::from_micros_since_unix_epoch(parsed.timestamp_micros()));
    }

    let micros_str = val
        .get("__timestamp_micros_since_unix_epoch__")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid timestamp field")?;

    let micros: i64 = micros_str
        .parse()
        .map_err(|e| format!("Invalid timestamp micros: {}", e))?;

    Ok(Timestamp::from_micros_since_unix_epoch(micros))
}

/// Bulk restore player table from JSON array
/// Protected by authorization check - only authorized workers can call this
#[reducer]
pub fn bulk_restore_player(ctx: &ReducerContext, json_data: String) -> Result<(), String> {
    // Authorization check: only authorized workers can restore data
    if ctx.db.authorized_worker().identity().find(&ctx.sender).is_none() {
        log::warn!("Unauthorized bulk_restore_player attempt by {}", ctx.sender);
        return Err("Unauthorized".to_string());
    }

    let data: Value = serde_json::from_str(&json_data)
        .map_err(|e| format!("Invalid JSON: {}", e))?;

    let players = data.as_array()
        .ok_or("Expected JSON array of players")?;

    let mut count = 0;
    for (i, p) in players.iter().enumerate() {
        let row = Player {
            id: p.get("id").and_then(|v| v.as_str()).ok_or(format!("Player {}: missing id", i))?.to_string(),
            name: p.get("name").and_then(|v| v.as_str()).ok_or(format!("Player {}: missing name", i))?.to_string(),
            created_at: parse_timestamp_json(p.get("createdAt").ok_or(format!("Player {}: missing createdAt", i))?)?,
            last_seen: p.get("lastSeen").and_then(|v| parse_timestamp_json(v).ok())
                .unwrap_or_else(|| ctx.timestamp), // Default to now for old backups
        };

        ctx.db.player().insert(row);
        count += 1;
    }

    log::info!("[RESTORE] restored {} player records", count);
    Ok(())
}

/// Bulk restore game_state table from JSON array
/// Protected by authorization check - only authorized workers can call this
#[reducer]
pub fn bulk_restore_game_state(ctx: &ReducerContext, json_data: String) -> Result<(), String> {
    // Authorization check: only authorized workers can restore data
    if ctx.db.authorized_worker().identity().find(&ctx.sender).is_none() {
        log::warn!("Unauthorized bulk_restore_game_state attempt by {}", ctx.sender);
        return Err("Unauthorized".to_string());
    }

    let data: Value = serde_json::from_str(&json_data)
        .map_err(|e| format!("Invalid JSON: {}", e))?;

    let states = data.as_array()
        .ok_or("Expected JSON array of game_state records")?;

    let mut count = 0;
    for (i, s) in states.iter().enumerate() {
        let current_step = s.get("currentStep").and_then(|v| v.as_u64())
            .ok_or(format!("State {}: missing currentStep", i))? as u8;
        // Reject steps a live module could never have written
        if current_step == 0 || current_step > GATE_COUNT + 1 {
            return Err(format!("State {}: currentStep {} outside 1..={}", i, current_step, GATE_COUNT + 1));
        }

        let row = GameState {
            player_id: s.get("playerId").and_then(|v| v.as_str()).ok_or(format!("State {}: missing playerId", i))?.to_string(),
            current_step,
            current_cycle: s.get("currentCycle").and_then(|v| v.as_u64()).ok_or(format!("State {}: missing currentCycle", i))? as u32,
            updated_at: parse_timestamp_json(s.get("updatedAt").ok_or(format!("State {}: missing updatedAt", i))?)?,
        };

        ctx.db.game_state().insert(row);
        count += 1;
    }

    log::info!("[RESTORE] restored {} game_state records", count);
    Ok(())
}

/// Bulk restore question_history table from JSON array
/// Protected by authorization check - only authorized workers can call this
#[reducer]
pub fn bulk_restore_question_history(ctx: &ReducerContext, json_data: String) -> Result<(), String> {
    // Authorization check: only authorized workers can restore data
    if ctx.db.authorized_worker().identity().find(&ctx.sender).is_none() {
        log::warn!("Unauthorized bulk_restore_question_history attempt by {}", ctx.sender);
        return Err("Unauthorized".to_string());
    }

    let data: Value = serde_json::from_str(&json_data)
        .map_err(|e| format!("Invalid JSON: {}", e))?;

    let rows = data.as_array()
        .ok_or("Expected JSON array of question_history records")?;

    let mut count = 0;
    for (i, h) in rows.iter().enumerate() {
        let row = QuestionHistory {
            id: 0, // auto_inc
            player_id: h.get("playerId").and_then(|v| v.as_str()).ok_or(format!("History {}: missing playerId", i))?.to_string(),
            prompt: h.get("prompt").and_then(|v| v.as_str()).ok_or(format!("History {}: missing prompt", i))?.to_string(),
            topic: h.get("topic").and_then(|v| v.as_str()).unwrap_or("generated").to_string(),
            correct: h.get("correct").and_then(|v| v.as_bool()).ok_or(format!("History {}: missing correct", i))?,
            answered_at: parse_timestamp_json(h.get("answeredAt").ok_or(format!("History {}: missing answeredAt", i))?)?,
        };

        ctx.db.question_history().insert(row);
        count += 1;
    }

    log::info!("[RESTORE] restored {} question_history records", count);
    Ok(())
}
