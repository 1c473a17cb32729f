// Progression rules for the gate sequence.
// Pure functions over plain data; reducers own all table access, so
// everything here is testable without a module host.

use spacetimedb::SpacetimeType;
use thiserror::Error;

use crate::content::{GeneratedPuzzle, GeneratorError, QuizQuestion};

/// Number of gates in one cycle
pub const GATE_COUNT: u8 = 6;

/// Questions per generated quiz
pub const QUIZ_LENGTH: usize = 5;

/// Points awarded per correct answer
pub const POINTS_PER_QUESTION: u32 = 10;

/// Expected, caller-recoverable transition failures. Reducers surface these
/// as `Err` strings; the transaction rolls back, so no partial state leaks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProgressionError {
    /// Action on a gate not yet reachable, or past the end of the run
    #[error("locked: {0}")]
    Locked(String),

    /// Referenced log is absent or belongs to another player
    #[error("not found: {0}")]
    NotFound(String),

    /// Input shape is invalid
    #[error("malformed: {0}")]
    Malformed(String),

    /// The content generator failed or returned an invalid shape
    #[error("generator failure: {0}")]
    Generator(#[from] GeneratorError),
}

impl From<ProgressionError> for String {
    fn from(err: ProgressionError) -> String {
        err.to_string()
    }
}

/// Quiz pass rule. Persisted in game_config and applied on every submission.
/// AllPass is the live default: every submission moves the player on to the
/// puzzle stage regardless of score.
#[derive(SpacetimeType, Clone, Debug, PartialEq)]
pub enum PassingPolicy {
    AllPass,
    RequireAllCorrect,
    RequireMinimumScore(u32),
}

/// Outcome of grading one submission
#[derive(Debug, Clone, PartialEq)]
pub struct QuizGrade {
    /// Accumulated score (POINTS_PER_QUESTION per correct answer)
    pub score: u32,

    /// Per-question correctness, in stored question order
    pub correct: Vec<bool>,
}

impl QuizGrade {
    pub fn correct_count(&self) -> usize {
        self.correct.iter().filter(|c| **c).count()
    }
}

/// A quiz may only be requested while gates remain in the cycle
pub fn ensure_quiz_stage(current_step: u8) -> Result<(), ProgressionError> {
    if current_step > GATE_COUNT {
        return Err(ProgressionError::Locked(
            "all gates cleared; no quiz available this cycle".to_string(),
        ));
    }
    Ok(())
}

/// Step numbers are 1-based and bounded by the gate count
pub fn ensure_valid_step(step: u8) -> Result<(), ProgressionError> {
    if step == 0 || step > GATE_COUNT {
        return Err(ProgressionError::Malformed(format!(
            "step {} outside 1..={}",
            step, GATE_COUNT
        )));
    }
    Ok(())
}

/// A puzzle is reachable once its gate is at or below the current step
pub fn ensure_gate_open(step: u8, current_step: u8) -> Result<(), ProgressionError> {
    ensure_valid_step(step)?;
    if step > current_step {
        return Err(ProgressionError::Locked(format!(
            "gate {} is locked; complete the quiz for gate {} first",
            step, current_step
        )));
    }
    Ok(())
}

/// Grade a submission against the stored question order.
/// An answer index outside a question's options grades as incorrect; only a
/// wrong-length answer list rejects the submission outright.
pub fn grade_answers(questions: &[QuizQuestion], answers: &[u8]) -> Result<QuizGrade, ProgressionError> {
    if answers.len() != questions.len() {
        return Err(ProgressionError::Malformed(format!(
            "expected {} answers, got {}",
            questions.len(),
            answers.len()
        )));
    }

    let correct: Vec<bool> = questions
        .iter()
        .zip(answers)
        .map(|(q, &a)| (a as usize) < q.options.len() && a == q.correct_index)
        .collect();
    let score = correct.iter().filter(|c| **c).count() as u32 * POINTS_PER_QUESTION;

    Ok(QuizGrade { score, correct })
}

/// Apply the configured pass rule to a graded submission
pub fn quiz_passed(policy: &PassingPolicy, grade: &QuizGrade) -> bool {
    match policy {
        PassingPolicy::AllPass => true,
        PassingPolicy::RequireAllCorrect => {
            !grade.correct.is_empty() && grade.correct.iter().all(|c| *c)
        }
        PassingPolicy::RequireMinimumScore(min) => grade.score >= *min,
    }
}

/// The only path by which current_step increases: solving the puzzle for the
/// step the player is standing on. Solving any other (already-passed) step
/// leaves the step untouched, so duplicate solve calls cannot double-advance.
pub fn advance_after_solve(current_step: u8, solved_step: u8) -> u8 {
    if solved_step == current_step {
        (current_step + 1).min(GATE_COUNT + 1)
    } else {
        current_step
    }
}

/// Validate generator quiz output before anything is persisted
pub fn validate_quiz(questions: &[QuizQuestion]) -> Result<(), ProgressionError> {
    if questions.is_empty() {
        return Err(GeneratorError::EmptyQuiz.into());
    }
    if questions.len() != QUIZ_LENGTH {
        return Err(GeneratorError::QuestionCount {
            expected: QUIZ_LENGTH,
            got: questions.len(),
        }
        .into());
    }
    for (index, q) in questions.iter().enumerate() {
        if q.prompt.is_empty() {
            return Err(GeneratorError::EmptyPrompt { index }.into());
        }
        if q.options.len() < 2 {
            return Err(GeneratorError::BadOptions { index }.into());
        }
        if (q.correct_index as usize) >= q.options.len() {
            return Err(GeneratorError::BadCorrectIndex {
                index,
                correct_index: q.correct_index,
            }
            .into());
        }
    }
    Ok(())
}

/// Validate generator puzzle output before anything is persisted.
/// The payload stays opaque; only its outermost shape is checked.
pub fn validate_puzzle(puzzle: &GeneratedPuzzle) -> Result<(), ProgressionError> {
    if !puzzle.data.is_object() {
        return Err(GeneratorError::BadPuzzlePayload.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PuzzleKind;
    use serde_json::json;

    fn question(prompt: &str, correct_index: u8) -> QuizQuestion {
        QuizQuestion {
            prompt: prompt.to_string(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index,
        }
    }

    fn full_quiz() -> Vec<QuizQuestion> {
        (0..QUIZ_LENGTH as u8)
            .map(|i| question(&format!("q{}", i), i % 4))
            .collect()
    }

    #[test]
    fn quiz_stage_open_until_all_gates_cleared() {
        for step in 1..=GATE_COUNT {
            assert!(ensure_quiz_stage(step).is_ok());
        }
        assert!(matches!(
            ensure_quiz_stage(GATE_COUNT + 1),
            Err(ProgressionError::Locked(_))
        ));
    }

    #[test]
    fn gate_open_at_or_below_current_step() {
        assert!(ensure_gate_open(1, 1).is_ok());
        assert!(ensure_gate_open(2, 5).is_ok());
        assert!(matches!(
            ensure_gate_open(3, 1),
            Err(ProgressionError::Locked(_))
        ));
    }

    #[test]
    fn step_bounds_are_malformed_not_locked() {
        assert!(matches!(
            ensure_gate_open(0, 3),
            Err(ProgressionError::Malformed(_))
        ));
        assert!(matches!(
            ensure_gate_open(GATE_COUNT + 1, GATE_COUNT + 1),
            Err(ProgressionError::Malformed(_))
        ));
    }

    #[test]
    fn wrong_length_submission_is_rejected() {
        let quiz = full_quiz();
        assert!(matches!(
            grade_answers(&quiz, &[0, 1]),
            Err(ProgressionError::Malformed(_))
        ));
        assert!(matches!(
            grade_answers(&quiz, &[0; QUIZ_LENGTH + 1]),
            Err(ProgressionError::Malformed(_))
        ));
    }

    #[test]
    fn all_correct_scores_full_points() {
        let quiz = full_quiz();
        let answers: Vec<u8> = quiz.iter().map(|q| q.correct_index).collect();
        let grade = grade_answers(&quiz, &answers).unwrap();
        assert_eq!(grade.score, QUIZ_LENGTH as u32 * POINTS_PER_QUESTION);
        assert_eq!(grade.correct_count(), QUIZ_LENGTH);
    }

    #[test]
    fn out_of_range_answer_counts_as_incorrect() {
        let quiz = full_quiz();
        let mut answers: Vec<u8> = quiz.iter().map(|q| q.correct_index).collect();
        answers[0] = 200;
        let grade = grade_answers(&quiz, &answers).unwrap();
        assert!(!grade.correct[0]);
        assert_eq!(grade.score, (QUIZ_LENGTH as u32 - 1) * POINTS_PER_QUESTION);
    }

    #[test]
    fn all_pass_policy_ignores_score() {
        let quiz = full_quiz();
        let grade = grade_answers(&quiz, &[3, 3, 3, 3, 3]).unwrap();
        assert!(quiz_passed(&PassingPolicy::AllPass, &grade));
    }

    #[test]
    fn require_all_correct_policy() {
        let quiz = full_quiz();
        let perfect: Vec<u8> = quiz.iter().map(|q| q.correct_index).collect();
        let mut one_off = perfect.clone();
        one_off[4] = (one_off[4] + 1) % 4;

        let policy = PassingPolicy::RequireAllCorrect;
        assert!(quiz_passed(&policy, &grade_answers(&quiz, &perfect).unwrap()));
        assert!(!quiz_passed(&policy, &grade_answers(&quiz, &one_off).unwrap()));
    }

    #[test]
    fn minimum_score_policy_is_inclusive() {
        let quiz = full_quiz();
        let perfect: Vec<u8> = quiz.iter().map(|q| q.correct_index).collect();
        let grade = grade_answers(&quiz, &perfect).unwrap();

        assert!(quiz_passed(&PassingPolicy::RequireMinimumScore(grade.score), &grade));
        assert!(!quiz_passed(
            &PassingPolicy::RequireMinimumScore(grade.score + 1),
            &grade
        ));
    }

    #[test]
    fn solve_advances_only_the_current_step() {
        assert_eq!(advance_after_solve(1, 1), 2);
        // Duplicate solve of an already-passed step
        assert_eq!(advance_after_solve(2, 1), 2);
        // Stale solve far behind
        assert_eq!(advance_after_solve(5, 2), 5);
    }

    #[test]
    fn step_never_exceeds_terminal_state() {
        let terminal = GATE_COUNT + 1;
        assert_eq!(advance_after_solve(GATE_COUNT, GATE_COUNT), terminal);
        assert_eq!(advance_after_solve(terminal, terminal), terminal);
    }

    #[test]
    fn step_is_monotonically_non_decreasing() {
        for current in 1..=GATE_COUNT + 1 {
            for solved in 1..=GATE_COUNT {
                assert!(advance_after_solve(current, solved) >= current);
            }
        }
    }

    #[test]
    fn validate_quiz_accepts_a_well_formed_set() {
        assert!(validate_quiz(&full_quiz()).is_ok());
    }

    #[test]
    fn validate_quiz_rejects_bad_shapes() {
        assert!(matches!(
            validate_quiz(&[]),
            Err(ProgressionError::Generator(GeneratorError::EmptyQuiz))
        ));

        let short = vec![question("q", 0)];
        assert!(matches!(
            validate_quiz(&short),
            Err(ProgressionError::Generator(GeneratorError::QuestionCount { .. }))
        ));

        let mut bad_index = full_quiz();
        bad_index[2].correct_index = 9;
        assert!(matches!(
            validate_quiz(&bad_index),
            Err(ProgressionError::Generator(GeneratorError::BadCorrectIndex { index: 2, .. }))
        ));

        let mut empty_prompt = full_quiz();
        empty_prompt[0].prompt.clear();
        assert!(matches!(
            validate_quiz(&empty_prompt),
            Err(ProgressionError::Generator(GeneratorError::EmptyPrompt { index: 0 }))
        ));

        let mut lone_option = full_quiz();
        lone_option[1].options.truncate(1);
        lone_option[1].correct_index = 0;
        assert!(matches!(
            validate_quiz(&lone_option),
            Err(ProgressionError::Generator(GeneratorError::BadOptions { index: 1 }))
        ));
    }

    #[test]
    fn validate_puzzle_requires_an_object_payload() {
        let good = GeneratedPuzzle {
            kind: PuzzleKind::Maze,
            data: json!({"title": "Neural Labyrinth", "seed": 7}),
        };
        assert!(validate_puzzle(&good).is_ok());

        let bad = GeneratedPuzzle {
            kind: PuzzleKind::Maze,
            data: json!([1, 2, 3]),
        };
        assert!(matches!(
            validate_puzzle(&bad),
            Err(ProgressionError::Generator(GeneratorError::BadPuzzlePayload))
        ));
    }

    #[test]
    fn error_strings_carry_their_category() {
        let locked: String = ProgressionError::Locked("gate 3".into()).into();
        assert!(locked.starts_with("locked:"));
        let missing: String = ProgressionError::NotFound("puzzle log".into()).into();
        assert!(missing.starts_with("not found:"));
        let malformed: String = ProgressionError::Malformed("answer count".into()).into();
        assert!(malformed.starts_with("malformed:"));
    }
}
