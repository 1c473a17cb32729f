// Content generation for quizzes, puzzles, and hints.
// The module only ever talks to the `ContentGenerator` trait; reducers pass a
// concrete generator in per call, so nothing here holds global state.

use serde_json::{json, Value};
use spacetimedb::rand::Rng;
use spacetimedb::SpacetimeType;
use thiserror::Error;

use crate::progression::QUIZ_LENGTH;

/// One generated multiple-choice question as stored in a quiz log
#[derive(SpacetimeType, Clone, Debug, PartialEq)]
pub struct QuizQuestion {
    /// Question text; also the dedup identity in question_history
    pub prompt: String,

    /// Ordered answer options shown to the player
    pub options: Vec<String>,

    /// Index into `options` of the correct answer
    pub correct_index: u8,
}

/// Puzzle family tag; the payload shape belongs to the renderer, not to us
#[derive(SpacetimeType, Clone, Copy, Debug, PartialEq)]
pub enum PuzzleKind {
    TowerOfHanoi,
    CircuitPath,
    MemoryMatch,
    Maze,
    MirrorMaze,
    SlidingTiles,
}

impl PuzzleKind {
    pub const ALL: [PuzzleKind; 6] = [
        PuzzleKind::TowerOfHanoi,
        PuzzleKind::CircuitPath,
        PuzzleKind::MemoryMatch,
        PuzzleKind::Maze,
        PuzzleKind::MirrorMaze,
        PuzzleKind::SlidingTiles,
    ];

    /// Wire tag matching the renderer's type strings
    pub fn tag(&self) -> &'static str {
        match self {
            PuzzleKind::TowerOfHanoi => "tower-of-hanoi",
            PuzzleKind::CircuitPath => "circuit-path",
            PuzzleKind::MemoryMatch => "memory-match",
            PuzzleKind::Maze => "maze",
            PuzzleKind::MirrorMaze => "mirror-maze",
            PuzzleKind::SlidingTiles => "sliding-tiles",
        }
    }
}

/// Generator output that failed shape validation; nothing gets persisted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    #[error("generator returned an empty question set")]
    EmptyQuiz,

    #[error("generator returned {got} questions, expected {expected}")]
    QuestionCount { expected: usize, got: usize },

    #[error("question {index} has fewer than two options")]
    BadOptions { index: usize },

    #[error("question {index} correct_index {correct_index} is out of range")]
    BadCorrectIndex { index: usize, correct_index: u8 },

    #[error("question {index} has an empty prompt")]
    EmptyPrompt { index: usize },

    #[error("puzzle payload is not a JSON object")]
    BadPuzzlePayload,
}

/// A generated puzzle instance: a kind tag plus an opaque payload
pub struct GeneratedPuzzle {
    pub kind: PuzzleKind,
    pub data: Value,
}

/// The external content collaborator. Stateless from the caller's point of
/// view; implementations may own an RNG.
pub trait ContentGenerator {
    /// Produce a full quiz for the given cycle. `exclude` holds prompts the
    /// player has already answered correctly and should not see again.
    fn quiz(&mut self, cycle: u32, exclude: &[String]) -> Result<Vec<QuizQuestion>, GeneratorError>;

    /// Produce a puzzle instance for (step, cycle)
    fn puzzle(&mut self, step: u8, cycle: u32) -> Result<GeneratedPuzzle, GeneratorError>;

    /// Short cryptic hint for an existing puzzle. Never persisted as
    /// progression state.
    fn hint(&mut self, step: u8, kind: PuzzleKind) -> String;
}

// ==================== QUESTION BANK ====================

struct BankedQuestion {
    prompt: &'static str,
    options: [&'static str; 4],
    correct_index: u8,
    /// Difficulty tier, mapped from cycle (1 = first playthrough)
    tier: u8,
}

const BANK: &[BankedQuestion] = &[
    // Tier 1: fundamentals
    BankedQuestion {
        prompt: "Which part of a neuron carries signals away from the cell body?",
        options: ["Dendrite", "Axon", "Synapse", "Myelin"],
        correct_index: 1,
        tier: 1,
    },
    BankedQuestion {
        prompt: "Binary notation uses which two digits?",
        options: ["0 and 1", "1 and 2", "0 and 9", "1 and 10"],
        correct_index: 0,
        tier: 1,
    },
    BankedQuestion {
        prompt: "Which data structure removes the most recently added element first?",
        options: ["Queue", "Stack", "Heap", "Linked list"],
        correct_index: 1,
        tier: 1,
    },
    BankedQuestion {
        prompt: "Which logic gate outputs true only when both inputs are true?",
        options: ["OR", "XOR", "AND", "NOT"],
        correct_index: 2,
        tier: 1,
    },
    BankedQuestion {
        prompt: "What happens to the contents of RAM when power is lost?",
        options: [
            "They are compressed",
            "They are written to disk",
            "They persist unchanged",
            "They are lost",
        ],
        correct_index: 3,
        tier: 1,
    },
    BankedQuestion {
        prompt: "What does a CPU cache primarily reduce?",
        options: ["Memory access latency", "Disk capacity", "Power draw", "Clock speed"],
        correct_index: 0,
        tier: 1,
    },
    // Tier 2: applied
    BankedQuestion {
        prompt: "Which sorting algorithm repeatedly swaps adjacent out-of-order elements?",
        options: ["Merge sort", "Bubble sort", "Quicksort", "Radix sort"],
        correct_index: 1,
        tier: 2,
    },
    BankedQuestion {
        prompt: "What does DNS translate?",
        options: [
            "IP addresses to MAC addresses",
            "Domain names to IP addresses",
            "URLs to file paths",
            "Ports to protocols",
        ],
        correct_index: 1,
        tier: 2,
    },
    BankedQuestion {
        prompt: "Hexadecimal is a number system with which base?",
        options: ["8", "12", "16", "32"],
        correct_index: 2,
        tier: 2,
    },
    BankedQuestion {
        prompt: "A checksum on a message primarily detects what?",
        options: ["Eavesdropping", "Transmission corruption", "Replay attacks", "Compression ratio"],
        correct_index: 1,
        tier: 2,
    },
    BankedQuestion {
        prompt: "Which binary tree traversal visits the root before its subtrees?",
        options: ["In-order", "Post-order", "Level-order", "Pre-order"],
        correct_index: 3,
        tier: 2,
    },
    BankedQuestion {
        prompt: "What does a database index speed up?",
        options: ["Row lookups", "Schema migrations", "Backups", "Connection pooling"],
        correct_index: 0,
        tier: 2,
    },
    // Tier 3: systems
    BankedQuestion {
        prompt: "Two threads each hold one lock and wait for the other's. What is this?",
        options: ["Livelock", "Starvation", "Deadlock", "Priority inversion"],
        correct_index: 2,
        tier: 3,
    },
    BankedQuestion {
        prompt: "What must be computationally hard to find for a cryptographic hash?",
        options: ["Its output length", "Two inputs with equal output", "Its seed value", "A fixed point"],
        correct_index: 1,
        tier: 3,
    },
    BankedQuestion {
        prompt: "Dijkstra's algorithm computes what over a weighted graph?",
        options: [
            "Minimum spanning tree",
            "Shortest paths from a source",
            "Strongly connected components",
            "Maximum flow",
        ],
        correct_index: 1,
        tier: 3,
    },
    BankedQuestion {
        prompt: "During a network partition, the CAP theorem forces a choice between what?",
        options: [
            "Consistency and availability",
            "Latency and throughput",
            "Durability and isolation",
            "Sharding and replication",
        ],
        correct_index: 0,
        tier: 3,
    },
    BankedQuestion {
        prompt: "Which class of memory error does an ownership-and-borrowing model rule out?",
        options: ["Stack overflow", "Integer overflow", "Use-after-free", "Cache miss"],
        correct_index: 2,
        tier: 3,
    },
    BankedQuestion {
        prompt: "What does a write-ahead log guarantee after a crash?",
        options: [
            "Committed writes can be replayed",
            "Reads never block",
            "Indexes stay balanced",
            "Compression stays optimal",
        ],
        correct_index: 0,
        tier: 3,
    },
];

/// Difficulty tier for a cycle: first playthrough gets tier 1, later cycles
/// climb until the bank tops out
fn tier_for_cycle(cycle: u32) -> u8 {
    cycle.clamp(1, 3) as u8
}

// ==================== HINT LINES ====================

const HANOI_HINTS: &[&str] = &[
    "The smallest fragment moves every second turn.",
    "Free the largest disc before anything else settles.",
    "Odd stacks open left, even stacks open right.",
];
const CIRCUIT_HINTS: &[&str] = &[
    "Power flows from source to target; corners waste nothing.",
    "Trace backwards from the target node.",
    "A straight segment only ever joins two neighbours.",
];
const MEMORY_HINTS: &[&str] = &[
    "Edges first; the centre lies.",
    "Pairs hide mirrored across the board.",
    "Slow reveals beat fast guesses.",
];
const MAZE_HINTS: &[&str] = &[
    "Keep one hand on the left wall.",
    "Dead ends cluster near the entrance.",
    "Bad data blocks never guard the true path.",
];
const MIRROR_HINTS: &[&str] = &[
    "Every reflection halves your options.",
    "Count the bends; the beam needs exactly that many.",
    "A mirror facing the source wastes the shot.",
];
const SLIDING_HINTS: &[&str] = &[
    "Solve the top row first and never touch it again.",
    "The blank tile does all the work.",
    "Rotate three tiles, not one.",
];

fn hint_pool(kind: PuzzleKind) -> &'static [&'static str] {
    match kind {
        PuzzleKind::TowerOfHanoi => HANOI_HINTS,
        PuzzleKind::CircuitPath => CIRCUIT_HINTS,
        PuzzleKind::MemoryMatch => MEMORY_HINTS,
        PuzzleKind::Maze => MAZE_HINTS,
        PuzzleKind::MirrorMaze => MIRROR_HINTS,
        PuzzleKind::SlidingTiles => SLIDING_HINTS,
    }
}

// ==================== BANK GENERATOR ====================

/// Built-in generator backed by the static banks above.
/// Constructed per reducer call over `ctx.rng()`.
pub struct BankGenerator<R: Rng> {
    rng: R,
}

impl<R: Rng> BankGenerator<R> {
    pub fn new(rng: R) -> Self {
        BankGenerator { rng }
    }

    /// Rotate a question's options so repeat encounters don't share a layout.
    /// The correct index is remapped to follow its option.
    fn rotated(&mut self, q: &BankedQuestion) -> QuizQuestion {
        let n = q.options.len();
        let shift = self.rng.gen_range(0..n);
        let options: Vec<String> = (0..n)
            .map(|i| q.options[(i + shift) % n].to_string())
            .collect();
        let correct_index = ((q.correct_index as usize + n - shift) % n) as u8;
        QuizQuestion {
            prompt: q.prompt.to_string(),
            options,
            correct_index,
        }
    }

    /// Draw up to `want` distinct questions from `pool` without replacement
    fn draw(&mut self, pool: &mut Vec<&'static BankedQuestion>, want: usize, out: &mut Vec<QuizQuestion>) {
        while out.len() < want && !pool.is_empty() {
            let i = self.rng.gen_range(0..pool.len());
            let picked = pool.swap_remove(i);
            let rotated = self.rotated(picked);
            out.push(rotated);
        }
    }
}

impl<R: Rng> ContentGenerator for BankGenerator<R> {
    fn quiz(&mut self, cycle: u32, exclude: &[String]) -> Result<Vec<QuizQuestion>, GeneratorError> {
        let tier = tier_for_cycle(cycle);
        let is_excluded = |q: &BankedQuestion| exclude.iter().any(|e| e == q.prompt);

        let mut questions = Vec::with_capacity(QUIZ_LENGTH);

        // Preferred pool: this cycle's tier, minus already-mastered prompts
        let mut pool: Vec<&BankedQuestion> = BANK
            .iter()
            .filter(|q| q.tier == tier && !is_excluded(q))
            .collect();
        self.draw(&mut pool, QUIZ_LENGTH, &mut questions);

        // Widen to the whole bank when the tier runs dry
        if questions.len() < QUIZ_LENGTH {
            let mut pool: Vec<&BankedQuestion> = BANK
                .iter()
                .filter(|q| q.tier != tier && !is_excluded(q))
                .collect();
            self.draw(&mut pool, QUIZ_LENGTH, &mut questions);
        }

        // Bank exhausted by history: fall back to repeats rather than
        // returning a short quiz
        if questions.len() < QUIZ_LENGTH {
            let mut pool: Vec<&BankedQuestion> = BANK
                .iter()
                .filter(|q| !questions.iter().any(|picked| picked.prompt == q.prompt))
                .collect();
            self.draw(&mut pool, QUIZ_LENGTH, &mut questions);
        }

        if questions.is_empty() {
            return Err(GeneratorError::EmptyQuiz);
        }
        Ok(questions)
    }

    fn puzzle(&mut self, step: u8, cycle: u32) -> Result<GeneratedPuzzle, GeneratorError> {
        // Rotate the kind with (step, cycle) so a repeat cycle sees a
        // different puzzle behind the same gate
        let slot = (step.max(1) as usize - 1 + (cycle.max(1) as usize - 1)) % PuzzleKind::ALL.len();
        let kind = PuzzleKind::ALL[slot];

        // Clients derive the full layout from the seed, so a revisit renders
        // the identical instance
        let seed: u32 = self.rng.gen();
        let stage = cycle.saturating_sub(1).min(2) + (step.max(1) as u32 - 1) / 2;

        let data = match kind {
            PuzzleKind::TowerOfHanoi => {
                let discs = (3 + stage).min(7);
                json!({
                    "title": "Core Relocation",
                    "brief": "Move the memory stack to the far pylon. Larger fragments never rest on smaller ones.",
                    "discs": discs,
                    "pegs": 3,
                    "min_moves": (1u64 << discs) - 1,
                    "seed": seed,
                })
            }
            PuzzleKind::CircuitPath => {
                let size = (4 + stage).min(7);
                json!({
                    "title": "Power Conduit",
                    "brief": "Rotate the segments until current reaches the target node.",
                    "size": size,
                    "seed": seed,
                })
            }
            PuzzleKind::MemoryMatch => {
                let pairs = (6 + stage).min(10);
                json!({
                    "title": "Pattern Echo",
                    "brief": "Recall where each glyph sleeps and wake them in pairs.",
                    "pairs": pairs,
                    "reveal_ms": 900,
                    "seed": seed,
                })
            }
            PuzzleKind::Maze => {
                let width = (7 + 2 * stage).min(15);
                json!({
                    "title": "Neural Labyrinth",
                    "brief": "Navigate the pathways. Avoid bad data blocks.",
                    "width": width,
                    "height": width,
                    "hazards": stage + 2,
                    "seed": seed,
                })
            }
            PuzzleKind::MirrorMaze => {
                let size = (5 + stage).min(8);
                json!({
                    "title": "Beam Alignment",
                    "brief": "Flip the mirrors until the beam lands on every sensor.",
                    "size": size,
                    "targets": (stage + 1).min(4),
                    "seed": seed,
                })
            }
            PuzzleKind::SlidingTiles => {
                let size = if stage >= 2 { 4 } else { 3 };
                json!({
                    "title": "Fragment Defrag",
                    "brief": "Slide the fragments back into sequence.",
                    "size": size,
                    "shuffle_moves": 20 + 10 * stage,
                    "seed": seed,
                })
            }
        };

        Ok(GeneratedPuzzle { kind, data })
    }

    fn hint(&mut self, _step: u8, kind: PuzzleKind) -> String {
        let pool = hint_pool(kind);
        let i = self.rng.gen_range(0..pool.len());
        pool[i].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacetimedb::rand::RngCore;

    /// Deterministic rng so generation tests are reproducible
    struct XorShift(u64);

    impl RngCore for XorShift {
        fn next_u32(&mut self) -> u32 {
            self.next_u64() as u32
        }

        fn next_u64(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for chunk in dest.chunks_mut(8) {
                let bytes = self.next_u64().to_le_bytes();
                chunk.copy_from_slice(&bytes[..chunk.len()]);
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), spacetimedb::rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    fn generator() -> BankGenerator<XorShift> {
        BankGenerator::new(XorShift(0x9E37_79B9_7F4A_7C15))
    }

    #[test]
    fn bank_is_well_formed() {
        for q in BANK {
            assert!(!q.prompt.is_empty());
            assert!((q.correct_index as usize) < q.options.len());
            assert!(q.options.iter().all(|o| !o.is_empty()));
            assert!((1..=3).contains(&q.tier));
        }
        // Every tier must be able to fill a quiz on its own
        for tier in 1..=3u8 {
            let count = BANK.iter().filter(|q| q.tier == tier).count();
            assert!(count >= QUIZ_LENGTH, "tier {} has only {} questions", tier, count);
        }
    }

    #[test]
    fn quiz_returns_full_set_of_distinct_prompts() {
        let questions = generator().quiz(1, &[]).unwrap();
        assert_eq!(questions.len(), QUIZ_LENGTH);
        for (i, a) in questions.iter().enumerate() {
            for b in &questions[i + 1..] {
                assert_ne!(a.prompt, b.prompt);
            }
        }
    }

    #[test]
    fn quiz_skips_excluded_prompts() {
        let exclude: Vec<String> = BANK
            .iter()
            .filter(|q| q.tier == 1)
            .take(3)
            .map(|q| q.prompt.to_string())
            .collect();
        let questions = generator().quiz(1, &exclude).unwrap();
        assert_eq!(questions.len(), QUIZ_LENGTH);
        for q in &questions {
            assert!(!exclude.contains(&q.prompt));
        }
    }

    #[test]
    fn quiz_falls_back_to_repeats_when_bank_is_exhausted() {
        let exclude: Vec<String> = BANK.iter().map(|q| q.prompt.to_string()).collect();
        let questions = generator().quiz(2, &exclude).unwrap();
        assert_eq!(questions.len(), QUIZ_LENGTH);
    }

    #[test]
    fn option_rotation_preserves_the_correct_answer() {
        let questions = generator().quiz(3, &[]).unwrap();
        for q in &questions {
            let banked = BANK
                .iter()
                .find(|b| b.prompt == q.prompt)
                .expect("generated prompt not in bank");
            assert_eq!(
                q.options[q.correct_index as usize],
                banked.options[banked.correct_index as usize]
            );
        }
    }

    #[test]
    fn same_seed_produces_the_same_quiz() {
        let a = generator().quiz(1, &[]).unwrap();
        let b = generator().quiz(1, &[]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn puzzle_kind_rotates_across_steps_and_cycles() {
        let mut seen = Vec::new();
        for step in 1..=6u8 {
            let p = generator().puzzle(step, 1).unwrap();
            assert!(!seen.contains(&p.kind.tag()));
            seen.push(p.kind.tag());
        }
        // A later cycle shifts the rotation behind the same gate
        let cycle1 = generator().puzzle(2, 1).unwrap();
        let cycle2 = generator().puzzle(1, 2).unwrap();
        assert_eq!(cycle1.kind, cycle2.kind);
    }

    #[test]
    fn puzzle_payload_carries_title_and_seed() {
        for step in 1..=6u8 {
            let p = generator().puzzle(step, 1).unwrap();
            let obj = p.data.as_object().expect("payload must be an object");
            assert!(obj.contains_key("title"));
            assert!(obj.contains_key("seed"));
        }
    }

    #[test]
    fn first_gate_hanoi_starts_at_three_discs() {
        let p = generator().puzzle(1, 1).unwrap();
        assert_eq!(p.kind, PuzzleKind::TowerOfHanoi);
        let discs = p.data["discs"].as_u64().unwrap();
        assert_eq!(discs, 3);
        assert_eq!(p.data["min_moves"].as_u64().unwrap(), (1 << discs) - 1);
    }

    #[test]
    fn hints_stay_short() {
        let mut g = generator();
        for kind in PuzzleKind::ALL {
            let hint = g.hint(1, kind);
            assert!(!hint.is_empty());
            assert!(hint.split_whitespace().count() <= 15);
        }
    }
}
