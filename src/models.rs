use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a card row in the store.
pub type CardRef = i64;

// Review direction. Each note yields one card per direction, with its own
// scheduling metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Prompt French, type the Korean answer.
    FrKo,
    /// Prompt Korean, recall the French answer.
    KoFr,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::FrKo => "fr-ko",
            Direction::KoFr => "ko-fr",
        }
    }

    // Column value in the cards table
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Direction::FrKo => "fr_ko",
            Direction::KoFr => "ko_fr",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fr-ko" | "fr_ko" | "frko" | "fr" => Some(Direction::FrKo),
            "ko-fr" | "ko_fr" | "kofr" | "ko" => Some(Direction::KoFr),
            _ => None,
        }
    }

    /// How correctness is determined for this direction.
    pub fn grading_mode(&self) -> GradingMode {
        match self {
            Direction::FrKo => GradingMode::ExactMatch,
            Direction::KoFr => GradingMode::SelfGraded,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::FrKo => "French → Korean",
            Direction::KoFr => "Korean → French",
        }
    }
}

/// How a graded answer is produced for a card.
///
/// `ExactMatch` grades automatically by comparing the normalized typed answer
/// against the expected text. `SelfGraded` shows the expected text and waits
/// for an explicit yes/no from the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradingMode {
    ExactMatch,
    SelfGraded,
}

// Lifecycle stage of a card in the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardState {
    New,
    Learning,
    Review,
    Relearning,
}

impl Default for CardState {
    fn default() -> Self {
        CardState::New
    }
}

impl CardState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardState::New => "new",
            CardState::Learning => "learning",
            CardState::Review => "review",
            CardState::Relearning => "relearning",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "learning" => CardState::Learning,
            "review" => CardState::Review,
            "relearning" => CardState::Relearning,
            _ => CardState::New,
        }
    }
}

/// Scheduling snapshot for one card/direction pair. Mutated exclusively by
/// the scheduler's output, applied after a successful persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardMeta {
    /// Days until the next scheduled review, always >= 1.
    pub interval_days: i64,
    /// Difficulty multiplier, kept within [1.3, 2.5].
    pub ease_factor: f64,
    /// Correct reviews ever recorded.
    pub reps: i64,
    /// Incorrect reviews ever recorded.
    pub lapses: i64,
    /// Consecutive correct reviews since the last lapse.
    pub success_streak: i64,
    pub state: CardState,
    /// Next moment the card becomes due. None for never-scheduled cards,
    /// which sort before everything else.
    pub due_at: Option<DateTime<Utc>>,
}

impl Default for CardMeta {
    fn default() -> Self {
        Self {
            interval_days: 1,
            ease_factor: 2.2,
            reps: 0,
            lapses: 0,
            success_streak: 0,
            state: CardState::New,
            due_at: None,
        }
    }
}

/// One graded answer. Ephemeral: the sole scheduler input besides the meta.
#[derive(Debug, Clone, Copy)]
pub struct ReviewOutcome {
    pub was_correct: bool,
    pub graded_at: DateTime<Utc>,
}

// Candidate-set selection policy for a fresh session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionPolicy {
    /// Due cards first (due_at ascending, never-scheduled first), backfilled
    /// with upcoming cards up to the limit.
    DueFirst,
    /// All cards ordered by success streak ascending, tie-broken by due_at.
    LowestMasteryFirst,
}

impl SelectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionPolicy::DueFirst => "due",
            SelectionPolicy::LowestMasteryFirst => "streak",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "due" | "srs" | "d" => Some(SelectionPolicy::DueFirst),
            "streak" | "mastery" | "s" => Some(SelectionPolicy::LowestMasteryFirst),
            _ => None,
        }
    }
}

/// A card fetched for review: reference, scheduling meta and the two texts
/// for the session's direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub card: CardRef,
    pub meta: CardMeta,
    pub prompt: String,
    pub expected: String,
}

/// A stored prompt pair. Cards for both directions are created alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub korean: String,
    pub french: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A recorded best score for one (policy, direction) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestScore {
    pub policy: SelectionPolicy,
    pub direction: Direction,
    pub score: i64,
    pub achieved_at: String,
}

// Store failures are retryable from the session's point of view, never fatal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("card {0} not found")]
    CardNotFound(CardRef),
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod direction_tests {
        use super::*;

        #[test]
        fn as_str_round_trips() {
            assert_eq!(
                Direction::from_str(Direction::FrKo.as_str()),
                Some(Direction::FrKo)
            );
            assert_eq!(
                Direction::from_str(Direction::KoFr.as_str()),
                Some(Direction::KoFr)
            );
        }

        #[test]
        fn from_str_accepts_db_form() {
            assert_eq!(Direction::from_str("fr_ko"), Some(Direction::FrKo));
            assert_eq!(Direction::from_str("ko_fr"), Some(Direction::KoFr));
        }

        #[test]
        fn from_str_case_insensitive() {
            assert_eq!(Direction::from_str("FR-KO"), Some(Direction::FrKo));
            assert_eq!(Direction::from_str("Ko-Fr"), Some(Direction::KoFr));
        }

        #[test]
        fn from_str_invalid_returns_none() {
            assert_eq!(Direction::from_str("en-ko"), None);
            assert_eq!(Direction::from_str(""), None);
        }

        #[test]
        fn grading_mode_per_direction() {
            assert_eq!(Direction::FrKo.grading_mode(), GradingMode::ExactMatch);
            assert_eq!(Direction::KoFr.grading_mode(), GradingMode::SelfGraded);
        }
    }

    mod card_state_tests {
        use super::*;

        #[test]
        fn as_str_round_trips() {
            for state in [
                CardState::New,
                CardState::Learning,
                CardState::Review,
                CardState::Relearning,
            ] {
                assert_eq!(CardState::from_str(state.as_str()), state);
            }
        }

        #[test]
        fn from_str_unknown_falls_back_to_new() {
            assert_eq!(CardState::from_str("garbage"), CardState::New);
            assert_eq!(CardState::from_str(""), CardState::New);
        }

        #[test]
        fn default_is_new() {
            assert_eq!(CardState::default(), CardState::New);
        }
    }

    mod card_meta_tests {
        use super::*;

        #[test]
        fn default_meta_is_fresh() {
            let meta = CardMeta::default();
            assert_eq!(meta.interval_days, 1);
            assert_eq!(meta.ease_factor, 2.2);
            assert_eq!(meta.reps, 0);
            assert_eq!(meta.lapses, 0);
            assert_eq!(meta.success_streak, 0);
            assert_eq!(meta.state, CardState::New);
            assert!(meta.due_at.is_none());
        }
    }

    mod selection_policy_tests {
        use super::*;

        #[test]
        fn from_str_valid_inputs() {
            assert_eq!(
                SelectionPolicy::from_str("due"),
                Some(SelectionPolicy::DueFirst)
            );
            assert_eq!(
                SelectionPolicy::from_str("srs"),
                Some(SelectionPolicy::DueFirst)
            );
            assert_eq!(
                SelectionPolicy::from_str("streak"),
                Some(SelectionPolicy::LowestMasteryFirst)
            );
            assert_eq!(
                SelectionPolicy::from_str("mastery"),
                Some(SelectionPolicy::LowestMasteryFirst)
            );
        }

        #[test]
        fn from_str_invalid_returns_none() {
            assert_eq!(SelectionPolicy::from_str("random"), None);
            assert_eq!(SelectionPolicy::from_str(""), None);
        }

        #[test]
        fn as_str_round_trips() {
            assert_eq!(
                SelectionPolicy::from_str(SelectionPolicy::DueFirst.as_str()),
                Some(SelectionPolicy::DueFirst)
            );
            assert_eq!(
                SelectionPolicy::from_str(SelectionPolicy::LowestMasteryFirst.as_str()),
                Some(SelectionPolicy::LowestMasteryFirst)
            );
        }
    }

    mod json_output_tests {
        use super::*;

        #[test]
        fn ok_with_data() {
            let output = JsonOutput::ok(42);
            assert!(output.success);
            assert_eq!(output.data, Some(42));
            assert!(output.error.is_none());
        }

        #[test]
        fn err_with_message() {
            let output = JsonOutput::<()>::err("fetch failed");
            assert!(!output.success);
            assert!(output.data.is_none());
            assert_eq!(output.error, Some("fetch failed".to_string()));
        }

        #[test]
        fn serializes_ok_correctly() {
            let output = JsonOutput::ok("test");
            let json = serde_json::to_string(&output).unwrap();
            assert!(json.contains("\"success\":true"));
            assert!(json.contains("\"data\":\"test\""));
            assert!(json.contains("\"error\":null"));
        }
    }
}
