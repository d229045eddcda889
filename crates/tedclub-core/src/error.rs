//! Error taxonomy for TedClub.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TedClubError>;

#[derive(Debug, Error)]
pub enum TedClubError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("API key missing for provider: {0}")]
    ApiKeyMissing(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Task '{0}' is already registered")]
    DuplicateTaskName(String),

    #[error("Invalid schedule '{0}' (expected e.g. \"Mon 08:00\")")]
    InvalidSchedule(String),

    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("Only {found} talks about '{topic}' within duration bounds, need {required}")]
    InsufficientCandidates {
        topic: String,
        found: usize,
        required: usize,
    },

    #[error("Description generation failed for '{title}': {reason}")]
    DescriptionGenerationFailed { title: String, reason: String },

    #[error("Poll creation failed: {0}")]
    PollCreationFailed(String),

    #[error("No current cycle in proposed state")]
    NoCurrentCycle,

    #[error("Poll has no winning option")]
    NoWinner,

    #[error("Candidate '{candidate_id}' is not part of cycle {cycle_id}")]
    CandidateNotInCycle { cycle_id: i64, candidate_id: String },

    #[error("Current cycle has no selected talk yet")]
    NoSelectionYet,

    #[error("Announcement failed: {0}")]
    AnnouncementFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TedClubError {
    /// Invariant violations that mean "nothing to do this week" rather than a
    /// collaborator failure.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::NoCurrentCycle | Self::NoWinner | Self::NoSelectionYet
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_classification() {
        assert!(TedClubError::NoCurrentCycle.is_skip());
        assert!(TedClubError::NoSelectionYet.is_skip());
        assert!(TedClubError::NoWinner.is_skip());
        assert!(!TedClubError::SearchFailed("timeout".into()).is_skip());
        assert!(!TedClubError::PollCreationFailed("403".into()).is_skip());
    }

    #[test]
    fn test_insufficient_candidates_message() {
        let err = TedClubError::InsufficientCandidates {
            topic: "Climate".into(),
            found: 3,
            required: 5,
        };
        assert_eq!(
            err.to_string(),
            "Only 3 talks about 'Climate' within duration bounds, need 5"
        );
    }
}
