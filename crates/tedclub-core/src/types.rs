//! Domain types shared across crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A talk returned by the search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub description: String,
    pub duration_secs: u32,
    #[serde(default)]
    pub url: Option<String>,
}

/// Opaque handle to a poll opened on the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRef(pub String);

/// Opaque handle to a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef(pub String);

impl std::fmt::Display for PollRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for MessageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Final vote count for one poll option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollTally {
    /// Position of the option in the poll, as opened.
    pub option_index: usize,
    pub text: String,
    pub votes: u32,
}

/// One proposed talk competing in a cycle's poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Provider-assigned id, unique within a cycle.
    pub id: String,
    pub title: String,
    /// Generated short description.
    pub description: String,
    /// Index of the poll option that represents this candidate.
    pub poll_option: usize,
    pub duration_secs: u32,
    #[serde(default)]
    pub url: Option<String>,
    /// Filled in when the poll is closed.
    #[serde(default)]
    pub votes: Option<u32>,
}

/// Where a cycle is in the weekly workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Proposed,
    Selected,
    Prepared,
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleState::Proposed => write!(f, "proposed"),
            CycleState::Selected => write!(f, "selected"),
            CycleState::Prepared => write!(f, "prepared"),
        }
    }
}

/// One weekly instance of the propose → select → prepare workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub topic: String,
    pub poll_ref: PollRef,
    pub candidates: Vec<Candidate>,
    pub selected_candidate_id: Option<String>,
    pub discussion: Option<String>,
}

impl Cycle {
    pub fn state(&self) -> CycleState {
        match (&self.selected_candidate_id, &self.discussion) {
            (None, _) => CycleState::Proposed,
            (Some(_), None) => CycleState::Selected,
            (Some(_), Some(_)) => CycleState::Prepared,
        }
    }

    pub fn candidate(&self, id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    pub fn candidate_for_option(&self, option_index: usize) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.poll_option == option_index)
    }

    pub fn selected_candidate(&self) -> Option<&Candidate> {
        self.selected_candidate_id
            .as_deref()
            .and_then(|id| self.candidate(id))
    }
}

/// A cycle about to be inserted (no id yet).
#[derive(Debug, Clone)]
pub struct NewCycle {
    pub started_at: DateTime<Utc>,
    pub topic: String,
    pub poll_ref: PollRef,
    pub candidates: Vec<Candidate>,
}
