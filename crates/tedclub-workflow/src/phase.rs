//! The three scheduled steps of a cycle.

use std::str::FromStr;

use tedclub_core::error::TedClubError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Propose,
    Select,
    Prepare,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Propose, Phase::Select, Phase::Prepare];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Propose => "propose",
            Phase::Select => "select",
            Phase::Prepare => "prepare",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = TedClubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "propose" => Ok(Phase::Propose),
            "select" => Ok(Phase::Select),
            "prepare" => Ok(Phase::Prepare),
            other => Err(TedClubError::Config(format!(
                "unknown phase '{other}' (expected propose, select or prepare)"
            ))),
        }
    }
}
