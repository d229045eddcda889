//! # TedClub Core
//!
//! Shared building blocks for the TedClub workspace: configuration, the error
//! taxonomy, domain types (cycles, candidates, poll tallies) and the traits
//! implemented by the external collaborators (search, generation, messaging,
//! persistence).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Result, TedClubError};
