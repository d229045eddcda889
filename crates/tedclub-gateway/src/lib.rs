//! # TedClub Gateway
//!
//! Small HTTP surface for operators: a `/health` probe that checks the
//! database and the messaging platform, and read-only cycle status.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
