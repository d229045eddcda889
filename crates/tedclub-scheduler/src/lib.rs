//! # TedClub Scheduler
//!
//! Wall-clock weekly scheduler and the SQLite store behind it.
//!
//! ## Design
//! - Tokio interval only, one check per tick, idle otherwise
//! - Handlers run on their own tasks; a slow or failing handler never
//!   delays the loop or another handler
//! - SQLite persistence for cycles and fire watermarks, survives restarts
//!
//! ```text
//! ClockScheduler (tokio interval, local tz)
//!   ├── propose  "Mon 08:00"
//!   ├── select   "Wed 18:00"
//!   └── prepare  "Sun 12:00"
//!         └── on match → tokio::spawn(handler)
//!
//! SchedulerDb (SQLite)
//!   ├── cycles / candidates  (CycleStore)
//!   └── task_fires           (FireLog)
//! ```

pub mod engine;
pub mod persistence;
pub mod tasks;

pub use engine::{ClockScheduler, FireLog};
pub use persistence::SchedulerDb;
pub use tasks::{ScheduledTask, TaskHandler, TaskRegistry, WeeklySlot};
