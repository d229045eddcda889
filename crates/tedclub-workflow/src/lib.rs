//! # TedClub Workflow
//!
//! The weekly cycle: propose candidate talks and open a poll, select the
//! winner when the poll closes, prepare discussion prompts before the meetup.
//!
//! ```text
//! Idle ──propose──▶ Proposed ──select──▶ Selected ──prepare──▶ Prepared
//!   ▲                                                             │
//!   └──────────────────── next week's propose ────────────────────┘
//! ```

pub mod messages;
pub mod orchestrator;
pub mod phase;
pub mod rules;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::Arc;

use futures::future::BoxFuture;
use tedclub_core::config::ScheduleConfig;
use tedclub_core::error::Result;
use tedclub_scheduler::{ScheduledTask, TaskRegistry, WeeklySlot};

pub use orchestrator::Orchestrator;
pub use phase::Phase;

/// Weekly slot for each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSchedule {
    pub propose: WeeklySlot,
    pub select: WeeklySlot,
    pub prepare: WeeklySlot,
}

impl PhaseSchedule {
    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        Ok(Self {
            propose: config.propose.parse()?,
            select: config.select.parse()?,
            prepare: config.prepare.parse()?,
        })
    }

    pub fn slot(&self, phase: Phase) -> WeeklySlot {
        match phase {
            Phase::Propose => self.propose,
            Phase::Select => self.select,
            Phase::Prepare => self.prepare,
        }
    }
}

/// Register one scheduled task per phase, named after the phase.
pub fn register_phases(
    registry: &mut TaskRegistry,
    orchestrator: Arc<Orchestrator>,
    schedule: &PhaseSchedule,
) -> Result<()> {
    for phase in Phase::ALL {
        let orchestrator = orchestrator.clone();
        registry.register(ScheduledTask::new(
            phase.as_str(),
            schedule.slot(phase),
            move || -> BoxFuture<'static, Result<()>> {
                let orchestrator = orchestrator.clone();
                Box::pin(async move { orchestrator.run_phase(phase).await })
            },
        ))?;
    }
    Ok(())
}
