//! Task definitions: weekly slots and the task registry.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike, Weekday};
use futures::future::BoxFuture;
use tedclub_core::error::{Result, TedClubError};

/// A weekday + time-of-day target at minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySlot {
    pub weekday: Weekday,
    pub time: NaiveTime,
}

impl WeeklySlot {
    pub fn new(weekday: Weekday, hour: u32, minute: u32) -> Result<Self> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| TedClubError::InvalidSchedule(format!("{weekday} {hour}:{minute}")))?;
        Ok(Self { weekday, time })
    }

    /// Most recent instant of this slot at or before `now` (local wall time).
    pub fn occurrence_at(&self, now: NaiveDateTime) -> NaiveDateTime {
        let now = truncate_to_minute(now);
        let back = (now.weekday().num_days_from_monday() + 7
            - self.weekday.num_days_from_monday())
            % 7;
        let candidate = (now.date() - Duration::days(back as i64)).and_time(self.time);
        if candidate > now {
            candidate - Duration::days(7)
        } else {
            candidate
        }
    }

    /// First instant of this slot strictly after `now`.
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        self.occurrence_at(now) + Duration::days(7)
    }
}

impl FromStr for WeeklySlot {
    type Err = TedClubError;

    /// Parses `"Mon 08:00"`, `"wednesday 18:30"`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TedClubError::InvalidSchedule(s.to_string());
        let mut parts = s.split_whitespace();
        let (Some(day), Some(clock), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        let weekday: Weekday = day.parse().map_err(|_| invalid())?;
        let time = NaiveTime::parse_from_str(clock, "%H:%M").map_err(|_| invalid())?;
        Ok(Self { weekday, time })
    }
}

impl std::fmt::Display for WeeklySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.weekday, self.time.format("%H:%M"))
    }
}

pub(crate) fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// Async task body. Called once per firing.
pub type TaskHandler = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A named task bound to a weekly slot.
#[derive(Clone)]
pub struct ScheduledTask {
    pub name: String,
    pub slot: WeeklySlot,
    pub handler: TaskHandler,
}

impl ScheduledTask {
    pub fn new<F>(name: &str, slot: WeeklySlot, handler: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            slot,
            handler: Arc::new(handler),
        }
    }
}

impl std::fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.name)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

/// Registry of tasks, handed to the scheduler by value.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Vec<ScheduledTask>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. Names are unique.
    pub fn register(&mut self, task: ScheduledTask) -> Result<()> {
        if self.tasks.iter().any(|t| t.name == task.name) {
            return Err(TedClubError::DuplicateTaskName(task.name));
        }
        tracing::info!("📅 Task registered: '{}' ({})", task.name, task.slot);
        self.tasks.push(task);
        Ok(())
    }

    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn noop() -> BoxFuture<'static, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    #[test]
    fn test_parse_slot() {
        let slot: WeeklySlot = "Mon 08:00".parse().unwrap();
        assert_eq!(slot.weekday, Weekday::Mon);
        assert_eq!(slot.time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(slot.to_string(), "Mon 08:00");

        let slot: WeeklySlot = "wednesday 18:30".parse().unwrap();
        assert_eq!(slot.weekday, Weekday::Wed);

        assert!("Mon".parse::<WeeklySlot>().is_err());
        assert!("Funday 08:00".parse::<WeeklySlot>().is_err());
        assert!("Mon 25:00".parse::<WeeklySlot>().is_err());
        assert!("Mon 08:00 extra".parse::<WeeklySlot>().is_err());
    }

    #[test]
    fn test_occurrence_at() {
        // 2026-10-19 is a Monday.
        let slot = WeeklySlot::new(Weekday::Mon, 8, 0).unwrap();
        assert_eq!(slot.occurrence_at(at(2026, 10, 19, 8, 0)), at(2026, 10, 19, 8, 0));
        assert_eq!(slot.occurrence_at(at(2026, 10, 19, 7, 59)), at(2026, 10, 12, 8, 0));
        assert_eq!(slot.occurrence_at(at(2026, 10, 21, 12, 0)), at(2026, 10, 19, 8, 0));

        let sunday = WeeklySlot::new(Weekday::Sun, 12, 0).unwrap();
        assert_eq!(sunday.occurrence_at(at(2026, 10, 19, 8, 0)), at(2026, 10, 18, 12, 0));
    }

    #[test]
    fn test_next_after() {
        let slot = WeeklySlot::new(Weekday::Wed, 18, 0).unwrap();
        assert_eq!(slot.next_after(at(2026, 10, 19, 8, 0)), at(2026, 10, 21, 18, 0));
        assert_eq!(slot.next_after(at(2026, 10, 21, 18, 0)), at(2026, 10, 28, 18, 0));
    }

    #[test]
    fn test_register_duplicate() {
        let slot = WeeklySlot::new(Weekday::Mon, 8, 0).unwrap();
        let mut registry = TaskRegistry::new();
        registry.register(ScheduledTask::new("propose", slot, noop)).unwrap();
        let err = registry
            .register(ScheduledTask::new("propose", slot, noop))
            .unwrap_err();
        assert!(matches!(err, TedClubError::DuplicateTaskName(name) if name == "propose"));
        assert_eq!(registry.len(), 1);
    }
}
