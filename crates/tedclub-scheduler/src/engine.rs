//! Clock Scheduler: the loop that compares wall time to weekly slots and
//! fires matching tasks.
//!
//! Uses `tokio::time::interval` for ticking (sleeps between checks). Each
//! matching task is spawned on its own tokio task; the loop never waits for a
//! handler before moving on to the next tick. On shutdown `run` returns only
//! after the handlers it started have finished.
//!
//! A task fires for an occurrence when the first tick lands within
//! `tolerance` of it. The per-task watermark records the last fired
//! occurrence so a task never fires twice for the same slot, and when a
//! [`FireLog`] is attached the watermark survives restarts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use tedclub_core::error::Result;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::tasks::{ScheduledTask, TaskRegistry, truncate_to_minute};

/// Durable record of the last occurrence each task fired for.
pub trait FireLog: Send + Sync {
    fn last_fired(&self, task_name: &str) -> Result<Option<NaiveDateTime>>;
    fn record_fire(&self, task_name: &str, occurrence: NaiveDateTime) -> Result<()>;
}

/// The scheduler engine.
pub struct ClockScheduler {
    registry: TaskRegistry,
    tz: Tz,
    tick: Duration,
    tolerance: chrono::Duration,
    watermarks: Mutex<HashMap<String, NaiveDateTime>>,
    fire_log: Option<Arc<dyn FireLog>>,
    stop: CancellationToken,
}

impl ClockScheduler {
    /// Create a scheduler with a one-minute tick and exact-minute matching.
    pub fn new(registry: TaskRegistry, tz: Tz) -> Self {
        Self {
            registry,
            tz,
            tick: Duration::from_secs(60),
            tolerance: chrono::Duration::minutes(1),
            watermarks: Mutex::new(HashMap::new()),
            fire_log: None,
            stop: CancellationToken::new(),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Fire within `minutes` of a slot. Values below 1 are treated as 1.
    pub fn with_tolerance_minutes(mut self, minutes: u32) -> Self {
        self.tolerance = chrono::Duration::minutes(minutes.max(1) as i64);
        self
    }

    /// Persist watermarks and seed them from the log.
    pub fn with_fire_log(mut self, log: Arc<dyn FireLog>) -> Self {
        let mut marks = HashMap::new();
        for task in self.registry.tasks() {
            match log.last_fired(&task.name) {
                Ok(Some(occurrence)) => {
                    marks.insert(task.name.clone(), occurrence);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("⚠️ Failed to load watermark for '{}': {e}", task.name),
            }
        }
        self.watermarks = Mutex::new(marks);
        self.fire_log = Some(log);
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Current wall time in the scheduler's timezone, truncated to the minute.
    pub fn local_minute(&self, now: DateTime<Utc>) -> NaiveDateTime {
        truncate_to_minute(now.with_timezone(&self.tz).naive_local())
    }

    /// Next local fire time for every task.
    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<(String, NaiveDateTime)> {
        let local = self.local_minute(now);
        self.registry
            .tasks()
            .iter()
            .map(|t| (t.name.clone(), t.slot.next_after(local)))
            .collect()
    }

    /// Tasks due at `now`. Advances their watermarks, so a second call for
    /// the same minute returns nothing.
    pub fn due_at(&self, now: DateTime<Utc>) -> Vec<ScheduledTask> {
        let local = self.local_minute(now);
        let mut marks = match self.watermarks.lock() {
            Ok(m) => m,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut due = Vec::new();
        for task in self.registry.tasks() {
            let occurrence = task.slot.occurrence_at(local);
            if local - occurrence >= self.tolerance {
                continue;
            }
            if marks.get(&task.name).is_some_and(|last| *last >= occurrence) {
                continue;
            }
            marks.insert(task.name.clone(), occurrence);
            if let Some(log) = &self.fire_log
                && let Err(e) = log.record_fire(&task.name, occurrence)
            {
                tracing::warn!("⚠️ Failed to persist watermark for '{}': {e}", task.name);
            }
            due.push(task.clone());
        }
        due
    }

    /// Evaluate one tick at `now` and spawn every due task.
    /// Returns one handle per dispatched task (resolves when it finishes).
    pub fn tick_at(&self, now: DateTime<Utc>) -> Vec<(String, JoinHandle<()>)> {
        self.due_at(now)
            .into_iter()
            .map(|task| {
                tracing::info!("🔔 Task triggered: '{}'", task.name);
                let name = task.name.clone();
                (name, dispatch(task))
            })
            .collect()
    }

    /// Run until `cancel` fires or [`stop`](Self::stop) is called, then wait
    /// for handlers that are still running.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            "⏰ Scheduler started ({} tasks, check every {}s, tz {})",
            self.registry.len(),
            self.tick.as_secs(),
            self.tz
        );
        for (name, next) in self.upcoming(Utc::now()) {
            tracing::info!("   next '{}' at {}", name, next.format("%a %Y-%m-%d %H:%M"));
        }

        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut running: Vec<(String, JoinHandle<()>)> = Vec::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.stop.cancelled() => break,
                _ = interval.tick() => {
                    running.retain(|(_, handle)| !handle.is_finished());
                    running.extend(self.tick_at(Utc::now()));
                }
            }
        }

        // Handlers started before shutdown run to completion.
        running.retain(|(_, handle)| !handle.is_finished());
        if !running.is_empty() {
            tracing::info!("⏳ Waiting for {} running task(s)", running.len());
        }
        for (name, handle) in running {
            if let Err(e) = handle.await {
                tracing::warn!("⚠️ Task '{}' watcher failed: {e}", name);
            }
        }
        tracing::info!("⏹️ Scheduler stopped");
    }

    /// Ask the loop to exit. Idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
    }
}

/// Spawn the handler and a watcher that logs its outcome.
fn dispatch(task: ScheduledTask) -> JoinHandle<()> {
    let ScheduledTask { name, handler, .. } = task;
    let inner = tokio::spawn(async move { handler().await });
    tokio::spawn(async move {
        match inner.await {
            Ok(Ok(())) => tracing::info!("✅ Task '{}' completed", name),
            Ok(Err(e)) if e.is_skip() => tracing::info!("⏭️ Task '{}' skipped: {e}", name),
            Ok(Err(e)) => tracing::warn!("⚠️ Task '{}' failed: {e}", name),
            Err(e) if e.is_panic() => tracing::error!("💥 Task '{}' panicked: {e}", name),
            Err(e) => tracing::warn!("⚠️ Task '{}' aborted: {e}", name),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::WeeklySlot;
    use chrono::{TimeZone, Weekday};
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tedclub_core::error::TedClubError;

    fn counting_task(name: &str, slot: WeeklySlot, counter: Arc<AtomicUsize>) -> ScheduledTask {
        ScheduledTask::new(name, slot, move || -> BoxFuture<'static, Result<()>> {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
    }

    fn scheduler_with(tasks: Vec<ScheduledTask>) -> ClockScheduler {
        let mut registry = TaskRegistry::new();
        for t in tasks {
            registry.register(t).unwrap();
        }
        ClockScheduler::new(registry, chrono_tz::UTC)
    }

    // 2026-10-19 is a Monday.
    fn utc(d: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, h, m, s).unwrap()
    }

    #[test]
    fn test_fires_only_on_matching_minute() {
        let counter = Arc::new(AtomicUsize::new(0));
        let slot = WeeklySlot::new(Weekday::Mon, 8, 0).unwrap();
        let sched = scheduler_with(vec![counting_task("propose", slot, counter)]);

        assert!(sched.due_at(utc(19, 7, 59, 59)).is_empty());
        assert_eq!(sched.due_at(utc(19, 8, 0, 5)).len(), 1);
        // Same minute again: deduplicated.
        assert!(sched.due_at(utc(19, 8, 0, 45)).is_empty());
        assert!(sched.due_at(utc(19, 8, 1, 0)).is_empty());
        // Same time on a different weekday.
        assert!(sched.due_at(utc(20, 8, 0, 0)).is_empty());
        // Next week fires again.
        assert_eq!(sched.due_at(utc(26, 8, 0, 0)).len(), 1);
    }

    #[test]
    fn test_tolerance_window_catches_late_tick() {
        let counter = Arc::new(AtomicUsize::new(0));
        let slot = WeeklySlot::new(Weekday::Mon, 8, 0).unwrap();
        let sched = scheduler_with(vec![counting_task("propose", slot, counter)])
            .with_tolerance_minutes(5);

        assert_eq!(sched.due_at(utc(19, 8, 3, 0)).len(), 1);
        assert!(sched.due_at(utc(19, 8, 4, 0)).is_empty());
        assert!(sched.due_at(utc(19, 8, 5, 0)).is_empty());
    }

    #[test]
    fn test_timezone_applied() {
        let counter = Arc::new(AtomicUsize::new(0));
        let slot = WeeklySlot::new(Weekday::Mon, 8, 0).unwrap();
        let mut registry = TaskRegistry::new();
        registry.register(counting_task("propose", slot, counter)).unwrap();
        let sched = ClockScheduler::new(registry, chrono_tz::Europe::Berlin);

        // 08:00 UTC is 10:00 in Berlin (CEST until 2026-10-25).
        assert!(sched.due_at(utc(19, 8, 0, 0)).is_empty());
        assert_eq!(sched.due_at(utc(19, 6, 0, 0)).len(), 1);
    }

    #[tokio::test]
    async fn test_tick_dispatches_concurrently() {
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let slot = WeeklySlot::new(Weekday::Mon, 8, 0).unwrap();
        let other = WeeklySlot::new(Weekday::Wed, 18, 0).unwrap();
        let sched = scheduler_with(vec![
            counting_task("one", slot, a.clone()),
            counting_task("two", slot, b.clone()),
            counting_task("three", other, b.clone()),
        ]);

        let fired = sched.tick_at(utc(19, 8, 0, 0));
        let names: Vec<_> = fired.iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["one", "two"]);
        for (_, handle) in fired {
            handle.await.unwrap();
        }
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_affect_others() {
        let counter = Arc::new(AtomicUsize::new(0));
        let slot = WeeklySlot::new(Weekday::Mon, 8, 0).unwrap();
        let failing = ScheduledTask::new("broken", slot, || -> BoxFuture<'static, Result<()>> {
            Box::pin(async { Err(TedClubError::SearchFailed("boom".into())) })
        });
        let panicking = ScheduledTask::new("panics", slot, || -> BoxFuture<'static, Result<()>> {
            Box::pin(async {
                let broken = true;
                if broken {
                    panic!("handler bug");
                }
                Ok(())
            })
        });
        let sched = scheduler_with(vec![
            failing,
            panicking,
            counting_task("ok", slot, counter.clone()),
        ]);

        for (_, handle) in sched.tick_at(utc(19, 8, 0, 0)) {
            // Watchers swallow handler errors and panics.
            handle.await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_ends_run() {
        let sched = Arc::new(scheduler_with(vec![]).with_tick(Duration::from_millis(10)));
        let runner = {
            let sched = sched.clone();
            tokio::spawn(async move { sched.run(CancellationToken::new()).await })
        };
        sched.stop();
        sched.stop();
        tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_waits_for_inflight_handler() {
        use chrono::{Datelike, Timelike};
        use std::sync::atomic::AtomicBool;

        let now = Utc::now();
        let slot = WeeklySlot::new(now.weekday(), now.hour(), now.minute()).unwrap();
        let started = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let task = {
            let started = started.clone();
            let finished = finished.clone();
            ScheduledTask::new("slow", slot, move || -> BoxFuture<'static, Result<()>> {
                let started = started.clone();
                let finished = finished.clone();
                Box::pin(async move {
                    started.store(true, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    finished.store(true, Ordering::SeqCst);
                    Ok(())
                })
            })
        };
        // Two minutes of tolerance covers a minute rollover during the test.
        let sched = scheduler_with(vec![task])
            .with_tick(Duration::from_millis(10))
            .with_tolerance_minutes(2);

        let cancel = CancellationToken::new();
        let runner = {
            let cancel = cancel.clone();
            tokio::spawn(async move { sched.run(cancel).await })
        };
        tokio::time::timeout(Duration::from_secs(2), async {
            while !started.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .unwrap()
            .unwrap();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_token_ends_run() {
        let sched = scheduler_with(vec![]).with_tick(Duration::from_millis(10));
        let cancel = CancellationToken::new();
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), sched.run(cancel))
            .await
            .unwrap();
    }

    #[test]
    fn test_upcoming() {
        let slot = WeeklySlot::new(Weekday::Wed, 18, 0).unwrap();
        let sched = scheduler_with(vec![counting_task(
            "select",
            slot,
            Arc::new(AtomicUsize::new(0)),
        )]);
        let upcoming = sched.upcoming(utc(19, 8, 0, 0));
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].1.format("%a %H:%M").to_string(), "Wed 18:00");
    }
}
