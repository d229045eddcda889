//! Workflow Orchestrator: drives one cycle through propose, select and
//! prepare.
//!
//! Each phase is a straight sequence of collaborator calls. Every
//! collaborator failure is surfaced as a typed error; nothing is retried
//! inside a phase. State lives in the [`CycleStore`], so phases can run in
//! separate processes.

use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;
use tedclub_core::config::WorkflowConfig;
use tedclub_core::error::{Result, TedClubError};
use tedclub_core::traits::{CycleStore, Messenger, SearchProvider, TextGenerator};
use tedclub_core::types::{Candidate, Cycle, CycleState, NewCycle};

use crate::messages;
use crate::phase::Phase;
use crate::rules::{self, MAX_OPTION_CHARS};

/// Number of discussion prompts the generator is asked for.
const EXPECTED_PROMPTS: std::ops::RangeInclusive<usize> = 3..=4;

pub struct Orchestrator {
    search: Arc<dyn SearchProvider>,
    generator: Arc<dyn TextGenerator>,
    messenger: Arc<dyn Messenger>,
    store: Arc<dyn CycleStore>,
    config: WorkflowConfig,
}

impl Orchestrator {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        generator: Arc<dyn TextGenerator>,
        messenger: Arc<dyn Messenger>,
        store: Arc<dyn CycleStore>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            search,
            generator,
            messenger,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn CycleStore> {
        &self.store
    }

    pub fn messenger(&self) -> &Arc<dyn Messenger> {
        &self.messenger
    }

    /// Run one phase. Used by scheduled handlers and the CLI.
    pub async fn run_phase(&self, phase: Phase) -> Result<()> {
        match phase {
            Phase::Propose => self.propose().await.map(|_| ()),
            Phase::Select => self.select().await.map(|_| ()),
            Phase::Prepare => self.prepare().await.map(|_| ()),
        }
    }

    fn choose_topic(&self) -> Result<String> {
        self.config
            .topics
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| TedClubError::Config("no topics configured".into()))
    }

    /// Start a new cycle on a random configured topic. Returns the cycle id.
    pub async fn propose(&self) -> Result<i64> {
        let topic = self.choose_topic()?;
        self.propose_topic(&topic).await
    }

    /// Start a new cycle on `topic`.
    pub async fn propose_topic(&self, topic: &str) -> Result<i64> {
        tracing::info!("💡 Proposing talks about '{}'", topic);

        let hits = self
            .search
            .search(topic)
            .await
            .map_err(|e| TedClubError::SearchFailed(e.to_string()))?;
        let found = hits.len();
        let eligible = rules::filter_by_duration(
            hits,
            self.config.min_duration_secs,
            self.config.max_duration_secs,
        );
        tracing::debug!("{} of {} talks within duration bounds", eligible.len(), found);
        if eligible.len() < self.config.min_candidates {
            return Err(TedClubError::InsufficientCandidates {
                topic: topic.to_string(),
                found: eligible.len(),
                required: self.config.min_candidates,
            });
        }

        let mut candidates = Vec::with_capacity(self.config.batch_size);
        for (poll_option, hit) in eligible
            .into_iter()
            .take(self.config.batch_size)
            .enumerate()
        {
            let description = self
                .generator
                .generate(&messages::description_prompt(&hit.title))
                .await
                .map_err(|e| TedClubError::DescriptionGenerationFailed {
                    title: hit.title.clone(),
                    reason: e.to_string(),
                })?;
            if description.trim().is_empty() {
                return Err(TedClubError::DescriptionGenerationFailed {
                    title: hit.title,
                    reason: "empty response".into(),
                });
            }
            candidates.push(Candidate {
                id: hit.id,
                title: hit.title,
                description: description.trim().to_string(),
                poll_option,
                duration_secs: hit.duration_secs,
                url: hit.url,
                votes: None,
            });
        }

        let options: Vec<String> = candidates
            .iter()
            .map(|c| rules::truncate_chars(&c.title, MAX_OPTION_CHARS))
            .collect();
        let poll_ref = self
            .messenger
            .open_poll(&messages::poll_question(topic), &options)
            .await
            .map_err(|e| TedClubError::PollCreationFailed(e.to_string()))?;

        if let Err(e) = self
            .messenger
            .send_message(&messages::candidates_message(topic, &candidates))
            .await
        {
            tracing::warn!("⚠️ Poll {} is open but the descriptions were not sent: {e}", poll_ref);
        }

        let cycle = NewCycle {
            started_at: Utc::now(),
            topic: topic.to_string(),
            poll_ref: poll_ref.clone(),
            candidates,
        };
        let cycle_id = self.store.insert_cycle(&cycle).map_err(|e| {
            tracing::error!("❌ orphaned poll {}: cycle not stored: {e}", poll_ref);
            match e {
                e @ TedClubError::Store(_) => e,
                other => TedClubError::Store(other.to_string()),
            }
        })?;

        tracing::info!(
            "✅ Cycle {} proposed: {} candidates, poll {}",
            cycle_id,
            cycle.candidates.len(),
            poll_ref
        );
        Ok(cycle_id)
    }

    fn proposed_cycle(&self) -> Result<Cycle> {
        match self.store.current_cycle()? {
            Some(cycle) if cycle.state() == CycleState::Proposed => Ok(cycle),
            _ => Err(TedClubError::NoCurrentCycle),
        }
    }

    /// Close the poll and record the winner. Returns the winning candidate.
    pub async fn select(&self) -> Result<Candidate> {
        let cycle = self.proposed_cycle()?;
        let tallies = self.messenger.close_poll(&cycle.poll_ref).await?;

        let option = rules::pick_winner(tallies.iter().map(|t| (t.option_index, t.votes)))
            .ok_or(TedClubError::NoWinner)?;
        let mut winner = cycle
            .candidate_for_option(option)
            .cloned()
            .ok_or(TedClubError::NoWinner)?;
        winner.votes = tallies
            .iter()
            .find(|t| t.option_index == option)
            .map(|t| t.votes);

        self.store.update_selection(cycle.id, &winner.id, &tallies)?;
        tracing::info!(
            "🏆 Cycle {} winner: '{}' ({} votes)",
            cycle.id,
            winner.title,
            winner.votes.unwrap_or(0)
        );

        let announced = match self
            .messenger
            .send_message(&messages::announcement(&winner))
            .await
        {
            Ok(msg) => self.messenger.pin_message(&msg).await,
            Err(e) => Err(e),
        };
        if let Err(e) = announced {
            tracing::warn!("⚠️ Announcement for cycle {} failed: {e}", cycle.id);
            return Err(TedClubError::AnnouncementFailed(e.to_string()));
        }
        Ok(winner)
    }

    /// Generate and broadcast discussion prompts for the selected talk.
    pub async fn prepare(&self) -> Result<Vec<String>> {
        let cycle = self
            .store
            .current_cycle()?
            .ok_or(TedClubError::NoCurrentCycle)?;
        let talk = cycle
            .selected_candidate()
            .cloned()
            .ok_or(TedClubError::NoSelectionYet)?;

        let raw = self
            .generator
            .generate(&messages::discussion_prompt(&talk.title, &talk.description))
            .await?;
        let prompts = rules::split_prompts(&raw);
        if !EXPECTED_PROMPTS.contains(&prompts.len()) {
            tracing::warn!(
                "⚠️ Expected 3-4 discussion prompts for '{}', got {}",
                talk.title,
                prompts.len()
            );
        }

        self.store.update_discussion(cycle.id, &prompts.join("\n"))?;
        self.messenger
            .send_message(&messages::discussion_message(&talk.title, &prompts))
            .await?;

        tracing::info!(
            "📝 Cycle {} prepared: {} prompts for '{}'",
            cycle.id,
            prompts.len(),
            talk.title
        );
        Ok(prompts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BrokenStore, FakeGenerator, FakeMessenger, FakeSearch, hit};
    use tedclub_core::types::MessageRef;
    use tedclub_scheduler::SchedulerDb;

    struct Harness {
        search: Arc<FakeSearch>,
        generator: Arc<FakeGenerator>,
        messenger: Arc<FakeMessenger>,
        store: Arc<SchedulerDb>,
        orchestrator: Orchestrator,
    }

    fn config() -> WorkflowConfig {
        WorkflowConfig {
            topics: vec!["Climate".into()],
            ..WorkflowConfig::default()
        }
    }

    fn harness(search: FakeSearch, generator: FakeGenerator) -> Harness {
        let search = Arc::new(search);
        let generator = Arc::new(generator);
        let messenger = Arc::new(FakeMessenger::new());
        let store = Arc::new(SchedulerDb::open_in_memory().unwrap());
        let orchestrator = Orchestrator::new(
            search.clone(),
            generator.clone(),
            messenger.clone(),
            store.clone(),
            config(),
        );
        Harness {
            search,
            generator,
            messenger,
            store,
            orchestrator,
        }
    }

    fn seven_talks() -> FakeSearch {
        FakeSearch::new(vec![
            hit("t1", "Trees", 700),
            hit("t2", "Too short", 300),
            hit("t3", "Oceans", 900),
            hit("t4", "Ice", 1200),
            hit("t5", "Wind", 600),
            hit("t6", "Sun", 1000),
            hit("t7", "Rain", 800),
            hit("t8", "Soil", 650),
            hit("t9", "Clouds", 1100),
        ])
    }

    #[tokio::test]
    async fn test_propose_stores_cycle_and_opens_poll() {
        let h = harness(seven_talks(), FakeGenerator::echo());
        let id = h.orchestrator.propose().await.unwrap();

        let cycle = h.store.current_cycle().unwrap().unwrap();
        assert_eq!(cycle.id, id);
        assert_eq!(cycle.topic, "Climate");
        assert_eq!(cycle.state(), CycleState::Proposed);
        // First batch_size (6) eligible talks, search order kept.
        let ids: Vec<_> = cycle.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t3", "t4", "t5", "t6", "t7"]);
        assert!(cycle.candidates.iter().enumerate().all(|(i, c)| c.poll_option == i));
        assert_eq!(cycle.candidates[0].description, "Description: Trees");

        let polls = h.messenger.polls();
        assert_eq!(polls.len(), 1);
        assert_eq!(polls[0].0, "Which TED talk about Climate should we discuss?");
        assert_eq!(polls[0].1[1], "Oceans");
        assert_eq!(cycle.poll_ref, h.messenger.last_poll_ref().unwrap());
        assert_eq!(h.search.queries(), vec!["Climate"]);
    }

    #[tokio::test]
    async fn test_propose_insufficient_candidates_stores_nothing() {
        let search = FakeSearch::new(vec![
            hit("a", "A", 700),
            hit("b", "B", 800),
            hit("c", "C", 900),
            hit("d", "D", 100),
        ]);
        let h = harness(search, FakeGenerator::echo());
        let err = h.orchestrator.propose().await.unwrap_err();
        assert!(matches!(
            err,
            TedClubError::InsufficientCandidates { found: 3, required: 5, .. }
        ));
        assert!(h.store.current_cycle().unwrap().is_none());
        assert!(h.messenger.polls().is_empty());
        assert!(h.generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_propose_search_failure() {
        let h = harness(FakeSearch::failing("timeout"), FakeGenerator::echo());
        let err = h.orchestrator.propose().await.unwrap_err();
        assert!(matches!(err, TedClubError::SearchFailed(_)));
    }

    #[tokio::test]
    async fn test_propose_description_failure_opens_no_poll() {
        let h = harness(seven_talks(), FakeGenerator::failing_after(2));
        let err = h.orchestrator.propose().await.unwrap_err();
        assert!(matches!(
            err,
            TedClubError::DescriptionGenerationFailed { ref title, .. } if title == "Ice"
        ));
        assert!(h.messenger.polls().is_empty());
        assert!(h.store.current_cycle().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_propose_poll_failure() {
        let h = harness(seven_talks(), FakeGenerator::echo());
        h.messenger.fail_polls();
        let err = h.orchestrator.propose().await.unwrap_err();
        assert!(matches!(err, TedClubError::PollCreationFailed(_)));
        assert!(h.store.current_cycle().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_propose_store_failure_leaves_orphan_poll() {
        let messenger = Arc::new(FakeMessenger::new());
        let orchestrator = Orchestrator::new(
            Arc::new(seven_talks()),
            Arc::new(FakeGenerator::echo()),
            messenger.clone(),
            Arc::new(BrokenStore),
            config(),
        );
        let err = orchestrator.propose().await.unwrap_err();
        assert!(matches!(err, TedClubError::Store(_)));
        assert_eq!(messenger.polls().len(), 1);
    }

    #[tokio::test]
    async fn test_propose_truncates_long_titles() {
        let long = "x".repeat(150);
        let search = FakeSearch::new(
            (0..5)
                .map(|i| hit(&format!("t{i}"), &long, 700))
                .collect(),
        );
        let h = harness(search, FakeGenerator::echo());
        h.orchestrator.propose().await.unwrap();
        let polls = h.messenger.polls();
        assert!(polls[0].1.iter().all(|o| o.chars().count() == 100));
        // The stored title is untouched.
        let cycle = h.store.current_cycle().unwrap().unwrap();
        assert_eq!(cycle.candidates[0].title.len(), 150);
    }

    #[tokio::test]
    async fn test_select_without_cycle() {
        let h = harness(seven_talks(), FakeGenerator::echo());
        assert!(matches!(
            h.orchestrator.select().await,
            Err(TedClubError::NoCurrentCycle)
        ));
    }

    #[tokio::test]
    async fn test_select_picks_first_of_ties_and_pins() {
        let h = harness(seven_talks(), FakeGenerator::echo());
        h.orchestrator.propose().await.unwrap();
        h.messenger.set_votes(vec![3, 5, 5, 2, 0, 0]);

        let winner = h.orchestrator.select().await.unwrap();
        assert_eq!(winner.id, "t3");
        assert_eq!(winner.votes, Some(5));

        let cycle = h.store.current_cycle().unwrap().unwrap();
        assert_eq!(cycle.state(), CycleState::Selected);
        assert_eq!(cycle.selected_candidate_id.as_deref(), Some("t3"));
        assert_eq!(cycle.candidate("t1").unwrap().votes, Some(3));

        let sent = h.messenger.sent();
        let announcement = sent.last().unwrap();
        assert!(announcement.contains("\"Oceans\""));
        assert_eq!(h.messenger.pinned().len(), 1);

        // Already selected: nothing to close.
        assert!(matches!(
            h.orchestrator.select().await,
            Err(TedClubError::NoCurrentCycle)
        ));
    }

    #[tokio::test]
    async fn test_select_empty_poll_has_no_winner() {
        let h = harness(seven_talks(), FakeGenerator::echo());
        h.orchestrator.propose().await.unwrap();
        h.messenger.set_votes(vec![]);
        assert!(matches!(
            h.orchestrator.select().await,
            Err(TedClubError::NoWinner)
        ));
        assert_eq!(
            h.store.current_cycle().unwrap().unwrap().state(),
            CycleState::Proposed
        );
    }

    #[tokio::test]
    async fn test_select_announcement_failure_keeps_selection() {
        let h = harness(seven_talks(), FakeGenerator::echo());
        h.orchestrator.propose().await.unwrap();
        h.messenger.set_votes(vec![0, 0, 4, 0, 0, 0]);
        h.messenger.fail_sends();

        let err = h.orchestrator.select().await.unwrap_err();
        assert!(matches!(err, TedClubError::AnnouncementFailed(_)));
        let cycle = h.store.current_cycle().unwrap().unwrap();
        assert_eq!(cycle.selected_candidate_id.as_deref(), Some("t4"));
    }

    #[tokio::test]
    async fn test_prepare_requires_selection() {
        let h = harness(seven_talks(), FakeGenerator::echo());
        assert!(matches!(
            h.orchestrator.prepare().await,
            Err(TedClubError::NoCurrentCycle)
        ));
        h.orchestrator.propose().await.unwrap();
        assert!(matches!(
            h.orchestrator.prepare().await,
            Err(TedClubError::NoSelectionYet)
        ));
    }

    #[tokio::test]
    async fn test_full_cycle() {
        let h = harness(seven_talks(), FakeGenerator::echo());
        h.orchestrator.run_phase(Phase::Propose).await.unwrap();
        h.messenger.set_votes(vec![1, 0, 0, 0, 0, 7]);
        h.orchestrator.run_phase(Phase::Select).await.unwrap();

        h.generator.set_fixed("Q1?\n\nQ2?\n");
        h.orchestrator.run_phase(Phase::Prepare).await.unwrap();

        let cycle = h.store.current_cycle().unwrap().unwrap();
        assert_eq!(cycle.state(), CycleState::Prepared);
        assert_eq!(cycle.selected_candidate().unwrap().title, "Rain");
        assert_eq!(cycle.discussion.as_deref(), Some("Q1?\nQ2?"));

        let last = h.messenger.sent().pop().unwrap();
        assert!(last.contains("discussion of \"Rain\""));
        assert!(last.contains("• Q1?\n• Q2?"));

        // Next week's propose starts a fresh cycle.
        let next = h.orchestrator.propose().await.unwrap();
        assert_eq!(h.store.current_cycle().unwrap().unwrap().id, next);
        assert_eq!(h.store.recent_cycles(5).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_six_talks_end_to_end() {
        let search = FakeSearch::new(
            [700, 650, 1200, 900, 600, 1000]
                .iter()
                .enumerate()
                .map(|(i, secs)| hit(&format!("t{i}"), &format!("Talk {i}"), *secs))
                .collect(),
        );
        let h = harness(search, FakeGenerator::echo());

        h.orchestrator.run_phase(Phase::Propose).await.unwrap();
        let cycle = h.store.current_cycle().unwrap().unwrap();
        assert_eq!(cycle.candidates.len(), 6);
        assert_eq!(h.messenger.polls()[0].1.len(), 6);

        h.messenger.set_votes(vec![0, 2, 4, 1, 0, 3]);
        h.orchestrator.run_phase(Phase::Select).await.unwrap();
        let announced = MessageRef(h.messenger.sent().len().to_string());
        assert_eq!(h.messenger.pinned(), vec![announced]);
        assert!(h.messenger.sent().last().unwrap().contains("\"Talk 2\""));

        h.generator.set_fixed("Q1?\nQ2?\n\nQ3?\nQ4?");
        h.orchestrator.run_phase(Phase::Prepare).await.unwrap();
        let cycle = h.store.current_cycle().unwrap().unwrap();
        assert_eq!(cycle.state(), CycleState::Prepared);
        assert_eq!(cycle.selected_candidate().unwrap().id, "t2");
        let prompts: Vec<_> = cycle.discussion.as_deref().unwrap().lines().collect();
        assert_eq!(prompts, vec!["Q1?", "Q2?", "Q3?", "Q4?"]);
    }
}
