//! In-memory collaborators for tests, behind the `testing` feature.
//!
//! Each fake records what it was asked to do so assertions can inspect the
//! calls afterwards.

use std::sync::Mutex;

use async_trait::async_trait;
use tedclub_core::error::{Result, TedClubError};
use tedclub_core::traits::{CycleStore, Messenger, SearchProvider, TextGenerator};
use tedclub_core::types::{Cycle, MessageRef, NewCycle, PollRef, PollTally, SearchHit};

fn locked<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub fn hit(id: &str, title: &str, duration_secs: u32) -> SearchHit {
    SearchHit {
        id: id.into(),
        title: title.into(),
        description: String::new(),
        duration_secs,
        url: None,
    }
}

/// Search provider returning a fixed result list.
pub struct FakeSearch {
    result: std::result::Result<Vec<SearchHit>, String>,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            result: Ok(hits),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        locked(&self.queries).clone()
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    fn name(&self) -> &str {
        "fake-search"
    }

    async fn search(&self, topic: &str) -> Result<Vec<SearchHit>> {
        locked(&self.queries).push(topic.to_string());
        self.result.clone().map_err(TedClubError::Http)
    }
}

enum Reply {
    Echo,
    Fixed(String),
    FailAfter(usize),
}

/// Generator with scripted replies.
///
/// `echo()` answers description prompts with `"Description: <title>"` and
/// anything else with three questions.
pub struct FakeGenerator {
    reply: Mutex<Reply>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    fn with(reply: Reply) -> Self {
        Self {
            reply: Mutex::new(reply),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn echo() -> Self {
        Self::with(Reply::Echo)
    }

    pub fn fixed(text: &str) -> Self {
        Self::with(Reply::Fixed(text.to_string()))
    }

    /// Succeed `n` times, then fail every call.
    pub fn failing_after(n: usize) -> Self {
        Self::with(Reply::FailAfter(n))
    }

    pub fn set_fixed(&self, text: &str) {
        *locked(&self.reply) = Reply::Fixed(text.to_string());
    }

    pub fn prompts(&self) -> Vec<String> {
        locked(&self.prompts).clone()
    }
}

fn echo_reply(prompt: &str) -> String {
    match prompt.rsplit_once("titled: ") {
        Some((_, title)) => format!("Description: {title}"),
        None => "What stood out to you?\nWhat would you try first?\nWho else should see it?"
            .to_string(),
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    fn name(&self) -> &str {
        "fake-generator"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let calls = {
            let mut prompts = locked(&self.prompts);
            prompts.push(prompt.to_string());
            prompts.len()
        };
        match &*locked(&self.reply) {
            Reply::Echo => Ok(echo_reply(prompt)),
            Reply::Fixed(text) => Ok(text.clone()),
            Reply::FailAfter(n) if calls > *n => {
                Err(TedClubError::Provider("generator unavailable".into()))
            }
            Reply::FailAfter(_) => Ok(echo_reply(prompt)),
        }
    }
}

#[derive(Default)]
struct MessengerState {
    polls: Vec<(String, Vec<String>)>,
    votes: Option<Vec<u32>>,
    sent: Vec<String>,
    pinned: Vec<MessageRef>,
    fail_polls: bool,
    fail_sends: bool,
}

/// Messenger that keeps polls and messages in memory.
///
/// Closing a poll returns the votes given to [`set_votes`](Self::set_votes),
/// or zero for every option when none were set.
#[derive(Default)]
pub struct FakeMessenger {
    state: Mutex<MessengerState>,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_votes(&self, votes: Vec<u32>) {
        locked(&self.state).votes = Some(votes);
    }

    pub fn fail_polls(&self) {
        locked(&self.state).fail_polls = true;
    }

    pub fn fail_sends(&self) {
        locked(&self.state).fail_sends = true;
    }

    /// `(question, options)` per opened poll.
    pub fn polls(&self) -> Vec<(String, Vec<String>)> {
        locked(&self.state).polls.clone()
    }

    pub fn last_poll_ref(&self) -> Option<PollRef> {
        let n = locked(&self.state).polls.len();
        (n > 0).then(|| PollRef(format!("fake:{n}")))
    }

    pub fn sent(&self) -> Vec<String> {
        locked(&self.state).sent.clone()
    }

    pub fn pinned(&self) -> Vec<MessageRef> {
        locked(&self.state).pinned.clone()
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    fn name(&self) -> &str {
        "fake-messenger"
    }

    async fn open_poll(&self, question: &str, options: &[String]) -> Result<PollRef> {
        let mut state = locked(&self.state);
        if state.fail_polls {
            return Err(TedClubError::Channel("poll rejected".into()));
        }
        state.polls.push((question.to_string(), options.to_vec()));
        Ok(PollRef(format!("fake:{}", state.polls.len())))
    }

    async fn close_poll(&self, poll: &PollRef) -> Result<Vec<PollTally>> {
        let state = locked(&self.state);
        let index = poll
            .0
            .strip_prefix("fake:")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
            .ok_or_else(|| TedClubError::Channel(format!("unknown poll {poll}")))?;
        let (_, options) = state
            .polls
            .get(index)
            .ok_or_else(|| TedClubError::Channel(format!("unknown poll {poll}")))?;
        let votes = state
            .votes
            .clone()
            .unwrap_or_else(|| vec![0; options.len()]);
        Ok(votes
            .into_iter()
            .enumerate()
            .map(|(option_index, votes)| PollTally {
                option_index,
                text: options.get(option_index).cloned().unwrap_or_default(),
                votes,
            })
            .collect())
    }

    async fn send_message(&self, text: &str) -> Result<MessageRef> {
        let mut state = locked(&self.state);
        if state.fail_sends {
            return Err(TedClubError::Channel("send rejected".into()));
        }
        state.sent.push(text.to_string());
        Ok(MessageRef(state.sent.len().to_string()))
    }

    async fn pin_message(&self, message: &MessageRef) -> Result<()> {
        locked(&self.state).pinned.push(message.clone());
        Ok(())
    }
}

/// Store whose every call fails.
pub struct BrokenStore;

impl CycleStore for BrokenStore {
    fn insert_cycle(&self, _cycle: &NewCycle) -> Result<i64> {
        Err(TedClubError::Store("disk full".into()))
    }

    fn current_cycle(&self) -> Result<Option<Cycle>> {
        Err(TedClubError::Store("disk full".into()))
    }

    fn update_selection(&self, _: i64, _: &str, _: &[PollTally]) -> Result<()> {
        Err(TedClubError::Store("disk full".into()))
    }

    fn update_discussion(&self, _: i64, _: &str) -> Result<()> {
        Err(TedClubError::Store("disk full".into()))
    }

    fn recent_cycles(&self, _: usize) -> Result<Vec<Cycle>> {
        Err(TedClubError::Store("disk full".into()))
    }

    fn ping(&self) -> Result<()> {
        Err(TedClubError::Store("disk full".into()))
    }
}
