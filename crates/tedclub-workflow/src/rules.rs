//! Pure decision rules used by the phases.

use std::collections::HashSet;

use tedclub_core::types::SearchHit;

/// Telegram caps poll option text at 100 characters.
pub const MAX_OPTION_CHARS: usize = 100;

/// Talks whose duration lies in `[min_secs, max_secs]`, in search order.
/// A repeated id keeps its first occurrence.
pub fn filter_by_duration(hits: Vec<SearchHit>, min_secs: u32, max_secs: u32) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|h| (min_secs..=max_secs).contains(&h.duration_secs))
        .filter(|h| seen.insert(h.id.clone()))
        .collect()
}

/// Option with the most votes. Ties go to the earliest option; no options
/// means no winner.
pub fn pick_winner<I>(tallies: I) -> Option<usize>
where
    I: IntoIterator<Item = (usize, u32)>,
{
    tallies
        .into_iter()
        .fold(None, |best: Option<(usize, u32)>, (index, votes)| match best {
            Some((_, top)) if votes <= top => best,
            _ => Some((index, votes)),
        })
        .map(|(index, _)| index)
}

/// One prompt per non-blank line of generated text.
pub fn split_prompts(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Cut `s` to at most `max` characters, on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte, _)) => s[..byte].to_string(),
        None => s.to_string(),
    }
}
