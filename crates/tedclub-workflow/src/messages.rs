//! Prompt and chat message templates.

use tedclub_core::types::Candidate;

pub fn poll_question(topic: &str) -> String {
    format!("Which TED talk about {topic} should we discuss?")
}

pub fn description_prompt(title: &str) -> String {
    format!("Create a short 2-3 sentence description for a TED talk titled: {title}")
}

pub fn discussion_prompt(title: &str, description: &str) -> String {
    format!(
        "Generate 3-4 discussion questions for a TED talk with the following details:\n\
         Title: {title}\n\
         Description: {description}\n\n\
         The questions should be thought-provoking and encourage meaningful discussion."
    )
}

/// Companion to the poll: numbered titles with their descriptions.
pub fn candidates_message(topic: &str, candidates: &[Candidate]) -> String {
    let mut out = format!("This week's talks about {topic}:\n");
    for (i, c) in candidates.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. {} ({} min)\n{}\n",
            i + 1,
            c.title,
            (c.duration_secs + 30) / 60,
            c.description
        ));
        if let Some(url) = &c.url {
            out.push_str(url);
            out.push('\n');
        }
    }
    out
}

pub fn announcement(winner: &Candidate) -> String {
    format!(
        "We're going to discuss \"{}\" on Sunday at 18:00 Berlin time! 🎉\n\n{}",
        winner.title, winner.description
    )
}

pub fn discussion_message(title: &str, prompts: &[String]) -> String {
    let bullets = prompts
        .iter()
        .map(|p| format!("• {p}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Here are some questions to guide our discussion of \"{title}\":\n\n{bullets}\n\nSee you at 18:00!"
    )
}
