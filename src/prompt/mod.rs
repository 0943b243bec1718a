//! Prompt composition.
//!
//! A prompt is a pure function of the speaker's profile, the meeting topic,
//! the phase and round focus, and a bounded tail of the transcript. No clock,
//! no randomness: identical inputs give identical prompts.

use crate::agents::AgentProfile;
use crate::meeting::TranscriptEntry;

/// Phase-specific part of a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStage<'a> {
    Introduction,
    /// `round` is 0-based.
    Discussion { round: u32, focus: &'a str },
    Conclusion,
}

#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub agent: &'a AgentProfile,
    pub topic: &'a str,
    pub stage: PromptStage<'a>,
    /// Scenario guidance shown to every participant.
    pub guidance: Option<&'a str>,
    pub language: Option<&'a str>,
    pub transcript: &'a [TranscriptEntry],
}

const OMITTED_MARKER: &str = "(earlier discussion omitted)";

#[derive(Debug, Clone)]
pub struct PromptComposer {
    context_entries: usize,
    context_chars: usize,
    summary_entries: Option<usize>,
}

impl PromptComposer {
    pub fn new(context_entries: usize, context_chars: usize, summary_entries: Option<usize>) -> Self {
        Self {
            context_entries,
            context_chars,
            summary_entries,
        }
    }

    pub fn compose(&self, ctx: &PromptContext<'_>) -> String {
        let mut prompt = String::new();

        prompt.push_str(&persona(ctx.agent));
        prompt.push_str(&format!("\n\nMeeting topic: \"{}\"", ctx.topic));
        if let Some(guidance) = ctx.guidance.filter(|g| !g.trim().is_empty()) {
            prompt.push_str(&format!("\n\nMeeting guidance: {guidance}"));
        }

        let (window, truncated) = match ctx.stage {
            PromptStage::Conclusion => self.summary_window(ctx.transcript),
            _ => self.context_window(ctx.transcript),
        };
        if !window.is_empty() {
            let heading = match ctx.stage {
                PromptStage::Conclusion => "Meeting transcript",
                _ => "Recent discussion",
            };
            prompt.push_str(&format!("\n\n{heading}:\n"));
            if truncated {
                prompt.push_str(OMITTED_MARKER);
                prompt.push('\n');
            }
            let lines: Vec<String> = window.iter().map(render_line).collect();
            prompt.push_str(&lines.join("\n"));
        }

        prompt.push_str("\n\n");
        prompt.push_str(&instruction(ctx.stage, ctx.topic));

        if let Some(language) = ctx.language.filter(|l| !l.trim().is_empty()) {
            prompt.push_str(&format!("\n\nRespond in {language}."));
        }

        prompt
    }

    /// Trailing entries for a participant prompt: at most `context_entries`,
    /// then the oldest are dropped until the rendered lines fit `context_chars`.
    /// The flag tells whether anything was left out.
    pub fn context_window<'t>(&self, transcript: &'t [TranscriptEntry]) -> (&'t [TranscriptEntry], bool) {
        let mut start = transcript.len().saturating_sub(self.context_entries);
        let mut used = 0usize;
        for (i, entry) in transcript[start..].iter().enumerate().rev() {
            let cost = render_line(entry).chars().count() + 1;
            if used + cost > self.context_chars {
                start += i + 1;
                break;
            }
            used += cost;
        }
        (&transcript[start..], start > 0)
    }

    fn summary_window<'t>(&self, transcript: &'t [TranscriptEntry]) -> (&'t [TranscriptEntry], bool) {
        match self.summary_entries {
            Some(n) if n < transcript.len() => (&transcript[transcript.len() - n..], true),
            _ => (transcript, false),
        }
    }
}

fn persona(agent: &AgentProfile) -> String {
    let mut text = format!(
        "You are {}, the {}, taking part in a meeting.",
        agent.name, agent.title
    );
    if !agent.personality.is_empty() {
        text.push_str(&format!(
            "\nPersonality: {}.",
            agent.personality.join(", ")
        ));
    }
    if !agent.expertise.is_empty() {
        let tags: Vec<&str> = agent.expertise.iter().map(String::as_str).collect();
        text.push_str(&format!("\nExpertise: {}.", tags.join(", ")));
    }
    if !agent.speaking_style.trim().is_empty() {
        text.push_str(&format!("\nSpeaking style: {}", agent.speaking_style));
    }
    text
}

fn instruction(stage: PromptStage<'_>, topic: &str) -> String {
    match stage {
        PromptStage::Introduction => format!(
            "Introduce yourself in two or three sentences: who you are, what you bring, \
             and your first impression of \"{topic}\"."
        ),
        PromptStage::Discussion { round, focus } => format!(
            "This is discussion round {}. Focus: {focus}\n\
             Contribute one concise point from your role's perspective. \
             Respond directly to the most recent one or two speakers where relevant \
             and avoid repeating what has already been said.",
            round + 1
        ),
        PromptStage::Conclusion => format!(
            "As the meeting's secretary, summarise the discussion on \"{topic}\": \
             the main viewpoints, five to seven numbered conclusions or action items, \
             and one or two open questions to follow up on."
        ),
    }
}

fn render_line(entry: &TranscriptEntry) -> String {
    format!("{}: {}", entry.speaker_label(), entry.text)
}
