use once_cell::sync::Lazy;
use regex::Regex;

use crate::translators::TranslationOutcome;

static SPEAKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^:]+):\s*(.*)$").unwrap());

/// Both renderings of one translated file plus the source's dialogue count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOutputs {
    pub markdown: String,
    pub plaintext: String,
    pub dialogue_count: usize,
    pub outcome: TranslationOutcome,
}

impl RenderedOutputs {
    pub fn render(outcome: TranslationOutcome, dialogue_count: usize) -> Self {
        let (markdown, plaintext) = {
            let text = outcome.text();
            (to_markdown(&text), to_text(&text))
        };
        Self {
            markdown,
            plaintext,
            dialogue_count,
            outcome,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_failure()
    }
}

/// Bolds the speaker of every `speaker: content` line. Line count and blank
/// line positions are preserved.
pub fn to_markdown(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return line.to_string();
            }
            match SPEAKER_RE.captures(trimmed) {
                Some(caps) => format!("**{}:** {}", caps[1].trim(), caps[2].trim()),
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn to_text(text: &str) -> String {
    text.to_string()
}
