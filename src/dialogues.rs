use std::fmt;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Bracketed emotion markers such as `[warm]`. Non-greedy, so the first `]`
/// after each `[` closes the tag.
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]").unwrap());

/// `speaker: utterance`, tested against a trimmed line.
static DIALOGUE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^:]+:\s*.+$").unwrap());

/// An uploaded dialogue file, decoded as UTF-8.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub filename: String,
    pub content: String,
}

impl SourceDocument {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    pub fn from_bytes(filename: &str, bytes: Vec<u8>) -> Result<Self> {
        let content = String::from_utf8(bytes)
            .with_context(|| format!("'{}' is not valid UTF-8", filename))?;
        Ok(Self::new(filename, content))
    }

    pub fn cleaned(&self) -> String {
        strip_tags(&self.content)
    }

    pub fn dialogue_count(&self) -> usize {
        count_dialogues(&self.content)
    }
}

impl fmt::Display for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.filename, self.content.len())
    }
}

/// Removes every `[...]` tag. Whitespace around a removed tag is left alone.
pub fn strip_tags(content: &str) -> String {
    TAG_RE.replace_all(content, "").into_owned()
}

/// Counts lines that look like `speaker: utterance`. A display metric only.
pub fn count_dialogues(content: &str) -> usize {
    content
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty() && DIALOGUE_RE.is_match(line))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_removes_emotion_tags() {
        // Only the tag goes; the spaces on both sides of it stay.
        let stripped = strip_tags("Sally: [warm] Hello!\nPete: [joyful] Hi!");
        assert_eq!(stripped, "Sally:  Hello!\nPete:  Hi!");
        assert!(!stripped.contains('['));
    }

    #[test]
    fn strip_is_non_greedy() {
        assert_eq!(strip_tags("a [x] b [y] c"), "a  b  c");
        assert_eq!(strip_tags("[[nested]] tail"), "] tail");
    }

    #[test]
    fn strip_without_brackets_is_identity() {
        let text = "Sally: Hello!\nPete: Hi!";
        assert_eq!(strip_tags(text), text);
    }

    #[test]
    fn strip_is_idempotent() {
        for input in [
            "Sally: [warm] Hello!",
            "[a][b] [c",
            "unclosed [tag\nnext] line",
            "]] [ok] [[",
            "",
        ] {
            let once = strip_tags(input);
            assert_eq!(strip_tags(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn strip_does_not_cross_lines() {
        assert_eq!(strip_tags("open [tag\nclose] here"), "open [tag\nclose] here");
    }

    #[test]
    fn count_skips_blank_and_colonless_lines() {
        assert_eq!(count_dialogues("Sally: Hi!\n\nNot a dialogue line"), 1);
    }

    #[test]
    fn count_is_heuristic() {
        let content = "  Pete: meet at 10:30  \nURL: https://example.com\n: orphan\nSally:\n";
        assert_eq!(count_dialogues(content), 2);
    }

    #[test]
    fn count_never_exceeds_non_blank_lines() {
        let content = "A: one\nB: two\n\n   \nplain\nC:three";
        let non_blank = content.lines().filter(|l| !l.trim().is_empty()).count();
        let count = count_dialogues(content);
        assert_eq!(count, 3);
        assert!(count <= non_blank);
    }

    #[test]
    fn from_bytes_rejects_invalid_utf8() {
        let err = SourceDocument::from_bytes("bad.txt", vec![0xff, 0xfe, 0x00]).unwrap_err();
        assert!(err.to_string().contains("bad.txt"));

        let doc = SourceDocument::from_bytes("ok.txt", "Sally: 你好".as_bytes().to_vec()).unwrap();
        assert_eq!(doc.dialogue_count(), 1);
    }
}
