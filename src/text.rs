//! Plain-text normalisation and line filtering.
//!
//! Text extracted from an ebook is cleaned of markup residue and split into
//! one [`TextLine`] per line break.  Each line becomes one synthesis request,
//! which keeps the generated clips short (the voice model does best with
//! utterances of a few seconds).

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

// ─────────────────────────────────────────────────────────────────────────────
// Lines
// ─────────────────────────────────────────────────────────────────────────────

/// One line of normalised text at its 0-based position in the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub index: usize,
    pub content: String,
}

impl TextLine {
    pub fn new(index: usize, content: impl Into<String>) -> Self {
        Self { index, content: content.into() }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Normalisation
// ─────────────────────────────────────────────────────────────────────────────

/// Footnote separators that survive plain-text conversion (`---`, `-----`, …).
static RE_FOOTNOTE_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{3,}").unwrap());

/// Every character sequence that ends a line.  CRLF comes first so it counts
/// as one boundary.
static RE_LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r\n|[\n\r\x0B\x0C\x1C-\x1E\x{85}\x{2028}\x{2029}]").unwrap());

/// Marker spoken in place of a footnote separator.
pub const FOOTNOTE_MARKER: &str = "Footnote:";

/// Strip emphasis underscores and rewrite footnote separators.
///
/// Underscores become spaces rather than being deleted so that `_word_`
/// does not glue onto its neighbours.
pub fn clean_text_chunk(text: &str) -> String {
    let text = text.replace('_', " ");
    RE_FOOTNOTE_RULE.replace_all(&text, FOOTNOTE_MARKER).into_owned()
}

/// Clean `text` and split it into lines.
///
/// `\n`, `\r\n`, a lone `\r`, vertical tab, form feed, `\x1C`..`\x1E`,
/// NEL, U+2028 and U+2029 all end a line.  A trailing line break does not
/// produce an extra empty line, and empty input yields no lines.
pub fn normalize(text: &str) -> Vec<TextLine> {
    let cleaned = clean_text_chunk(text);
    let mut pieces: Vec<&str> = RE_LINE_BREAK.split(&cleaned).collect();
    if pieces.last().is_some_and(|p| p.is_empty()) {
        pieces.pop();
    }
    pieces
        .into_iter()
        .enumerate()
        .map(|(index, content)| TextLine::new(index, content))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Filtering
// ─────────────────────────────────────────────────────────────────────────────

/// Typographic punctuation pandoc emits in plain-text output.
const UNICODE_PUNCTUATION: &str = "‐‑‒–—―…‘’‚‛“”„‟«»‹›·•¡¿§¶†‡′″";

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || c.is_whitespace() || UNICODE_PUNCTUATION.contains(c)
}

/// `true` when `content` contains something a voice can say.
///
/// Lines made only of punctuation and whitespace (including the empty line,
/// scene breaks such as `* * *`, and ellipses) are not speakable.
pub fn is_speakable(content: &str) -> bool {
    !content.chars().all(is_punctuation)
}

/// Applies [`is_speakable`] and keeps a tally of the outcome.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LineFilter {
    accepted: usize,
    rejected: usize,
}

impl LineFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `line` should be synthesized.  Rejections are logged.
    pub fn accept(&mut self, line: &TextLine) -> bool {
        if is_speakable(&line.content) {
            self.accepted += 1;
            true
        } else {
            self.rejected += 1;
            info!(line = line.index, content = %line.content, "skipping unspeakable line");
            false
        }
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
