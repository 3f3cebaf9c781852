//! Word budgeting and script clean-up.
//!
//! The script writer is asked for a word count but is not trusted to honor
//! it. Whatever comes back is trimmed locally so the narration never runs
//! past the budget.

use serde::{Deserialize, Serialize};

/// Narration length parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Spoken words per second of video
    pub words_per_second: f64,
    pub min_words: usize,
    pub max_words: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            words_per_second: 3.0,
            min_words: 10,
            max_words: 80,
        }
    }
}

impl ScriptConfig {
    /// `clamp(round(duration * words_per_second), min_words, max_words)`.
    pub fn word_budget(&self, duration_secs: f64) -> usize {
        let raw = duration_secs * self.words_per_second;
        let words = if raw.is_finite() && raw > 0.0 {
            raw.round() as usize
        } else {
            0
        };
        words.clamp(self.min_words, self.max_words)
    }
}

/// Clean up raw script writer output.
///
/// Strips enclosing quotes and hard-truncates to `max_words`. The result is
/// then cut back to its last `.` or `!` when one sits at least a third of
/// the way in, so a trailing sentence fragment is never spoken. Without
/// such a mark the truncation stands.
pub fn finalize_script(raw: &str, max_words: usize) -> String {
    let text = strip_enclosing_quotes(raw.trim());
    let words: Vec<&str> = text.split_whitespace().collect();

    let truncated = words[..words.len().min(max_words)].join(" ");
    match last_sentence_end(&truncated) {
        Some(end) => truncated[..end].to_string(),
        None => truncated,
    }
}

fn strip_enclosing_quotes(text: &str) -> &str {
    const PAIRS: [(char, char); 3] = [('"', '"'), ('\'', '\''), ('\u{201c}', '\u{201d}')];

    for (open, close) in PAIRS {
        if let Some(inner) = text
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.trim();
        }
    }
    text
}

/// Byte offset just past the last `.` or `!` at or after one third of `text`.
fn last_sentence_end(text: &str) -> Option<usize> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let earliest = chars.len() as f64 / 3.0;

    chars
        .iter()
        .enumerate()
        .rev()
        .take_while(|(pos, _)| *pos as f64 >= earliest)
        .find(|(_, (_, c))| matches!(*c, '.' | '!'))
        .map(|(_, (offset, c))| offset + c.len_utf8())
}
