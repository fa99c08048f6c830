//! Line normalization for raw trace text.
//!
//! Strips terminal escape sequences, splits on `\n`, trims, and drops empty
//! lines. Box-drawing glyphs are left in place: the classifier uses them to
//! find the edges of the crew's framed output blocks.

use regex::Regex;
use std::sync::LazyLock;

/// CSI sequences: colors (`ESC[1;32m`) plus cursor/erase controls.
static ANSI_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").unwrap());

/// Glyphs that open or close a framed block.
pub const BOUNDARY_GLYPHS: [char; 4] = ['╭', '╰', '╮', '╯'];

/// Every box-drawing glyph the crew prints, including side/rule padding.
pub const BOX_GLYPHS: [char; 6] = ['╭', '╰', '│', '─', '╮', '╯'];

pub fn strip_ansi(text: &str) -> String {
    ANSI_REGEX.replace_all(text, "").into_owned()
}

/// Clean a single line: remove escapes and surrounding whitespace.
pub fn normalize_line(line: &str) -> String {
    strip_ansi(line).trim().to_string()
}

/// Split a self-contained chunk into cleaned, non-empty lines.
pub fn normalize_chunk(chunk: &str) -> Vec<String> {
    chunk
        .split('\n')
        .map(normalize_line)
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn has_box_glyph(line: &str) -> bool {
    line.chars().any(|c| BOX_GLYPHS.contains(&c))
}

pub fn has_boundary_glyph(line: &str) -> bool {
    line.chars().any(|c| BOUNDARY_GLYPHS.contains(&c))
}

/// Remove box padding from both ends of a captured answer line.
pub fn strip_box_padding(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() || BOX_GLYPHS.contains(&c))
}

/// Reassembles logical lines from arbitrarily split chunks.
///
/// Only complete lines are released; a trailing partial line waits for the
/// next chunk or for [`LineSplitter::finish`]. This keeps classification
/// independent of where the producer happened to cut its writes.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: String,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the cleaned lines it completed.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);
        let Some(last_newline) = self.pending.rfind('\n') else {
            return Vec::new();
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        normalize_chunk(&complete)
    }

    /// Release whatever partial line is buffered.
    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.pending);
        normalize_chunk(&rest)
    }
}

/// Substring filter for framework chatter that should never become events.
#[derive(Debug, Clone, Default)]
pub struct NoiseFilter {
    patterns: Vec<String>,
}

impl NoiseFilter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_string())
                .filter(|p| !p.trim().is_empty())
                .collect(),
        }
    }

    pub fn is_noise(&self, line: &str) -> bool {
        self.patterns.iter().any(|p| line.contains(p.as_str()))
    }
}
