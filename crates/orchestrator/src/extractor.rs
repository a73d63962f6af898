use regex::Regex;
use schemaforge_core::PhaseContent;
use std::fmt;
use std::sync::OnceLock;

static FENCE_LINE: OnceLock<Option<Regex>> = OnceLock::new();

/// A line holding only a code fence, with an optional info string.
fn fence_line() -> Option<&'static Regex> {
    FENCE_LINE
        .get_or_init(|| Regex::new(r"(?m)^[ \t]*```[ \t]*([^\s`]*)[^\r\n`]*?\r?$").ok())
        .as_ref()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    FencedBlock,
    BraceRegion,
    RawText,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FencedBlock => "fenced block",
            Self::BraceRegion => "brace region",
            Self::RawText => "raw text",
        }
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub content: PhaseContent,
    pub strategy: ExtractionStrategy,
}

/// Turns a generator's raw reply into phase content. Never fails.
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn extract(raw: &str) -> Extraction {
        if let Some(value) = Self::from_fenced_block(raw) {
            return Extraction {
                content: PhaseContent::Structured(value),
                strategy: ExtractionStrategy::FencedBlock,
            };
        }

        if let Some(value) = Self::from_brace_region(raw) {
            return Extraction {
                content: PhaseContent::Structured(value),
                strategy: ExtractionStrategy::BraceRegion,
            };
        }

        Extraction {
            content: PhaseContent::Text(raw.trim().to_string()),
            strategy: ExtractionStrategy::RawText,
        }
    }

    /// Pair fence lines in order (open, close, open, close...) and parse
    /// the first untagged or `json` block that holds valid JSON.
    fn from_fenced_block(raw: &str) -> Option<serde_json::Value> {
        let mut fences = fence_line()?.captures_iter(raw);

        while let Some(open) = fences.next() {
            let close = fences.next()?;
            let (Some(open_line), Some(close_line)) = (open.get(0), close.get(0)) else {
                return None;
            };

            let info = open.get(1).map_or("", |m| m.as_str());
            if !info.is_empty() && !info.eq_ignore_ascii_case("json") {
                continue;
            }

            let body = &raw[open_line.end()..close_line.start()];
            if let Ok(value) = serde_json::from_str(body.trim()) {
                return Some(value);
            }
        }

        None
    }

    /// Parse the first balanced `{...}` region, ignoring braces inside strings.
    fn from_brace_region(raw: &str) -> Option<serde_json::Value> {
        let start = raw.find('{')?;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (offset, ch) in raw[start..].char_indices() {
            if in_string {
                match ch {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }

            match ch {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = start + offset + ch.len_utf8();
                        return serde_json::from_str(&raw[start..end]).ok();
                    }
                }
                _ => {}
            }
        }

        None
    }
}
