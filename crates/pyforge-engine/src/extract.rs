//! Pulls a single Python payload out of free-form model output.
//!
//! Preference order: first fenced block tagged as Python, then the first
//! untagged fenced block, then the whole reply if it reads like bare code.
//! Fences are paired left to right, so the closing marker of one block is
//! never mistaken for the opening marker of the next.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// How the code was located in the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    TaggedFence,
    GenericFence,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedCode {
    pub code: String,
    pub method: ExtractionMethod,
}

const PYTHON_TAGS: &[&str] = &["python", "py", "python3"];
const CODE_MARKERS: &[&str] = &["def ", "import ", "class ", "print("];

/// Extract Python code from `text`, or `None` if nothing looks like code.
pub fn extract_code(text: &str) -> Option<ExtractedCode> {
    static FENCE_RE: OnceLock<Regex> = OnceLock::new();
    let fence_re =
        FENCE_RE.get_or_init(|| Regex::new(r"(?s)```[ \t]*([^\s`]*)\s(.*?)```").unwrap());

    let mut generic: Option<String> = None;
    for caps in fence_re.captures_iter(text) {
        let tag = caps[1].trim();
        let body = caps[2].trim();
        if body.is_empty() {
            continue;
        }
        if PYTHON_TAGS.iter().any(|t| tag.eq_ignore_ascii_case(t)) {
            return Some(ExtractedCode {
                code: body.to_string(),
                method: ExtractionMethod::TaggedFence,
            });
        }
        if tag.is_empty() && generic.is_none() {
            generic = Some(body.to_string());
        }
    }
    if let Some(code) = generic {
        return Some(ExtractedCode {
            code,
            method: ExtractionMethod::GenericFence,
        });
    }

    looks_like_code(text).then(|| ExtractedCode {
        code: text.trim().to_string(),
        method: ExtractionMethod::Heuristic,
    })
}

fn looks_like_code(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || text.trim_start().starts_with("```") {
        return false;
    }
    if CODE_MARKERS.iter().any(|m| text.contains(m)) {
        return true;
    }
    let mut lines = trimmed.lines();
    let multi_line = lines.clone().nth(1).is_some();
    multi_line && lines.any(|l| l.starts_with(' ') || l.starts_with('\t'))
}
