//! Response Sanitization
//!
//! Normalizes model output before it is stored: reasoning blocks are removed
//! and a fence wrapping the whole answer is unwrapped.

use std::sync::OnceLock;

use regex::Regex;

fn think_block() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid think pattern"))
}

fn outer_fence() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)\A```(?:markdown)?[ \t]*\r?\n(.*?)\r?\n?```\z").expect("valid fence pattern")
    })
}

fn sanitize_once(text: &str) -> String {
    let without_think = think_block().replace_all(text, "");
    let body = if without_think.len() == text.len() {
        text
    } else {
        without_think.trim_matches(|c| c == '\n' || c == '\r')
    };

    // whitespace around a fence belongs to the wrapper
    match outer_fence().captures(body.trim()) {
        Some(caps) => caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
        None => body.to_string(),
    }
}

/// Clean a model response.
///
/// Applied until the text stops changing, so running it on its own output
/// is a no-op.
pub fn sanitize_response(text: &str) -> String {
    let mut current = sanitize_once(text);
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
