//! Strip markdown from model output
//!
//! Insights are shown as plain text, but small models add markdown anyway.

use std::sync::OnceLock;

use regex::{Captures, Regex};

struct Patterns {
    fence: Regex,
    heading: Regex,
    bullet: Regex,
    strong: Regex,
    underline: Regex,
    emphasis: Regex,
    code: Regex,
    blank_runs: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        fence: Regex::new(r"(?m)^[ \t]*```[^\n]*\n?").expect("valid regex"),
        heading: Regex::new(r"(?m)^[ \t]{0,3}#{1,6}[ \t]+").expect("valid regex"),
        bullet: Regex::new(r"(?m)^([ \t]*)[*+][ \t]+").expect("valid regex"),
        strong: Regex::new(r"\*\*([^\s*](?:[^*\n]*[^\s*])?)\*\*").expect("valid regex"),
        // Phrases only, so identifiers like __init__ are kept
        underline: Regex::new(r"__([^\s_][^_\n]*\s[^_\n]*[^\s_])__").expect("valid regex"),
        emphasis: Regex::new(r"\*([^\s*](?:[^*\n]*[^\s*])?)\*").expect("valid regex"),
        code: Regex::new(r"`([^`\n]*)`").expect("valid regex"),
        blank_runs: Regex::new(r"\n{3,}").expect("valid regex"),
    })
}

/// Remove code fences, heading markers, emphasis markers and inline code
/// ticks; `*`/`+` bullets become `-`
pub fn sanitize(text: &str) -> String {
    let p = patterns();
    let text = p.fence.replace_all(text, "");
    let text = p.heading.replace_all(&text, "");
    let text = p.bullet.replace_all(&text, "${1}- ");
    let text = unwrap_delimited(&p.strong, &text);
    let text = unwrap_delimited(&p.underline, &text);
    let text = unwrap_delimited(&p.emphasis, &text);
    let text = p.code.replace_all(&text, "${1}");
    let text = p.blank_runs.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Replace each match with its first group, but only when the delimiters sit
/// on non-word boundaries (`2*5*3` and `a*b` are not emphasis)
fn unwrap_delimited(re: &Regex, text: &str) -> String {
    re.replace_all(text, |caps: &Captures| {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            return String::new();
        };
        let before = text[..whole.start()].chars().next_back();
        let after = text[whole.end()..].chars().next();
        if is_boundary(before) && is_boundary(after) {
            inner.as_str().to_string()
        } else {
            whole.as_str().to_string()
        }
    })
    .into_owned()
}

fn is_boundary(c: Option<char>) -> bool {
    c.map_or(true, |c| !(c.is_alphanumeric() || c == '_' || c == '*'))
}
