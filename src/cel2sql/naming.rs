//! Storage column naming

use crate::view::SUMMARY_MESSAGE;

/// Message types stored flattened into prefixed columns
const FLATTENED_MESSAGES: &[(&str, &str)] = &[(SUMMARY_MESSAGE, "recordsummary")];

/// Column holding `field` of a flattened message, if `message` is flattened
pub fn flattened_column(message: &str, field: &str) -> Option<String> {
    FLATTENED_MESSAGES
        .iter()
        .find(|(name, _)| *name == message)
        .map(|(_, prefix)| format!("{}_{}", prefix, to_snake_case(field)))
}

/// Convert a field name to the storage naming convention.
///
/// `startTime` → `start_time`, `HTTPServer` → `http_server`,
/// `summary.endTime` → `summary_end_time`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '.' || c == '-' || c == ' ' || c == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev = if i > 0 { Some(chars[i - 1]) } else { None };
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.map_or(false, |n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}
