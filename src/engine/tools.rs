//! Category and path-segment utilities

use std::path::Path;

use crate::utils::config::NamingConsts;
use crate::{CategoryRules, Destination, WorkItem};

/// Make `name` safe as a single path segment on all common filesystems.
///
/// Invalid characters and ASCII control characters become `_`, surrounding whitespace is
/// trimmed, and the result is cut to [`NamingConsts::MAX_NAME_CHARS`] characters. Trailing dots
/// and spaces are then dropped. An empty result (including what `.` and `..` reduce to) becomes
/// `_` so a segment never points outside its parent.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if NamingConsts::INVALID_NAME_CHARS.contains(&c) || c.is_ascii_control() {
                NamingConsts::REPLACEMENT_CHAR
            } else {
                c
            }
        })
        .take(NamingConsts::MAX_NAME_CHARS)
        .collect();
    // Windows drops trailing dots and spaces, so `Eng.` and `Eng` would share a directory.
    let cleaned = cleaned.trim_end_matches(|c: char| c == '.' || c.is_whitespace());
    match cleaned {
        "" => NamingConsts::REPLACEMENT_CHAR.to_string(),
        _ => cleaned.to_string(),
    }
}

/// First present and non-empty (after trim) field from `rules.fields`, trimmed; else `rules.default`.
pub fn resolve_category<'a>(item: &'a WorkItem, rules: &'a CategoryRules) -> &'a str {
    rules
        .fields
        .iter()
        .filter_map(|f| item.get(f))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or(rules.default.as_str())
}

/// Destination for `item` under `root`: resolved category, sanitized.
pub fn resolve_destination(root: &Path, item: &WorkItem, rules: &CategoryRules) -> Destination {
    Destination {
        root: root.to_path_buf(),
        category: sanitize_name(resolve_category(item, rules)),
    }
}
