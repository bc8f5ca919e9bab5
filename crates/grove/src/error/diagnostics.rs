//! # Diagnostic Utilities
//!
//! Helpers for rendering syntax errors:
//! - "Did you mean?" suggestions against the expected candidates
//! - Context extraction around an error offset
//! - Caret-marked source snippets

use crate::source::Source;
use std::fmt::Write;

/// Best candidate similar to `actual`, if any passes the similarity threshold.
///
/// Candidates are compared without surrounding quotes, so `"while"` matches
/// `whle`.
#[must_use]
pub fn did_you_mean(actual: &str, expected: &[String]) -> Option<String> {
    if actual.is_empty() {
        return None;
    }

    let actual_lower = actual.to_lowercase();
    let mut best_match: Option<(&String, f64)> = None;
    let threshold = 0.6;

    for candidate in expected {
        let bare = candidate.trim_matches('"');
        if bare == actual {
            continue;
        }
        let similarity = string_similarity(&actual_lower, &bare.to_lowercase());
        if similarity >= threshold {
            match best_match {
                None => best_match = Some((candidate, similarity)),
                Some((_, best_sim)) if similarity > best_sim => {
                    best_match = Some((candidate, similarity));
                }
                _ => {}
            }
        }
    }

    best_match.map(|(suggestion, _)| suggestion.clone())
}

/// Similarity in `0.0..=1.0`: one minus the edit distance over the longer length.
#[must_use]
pub fn string_similarity(s1: &str, s2: &str) -> f64 {
    if s1 == s2 {
        return 1.0;
    }

    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let distance = prev[b.len()];
    let max_len = f64::from(u32::try_from(max_len).unwrap_or(u32::MAX));
    let distance = f64::from(u32::try_from(distance).unwrap_or(u32::MAX));
    1.0 - distance / max_len
}

/// The identifier-like word (or single character) starting at `offset`.
#[must_use]
pub fn word_at(text: &str, offset: usize) -> &str {
    let Some(rest) = text.get(offset..) else {
        return "";
    };
    let word_len: usize = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .map(char::len_utf8)
        .sum();
    if word_len > 0 {
        &rest[..word_len]
    } else {
        rest.chars().next().map_or("", |c| &rest[..c.len_utf8()])
    }
}

/// Extract up to `context_chars` bytes of context on each side of `offset`.
///
/// Returns `(before, after)`, clipped to character boundaries and to the
/// current line.
#[must_use]
pub fn extract_context(source: &Source, offset: usize, context_chars: usize) -> (String, String) {
    let line = source.line_text(offset);
    let column = source.position(offset).column as usize;
    let column = column.min(line.len());

    let mut start = column.saturating_sub(context_chars);
    while !line.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (column + context_chars).min(line.len());
    while !line.is_char_boundary(end) {
        end += 1;
    }
    let column = if line.is_char_boundary(column) { column } else { start };

    (line[start..column].to_string(), line[column..end].to_string())
}

/// Render the line containing `offset` with a caret under the offending column.
#[must_use]
pub fn render_snippet(source: &Source, offset: usize) -> String {
    let position = source.position(offset);
    let line_no = (position.line + 1).to_string();
    let gutter = " ".repeat(line_no.len());
    let line = source.line_text(offset);
    let caret_col = line
        .get(..(position.column as usize).min(line.len()))
        .map_or(0, |prefix| prefix.chars().count());

    let mut out = String::new();
    let _ = writeln!(out, "{gutter}--> {position}");
    let _ = writeln!(out, "{gutter} |");
    let _ = writeln!(out, "{line_no} | {line}");
    let _ = write!(out, "{gutter} | {:caret_col$}^", "");
    out
}
