//! Object storage keys for generated certificates.
//!
//! Keys are derived from the quiz title, team name and student name. Two
//! students whose names sanitize to the same segments share a key, and the
//! later upload overwrites the earlier one.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Prefix under which every certificate is stored.
pub const CERTIFICATE_PREFIX: &str = "certificates";

/// Segment used when nothing survives sanitization.
pub const EMPTY_SEGMENT: &str = "unnamed";

/// Make a single key segment safe for filesystems and URLs.
///
/// Accents are stripped through canonical decomposition, everything outside
/// `[A-Za-z0-9._-]` is dropped, whitespace runs become a single `-` and the
/// result is lowercased.
pub fn sanitize_key_segment(input: &str) -> String {
    let kept: String = input
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') || c.is_whitespace())
        .collect();

    let segment = kept
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_ascii_lowercase();

    // `.` and `..` are not valid path segments
    if segment.chars().all(|c| c == '.') {
        return EMPTY_SEGMENT.to_string();
    }
    segment
}

/// Storage key for a student's certificate: `certificates/{quiz}/{team}/{student}`.
pub fn certificate_key(quiz_title: &str, team_name: &str, student_name: &str) -> String {
    format!(
        "{CERTIFICATE_PREFIX}/{}/{}/{}",
        sanitize_key_segment(quiz_title),
        sanitize_key_segment(team_name),
        sanitize_key_segment(student_name)
    )
}
