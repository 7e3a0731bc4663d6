//! Name validation, normalization and identifier derivation.

use regex::Regex;
use std::sync::OnceLock;

pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_NAME_LENGTH: usize = 50;

const SEPARATORS: &[char] = &[' ', '-', '\''];
const RESERVED: &[&str] = &["test", "admin", "root", "user"];

/// Why a spoken name was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRejection {
    Empty,
    TooShort,
    TooLong,
    InvalidCharacters,
    BadBoundary,
    RepeatedSeparators,
    Reserved,
}

impl std::fmt::Display for NameRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::Empty => "name is empty",
            Self::TooShort => "name is too short",
            Self::TooLong => "name is too long",
            Self::InvalidCharacters => "name contains characters other than letters, spaces, hyphens and apostrophes",
            Self::BadBoundary => "name must start and end with a letter",
            Self::RepeatedSeparators => "name contains a run of separators",
            Self::Reserved => "name is reserved",
        };
        f.write_str(reason)
    }
}

/// Validates a candidate name and returns it capitalized.
///
/// Accepts letters from any script plus spaces, hyphens and apostrophes,
/// 2 to 50 characters after trimming.
pub fn validate_name(raw: &str) -> Result<String, NameRejection> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(NameRejection::Empty);
    }

    let length = name.chars().count();
    if length < MIN_NAME_LENGTH {
        return Err(NameRejection::TooShort);
    }
    if length > MAX_NAME_LENGTH {
        return Err(NameRejection::TooLong);
    }
    if !name
        .chars()
        .all(|c| c.is_alphabetic() || SEPARATORS.contains(&c))
    {
        return Err(NameRejection::InvalidCharacters);
    }

    let starts_with_letter = name.chars().next().is_some_and(char::is_alphabetic);
    let ends_with_letter = name.chars().next_back().is_some_and(char::is_alphabetic);
    if !starts_with_letter || !ends_with_letter {
        return Err(NameRejection::BadBoundary);
    }

    let mut run = 0;
    for c in name.chars() {
        run = if SEPARATORS.contains(&c) { run + 1 } else { 0 };
        if run >= 3 {
            return Err(NameRejection::RepeatedSeparators);
        }
    }

    if RESERVED.iter().any(|r| name.eq_ignore_ascii_case(r)) {
        return Err(NameRejection::Reserved);
    }

    Ok(clean_name(name))
}

/// Capitalizes every word and every hyphenated part: "jean-luc picard"
/// becomes "Jean-Luc Picard". Whitespace runs collapse to one space.
pub fn clean_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            word.split('-')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Plugin identifier for a display name: lowercase, spaces to underscores.
pub fn user_id(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Display name for a plugin identifier.
pub fn display_name(user_id: &str) -> String {
    clean_name(&user_id.replace('_', " "))
}

struct SpokenNamePatterns {
    lead_ins: Vec<Regex>,
    names: Vec<Regex>,
}

fn spoken_name_patterns() -> &'static SpokenNamePatterns {
    static PATTERNS: OnceLock<SpokenNamePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |p: &str| Regex::new(p).expect("valid regex");
        SpokenNamePatterns {
            lead_ins: [
                r"(?i)^my name is\s+",
                r"(?i)^i'?m\s+",
                r"(?i)^call me\s+",
                r"(?i)^it'?s\s+",
                r"(?i)^the name is\s+",
                r"(?i)^use\s+",
            ]
            .into_iter()
            .map(compile)
            .collect(),
            names: [
                r"(?i)\bas\s+(\p{L}[\p{L}\s\-']{0,48}\p{L})",
                r"(?i)\bname\s+(\p{L}[\p{L}\s\-']{0,48}\p{L})",
                r"^(\p{L}[\p{L}\s\-']{0,48}\p{L})$",
            ]
            .into_iter()
            .map(compile)
            .collect(),
        }
    })
}

/// Pulls a name out of a free-form answer to "what is your name?".
///
/// Strips lead-ins such as "my name is" or "call me", then looks for
/// "as <Name>", "name <Name>", or a bare name. The result is capitalized
/// but not validated.
pub fn extract_spoken_name(utterance: &str) -> Option<String> {
    let patterns = spoken_name_patterns();
    let mut cleaned = utterance
        .trim()
        .trim_end_matches(['.', '!', '?', ','])
        .to_string();
    for lead_in in &patterns.lead_ins {
        cleaned = lead_in.replace(&cleaned, "").into_owned();
    }
    let cleaned = cleaned.trim();

    patterns.names.iter().find_map(|pattern| {
        pattern
            .captures(cleaned)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|name| name.chars().count() >= MIN_NAME_LENGTH)
            .map(clean_name)
    })
}
