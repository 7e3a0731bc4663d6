//! Keyword intent recognition and yes/no parsing.
//!
//! Matching is whole-word and case-insensitive. Every trigger except
//! cancel needs a voice word next to its verb, so requests meant for other
//! skills ("record a memo", "who is in this photo") stay unrecognized. The
//! name slot is pulled from "... as <Name>" first, then "... for <Name>".

use regex::Regex;
use std::sync::OnceLock;

const ENROLL: &[&str] = &["enroll", "enrol", "register", "save", "record", "train", "add"];
const VOICE: &[&str] = &["voice", "speech"];
const REMEMBER: &[&str] = &["remember", "learn"];
const ME: &[&str] = &["me", "my", "myself"];
const VERIFY: &[&str] = &["verify", "compare"];
const SPEAKERS: &[&str] = &["speaker", "speakers", "voice", "voices"];
const DELETE: &[&str] = &["delete", "remove", "forget", "erase"];
const VOICEPRINT: &[&str] = &["voice", "voices", "voiceprint"];
const LIST: &[&str] = &["list", "show", "who"];
const KNOWN_VOICES: &[&str] = &["voice", "voices", "voiceprints", "enrolled"];
const CANCEL: &[&str] = &["cancel", "stop", "abort", "nevermind"];

/// Words accepted as "yes" at a confirmation prompt.
pub const AFFIRMATIVE: &[&str] = &["yes", "yeah", "sure", "okay", "proceed"];
/// Words accepted as "no" at a confirmation prompt.
pub const NEGATIVE: &[&str] = &["no", "cancel", "stop", "abort"];

/// What an utterance asks the skill to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    EnrollVoice { name: Option<String> },
    RememberMe { name: Option<String> },
    ListUsers,
    DeleteProfile { name: Option<String> },
    VerifySpeakers,
    Cancel,
    Unrecognized,
}

impl Intent {
    pub fn is_enrollment(&self) -> bool {
        matches!(self, Self::EnrollVoice { .. } | Self::RememberMe { .. })
    }
}

/// Answer to a yes/no prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
}

struct Words(Vec<String>);

impl Words {
    fn of(utterance: &str) -> Self {
        Self(
            utterance
                .split(|c: char| !(c.is_alphanumeric() || c == '\''))
                .filter(|w| !w.is_empty())
                .map(str::to_lowercase)
                .collect(),
        )
    }

    fn any(&self, vocabulary: &[&str]) -> bool {
        self.0.iter().any(|w| vocabulary.contains(&w.as_str()))
    }
}

/// Maps an utterance onto an [`Intent`].
pub fn recognize(utterance: &str) -> Intent {
    let words = Words::of(utterance);

    if words.any(CANCEL) {
        Intent::Cancel
    } else if words.any(DELETE) && words.any(VOICEPRINT) {
        Intent::DeleteProfile {
            name: extract_name_slot(utterance),
        }
    } else if words.any(VERIFY) && words.any(SPEAKERS) {
        Intent::VerifySpeakers
    } else if words.any(LIST) && words.any(KNOWN_VOICES) {
        Intent::ListUsers
    } else if words.any(ENROLL) && words.any(VOICE) && words.any(ME) {
        Intent::EnrollVoice {
            name: extract_name_slot(utterance),
        }
    } else if words.any(REMEMBER) && words.any(ME) {
        Intent::RememberMe {
            name: extract_name_slot(utterance),
        }
    } else {
        Intent::Unrecognized
    }
}

/// Reads a yes/no answer. Anything not clearly affirmative is a no.
pub fn parse_confirmation(utterance: &str) -> Confirmation {
    let words = Words::of(utterance);
    if words.any(NEGATIVE) {
        Confirmation::No
    } else if words.any(AFFIRMATIVE) {
        Confirmation::Yes
    } else {
        Confirmation::No
    }
}

fn slot_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?i)\bas\s+(\p{L}[\p{L}\s\-']{0,48}\p{L})\b").expect("valid regex"),
            Regex::new(r"(?i)\bfor\s+(\p{L}[\p{L}\s\-']{0,48}\p{L})\b").expect("valid regex"),
        ]
    })
}

/// Extracts the raw name slot, unvalidated.
pub fn extract_name_slot(utterance: &str) -> Option<String> {
    slot_patterns().iter().find_map(|pattern| {
        pattern
            .captures(utterance)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enroll_with_name() {
        assert_eq!(
            recognize("enroll my voice as John"),
            Intent::EnrollVoice {
                name: Some("John".to_string())
            }
        );
    }

    #[test]
    fn enrollment_phrasings() {
        assert_eq!(recognize("save my voice"), Intent::EnrollVoice { name: None });
        assert_eq!(recognize("Register my Voice"), Intent::EnrollVoice { name: None });
        assert_eq!(recognize("remember me"), Intent::RememberMe { name: None });
        assert_eq!(
            recognize("please remember me as mary smith"),
            Intent::RememberMe {
                name: Some("mary smith".to_string())
            }
        );
    }

    #[test]
    fn delete_with_for_slot() {
        assert_eq!(
            recognize("delete voice profile for John"),
            Intent::DeleteProfile {
                name: Some("John".to_string())
            }
        );
        assert_eq!(recognize("forget my voice"), Intent::DeleteProfile { name: None });
    }

    #[test]
    fn management_intents() {
        assert_eq!(recognize("list voice users"), Intent::ListUsers);
        assert_eq!(recognize("who is enrolled"), Intent::ListUsers);
        assert_eq!(recognize("show enrolled voices"), Intent::ListUsers);
        assert_eq!(recognize("compare two voices"), Intent::VerifySpeakers);
        assert_eq!(recognize("verify speakers"), Intent::VerifySpeakers);
        assert_eq!(recognize("cancel"), Intent::Cancel);
        assert_eq!(recognize("what's the weather"), Intent::Unrecognized);
    }

    #[test]
    fn requests_for_other_skills_are_unrecognized() {
        for utterance in [
            "record a voice memo",
            "who are the people in this photo",
            "show my profile",
            "remove the meeting from my calendar",
            "check the speakers",
            "add milk to my shopping list",
        ] {
            assert_eq!(recognize(utterance), Intent::Unrecognized, "{}", utterance);
        }
    }

    #[test]
    fn affirmative_vocabulary_is_yes() {
        for word in AFFIRMATIVE {
            assert_eq!(parse_confirmation(word), Confirmation::Yes, "{}", word);
            assert_eq!(
                parse_confirmation(&word.to_uppercase()),
                Confirmation::Yes,
                "{}",
                word
            );
        }
        assert_eq!(parse_confirmation("yes please"), Confirmation::Yes);
    }

    #[test]
    fn negative_and_unmatched_are_no() {
        for word in NEGATIVE {
            assert_eq!(parse_confirmation(word), Confirmation::No, "{}", word);
        }
        assert_eq!(parse_confirmation("maybe later"), Confirmation::No);
        assert_eq!(parse_confirmation(""), Confirmation::No);
        assert_eq!(parse_confirmation("yes, no, stop"), Confirmation::No);
    }

    #[test]
    fn name_slot_requires_a_trigger_word() {
        assert_eq!(extract_name_slot("enroll my voice"), None);
        assert_eq!(
            extract_name_slot("register as Jean-Luc"),
            Some("Jean-Luc".to_string())
        );
    }
}
