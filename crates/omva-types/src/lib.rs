//! Shared types and constants for the OMVA voice enrollment skill.
//!
//! This crate holds the vocabulary every other crate agrees on: the stable
//! enrollment error codes, the bus message names exchanged with the voice
//! identification plugin, the enrollment settings surface, and the phrases
//! read aloud while recording samples.
//!
//! It performs no I/O and depends only on `serde`, so both the pure dialogue
//! logic and the async runtime can share it without pulling in each other.

use serde::{Deserialize, Serialize};

pub mod events;
mod settings;

pub use settings::EnrollmentSettings;

/// Skill identifier announced on the bus.
pub const SKILL_ID: &str = "omva-skill-voice-enrollment";

/// Phrases the user is asked to read, one per sample, rotating.
pub const SAMPLE_PHRASES: [&str; 10] = [
    "The quick brown fox jumps over the lazy dog",
    "She sells seashells by the seashore",
    "How much wood would a woodchuck chuck if a woodchuck could chuck wood",
    "Peter Piper picked a peck of pickled peppers",
    "A proper copper coffee pot",
    "Red leather, yellow leather",
    "Toy boat, toy boat, toy boat",
    "Unique New York, unique New York",
    "Sally sells seashells down by the seashore",
    "The thirty-three thieves thought that they thrilled the throne throughout Thursday",
];

/// Returns the phrase to read for the zero-based sample `index`.
pub fn sample_phrase(index: u32) -> &'static str {
    SAMPLE_PHRASES[index as usize % SAMPLE_PHRASES.len()]
}

/// Stable enrollment failure codes.
///
/// The plugin reports failures as free text; the dialogue layer maps that
/// text onto one of these codes so guidance dialogs stay stable when the
/// plugin's wording changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The user name was missing or rejected by the plugin.
    InvalidName,
    /// Not enough usable audio samples reached the plugin.
    SampleCountInsufficient,
    /// The plugin's voice processor is not running.
    PluginUnavailable,
    /// A profile with this identifier is already enrolled.
    UserExists,
    /// The plugin judged the audio unusable.
    AudioQualityPoor,
    /// Anything else, including timeouts.
    ProcessingFailed,
}

impl ErrorCode {
    /// Every code, in declaration order.
    pub const ALL: [ErrorCode; 6] = [
        Self::InvalidName,
        Self::SampleCountInsufficient,
        Self::PluginUnavailable,
        Self::UserExists,
        Self::AudioQualityPoor,
        Self::ProcessingFailed,
    ];

    /// Returns the canonical string label for this code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidName => "INVALID_NAME",
            Self::SampleCountInsufficient => "SAMPLE_COUNT_INSUFFICIENT",
            Self::PluginUnavailable => "PLUGIN_UNAVAILABLE",
            Self::UserExists => "USER_EXISTS",
            Self::AudioQualityPoor => "AUDIO_QUALITY_POOR",
            Self::ProcessingFailed => "PROCESSING_FAILED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorCode {
    type Err = ParseErrorCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| ParseErrorCodeError(s.to_string()))
    }
}

/// Error returned when parsing an unknown error code string.
#[derive(Debug, Clone)]
pub struct ParseErrorCodeError(pub String);

impl std::fmt::Display for ParseErrorCodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown error code: {}", self.0)
    }
}

impl std::error::Error for ParseErrorCodeError {}
