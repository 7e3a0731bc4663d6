//! Enrollment settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User-tunable behaviour of the enrollment dialogue.
///
/// Deserialized from the `[enrollment]` table of the skill configuration;
/// every field falls back to its default when absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrollmentSettings {
    /// Number of accepted samples required before enrolling.
    #[serde(default = "default_target_samples")]
    pub target_samples: u32,
    /// Shortest acceptable sample, in seconds.
    #[serde(default = "default_min_audio_duration")]
    pub min_audio_duration: f64,
    /// Longest acceptable sample, in seconds.
    #[serde(default = "default_max_audio_duration")]
    pub max_audio_duration: f64,
    /// Minimum quality score (0.0-1.0) for a sample to count.
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,
    /// Ask "shall I proceed?" before collecting anything.
    #[serde(default = "default_true")]
    pub confirmation_required: bool,
    /// Ask the plugin to overwrite an existing profile with the same id.
    #[serde(default)]
    pub replace_existing_profiles: bool,
    /// Greet users the plugin identifies by voice.
    #[serde(default = "default_true")]
    pub announce_identification: bool,
    /// Offer enrollment when the plugin hears an unknown voice.
    #[serde(default)]
    pub offer_enrollment_to_unknown: bool,
    /// Invalid name answers tolerated before the enrollment is cancelled.
    #[serde(default = "default_max_attempts")]
    pub max_name_attempts: u32,
    /// Rejected samples tolerated per sample slot before cancelling.
    #[serde(default = "default_max_attempts")]
    pub max_sample_retries: u32,
    /// Seconds to wait for the plugin's enrollment response.
    #[serde(default = "default_processing_timeout_secs")]
    pub processing_timeout_secs: u64,
}

fn default_target_samples() -> u32 {
    3
}

fn default_min_audio_duration() -> f64 {
    3.0
}

fn default_max_audio_duration() -> f64 {
    10.0
}

fn default_quality_threshold() -> f64 {
    0.7
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_processing_timeout_secs() -> u64 {
    30
}

impl Default for EnrollmentSettings {
    fn default() -> Self {
        Self {
            target_samples: default_target_samples(),
            min_audio_duration: default_min_audio_duration(),
            max_audio_duration: default_max_audio_duration(),
            quality_threshold: default_quality_threshold(),
            confirmation_required: true,
            replace_existing_profiles: false,
            announce_identification: true,
            offer_enrollment_to_unknown: false,
            max_name_attempts: default_max_attempts(),
            max_sample_retries: default_max_attempts(),
            processing_timeout_secs: default_processing_timeout_secs(),
        }
    }
}

impl EnrollmentSettings {
    /// How long to wait for a requested recording: the longest accepted
    /// clip plus one second.
    pub fn recording_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_audio_duration + 1.0)
            .unwrap_or(Duration::from_secs(default_max_audio_duration() as u64 + 1))
    }

    /// Checks the settings for values the dialogue cannot work with.
    ///
    /// Returns a human-readable description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.target_samples == 0 {
            return Err("target_samples must be at least 1".to_string());
        }
        if self.min_audio_duration <= 0.0 {
            return Err("min_audio_duration must be positive".to_string());
        }
        if self.min_audio_duration >= self.max_audio_duration {
            return Err(format!(
                "min_audio_duration ({}) must be below max_audio_duration ({})",
                self.min_audio_duration, self.max_audio_duration
            ));
        }
        if !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(format!(
                "quality_threshold must be within 0.0..=1.0, got {}",
                self.quality_threshold
            ));
        }
        if self.max_name_attempts == 0 || self.max_sample_retries == 0 {
            return Err("retry limits must be at least 1".to_string());
        }
        Ok(())
    }
}
