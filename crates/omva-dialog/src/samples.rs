//! Validation of recorded audio samples.

use omva_bus::payload::{CollectSampleRequest, SampleCollected};
use omva_types::{sample_phrase, EnrollmentSettings};
use uuid::Uuid;

/// Recordings below this size are treated as noise.
const MIN_AUDIO_BYTES: usize = 1000;
/// Byte size at which the size component of the estimate saturates.
const FULL_SIZE_BYTES: f64 = 50_000.0;

/// A recording that passed duration and quality checks.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedSample {
    pub sample_id: String,
    pub audio: Vec<u8>,
    pub duration: f64,
    pub quality: f64,
}

/// Why a recording was not kept.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleRejection {
    /// The host could not record at all.
    RecordingFailed(String),
    TooShort { duration: f64 },
    TooLong { duration: f64 },
    LowQuality { score: f64 },
    /// Nothing came back before the recording deadline.
    TimedOut,
}

impl SampleRejection {
    pub fn is_recording_failure(&self) -> bool {
        matches!(self, Self::RecordingFailed(_))
    }
}

/// Builds a recording request for the zero-based sample `index` under a
/// fresh sample id.
pub fn collect_request(index: u32, total: u32, settings: &EnrollmentSettings) -> CollectSampleRequest {
    CollectSampleRequest {
        sample_id: Uuid::new_v4().to_string(),
        index: index + 1,
        total,
        phrase: sample_phrase(index).to_string(),
        min_duration: settings.min_audio_duration,
        max_duration: settings.max_audio_duration,
    }
}

/// Scores a recording from its length and size when the host supplies no
/// quality score of its own.
pub fn estimate_quality(audio_len: usize, duration: f64, settings: &EnrollmentSettings) -> f64 {
    if audio_len < MIN_AUDIO_BYTES {
        return 0.2;
    }
    if duration < settings.min_audio_duration {
        return 0.3;
    }
    if duration > settings.max_audio_duration {
        return 0.4;
    }

    let span = settings.max_audio_duration - settings.min_audio_duration;
    let duration_score = ((duration - settings.min_audio_duration) / span).min(1.0);
    let size_score = (audio_len as f64 / FULL_SIZE_BYTES).min(1.0);
    ((duration_score + size_score) / 2.0).clamp(0.0, 1.0)
}

/// Checks a collected recording against duration bounds and the quality
/// threshold.
pub fn check_sample(
    sample: SampleCollected,
    settings: &EnrollmentSettings,
) -> Result<AcceptedSample, SampleRejection> {
    if !sample.status.is_success() || sample.audio.is_empty() {
        let reason = sample
            .message
            .unwrap_or_else(|| "no audio recorded".to_string());
        return Err(SampleRejection::RecordingFailed(reason));
    }
    if sample.duration < settings.min_audio_duration {
        return Err(SampleRejection::TooShort {
            duration: sample.duration,
        });
    }
    if sample.duration > settings.max_audio_duration {
        return Err(SampleRejection::TooLong {
            duration: sample.duration,
        });
    }

    let quality = sample
        .quality_score
        .unwrap_or_else(|| estimate_quality(sample.audio.len(), sample.duration, settings));
    tracing::debug!(
        sample_id = %sample.sample_id,
        duration = sample.duration,
        bytes = sample.audio.len(),
        quality,
        "scored audio sample"
    );
    if quality < settings.quality_threshold {
        return Err(SampleRejection::LowQuality { score: quality });
    }

    Ok(AcceptedSample {
        sample_id: sample.sample_id,
        audio: sample.audio,
        duration: sample.duration,
        quality,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use omva_bus::ResponseStatus;

    fn collected(bytes: usize, duration: f64, quality: Option<f64>) -> SampleCollected {
        SampleCollected {
            sample_id: "s-1".to_string(),
            status: ResponseStatus::Success,
            audio: vec![7; bytes],
            duration,
            quality_score: quality,
            message: None,
        }
    }

    #[test]
    fn estimate_tiny_and_out_of_bounds() {
        let settings = EnrollmentSettings::default();
        assert_eq!(estimate_quality(999, 5.0, &settings), 0.2);
        assert_eq!(estimate_quality(40_000, 2.0, &settings), 0.3);
        assert_eq!(estimate_quality(40_000, 11.0, &settings), 0.4);
    }

    #[test]
    fn estimate_in_bounds() {
        let settings = EnrollmentSettings::default();
        // Full duration span and saturated size.
        assert!((estimate_quality(100_000, 10.0, &settings) - 1.0).abs() < 1e-9);
        // Shortest allowed recording, half-size.
        assert!((estimate_quality(25_000, 3.0, &settings) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn accepts_good_sample() {
        let settings = EnrollmentSettings::default();
        let accepted = check_sample(collected(160_000, 5.0, Some(0.9)), &settings).unwrap();
        assert_eq!(accepted.quality, 0.9);
        assert_eq!(accepted.audio.len(), 160_000);
    }

    #[test]
    fn rejects_duration_outside_bounds() {
        let settings = EnrollmentSettings::default();
        assert_eq!(
            check_sample(collected(50_000, 2.5, Some(0.9)), &settings),
            Err(SampleRejection::TooShort { duration: 2.5 })
        );
        assert_eq!(
            check_sample(collected(50_000, 12.0, Some(0.9)), &settings),
            Err(SampleRejection::TooLong { duration: 12.0 })
        );
    }

    #[test]
    fn rejects_low_quality() {
        let settings = EnrollmentSettings::default();
        assert_eq!(
            check_sample(collected(50_000, 5.0, Some(0.5)), &settings),
            Err(SampleRejection::LowQuality { score: 0.5 })
        );
    }

    #[test]
    fn failed_recording() {
        let settings = EnrollmentSettings::default();
        let mut sample = collected(0, 0.0, None);
        sample.status = ResponseStatus::Error;
        sample.message = Some("microphone busy".to_string());
        let rejection = check_sample(sample, &settings).unwrap_err();
        assert!(rejection.is_recording_failure());
        assert_eq!(
            rejection,
            SampleRejection::RecordingFailed("microphone busy".to_string())
        );
    }
}
