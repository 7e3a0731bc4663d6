//! Spoken output.
//!
//! Each [`Dialog`] variant carries its slot values; [`Dialog::render`] fills
//! the English template and [`Dialog::key`] names it for the host's `speak`
//! metadata.

use crate::names::display_name;
use crate::samples::SampleRejection;
use omva_bus::payload::{SpeakMeta, SpeakRequest};
use omva_bus::Outbound;
use omva_types::{ErrorCode, SKILL_ID};

/// Largest user list read out name by name.
const MAX_NAMED_USERS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum Dialog {
    // Enrollment
    EnrollmentStartWithName { name: String },
    EnrollmentStartNoName,
    RequestName,
    NameInvalid,
    NameConfirmed { name: String, total: u32, phrase: String },
    ReadyForSamples { name: String, total: u32, phrase: String },
    SampleAccepted { number: u32, total: u32, next_phrase: String },
    SampleRejected { reason: SampleRejection, number: u32, phrase: String },
    SamplesComplete { name: String, count: u32 },
    EnrollmentSuccess { name: String, samples: u32 },
    EnrollmentFailed { code: ErrorCode },
    EnrollmentCancelled,
    TooManyAttempts,
    StillWorking,

    // Listing
    CheckingUsers,
    NoEnrolledUsers,
    OneEnrolledUser { name: String },
    MultipleEnrolledUsers { count: usize, users: Vec<String> },
    ManyEnrolledUsers { count: usize },
    ErrorCheckingUsers,

    // Deletion
    DeleteRequestName,
    DeleteConfirm { name: String },
    DeleteCancelled,
    DeleteSuccess { name: String },
    DeleteFailed { name: String, message: String },

    // Verification
    VerifyStart { phrase: String },
    VerifySecondSample { phrase: String },
    VerifyComparing,
    VerifyRecordingFailed,
    VerifyResult { same: bool, score: f64 },
    VerifyFailed { message: String },
    VerifyCancelled,

    // Identification
    VoiceIdentified { name: String },
    UnknownVoiceOffer,
}

impl Dialog {
    /// Builds the dialog for a user list reported by the plugin.
    pub fn for_user_list(users: &[String], total: usize) -> Self {
        let names: Vec<String> = users.iter().map(|id| display_name(id)).collect();
        match (total, names.as_slice()) {
            (0, _) => Self::NoEnrolledUsers,
            (1, [name]) => Self::OneEnrolledUser { name: name.clone() },
            (count, _) if count <= MAX_NAMED_USERS && names.len() == count => {
                Self::MultipleEnrolledUsers { count, users: names }
            }
            (count, _) => Self::ManyEnrolledUsers { count },
        }
    }

    /// Template name reported to the host.
    pub fn key(&self) -> &'static str {
        match self {
            Self::EnrollmentStartWithName { .. } => "enrollment_start_with_name",
            Self::EnrollmentStartNoName => "enrollment_start_no_name",
            Self::RequestName => "request_name",
            Self::NameInvalid => "name_invalid",
            Self::NameConfirmed { .. } => "name_confirmed",
            Self::ReadyForSamples { .. } => "ready_for_samples",
            Self::SampleAccepted { .. } => "sample_accepted",
            Self::SampleRejected { reason, .. } => match reason {
                SampleRejection::RecordingFailed(_) => "recording_failed",
                SampleRejection::TooShort { .. } => "sample_too_short",
                SampleRejection::TooLong { .. } => "sample_too_long",
                SampleRejection::LowQuality { .. } => "sample_quality_poor",
                SampleRejection::TimedOut => "recording_timeout",
            },
            Self::SamplesComplete { .. } => "samples_complete",
            Self::EnrollmentSuccess { .. } => "enrollment_success",
            Self::EnrollmentFailed { code } => match code {
                ErrorCode::InvalidName => "error_invalid_name",
                ErrorCode::SampleCountInsufficient => "error_insufficient_samples",
                ErrorCode::PluginUnavailable => "error_plugin_unavailable",
                ErrorCode::UserExists => "error_user_exists",
                ErrorCode::AudioQualityPoor => "error_audio_quality",
                ErrorCode::ProcessingFailed => "enrollment_failed",
            },
            Self::EnrollmentCancelled => "enrollment_cancelled",
            Self::TooManyAttempts => "too_many_attempts",
            Self::StillWorking => "still_working",
            Self::CheckingUsers => "checking_users",
            Self::NoEnrolledUsers => "no_enrolled_users",
            Self::OneEnrolledUser { .. } => "one_enrolled_user",
            Self::MultipleEnrolledUsers { .. } => "multiple_enrolled_users",
            Self::ManyEnrolledUsers { .. } => "many_enrolled_users",
            Self::ErrorCheckingUsers => "error_checking_users",
            Self::DeleteRequestName => "delete_request_name",
            Self::DeleteConfirm { .. } => "delete_confirm",
            Self::DeleteCancelled => "delete_cancelled",
            Self::DeleteSuccess { .. } => "delete_success",
            Self::DeleteFailed { .. } => "delete_failed",
            Self::VerifyStart { .. } => "verify_start",
            Self::VerifySecondSample { .. } => "verify_second_sample",
            Self::VerifyComparing => "verify_comparing",
            Self::VerifyRecordingFailed => "verify_recording_failed",
            Self::VerifyResult { same: true, .. } => "verify_same_speaker",
            Self::VerifyResult { same: false, .. } => "verify_different_speaker",
            Self::VerifyFailed { .. } => "verify_failed",
            Self::VerifyCancelled => "verify_cancelled",
            Self::VoiceIdentified { .. } => "voice_identified",
            Self::UnknownVoiceOffer => "unknown_voice_offer",
        }
    }

    /// Whether the host should listen for an answer after speaking.
    pub fn expects_response(&self) -> bool {
        matches!(
            self,
            Self::EnrollmentStartWithName { .. }
                | Self::EnrollmentStartNoName
                | Self::EnrollmentFailed { .. }
                | Self::RequestName
                | Self::NameInvalid
                | Self::DeleteRequestName
                | Self::DeleteConfirm { .. }
        )
    }

    /// The sentence to speak.
    pub fn render(&self) -> String {
        match self {
            Self::EnrollmentStartWithName { name } => format!(
                "I'll learn to recognize your voice as {}. I need a few voice samples. Shall we start?",
                name
            ),
            Self::EnrollmentStartNoName => {
                "I can learn to recognize your voice. I need your name and a few voice samples. Shall we start?"
                    .to_string()
            }
            Self::RequestName => "What name should I use for you?".to_string(),
            Self::NameInvalid => {
                "Sorry, I couldn't use that name. Please say just your name, using letters only."
                    .to_string()
            }
            Self::NameConfirmed { name, total, phrase } => format!(
                "Nice to meet you, {}. I'll record {} samples. Please say: {}",
                name, total, phrase
            ),
            Self::ReadyForSamples { name, total, phrase } => format!(
                "Great, {}. I'll record {} samples. Please say: {}",
                name, total, phrase
            ),
            Self::SampleAccepted {
                number,
                total,
                next_phrase,
            } => format!(
                "Sample {} of {} recorded. Next, please say: {}",
                number, total, next_phrase
            ),
            Self::SampleRejected {
                reason,
                number,
                phrase,
            } => {
                let problem = match reason {
                    SampleRejection::RecordingFailed(_) => "I couldn't record that",
                    SampleRejection::TooShort { .. } => "That was too short",
                    SampleRejection::TooLong { .. } => "That was too long",
                    SampleRejection::LowQuality { .. } => "The audio quality wasn't good enough",
                    SampleRejection::TimedOut => "I didn't hear anything",
                };
                format!(
                    "{}. Let's try sample {} again. Please say: {}",
                    problem, number, phrase
                )
            }
            Self::SamplesComplete { name, count } => format!(
                "Thanks, {}. I have all {} samples and I'm creating your voice profile now.",
                name, count
            ),
            Self::EnrollmentSuccess { name, samples } => format!(
                "Done. I've learned your voice, {}, from {} samples.",
                name, samples
            ),
            Self::EnrollmentFailed { code } => {
                let guidance = match code {
                    ErrorCode::InvalidName => "The voice service rejected that name.",
                    ErrorCode::SampleCountInsufficient => {
                        "I didn't get enough usable voice samples. Somewhere quieter may help."
                    }
                    ErrorCode::PluginUnavailable => {
                        "Voice identification isn't available right now."
                    }
                    ErrorCode::UserExists => {
                        "A voice profile with that name already exists. Delete it first or choose another name."
                    }
                    ErrorCode::AudioQualityPoor => {
                        "The audio quality was too low. Speaking closer to the microphone may help."
                    }
                    ErrorCode::ProcessingFailed => {
                        "Something went wrong while creating your voice profile."
                    }
                };
                format!("{} Would you like to try again?", guidance)
            }
            Self::EnrollmentCancelled => "Okay, I've cancelled voice enrollment.".to_string(),
            Self::TooManyAttempts => {
                "That didn't work after several tries, so I've stopped. You can start again any time."
                    .to_string()
            }
            Self::StillWorking => {
                "I'm still working on your last request. Say cancel to stop it.".to_string()
            }
            Self::CheckingUsers => "Let me check who I know.".to_string(),
            Self::NoEnrolledUsers => "I don't know anyone's voice yet.".to_string(),
            Self::OneEnrolledUser { name } => format!("I know one voice: {}.", name),
            Self::MultipleEnrolledUsers { count, users } => {
                format!("I know {} voices: {}.", count, join_names(users))
            }
            Self::ManyEnrolledUsers { count: 1 } => "I know one voice.".to_string(),
            Self::ManyEnrolledUsers { count } => format!("I know {} voices.", count),
            Self::ErrorCheckingUsers => {
                "Sorry, I couldn't get the list of voices.".to_string()
            }
            Self::DeleteRequestName => "Whose voice profile should I delete?".to_string(),
            Self::DeleteConfirm { name } => format!(
                "Are you sure you want to delete the voice profile for {}?",
                name
            ),
            Self::DeleteCancelled => "Okay, I won't delete anything.".to_string(),
            Self::DeleteSuccess { name } => {
                format!("I've deleted the voice profile for {}.", name)
            }
            Self::DeleteFailed { name, message } => format!(
                "I couldn't delete the voice profile for {}: {}",
                name, message
            ),
            Self::VerifyStart { phrase } => format!(
                "Let's compare two voices. First speaker, please say: {}",
                phrase
            ),
            Self::VerifySecondSample { phrase } => {
                format!("Got it. Second speaker, please say: {}", phrase)
            }
            Self::VerifyComparing => "Comparing the two voices.".to_string(),
            Self::VerifyRecordingFailed => {
                "I couldn't record that, so I've stopped the comparison.".to_string()
            }
            Self::VerifyResult { same: true, score } => format!(
                "Those sound like the same speaker. Similarity score {:.2}.",
                score
            ),
            Self::VerifyResult { same: false, score } => format!(
                "Those sound like different speakers. Similarity score {:.2}.",
                score
            ),
            Self::VerifyFailed { message } => {
                format!("I couldn't compare the voices: {}", message)
            }
            Self::VerifyCancelled => "Okay, I've stopped the comparison.".to_string(),
            Self::VoiceIdentified { name } => format!("Hello, {}.", name),
            Self::UnknownVoiceOffer => {
                "I don't recognize your voice. Say \"enroll my voice\" if you'd like me to learn it."
                    .to_string()
            }
        }
    }

    /// Wraps the rendered sentence in a `speak` request.
    pub fn to_outbound(&self) -> Outbound {
        Outbound::Speak(SpeakRequest {
            utterance: self.render(),
            expect_response: self.expects_response(),
            meta: SpeakMeta {
                skill: SKILL_ID.to_string(),
                dialog: self.key().to_string(),
            },
        })
    }
}

fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}
