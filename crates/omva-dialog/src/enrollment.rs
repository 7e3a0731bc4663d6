//! The multi-stage enrollment conversation.
//!
//! ```text
//! AwaitingConfirmation --yes, name known--> AwaitingSamples
//! AwaitingConfirmation --yes, no name----> AwaitingName --valid--> AwaitingSamples
//! AwaitingSamples --target reached--> AwaitingPluginResponse --response--> Done
//! any non-terminal --no / cancel / retries exhausted--> Cancelled
//! ```

use crate::dialog::Dialog;
use crate::errors::map_plugin_error;
use crate::intent::Confirmation;
use crate::names::{display_name, extract_spoken_name, user_id, validate_name};
use crate::samples::{check_sample, collect_request, AcceptedSample, SampleRejection};
use crate::session::Step;
use chrono::{DateTime, Utc};
use omva_bus::payload::{EnrollRequest, EnrollResponse, SampleCollected};
use omva_bus::Outbound;
use omva_types::{sample_phrase, EnrollmentSettings, ErrorCode};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentStage {
    AwaitingConfirmation,
    AwaitingName,
    AwaitingSamples,
    AwaitingPluginResponse,
    Done,
    Cancelled,
}

impl EnrollmentStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

/// The most recent failure of an enrollment.
#[derive(Debug, Clone, PartialEq)]
pub struct LastError {
    pub code: ErrorCode,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// What is left of a failed enrollment while the user decides whether to
/// start over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOffer {
    pub user_name: Option<String>,
}

impl RetryOffer {
    /// Offers a retry after `ctx` failed on the plugin's side. Cancelled or
    /// abandoned enrollments get no offer.
    pub fn after(ctx: &EnrollmentContext) -> Option<Self> {
        (ctx.stage == EnrollmentStage::Done && ctx.last_error.is_some()).then(|| Self {
            user_name: ctx.user_name.clone(),
        })
    }

    /// "Yes" opens a fresh enrollment under the same name; anything else
    /// ends the conversation.
    pub fn on_confirmation(
        self,
        answer: Confirmation,
        settings: &EnrollmentSettings,
        now: DateTime<Utc>,
    ) -> (Option<EnrollmentContext>, Step) {
        match answer {
            Confirmation::Yes => {
                tracing::info!(user_name = ?self.user_name, "retrying enrollment");
                let (ctx, step) = EnrollmentContext::start(self.user_name, settings, now);
                (Some(ctx), step)
            }
            Confirmation::No => (None, Step::speak(Dialog::EnrollmentCancelled)),
        }
    }
}

/// State of one enrollment, from the triggering intent until it concludes.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentContext {
    pub user_name: Option<String>,
    pub stage: EnrollmentStage,
    pub samples: Vec<AcceptedSample>,
    pub last_error: Option<LastError>,
    pub name_attempts: u32,
    /// Rejected recordings for the sample currently being collected.
    pub sample_retries: u32,
    pub pending_sample_id: Option<String>,
    /// Correlates the plugin's response and the processing timeout.
    pub enrollment_id: String,
    pub started_at: DateTime<Utc>,
}

impl EnrollmentContext {
    /// Opens an enrollment. `name` must already be validated.
    pub fn start(
        name: Option<String>,
        settings: &EnrollmentSettings,
        now: DateTime<Utc>,
    ) -> (Self, Step) {
        let mut ctx = Self {
            user_name: name,
            stage: EnrollmentStage::AwaitingConfirmation,
            samples: Vec::new(),
            last_error: None,
            name_attempts: 0,
            sample_retries: 0,
            pending_sample_id: None,
            enrollment_id: Uuid::new_v4().to_string(),
            started_at: now,
        };
        tracing::info!(
            enrollment_id = %ctx.enrollment_id,
            user_name = ?ctx.user_name,
            "enrollment started"
        );

        let step = match (&ctx.user_name, settings.confirmation_required) {
            (Some(name), true) => Step::speak(Dialog::EnrollmentStartWithName { name: name.clone() }),
            (None, true) => Step::speak(Dialog::EnrollmentStartNoName),
            (Some(_), false) => ctx.begin_samples(settings, false),
            (None, false) => ctx.ask_for_name(),
        };
        (ctx, step)
    }

    pub fn samples_collected(&self) -> u32 {
        self.samples.len() as u32
    }

    pub fn is_finished(&self) -> bool {
        self.stage.is_terminal()
    }

    pub fn succeeded(&self) -> bool {
        self.stage == EnrollmentStage::Done && self.last_error.is_none()
    }

    pub fn expects_confirmation(&self) -> bool {
        self.stage == EnrollmentStage::AwaitingConfirmation
    }

    pub fn expects_name(&self) -> bool {
        self.stage == EnrollmentStage::AwaitingName
    }

    pub fn is_waiting_on_plugin(&self) -> bool {
        self.stage == EnrollmentStage::AwaitingPluginResponse
    }

    /// Handles the answer to "shall we start?".
    pub fn on_confirmation(&mut self, answer: Confirmation, settings: &EnrollmentSettings) -> Step {
        if !self.expects_confirmation() {
            return Step::none();
        }
        match answer {
            Confirmation::No => self.cancel(),
            Confirmation::Yes if self.user_name.is_some() => self.begin_samples(settings, false),
            Confirmation::Yes => self.ask_for_name(),
        }
    }

    /// Handles a free-text answer to "what name should I use?".
    pub fn on_name_answer(&mut self, utterance: &str, settings: &EnrollmentSettings) -> Step {
        if !self.expects_name() {
            return Step::none();
        }
        let candidate =
            extract_spoken_name(utterance).unwrap_or_else(|| utterance.trim().to_string());
        match validate_name(&candidate) {
            Ok(name) => {
                tracing::info!(enrollment_id = %self.enrollment_id, user_name = %name, "name accepted");
                self.user_name = Some(name);
                self.begin_samples(settings, true)
            }
            Err(reason) => {
                self.name_attempts += 1;
                tracing::warn!(
                    enrollment_id = %self.enrollment_id,
                    attempts = self.name_attempts,
                    %reason,
                    "name rejected"
                );
                if self.name_attempts >= settings.max_name_attempts {
                    self.abandon()
                } else {
                    Step::speak(Dialog::NameInvalid)
                }
            }
        }
    }

    /// Handles a finished recording.
    pub fn on_sample(
        &mut self,
        sample: SampleCollected,
        settings: &EnrollmentSettings,
        now: DateTime<Utc>,
    ) -> Step {
        if self.stage != EnrollmentStage::AwaitingSamples
            || self.pending_sample_id.as_deref() != Some(sample.sample_id.as_str())
        {
            tracing::debug!(sample_id = %sample.sample_id, "ignoring sample not requested by this enrollment");
            return Step::none();
        }
        self.pending_sample_id = None;

        let accepted = match check_sample(sample, settings) {
            Ok(accepted) => accepted,
            Err(reason) => return self.reject(reason, settings),
        };

        self.samples.push(accepted);
        self.sample_retries = 0;
        let collected = self.samples_collected();
        tracing::info!(
            enrollment_id = %self.enrollment_id,
            collected,
            target = settings.target_samples,
            "sample accepted"
        );

        if collected >= settings.target_samples {
            self.stage = EnrollmentStage::AwaitingPluginResponse;
            let name = self.user_name.clone().unwrap_or_default();
            return Step::emit_and_speak(
                self.enroll_request(settings, now),
                Dialog::SamplesComplete {
                    name,
                    count: collected,
                },
            );
        }

        let request = self.request_sample(settings);
        Step::emit_and_speak(
            request,
            Dialog::SampleAccepted {
                number: collected,
                total: settings.target_samples,
                next_phrase: sample_phrase(collected).to_string(),
            },
        )
    }

    /// Handles a recording that never came back. Counts as a rejected
    /// sample; ignored unless `sample_id` is the one outstanding.
    pub fn on_sample_timeout(&mut self, sample_id: &str, settings: &EnrollmentSettings) -> Step {
        if self.stage != EnrollmentStage::AwaitingSamples
            || self.pending_sample_id.as_deref() != Some(sample_id)
        {
            return Step::none();
        }
        self.pending_sample_id = None;
        self.reject(SampleRejection::TimedOut, settings)
    }

    /// Handles the plugin's verdict on the enrollment request.
    pub fn on_enroll_response(&mut self, response: EnrollResponse, now: DateTime<Utc>) -> Step {
        if !self.is_waiting_on_plugin() {
            tracing::debug!("ignoring enrollment response with no request outstanding");
            return Step::none();
        }
        if let Some(id) = response.enrollment_id.as_deref() {
            if id != self.enrollment_id {
                tracing::debug!(enrollment_id = %id, "ignoring response for another enrollment");
                return Step::none();
            }
        }

        if response.status.is_success() {
            self.stage = EnrollmentStage::Done;
            let name = self
                .user_name
                .clone()
                .unwrap_or_else(|| display_name(&response.user_id));
            tracing::info!(
                enrollment_id = %self.enrollment_id,
                user_id = %response.user_id,
                samples_processed = response.samples_processed,
                "enrollment succeeded"
            );
            return Step::emit_and_speak(
                Outbound::ListUsers,
                Dialog::EnrollmentSuccess {
                    name,
                    samples: response.samples_processed,
                },
            );
        }

        let code = map_plugin_error(&response.message);
        self.fail(code, response.message, now)
    }

    /// Fails the enrollment if the plugin has not answered `enrollment_id`.
    pub fn on_processing_timeout(&mut self, enrollment_id: &str, now: DateTime<Utc>) -> Step {
        if !self.is_waiting_on_plugin() || enrollment_id != self.enrollment_id {
            return Step::none();
        }
        self.fail(ErrorCode::ProcessingFailed, "Processing timeout".to_string(), now)
    }

    /// Cancels on the user's request.
    pub fn cancel(&mut self) -> Step {
        self.close();
        tracing::info!(enrollment_id = %self.enrollment_id, "enrollment cancelled");
        Step::speak(Dialog::EnrollmentCancelled)
    }

    /// Marks the context cancelled without speaking.
    pub fn close(&mut self) {
        self.stage = EnrollmentStage::Cancelled;
        self.user_name = None;
        self.pending_sample_id = None;
    }

    /// The request sent once enough samples are in.
    pub fn enroll_request(&self, settings: &EnrollmentSettings, now: DateTime<Utc>) -> Outbound {
        Outbound::EnrollUser(EnrollRequest {
            user_id: user_id(self.user_name.as_deref().unwrap_or_default()),
            audio_samples: self.samples.iter().map(|s| s.audio.clone()).collect(),
            enrollment_id: self.enrollment_id.clone(),
            timestamp: now.to_rfc3339(),
            replace_existing: settings.replace_existing_profiles,
        })
    }

    fn ask_for_name(&mut self) -> Step {
        self.stage = EnrollmentStage::AwaitingName;
        Step::speak(Dialog::RequestName)
    }

    fn begin_samples(&mut self, settings: &EnrollmentSettings, name_was_asked: bool) -> Step {
        self.stage = EnrollmentStage::AwaitingSamples;
        let name = self.user_name.clone().unwrap_or_default();
        let total = settings.target_samples;
        let phrase = sample_phrase(0).to_string();
        let dialog = if name_was_asked {
            Dialog::NameConfirmed { name, total, phrase }
        } else {
            Dialog::ReadyForSamples { name, total, phrase }
        };
        let request = self.request_sample(settings);
        Step::emit_and_speak(request, dialog)
    }

    fn request_sample(&mut self, settings: &EnrollmentSettings) -> Outbound {
        let request = collect_request(self.samples_collected(), settings.target_samples, settings);
        self.pending_sample_id = Some(request.sample_id.clone());
        Outbound::CollectSample(request)
    }

    fn reject(&mut self, reason: SampleRejection, settings: &EnrollmentSettings) -> Step {
        self.sample_retries += 1;
        tracing::warn!(
            enrollment_id = %self.enrollment_id,
            retries = self.sample_retries,
            ?reason,
            "sample rejected"
        );
        if self.sample_retries > settings.max_sample_retries {
            return self.abandon();
        }
        let number = self.samples_collected() + 1;
        let request = self.request_sample(settings);
        Step::emit_and_speak(
            request,
            Dialog::SampleRejected {
                reason,
                number,
                phrase: sample_phrase(number - 1).to_string(),
            },
        )
    }

    fn abandon(&mut self) -> Step {
        self.close();
        tracing::warn!(enrollment_id = %self.enrollment_id, "enrollment abandoned after repeated failures");
        Step::speak(Dialog::TooManyAttempts)
    }

    fn fail(&mut self, code: ErrorCode, message: String, now: DateTime<Utc>) -> Step {
        tracing::warn!(
            enrollment_id = %self.enrollment_id,
            %code,
            %message,
            "enrollment failed"
        );
        self.stage = EnrollmentStage::Done;
        self.last_error = Some(LastError {
            code,
            message,
            timestamp: now,
        });
        Step::speak(Dialog::EnrollmentFailed { code })
    }
}
