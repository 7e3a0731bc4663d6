//! Comparing two speakers from two consecutive recordings.

use crate::dialog::Dialog;
use crate::samples::{check_sample, collect_request, AcceptedSample, SampleRejection};
use crate::session::{Progress, Step};
use omva_bus::payload::{SampleCollected, VerifyRequest, VerifyResponse};
use omva_bus::{Outbound, ResponseStatus};
use omva_types::{sample_phrase, EnrollmentSettings};

const SAMPLES_COMPARED: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStage {
    FirstSample,
    SecondSample,
    AwaitingResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationContext {
    pub stage: VerificationStage,
    pub first: Option<AcceptedSample>,
    pub pending_sample_id: Option<String>,
    pub retries: u32,
}

impl VerificationContext {
    pub fn start(settings: &EnrollmentSettings) -> (Self, Step) {
        let mut ctx = Self {
            stage: VerificationStage::FirstSample,
            first: None,
            pending_sample_id: None,
            retries: 0,
        };
        let request = ctx.request_sample(0, settings);
        let step = Step::emit_and_speak(
            request,
            Dialog::VerifyStart {
                phrase: sample_phrase(0).to_string(),
            },
        );
        (ctx, step)
    }

    pub fn is_waiting_on_plugin(&self) -> bool {
        self.stage == VerificationStage::AwaitingResult
    }

    pub fn on_sample(&mut self, sample: SampleCollected, settings: &EnrollmentSettings) -> Progress {
        if self.is_waiting_on_plugin()
            || self.pending_sample_id.as_deref() != Some(sample.sample_id.as_str())
        {
            tracing::debug!(sample_id = %sample.sample_id, "ignoring sample not requested by verification");
            return Progress::Continue(Step::none());
        }
        self.pending_sample_id = None;
        let index = self.current_index();

        let accepted = match check_sample(sample, settings) {
            Ok(accepted) => accepted,
            Err(reason) if reason.is_recording_failure() => {
                tracing::warn!(?reason, "verification recording failed");
                return Progress::Finish(Step::speak(Dialog::VerifyRecordingFailed));
            }
            Err(reason) => return self.reject(reason, index, settings),
        };
        self.retries = 0;

        match self.first.take() {
            None => {
                self.first = Some(accepted);
                self.stage = VerificationStage::SecondSample;
                let request = self.request_sample(1, settings);
                Progress::Continue(Step::emit_and_speak(
                    request,
                    Dialog::VerifySecondSample {
                        phrase: sample_phrase(1).to_string(),
                    },
                ))
            }
            Some(first) => {
                self.stage = VerificationStage::AwaitingResult;
                tracing::info!("requesting speaker comparison");
                Progress::Continue(Step::emit_and_speak(
                    Outbound::VerifySpeakers(VerifyRequest {
                        audio_sample1: first.audio,
                        audio_sample2: accepted.audio,
                    }),
                    Dialog::VerifyComparing,
                ))
            }
        }
    }

    /// Handles a recording that never came back, as a rejected sample.
    pub fn on_sample_timeout(&mut self, sample_id: &str, settings: &EnrollmentSettings) -> Progress {
        if self.pending_sample_id.as_deref() != Some(sample_id) {
            return Progress::Continue(Step::none());
        }
        self.pending_sample_id = None;
        let index = self.current_index();
        self.reject(SampleRejection::TimedOut, index, settings)
    }

    pub fn on_response(&self, response: VerifyResponse) -> Progress {
        if !self.is_waiting_on_plugin() {
            tracing::debug!("ignoring verify response with no request outstanding");
            return Progress::Continue(Step::none());
        }
        if response.status == Some(ResponseStatus::Error) {
            let message = response
                .message
                .unwrap_or_else(|| "Unknown error".to_string());
            tracing::warn!(%message, "speaker comparison failed");
            return Progress::Finish(Step::speak(Dialog::VerifyFailed { message }));
        }
        tracing::info!(
            same_speaker = response.is_same_speaker,
            score = response.similarity_score,
            "speaker comparison finished"
        );
        Progress::Finish(Step::speak(Dialog::VerifyResult {
            same: response.is_same_speaker,
            score: response.similarity_score,
        }))
    }

    fn current_index(&self) -> u32 {
        match self.stage {
            VerificationStage::FirstSample => 0,
            _ => 1,
        }
    }

    fn reject(&mut self, reason: SampleRejection, index: u32, settings: &EnrollmentSettings) -> Progress {
        self.retries += 1;
        tracing::warn!(retries = self.retries, ?reason, "verification sample rejected");
        if self.retries > settings.max_sample_retries {
            return Progress::Finish(Step::speak(Dialog::TooManyAttempts));
        }
        let request = self.request_sample(index, settings);
        Progress::Continue(Step::emit_and_speak(
            request,
            Dialog::SampleRejected {
                reason,
                number: index + 1,
                phrase: sample_phrase(index).to_string(),
            },
        ))
    }

    fn request_sample(&mut self, index: u32, settings: &EnrollmentSettings) -> Outbound {
        let request = collect_request(index, SAMPLES_COMPARED, settings);
        self.pending_sample_id = Some(request.sample_id.clone());
        Outbound::CollectSample(request)
    }
}
