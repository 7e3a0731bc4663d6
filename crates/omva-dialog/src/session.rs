//! One conversation: routes decoded bus traffic to the active flow.
//!
//! The session never touches the bus. Every handler returns a [`Step`]
//! describing what to send and what to say, and the caller performs it.

use crate::deletion::DeletionFlow;
use crate::dialog::Dialog;
use crate::enrollment::{EnrollmentContext, RetryOffer};
use crate::intent::{parse_confirmation, recognize, Confirmation, Intent};
use crate::names::{display_name, validate_name};
use crate::verification::VerificationContext;
use chrono::{DateTime, Utc};
use omva_bus::payload::UsersResponse;
use omva_bus::{Inbound, Outbound};
use omva_types::EnrollmentSettings;

/// Effects of handling one event, executed in order: emit, then speak.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    pub emit: Option<Outbound>,
    pub speak: Option<Dialog>,
    /// An enrollment that ended during this step.
    pub concluded: Option<EnrollmentContext>,
}

impl Step {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn speak(dialog: Dialog) -> Self {
        Self {
            speak: Some(dialog),
            ..Self::default()
        }
    }

    pub fn emit(outbound: Outbound) -> Self {
        Self {
            emit: Some(outbound),
            ..Self::default()
        }
    }

    pub fn emit_and_speak(outbound: Outbound, dialog: Dialog) -> Self {
        Self {
            emit: Some(outbound),
            speak: Some(dialog),
            concluded: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.emit.is_none() && self.speak.is_none() && self.concluded.is_none()
    }
}

/// Result of a short flow's handler.
#[derive(Debug)]
pub enum Progress {
    Continue(Step),
    Finish(Step),
}

/// The conversation currently in progress, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ActiveFlow {
    #[default]
    Idle,
    Enrollment(EnrollmentContext),
    Deletion(DeletionFlow),
    Verification(VerificationContext),
    /// A failed enrollment waiting for "try again?" to be answered.
    RetryOffer(RetryOffer),
}

impl ActiveFlow {
    fn is_waiting_on_plugin(&self) -> bool {
        match self {
            Self::Idle | Self::RetryOffer(_) => false,
            Self::Enrollment(ctx) => ctx.is_waiting_on_plugin(),
            Self::Deletion(flow) => flow.is_waiting_on_plugin(),
            Self::Verification(ctx) => ctx.is_waiting_on_plugin(),
        }
    }

    fn expects_confirmation(&self) -> bool {
        match self {
            Self::Enrollment(ctx) => ctx.expects_confirmation(),
            Self::Deletion(flow) => flow.expects_confirmation(),
            Self::RetryOffer(_) => true,
            _ => false,
        }
    }

    fn expects_name(&self) -> bool {
        match self {
            Self::Enrollment(ctx) => ctx.expects_name(),
            Self::Deletion(flow) => flow.expects_name(),
            _ => false,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Enrollment(_) => "enrollment",
            Self::Deletion(_) => "deletion",
            Self::Verification(_) => "verification",
            Self::RetryOffer(_) => "retry_offer",
        }
    }
}

/// Dialogue state for one user.
///
/// At most one flow is active. A new enrollment, deletion or verification
/// request replaces a flow that is still collecting input, and is refused
/// while the active flow waits on the plugin.
#[derive(Debug, Clone)]
pub struct Session {
    settings: EnrollmentSettings,
    flow: ActiveFlow,
    awaiting_user_list: bool,
}

impl Session {
    pub fn new(settings: EnrollmentSettings) -> Self {
        Self {
            settings,
            flow: ActiveFlow::Idle,
            awaiting_user_list: false,
        }
    }

    pub fn settings(&self) -> &EnrollmentSettings {
        &self.settings
    }

    pub fn flow(&self) -> &ActiveFlow {
        &self.flow
    }

    pub fn enrollment(&self) -> Option<&EnrollmentContext> {
        match &self.flow {
            ActiveFlow::Enrollment(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.flow == ActiveFlow::Idle
    }

    /// Handles one decoded bus message.
    pub fn handle(&mut self, inbound: Inbound, now: DateTime<Utc>) -> Step {
        match inbound {
            Inbound::Utterance(event) => match event.text().map(str::trim) {
                Some(text) if !text.is_empty() => self.handle_utterance(text, now),
                _ => Step::none(),
            },
            Inbound::EnrollResponse(response) => {
                if let ActiveFlow::Enrollment(ctx) = &mut self.flow {
                    let step = ctx.on_enroll_response(response, now);
                    if step.emit == Some(Outbound::ListUsers) {
                        self.awaiting_user_list = false;
                    }
                    return self.settle(step);
                }
                tracing::debug!("enrollment response with no active enrollment");
                Step::none()
            }
            Inbound::UsersResponse(response) => self.on_users(response),
            Inbound::RemoveResponse(response) => {
                if let ActiveFlow::Deletion(flow) = &self.flow {
                    let progress = flow.on_response(response);
                    return self.advance(progress);
                }
                tracing::debug!("removal response with no active deletion");
                Step::none()
            }
            Inbound::VerifyResponse(response) => {
                if let ActiveFlow::Verification(ctx) = &self.flow {
                    let progress = ctx.on_response(response);
                    return self.advance(progress);
                }
                tracing::debug!("verify response with no active verification");
                Step::none()
            }
            Inbound::SampleCollected(sample) => match &mut self.flow {
                ActiveFlow::Enrollment(ctx) => {
                    let step = ctx.on_sample(sample, &self.settings, now);
                    self.settle(step)
                }
                ActiveFlow::Verification(ctx) => {
                    let progress = ctx.on_sample(sample, &self.settings);
                    self.advance(progress)
                }
                _ => {
                    tracing::debug!(sample_id = %sample.sample_id, "sample with no flow collecting");
                    Step::none()
                }
            },
            Inbound::VoiceIdentified(event) => {
                if self.settings.announce_identification && self.is_idle() {
                    tracing::info!(speaker_id = %event.speaker_id, confidence = event.confidence, "speaker identified");
                    Step::speak(Dialog::VoiceIdentified {
                        name: display_name(&event.speaker_id),
                    })
                } else {
                    Step::none()
                }
            }
            Inbound::VoiceUnknown(event) => {
                if self.settings.offer_enrollment_to_unknown && self.is_idle() {
                    tracing::info!(confidence = event.confidence, "unknown speaker");
                    Step::speak(Dialog::UnknownVoiceOffer)
                } else {
                    Step::none()
                }
            }
            Inbound::StatsResponse(_) | Inbound::Other(_) => Step::none(),
        }
    }

    /// Fails the enrollment `enrollment_id` if it is still waiting on the
    /// plugin.
    pub fn on_processing_timeout(&mut self, enrollment_id: &str, now: DateTime<Utc>) -> Step {
        if let ActiveFlow::Enrollment(ctx) = &mut self.flow {
            let step = ctx.on_processing_timeout(enrollment_id, now);
            return self.settle(step);
        }
        Step::none()
    }

    /// Treats a recording that never arrived as a rejected sample. Ignored
    /// unless `sample_id` is the sample currently requested.
    pub fn on_sample_timeout(&mut self, sample_id: &str) -> Step {
        match &mut self.flow {
            ActiveFlow::Enrollment(ctx) => {
                let step = ctx.on_sample_timeout(sample_id, &self.settings);
                self.settle(step)
            }
            ActiveFlow::Verification(ctx) => {
                let progress = ctx.on_sample_timeout(sample_id, &self.settings);
                self.advance(progress)
            }
            _ => Step::none(),
        }
    }

    /// Drops whatever flow is active, returning an interrupted enrollment.
    pub fn reset(&mut self) -> Option<EnrollmentContext> {
        self.awaiting_user_list = false;
        self.interrupt()
    }

    fn interrupt(&mut self) -> Option<EnrollmentContext> {
        match std::mem::take(&mut self.flow) {
            ActiveFlow::Enrollment(mut ctx) => {
                ctx.close();
                Some(ctx)
            }
            _ => None,
        }
    }

    fn handle_utterance(&mut self, text: &str, now: DateTime<Utc>) -> Step {
        let intent = recognize(text);
        tracing::debug!(?intent, flow = self.flow.label(), "utterance");

        if intent == Intent::Cancel {
            return self.cancel();
        }
        if let ActiveFlow::RetryOffer(offer) = &self.flow {
            if intent == Intent::Unrecognized {
                let offer = offer.clone();
                return self.on_retry_answer(offer, parse_confirmation(text), now);
            }
        } else if self.flow.expects_confirmation() && intent != Intent::ListUsers {
            let answer = parse_confirmation(text);
            return match &mut self.flow {
                ActiveFlow::Enrollment(ctx) => {
                    let step = ctx.on_confirmation(answer, &self.settings);
                    self.settle(step)
                }
                ActiveFlow::Deletion(flow) => {
                    let progress = flow.on_confirmation(answer);
                    self.advance(progress)
                }
                _ => Step::none(),
            };
        }
        if self.flow.expects_name() && intent == Intent::Unrecognized {
            return match &mut self.flow {
                ActiveFlow::Enrollment(ctx) => {
                    let step = ctx.on_name_answer(text, &self.settings);
                    self.settle(step)
                }
                ActiveFlow::Deletion(flow) => {
                    let progress = flow.on_name_answer(text, &self.settings);
                    self.advance(progress)
                }
                _ => Step::none(),
            };
        }

        match intent {
            Intent::Unrecognized | Intent::Cancel => Step::none(),
            Intent::ListUsers => {
                self.awaiting_user_list = true;
                Step::emit_and_speak(Outbound::ListUsers, Dialog::CheckingUsers)
            }
            other => self.start_flow(other, now),
        }
    }

    fn start_flow(&mut self, intent: Intent, now: DateTime<Utc>) -> Step {
        if self.flow.is_waiting_on_plugin() {
            tracing::info!(flow = self.flow.label(), "refusing new request while waiting on the plugin");
            return Step::speak(Dialog::StillWorking);
        }
        let replaced = self.interrupt();
        if let Some(ctx) = &replaced {
            tracing::info!(enrollment_id = %ctx.enrollment_id, "replacing unfinished enrollment");
        }

        let (flow, mut step) = match intent {
            Intent::EnrollVoice { name } | Intent::RememberMe { name } => {
                let name = name.and_then(|n| validate_name(&n).ok());
                let (ctx, step) = EnrollmentContext::start(name, &self.settings, now);
                (ActiveFlow::Enrollment(ctx), step)
            }
            Intent::DeleteProfile { name } => {
                let (flow, step) = DeletionFlow::start(name);
                (ActiveFlow::Deletion(flow), step)
            }
            Intent::VerifySpeakers => {
                let (ctx, step) = VerificationContext::start(&self.settings);
                (ActiveFlow::Verification(ctx), step)
            }
            Intent::ListUsers | Intent::Cancel | Intent::Unrecognized => {
                (ActiveFlow::Idle, Step::none())
            }
        };
        self.flow = flow;
        step.concluded = replaced;
        self.settle(step)
    }

    fn on_retry_answer(&mut self, offer: RetryOffer, answer: Confirmation, now: DateTime<Utc>) -> Step {
        match offer.on_confirmation(answer, &self.settings, now) {
            (Some(ctx), step) => {
                self.flow = ActiveFlow::Enrollment(ctx);
                self.settle(step)
            }
            (None, step) => {
                self.flow = ActiveFlow::Idle;
                step
            }
        }
    }

    fn cancel(&mut self) -> Step {
        match std::mem::take(&mut self.flow) {
            ActiveFlow::Idle => {
                tracing::debug!("cancel with no flow active");
                Step::none()
            }
            ActiveFlow::RetryOffer(_) => Step::speak(Dialog::EnrollmentCancelled),
            ActiveFlow::Enrollment(mut ctx) => {
                let mut step = ctx.cancel();
                step.concluded = Some(ctx);
                step
            }
            ActiveFlow::Deletion(_) => Step::speak(Dialog::DeleteCancelled),
            ActiveFlow::Verification(_) => Step::speak(Dialog::VerifyCancelled),
        }
    }

    fn on_users(&mut self, response: UsersResponse) -> Step {
        tracing::info!(
            success = response.status.is_success(),
            total = response.total(),
            "user list received"
        );
        if !std::mem::take(&mut self.awaiting_user_list) {
            return Step::none();
        }
        if response.status.is_success() {
            Step::speak(Dialog::for_user_list(&response.users, response.total()))
        } else {
            Step::speak(Dialog::ErrorCheckingUsers)
        }
    }

    /// Moves a finished enrollment out of the session into the step. A
    /// plugin-side failure leaves a retry offer behind.
    fn settle(&mut self, mut step: Step) -> Step {
        let finished = matches!(&self.flow, ActiveFlow::Enrollment(ctx) if ctx.is_finished());
        if finished {
            if let ActiveFlow::Enrollment(ctx) = std::mem::take(&mut self.flow) {
                self.flow = RetryOffer::after(&ctx).map_or(ActiveFlow::Idle, ActiveFlow::RetryOffer);
                step.concluded = Some(ctx);
            }
        }
        step
    }

    fn advance(&mut self, progress: Progress) -> Step {
        match progress {
            Progress::Continue(step) => step,
            Progress::Finish(step) => {
                self.flow = ActiveFlow::Idle;
                step
            }
        }
    }
}
