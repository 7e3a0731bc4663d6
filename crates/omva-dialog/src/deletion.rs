//! Removing a voice profile: name, confirmation, one plugin round trip.

use crate::dialog::Dialog;
use crate::intent::Confirmation;
use crate::names::{extract_spoken_name, user_id, validate_name};
use crate::session::{Progress, Step};
use omva_bus::payload::{RemoveRequest, RemoveResponse};
use omva_bus::Outbound;
use omva_types::EnrollmentSettings;

/// A confirmed removal waiting on the plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeletionRequest {
    pub user_name: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionFlow {
    AwaitingName { attempts: u32 },
    AwaitingConfirmation { user_name: String },
    Pending(PendingDeletionRequest),
}

impl DeletionFlow {
    /// Opens a deletion, asking for the name unless `name` is usable.
    pub fn start(name: Option<String>) -> (Self, Step) {
        match name.and_then(|n| validate_name(&n).ok()) {
            Some(user_name) => (
                Self::AwaitingConfirmation {
                    user_name: user_name.clone(),
                },
                Step::speak(Dialog::DeleteConfirm { name: user_name }),
            ),
            None => (
                Self::AwaitingName { attempts: 0 },
                Step::speak(Dialog::DeleteRequestName),
            ),
        }
    }

    pub fn expects_name(&self) -> bool {
        matches!(self, Self::AwaitingName { .. })
    }

    pub fn expects_confirmation(&self) -> bool {
        matches!(self, Self::AwaitingConfirmation { .. })
    }

    pub fn is_waiting_on_plugin(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn on_name_answer(&mut self, utterance: &str, settings: &EnrollmentSettings) -> Progress {
        let Self::AwaitingName { attempts } = self else {
            return Progress::Continue(Step::none());
        };
        let candidate =
            extract_spoken_name(utterance).unwrap_or_else(|| utterance.trim().to_string());
        match validate_name(&candidate) {
            Ok(user_name) => {
                *self = Self::AwaitingConfirmation {
                    user_name: user_name.clone(),
                };
                Progress::Continue(Step::speak(Dialog::DeleteConfirm { name: user_name }))
            }
            Err(reason) => {
                *attempts += 1;
                tracing::warn!(attempts = *attempts, %reason, "deletion name rejected");
                if *attempts >= settings.max_name_attempts {
                    Progress::Finish(Step::speak(Dialog::TooManyAttempts))
                } else {
                    Progress::Continue(Step::speak(Dialog::DeleteRequestName))
                }
            }
        }
    }

    pub fn on_confirmation(&mut self, answer: Confirmation) -> Progress {
        let Self::AwaitingConfirmation { user_name } = self else {
            return Progress::Continue(Step::none());
        };
        if answer == Confirmation::No {
            tracing::info!(user_name = %user_name, "deletion cancelled");
            return Progress::Finish(Step::speak(Dialog::DeleteCancelled));
        }

        let request = PendingDeletionRequest {
            user_id: user_id(user_name),
            user_name: std::mem::take(user_name),
        };
        tracing::info!(user_id = %request.user_id, "requesting profile removal");
        let emit = Outbound::RemoveUser(RemoveRequest {
            user_id: request.user_id.clone(),
        });
        *self = Self::Pending(request);
        Progress::Continue(Step::emit(emit))
    }

    /// Speaks the outcome. The flow ends whatever the plugin said.
    pub fn on_response(&self, response: RemoveResponse) -> Progress {
        let Self::Pending(request) = self else {
            tracing::debug!("ignoring removal response with no request outstanding");
            return Progress::Continue(Step::none());
        };
        let name = request.user_name.clone();
        if response.status.is_success() {
            tracing::info!(user_id = %request.user_id, "profile removed");
            Progress::Finish(Step::speak(Dialog::DeleteSuccess { name }))
        } else {
            tracing::warn!(user_id = %request.user_id, message = %response.message, "profile removal failed");
            Progress::Finish(Step::speak(Dialog::DeleteFailed {
                name,
                message: response.message,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omva_bus::ResponseStatus;

    fn finished(progress: Progress) -> Step {
        match progress {
            Progress::Finish(step) => step,
            Progress::Continue(step) => panic!("expected the flow to finish, got {:?}", step),
        }
    }

    fn continued(progress: Progress) -> Step {
        match progress {
            Progress::Continue(step) => step,
            Progress::Finish(step) => panic!("expected the flow to continue, got {:?}", step),
        }
    }

    #[test]
    fn slot_name_goes_to_confirmation() {
        let (flow, step) = DeletionFlow::start(Some("john".to_string()));
        assert!(flow.expects_confirmation());
        assert_eq!(
            step.speak,
            Some(Dialog::DeleteConfirm {
                name: "John".to_string()
            })
        );
    }

    #[test]
    fn missing_name_is_asked_for() {
        let (mut flow, step) = DeletionFlow::start(None);
        assert_eq!(step.speak, Some(Dialog::DeleteRequestName));
        let step = continued(flow.on_name_answer("it's mary smith", &EnrollmentSettings::default()));
        assert_eq!(
            step.speak,
            Some(Dialog::DeleteConfirm {
                name: "Mary Smith".to_string()
            })
        );
    }

    #[test]
    fn confirmed_removal_uses_normalized_id() {
        let (mut flow, _) = DeletionFlow::start(Some("Mary Smith".to_string()));
        let step = continued(flow.on_confirmation(Confirmation::Yes));
        assert_eq!(
            step.emit,
            Some(Outbound::RemoveUser(RemoveRequest {
                user_id: "mary_smith".to_string()
            }))
        );
        assert!(flow.is_waiting_on_plugin());
    }

    #[test]
    fn declined_removal_finishes_without_request() {
        let (mut flow, _) = DeletionFlow::start(Some("John".to_string()));
        let step = finished(flow.on_confirmation(Confirmation::No));
        assert!(step.emit.is_none());
        assert_eq!(step.speak, Some(Dialog::DeleteCancelled));
    }

    #[test]
    fn failure_message_is_spoken() {
        let (mut flow, _) = DeletionFlow::start(Some("John".to_string()));
        flow.on_confirmation(Confirmation::Yes);
        let step = finished(flow.on_response(RemoveResponse {
            status: ResponseStatus::Error,
            user_id: None,
            message: "not found".to_string(),
        }));
        let Some(dialog) = step.speak else {
            panic!("expected a dialog");
        };
        assert!(dialog.render().contains("not found"));
    }
}
