//! Runtime for the voice enrollment skill.
//!
//! [`Skill`] owns the dialogue [`Session`] and is the single consumer of the
//! session's bus subscription: it decodes each message, hands it to the
//! session, and performs the returned [`Step`]. The plugin health monitor
//! runs beside it as a separate task (see [`background`]).

pub mod background;
pub mod config;

use chrono::Utc;
use config::ConfigError;
use omva_bus::{BusError, BusMessage, Inbound, MessageBus, Outbound, Subscription};
use omva_dialog::{EnrollmentContext, HealthMonitor, Session, Step};
use omva_types::{events, EnrollmentSettings};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that stop the skill.
#[derive(Debug, Error)]
pub enum SkillError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("message bus subscription closed")]
    BusClosed,
}

/// Internal events delivered back to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    ProcessingTimeout { enrollment_id: String },
    /// The recording requested as `sample_id` should have arrived by now.
    SampleTimeout { sample_id: String },
}

/// Locks the shared health monitor, recovering from a poisoned lock.
pub fn lock_health(monitor: &Mutex<HealthMonitor>) -> std::sync::MutexGuard<'_, HealthMonitor> {
    monitor.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct Skill<B: MessageBus> {
    bus: Arc<B>,
    session: Session,
    subscription: Subscription,
    health: Arc<Mutex<HealthMonitor>>,
    timer_tx: mpsc::Sender<TimerEvent>,
    timer_rx: mpsc::Receiver<TimerEvent>,
    processing_timeout: Duration,
    recording_timeout: Duration,
}

impl<B: MessageBus + 'static> Skill<B> {
    /// Subscribes to every message the session handles.
    pub fn new(bus: Arc<B>, settings: EnrollmentSettings, health: Arc<Mutex<HealthMonitor>>) -> Self {
        let subscription = bus.subscribe(&events::SESSION_SUBSCRIPTIONS);
        let (timer_tx, timer_rx) = mpsc::channel(16);
        let processing_timeout = Duration::from_secs(settings.processing_timeout_secs);
        let recording_timeout = settings.recording_timeout();
        tracing::info!(
            subscription = subscription.id(),
            names = events::SESSION_SUBSCRIPTIONS.len(),
            "skill subscribed to bus"
        );
        Self {
            bus,
            session: Session::new(settings),
            subscription,
            health,
            timer_tx,
            timer_rx,
            processing_timeout,
            recording_timeout,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Processes bus traffic and timers until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns `SkillError::BusClosed` if the subscription ends, or
    /// `SkillError::Bus` if the bus refuses a message because it closed.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<(), SkillError> {
        tokio::pin!(shutdown);
        tracing::info!("voice enrollment skill running");

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    if let Some(ctx) = self.session.reset() {
                        tracing::info!(
                            enrollment_id = %ctx.enrollment_id,
                            "shutdown interrupted an enrollment"
                        );
                    }
                    tracing::info!("voice enrollment skill stopped");
                    return Ok(());
                }
                message = self.subscription.recv() => match message {
                    Some(message) => self.handle_message(&message)?,
                    None => return Err(SkillError::BusClosed),
                },
                Some(event) = self.timer_rx.recv() => self.handle_timer(event)?,
            }
        }
    }

    /// Decodes and handles one bus message.
    pub fn handle_message(&mut self, message: &BusMessage) -> Result<(), SkillError> {
        let inbound = match Inbound::decode(message) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed bus message");
                return Ok(());
            }
        };
        let step = self.session.handle(inbound, Utc::now());
        self.execute(step)
    }

    fn handle_timer(&mut self, event: TimerEvent) -> Result<(), SkillError> {
        match event {
            TimerEvent::ProcessingTimeout { enrollment_id } => {
                let step = self.session.on_processing_timeout(&enrollment_id, Utc::now());
                if !step.is_empty() {
                    tracing::warn!(%enrollment_id, "plugin did not answer enrollment request in time");
                }
                self.execute(step)
            }
            TimerEvent::SampleTimeout { sample_id } => {
                let step = self.session.on_sample_timeout(&sample_id);
                if !step.is_empty() {
                    tracing::warn!(%sample_id, "no recording arrived in time");
                }
                self.execute(step)
            }
        }
    }

    /// Performs a step: emit first, then speak.
    fn execute(&mut self, step: Step) -> Result<(), SkillError> {
        if let Some(outbound) = &step.emit {
            match outbound {
                Outbound::EnrollUser(request) => {
                    if lock_health(&self.health).is_degraded() {
                        tracing::warn!(
                            enrollment_id = %request.enrollment_id,
                            "voice plugin failed its last health check, sending enrollment anyway"
                        );
                    }
                    self.arm_timer(
                        self.processing_timeout,
                        TimerEvent::ProcessingTimeout {
                            enrollment_id: request.enrollment_id.clone(),
                        },
                    );
                }
                Outbound::CollectSample(request) => self.arm_timer(
                    self.recording_timeout,
                    TimerEvent::SampleTimeout {
                        sample_id: request.sample_id.clone(),
                    },
                ),
                _ => {}
            }
            self.send(outbound)?;
        }
        if let Some(dialog) = &step.speak {
            tracing::debug!(dialog = dialog.key(), "speaking");
            self.send(&dialog.to_outbound())?;
        }
        if let Some(ctx) = &step.concluded {
            log_concluded(ctx);
        }
        Ok(())
    }

    fn send(&self, outbound: &Outbound) -> Result<(), SkillError> {
        match self.bus.emit_outbound(outbound) {
            Ok(()) => Ok(()),
            Err(BusError::Closed) => Err(SkillError::Bus(BusError::Closed)),
            Err(e) => {
                tracing::warn!(name = outbound.name(), error = %e, "failed to emit message");
                Ok(())
            }
        }
    }

    fn arm_timer(&self, delay: Duration, event: TimerEvent) {
        let tx = self.timer_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event).await;
        });
    }
}

fn log_concluded(ctx: &EnrollmentContext) {
    let elapsed_secs = (Utc::now() - ctx.started_at).num_seconds();
    match &ctx.last_error {
        Some(error) => tracing::info!(
            enrollment_id = %ctx.enrollment_id,
            code = %error.code,
            message = %error.message,
            elapsed_secs,
            "enrollment concluded with error"
        ),
        None => tracing::info!(
            enrollment_id = %ctx.enrollment_id,
            stage = ?ctx.stage,
            samples = ctx.samples_collected(),
            elapsed_secs,
            "enrollment concluded"
        ),
    }
}
