//! End-to-end tests for the skill loop over an in-memory bus.
//!
//! These tests verify:
//! - A full named enrollment, from utterance to success dialog
//! - Sample requests are answered and counted over the bus
//! - Deletion failures are spoken and the flow is cleared
//! - An unanswered enrollment request times out
//! - Recordings that never arrive are re-requested, then the enrollment gives up
//! - Shutdown stops the loop

use omva_bus::{BusMessage, MemoryBus};
use omva_dialog::{HealthConfig, HealthMonitor};
use omva_skill::{Skill, SkillError};
use omva_types::{events, EnrollmentSettings};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Harness {
    bus: MemoryBus,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), SkillError>>,
}

impl Harness {
    fn start(settings: EnrollmentSettings) -> Self {
        let bus = MemoryBus::new();
        let health = Arc::new(Mutex::new(HealthMonitor::new(HealthConfig::default())));
        let mut skill = Skill::new(Arc::new(bus.clone()), settings, health);
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            skill
                .run(async {
                    let _ = stopped.await;
                })
                .await
        });
        Self {
            bus,
            stop: Some(stop),
            task,
        }
    }

    fn inject(&self, name: &str, data: Value) {
        self.bus.inject(BusMessage::new(name, data));
    }

    fn say(&self, text: &str) {
        self.inject(events::UTTERANCE, json!({"utterances": [text]}));
    }

    /// Waits until `count` messages named `name` have been emitted.
    async fn wait_for(&self, name: &str, count: usize) -> Vec<BusMessage> {
        for _ in 0..500 {
            let emitted = self.bus.emitted_named(name);
            if emitted.len() >= count {
                return emitted;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {} '{}' messages, saw {}",
            count,
            name,
            self.bus.emitted_named(name).len()
        );
    }

    async fn last_spoken(&self, count: usize) -> String {
        let spoken = self.wait_for(events::SPEAK, count).await;
        spoken[count - 1].data["utterance"]
            .as_str()
            .expect("speak carries an utterance")
            .to_string()
    }

    /// Answers the `n`th sample request (1-based) with a clean recording.
    async fn record(&self, n: usize) {
        let requests = self.wait_for(events::COLLECT_SAMPLE, n).await;
        let sample_id = requests[n - 1].data["sample_id"].clone();
        self.inject(
            events::SAMPLE_COLLECTED,
            json!({
                "sample_id": sample_id,
                "status": "success",
                "audio": "ab".repeat(60_000),
                "duration": 4.0,
                "quality_score": 0.85,
            }),
        );
    }

    async fn stop(mut self) -> Result<(), SkillError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await.expect("skill task should not panic")
    }
}

#[tokio::test]
async fn named_enrollment_over_the_bus() {
    let skill = Harness::start(EnrollmentSettings::default());

    skill.say("enroll my voice as John");
    assert!(skill.last_spoken(1).await.contains("John"));

    skill.say("yes");
    for n in 1..=3 {
        skill.record(n).await;
    }

    let enroll = skill.wait_for(events::ENROLL_USER, 1).await;
    assert_eq!(enroll.len(), 1);
    assert_eq!(enroll[0].data["user_id"], "john");
    assert_eq!(enroll[0].data["audio_samples"].as_array().unwrap().len(), 3);
    assert_eq!(enroll[0].data["replace_existing"], false);
    let enrollment_id = enroll[0].data["enrollment_id"].clone();

    skill.inject(
        events::ENROLL_RESPONSE,
        json!({
            "status": "success",
            "user_id": "john",
            "samples_processed": 3,
            "enrollment_id": enrollment_id,
        }),
    );

    // Confirmation, ready, two accepted, samples complete, success.
    let success = skill.last_spoken(6).await;
    assert!(success.contains("John"), "{}", success);
    assert!(success.contains('3'), "{}", success);

    // Follow-up listing is requested but not spoken.
    skill.wait_for(events::LIST_USERS, 1).await;
    skill.inject(
        events::USERS_RESPONSE,
        json!({"status": "success", "users": ["john"], "total_users": 1}),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(skill.bus.emitted_named(events::SPEAK).len(), 6);

    skill.stop().await.unwrap();
}

#[tokio::test]
async fn speak_messages_carry_dialog_metadata() {
    let skill = Harness::start(EnrollmentSettings::default());
    skill.say("remember me");

    let spoken = skill.wait_for(events::SPEAK, 1).await;
    assert_eq!(spoken[0].data["meta"]["dialog"], "enrollment_start_no_name");
    assert_eq!(spoken[0].data["meta"]["skill"], omva_types::SKILL_ID);
    assert_eq!(spoken[0].data["expect_response"], true);
    assert_eq!(spoken[0].context["source"], omva_types::SKILL_ID);

    skill.stop().await.unwrap();
}

#[tokio::test]
async fn deletion_failure_over_the_bus() {
    let skill = Harness::start(EnrollmentSettings::default());

    skill.say("delete voice profile for John");
    skill.wait_for(events::SPEAK, 1).await;
    skill.say("yes");

    let removal = skill.wait_for(events::REMOVE_USER, 1).await;
    assert_eq!(removal[0].data["user_id"], "john");

    skill.inject(
        events::REMOVE_RESPONSE,
        json!({"status": "error", "message": "not found"}),
    );
    assert!(skill.last_spoken(2).await.contains("not found"));

    // Nothing pending: a second response is ignored.
    skill.inject(
        events::REMOVE_RESPONSE,
        json!({"status": "success", "message": "removed"}),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(skill.bus.emitted_named(events::SPEAK).len(), 2);

    skill.stop().await.unwrap();
}

#[tokio::test]
async fn unanswered_enrollment_times_out() {
    let settings = EnrollmentSettings {
        processing_timeout_secs: 1,
        confirmation_required: false,
        ..EnrollmentSettings::default()
    };
    let skill = Harness::start(settings);

    skill.say("enroll my voice as Anna");
    for n in 1..=3 {
        skill.record(n).await;
    }
    skill.wait_for(events::ENROLL_USER, 1).await;

    // Ready, two accepted, samples complete, then the timeout failure.
    let failure = skill.last_spoken(5).await;
    assert!(failure.contains("Something went wrong"), "{}", failure);
    let spoken = skill.bus.emitted_named(events::SPEAK);
    assert_eq!(spoken[4].data["meta"]["dialog"], "enrollment_failed");

    skill.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn missing_recordings_time_out() {
    let settings = EnrollmentSettings {
        confirmation_required: false,
        ..EnrollmentSettings::default()
    };
    let skill = Harness::start(settings);

    skill.say("enroll my voice as Anna");
    skill.wait_for(events::COLLECT_SAMPLE, 1).await;

    // Nothing answers; each request is given max_audio_duration plus a second.
    tokio::time::sleep(Duration::from_secs(12)).await;
    let spoken = skill.bus.emitted_named(events::SPEAK);
    assert_eq!(spoken.len(), 2);
    assert_eq!(spoken[1].data["meta"]["dialog"], "recording_timeout");
    assert_eq!(skill.bus.emitted_named(events::COLLECT_SAMPLE).len(), 2);

    // Three retries are allowed before the enrollment is abandoned.
    tokio::time::sleep(Duration::from_secs(40)).await;
    let spoken = skill.bus.emitted_named(events::SPEAK);
    assert_eq!(spoken.len(), 5);
    assert_eq!(spoken[4].data["meta"]["dialog"], "too_many_attempts");
    assert_eq!(skill.bus.emitted_named(events::COLLECT_SAMPLE).len(), 4);

    // A recording that shows up late is ignored.
    skill.record(1).await;
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(skill.bus.emitted_named(events::SPEAK).len(), 5);
    assert_eq!(skill.bus.emitted_named(events::COLLECT_SAMPLE).len(), 4);

    skill.stop().await.unwrap();
}

#[tokio::test]
async fn malformed_payloads_do_not_stop_the_loop() {
    let skill = Harness::start(EnrollmentSettings::default());

    skill.inject(
        events::SAMPLE_COLLECTED,
        json!({"sample_id": "x", "audio": "not hex"}),
    );
    skill.say("list voice users");
    skill.wait_for(events::LIST_USERS, 1).await;

    skill.stop().await.unwrap();
}
