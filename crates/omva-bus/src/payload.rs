//! Typed payloads for every message the skill sends or handles.
//!
//! Incoming envelopes are decoded exactly once, here, into [`Inbound`];
//! handlers never look at raw JSON. Absent fields take the defaults the
//! plugin protocol implies (a response without `status` is a failure).

use crate::error::BusError;
use crate::message::BusMessage;
use omva_types::events;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Hex encoding for audio bytes on the wire.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(bytes: T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        hex::decode(text.trim()).map_err(serde::de::Error::custom)
    }

    pub fn serialize_list<S>(samples: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(samples.iter().map(hex::encode))
    }
}

/// Outcome field shared by plugin responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    #[default]
    #[serde(other)]
    Error,
}

impl ResponseStatus {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

fn unknown_user() -> String {
    "Unknown".to_string()
}

fn unknown_error() -> String {
    "Unknown error".to_string()
}

fn listing_failed() -> String {
    "User listing failed".to_string()
}

// ── Incoming ────────────────────────────────────────────────────────────

/// `recognizer_loop:utterance`: transcribed speech from the host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UtteranceEvent {
    #[serde(default)]
    pub utterances: Vec<String>,
    #[serde(default)]
    pub lang: Option<String>,
}

impl UtteranceEvent {
    /// The best transcription hypothesis, if any.
    pub fn text(&self) -> Option<&str> {
        self.utterances.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnrollResponse {
    #[serde(default)]
    pub status: ResponseStatus,
    #[serde(default = "unknown_user")]
    pub user_id: String,
    #[serde(default)]
    pub samples_processed: u32,
    #[serde(default = "unknown_error")]
    pub message: String,
    #[serde(default)]
    pub enrollment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UsersResponse {
    #[serde(default)]
    pub status: ResponseStatus,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub total_users: Option<usize>,
    #[serde(default = "listing_failed")]
    pub message: String,
}

impl UsersResponse {
    /// Reported total, falling back to the length of `users`.
    pub fn total(&self) -> usize {
        self.total_users.unwrap_or(self.users.len())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoveResponse {
    #[serde(default)]
    pub status: ResponseStatus,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "unknown_error")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VerifyResponse {
    /// Absent on plain decisions; present and `error` when the plugin failed.
    #[serde(default)]
    pub status: Option<ResponseStatus>,
    #[serde(default)]
    pub is_same_speaker: bool,
    #[serde(default)]
    pub similarity_score: f64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub plugin_version: Option<String>,
    #[serde(default)]
    pub enrolled_users: u64,
    #[serde(default)]
    pub total_processed: u64,
}

/// `omva.voiceid.sample.collected`: one finished recording.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SampleCollected {
    pub sample_id: String,
    #[serde(default)]
    pub status: ResponseStatus,
    #[serde(default, with = "hex_bytes")]
    pub audio: Vec<u8>,
    /// Recording length in seconds.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VoiceIdentified {
    pub speaker_id: String,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VoiceUnknown {
    #[serde(default)]
    pub confidence: f64,
}

/// A decoded incoming message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Utterance(UtteranceEvent),
    EnrollResponse(EnrollResponse),
    UsersResponse(UsersResponse),
    RemoveResponse(RemoveResponse),
    VerifyResponse(VerifyResponse),
    StatsResponse(StatsResponse),
    SampleCollected(SampleCollected),
    VoiceIdentified(VoiceIdentified),
    VoiceUnknown(VoiceUnknown),
    /// A name this skill does not handle.
    Other(String),
}

impl Inbound {
    /// Decodes an envelope into its typed payload.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Payload` if a known message carries fields of the
    /// wrong shape (for example non-hex audio).
    pub fn decode(message: &BusMessage) -> Result<Self, BusError> {
        let inbound = match message.msg_type.as_str() {
            events::UTTERANCE => Self::Utterance(parse(message)?),
            events::ENROLL_RESPONSE => Self::EnrollResponse(parse(message)?),
            events::USERS_RESPONSE => Self::UsersResponse(parse(message)?),
            events::REMOVE_RESPONSE => Self::RemoveResponse(parse(message)?),
            events::VERIFY_RESPONSE => Self::VerifyResponse(parse(message)?),
            events::STATS_RESPONSE => Self::StatsResponse(parse(message)?),
            events::SAMPLE_COLLECTED => Self::SampleCollected(parse(message)?),
            events::VOICE_IDENTIFIED => Self::VoiceIdentified(parse(message)?),
            events::VOICE_UNKNOWN => Self::VoiceUnknown(parse(message)?),
            other => Self::Other(other.to_string()),
        };
        Ok(inbound)
    }
}

fn parse<T: DeserializeOwned>(message: &BusMessage) -> Result<T, BusError> {
    serde_json::from_value(message.data.clone()).map_err(|e| BusError::Payload {
        name: message.msg_type.clone(),
        reason: e.to_string(),
    })
}

// ── Outgoing ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollRequest {
    pub user_id: String,
    #[serde(serialize_with = "hex_bytes::serialize_list")]
    pub audio_samples: Vec<Vec<u8>>,
    pub enrollment_id: String,
    pub timestamp: String,
    pub replace_existing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoveRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyRequest {
    #[serde(serialize_with = "hex_bytes::serialize")]
    pub audio_sample1: Vec<u8>,
    #[serde(serialize_with = "hex_bytes::serialize")]
    pub audio_sample2: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsRequest {
    pub health_check: bool,
    pub timestamp: String,
}

/// Asks the host to record one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectSampleRequest {
    pub sample_id: String,
    /// One-based position of this sample.
    pub index: u32,
    pub total: u32,
    pub phrase: String,
    pub min_duration: f64,
    pub max_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakMeta {
    pub skill: String,
    pub dialog: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakRequest {
    pub utterance: String,
    pub expect_response: bool,
    pub meta: SpeakMeta,
}

/// A message the skill sends.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    EnrollUser(EnrollRequest),
    ListUsers,
    RemoveUser(RemoveRequest),
    VerifySpeakers(VerifyRequest),
    GetStats(StatsRequest),
    CollectSample(CollectSampleRequest),
    Speak(SpeakRequest),
}

impl Outbound {
    /// The bus name this payload travels under.
    pub fn name(&self) -> &'static str {
        match self {
            Self::EnrollUser(_) => events::ENROLL_USER,
            Self::ListUsers => events::LIST_USERS,
            Self::RemoveUser(_) => events::REMOVE_USER,
            Self::VerifySpeakers(_) => events::VERIFY_SPEAKERS,
            Self::GetStats(_) => events::GET_STATS,
            Self::CollectSample(_) => events::COLLECT_SAMPLE,
            Self::Speak(_) => events::SPEAK,
        }
    }

    /// Wraps the payload in an envelope.
    pub fn to_message(&self) -> Result<BusMessage, BusError> {
        let data = match self {
            Self::EnrollUser(req) => serde_json::to_value(req)?,
            Self::ListUsers => json!({}),
            Self::RemoveUser(req) => serde_json::to_value(req)?,
            Self::VerifySpeakers(req) => serde_json::to_value(req)?,
            Self::GetStats(req) => serde_json::to_value(req)?,
            Self::CollectSample(req) => serde_json::to_value(req)?,
            Self::Speak(req) => serde_json::to_value(req)?,
        };
        Ok(BusMessage::new(self.name(), data))
    }
}
