//! Bus message names.
//!
//! Requests go out to the voice identification plugin, responses and
//! events come back. The `omva.*` names belong to this skill's own sample
//! collection protocol; the `ovos.*` names are the plugin's API.

// Outgoing, to the voice identification plugin.
pub const ENROLL_USER: &str = "ovos.voiceid.enroll_user";
pub const LIST_USERS: &str = "ovos.voiceid.list_users";
pub const REMOVE_USER: &str = "ovos.voiceid.remove_user";
pub const VERIFY_SPEAKERS: &str = "ovos.voiceid.verify_speakers";
pub const GET_STATS: &str = "ovos.voiceid.get_stats";
pub const COLLECT_SAMPLE: &str = "omva.voiceid.collect_sample";

// Incoming, from the plugin.
pub const ENROLL_RESPONSE: &str = "ovos.voiceid.enroll.response";
pub const USERS_RESPONSE: &str = "ovos.voiceid.users.response";
pub const REMOVE_RESPONSE: &str = "ovos.voiceid.remove.response";
pub const VERIFY_RESPONSE: &str = "ovos.voiceid.verify.response";
pub const STATS_RESPONSE: &str = "ovos.voiceid.stats.response";
pub const SAMPLE_COLLECTED: &str = "omva.voiceid.sample.collected";

// Automatic identification.
pub const VOICE_IDENTIFIED: &str = "ovos.voice.identified";
pub const VOICE_UNKNOWN: &str = "ovos.voice.unknown";

// Host platform.
pub const UTTERANCE: &str = "recognizer_loop:utterance";
pub const SPEAK: &str = "speak";

/// Names the dialogue session subscribes to. Stats responses go to the
/// health monitor instead.
pub const SESSION_SUBSCRIPTIONS: [&str; 8] = [
    UTTERANCE,
    ENROLL_RESPONSE,
    USERS_RESPONSE,
    REMOVE_RESPONSE,
    VERIFY_RESPONSE,
    SAMPLE_COLLECTED,
    VOICE_IDENTIFIED,
    VOICE_UNKNOWN,
];
