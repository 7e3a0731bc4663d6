//! Mapping of plugin free-text errors onto stable [`ErrorCode`]s.

use omva_types::ErrorCode;

/// Ordered (substring, code) pairs. The first entry whose substring occurs
/// in the lowercased plugin message wins.
pub const PLUGIN_ERROR_TABLE: &[(&str, ErrorCode)] = &[
    ("user id is required", ErrorCode::InvalidName),
    ("missing user_name", ErrorCode::InvalidName),
    ("invalid name", ErrorCode::InvalidName),
    ("audio samples are required", ErrorCode::SampleCountInsufficient),
    ("no valid audio samples", ErrorCode::SampleCountInsufficient),
    ("not enough samples", ErrorCode::SampleCountInsufficient),
    ("voice processor not initialized", ErrorCode::PluginUnavailable),
    ("plugin unavailable", ErrorCode::PluginUnavailable),
    ("already exists", ErrorCode::UserExists),
    ("already enrolled", ErrorCode::UserExists),
    ("audio quality", ErrorCode::AudioQualityPoor),
    ("quality too low", ErrorCode::AudioQualityPoor),
];

/// Maps a plugin error message to a code, falling back to
/// [`ErrorCode::ProcessingFailed`].
pub fn map_plugin_error(message: &str) -> ErrorCode {
    let message = message.to_lowercase();
    PLUGIN_ERROR_TABLE
        .iter()
        .find(|(needle, _)| message.contains(needle))
        .map(|(_, code)| *code)
        .unwrap_or(ErrorCode::ProcessingFailed)
}
