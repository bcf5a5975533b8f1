// Audio session error types and constants

use crate::backend::BackendError;
use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio session error code constants
///
/// Single source of truth for the numeric codes reported by [`AudioError`].
///
/// Error code range: 3001-3009
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// No audio device could be opened
    pub const DEVICE_UNAVAILABLE: i32 = 3001;

    /// Device opened but no rendering context could be created on it
    pub const CONTEXT_CREATION_FAILED: i32 = 3002;

    /// Context created but could not be made current
    pub const MAKE_CURRENT_FAILED: i32 = 3003;

    /// Session already holds a device and context
    pub const ALREADY_INITIALIZED: i32 = 3004;

    /// Session was cleaned up and cannot be reused
    pub const SESSION_CLOSED: i32 = 3005;

    /// Wave decoder is not available
    pub const DECODER_UNAVAILABLE: i32 = 3006;

    /// Wave file could not be opened or parsed
    pub const WAVE_OPEN_FAILED: i32 = 3007;

    /// Decoded wave properties could not be queried
    pub const WAVE_DATA_UNAVAILABLE: i32 = 3008;

    /// Backend rejected the buffer upload
    pub const BUFFER_UPLOAD_FAILED: i32 = 3009;
}

/// Log an audio error with structured context
///
/// Emits the numeric code, component and message through the `log` facade.
/// Never panics.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio session errors
///
/// Covers device acquisition, session lifecycle misuse, wave decoding and
/// buffer upload. Buffer duration queries do not use this type; they report
/// failure through a `0.0` sentinel.
///
/// Error code range: 3001-3009
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// No audio device could be opened
    DeviceUnavailable { requested: Option<String> },

    /// Device opened but context creation failed; the device was closed again
    ContextCreationFailed { device: String },

    /// Context could not be made current; context and device were released
    MakeCurrentFailed,

    /// `initialize` called on a session that is already initialized
    AlreadyInitialized,

    /// Session was cleaned up
    SessionClosed,

    /// Session has no wave decoder
    DecoderUnavailable,

    /// Wave file could not be opened or parsed
    WaveOpenFailed { path: String, reason: String },

    /// Size, data, frequency or format of the decoded wave was unavailable
    WaveDataUnavailable { path: String },

    /// Backend reported an error after the upload
    BufferUploadFailed { path: String, backend_code: i32 },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::DeviceUnavailable { .. } => AudioErrorCodes::DEVICE_UNAVAILABLE,
            AudioError::ContextCreationFailed { .. } => AudioErrorCodes::CONTEXT_CREATION_FAILED,
            AudioError::MakeCurrentFailed => AudioErrorCodes::MAKE_CURRENT_FAILED,
            AudioError::AlreadyInitialized => AudioErrorCodes::ALREADY_INITIALIZED,
            AudioError::SessionClosed => AudioErrorCodes::SESSION_CLOSED,
            AudioError::DecoderUnavailable => AudioErrorCodes::DECODER_UNAVAILABLE,
            AudioError::WaveOpenFailed { .. } => AudioErrorCodes::WAVE_OPEN_FAILED,
            AudioError::WaveDataUnavailable { .. } => AudioErrorCodes::WAVE_DATA_UNAVAILABLE,
            AudioError::BufferUploadFailed { .. } => AudioErrorCodes::BUFFER_UPLOAD_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::DeviceUnavailable { requested } => match requested {
                Some(name) => format!("Cannot open audio device '{}'", name),
                None => "Cannot open default audio device".to_string(),
            },
            AudioError::ContextCreationFailed { device } => {
                format!("Cannot create context on device '{}'", device)
            }
            AudioError::MakeCurrentFailed => "Cannot make context current".to_string(),
            AudioError::AlreadyInitialized => {
                "Audio session already initialized. Call clean_up() first.".to_string()
            }
            AudioError::SessionClosed => {
                "Audio session was cleaned up and cannot be reinitialized".to_string()
            }
            AudioError::DecoderUnavailable => "Wave decoder not available".to_string(),
            AudioError::WaveOpenFailed { path, reason } => {
                format!("Not able to load audio file '{}': {}", path, reason)
            }
            AudioError::WaveDataUnavailable { path } => {
                format!("Not able to load wav data from '{}'", path)
            }
            AudioError::BufferUploadFailed { path, backend_code } => {
                match BackendError::from_code(*backend_code) {
                    Some(err) => format!("Not able to load audio data, error: {}, file: {}", err, path),
                    None => format!(
                        "Not able to load audio data, error: {:#06x}, file: {}",
                        backend_code, path
                    ),
                }
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}
