// Error types for the audio session crate
//
// This module defines the session error type with stable numeric codes,
// mirroring the error reporting the backend itself uses (numeric codes plus
// a human-readable message).

mod audio;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
