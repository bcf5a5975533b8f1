// Audio Session Core - device lifecycle and wave buffer loading
// Synchronous wrapper over an audio device backend with a diagnostic log

// Module declarations
pub mod backend;
pub mod config;
pub mod debug_log;
pub mod error;
pub mod session;
pub mod wave;

// Re-exports for convenience
pub use backend::{AudioBackend, BufferFormat, BufferId, SoftwareBackend};
pub use config::SessionConfig;
pub use error::{AudioError, ErrorCode};
pub use session::{AudioSession, SessionState};

#[cfg(not(target_os = "android"))]
pub use backend::CpalBackend;
