//! Backend abstractions for the native audio device API.
//!
//! The session never talks to a device library directly. Everything it needs
//! (device and context lifecycle, buffer upload, buffer/listener queries and
//! the process-global error flag) goes through [`AudioBackend`].

use std::fmt;
use std::num::NonZeroU32;

macro_rules! handle_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Build a handle from its raw value. Zero is the null handle.
            pub fn from_raw(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }

            /// Raw numeric value of the handle.
            pub fn raw(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

handle_id!(
    /// Opaque handle to an open audio device.
    DeviceId
);
handle_id!(
    /// Opaque handle to a rendering context created on a device.
    ContextId
);
handle_id!(
    /// Caller-owned buffer slot handle.
    BufferId
);

/// Backend error flag values.
///
/// "No error" is represented by `None` wherever the flag is read.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BackendError {
    /// Unknown buffer, context or device name
    InvalidName,
    /// Unknown enum/parameter
    InvalidEnum,
    /// Value out of range or inconsistent with the format
    InvalidValue,
    /// Operation not allowed in the current state
    InvalidOperation,
    /// Allocation failure
    OutOfMemory,
}

impl BackendError {
    pub fn code(self) -> i32 {
        match self {
            BackendError::InvalidName => 0xA001,
            BackendError::InvalidEnum => 0xA002,
            BackendError::InvalidValue => 0xA003,
            BackendError::InvalidOperation => 0xA004,
            BackendError::OutOfMemory => 0xA005,
        }
    }

    /// Map a numeric code back to its error. Unknown codes give `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0xA001 => Some(BackendError::InvalidName),
            0xA002 => Some(BackendError::InvalidEnum),
            0xA003 => Some(BackendError::InvalidValue),
            0xA004 => Some(BackendError::InvalidOperation),
            0xA005 => Some(BackendError::OutOfMemory),
            _ => None,
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({:#06x})", self, self.code())
    }
}

/// Sample layouts a buffer can be uploaded with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferFormat {
    Mono8,
    Mono16,
    Stereo8,
    Stereo16,
    Quad8,
    Quad16,
    Surround51Chn8,
    Surround51Chn16,
    Surround61Chn8,
    Surround61Chn16,
    Surround71Chn8,
    Surround71Chn16,
    MonoFloat32,
    StereoFloat32,
}

impl BufferFormat {
    pub const ALL: [BufferFormat; 14] = [
        BufferFormat::Mono8,
        BufferFormat::Mono16,
        BufferFormat::Stereo8,
        BufferFormat::Stereo16,
        BufferFormat::Quad8,
        BufferFormat::Quad16,
        BufferFormat::Surround51Chn8,
        BufferFormat::Surround51Chn16,
        BufferFormat::Surround61Chn8,
        BufferFormat::Surround61Chn16,
        BufferFormat::Surround71Chn8,
        BufferFormat::Surround71Chn16,
        BufferFormat::MonoFloat32,
        BufferFormat::StereoFloat32,
    ];

    /// Backend enum value for this format.
    pub fn code(self) -> i32 {
        match self {
            BufferFormat::Mono8 => 0x1100,
            BufferFormat::Mono16 => 0x1101,
            BufferFormat::Stereo8 => 0x1102,
            BufferFormat::Stereo16 => 0x1103,
            BufferFormat::Quad8 => 0x1204,
            BufferFormat::Quad16 => 0x1205,
            BufferFormat::Surround51Chn8 => 0x120A,
            BufferFormat::Surround51Chn16 => 0x120B,
            BufferFormat::Surround61Chn8 => 0x120D,
            BufferFormat::Surround61Chn16 => 0x120E,
            BufferFormat::Surround71Chn8 => 0x1210,
            BufferFormat::Surround71Chn16 => 0x1211,
            BufferFormat::MonoFloat32 => 0x10010,
            BufferFormat::StereoFloat32 => 0x10011,
        }
    }

    /// Enum name the backend resolves this format by.
    pub fn name(self) -> &'static str {
        match self {
            BufferFormat::Mono8 => "AL_FORMAT_MONO8",
            BufferFormat::Mono16 => "AL_FORMAT_MONO16",
            BufferFormat::Stereo8 => "AL_FORMAT_STEREO8",
            BufferFormat::Stereo16 => "AL_FORMAT_STEREO16",
            BufferFormat::Quad8 => "AL_FORMAT_QUAD8",
            BufferFormat::Quad16 => "AL_FORMAT_QUAD16",
            BufferFormat::Surround51Chn8 => "AL_FORMAT_51CHN8",
            BufferFormat::Surround51Chn16 => "AL_FORMAT_51CHN16",
            BufferFormat::Surround61Chn8 => "AL_FORMAT_61CHN8",
            BufferFormat::Surround61Chn16 => "AL_FORMAT_61CHN16",
            BufferFormat::Surround71Chn8 => "AL_FORMAT_71CHN8",
            BufferFormat::Surround71Chn16 => "AL_FORMAT_71CHN16",
            BufferFormat::MonoFloat32 => "AL_FORMAT_MONO_FLOAT32",
            BufferFormat::StereoFloat32 => "AL_FORMAT_STEREO_FLOAT32",
        }
    }

    pub fn channels(self) -> u16 {
        match self {
            BufferFormat::Mono8 | BufferFormat::Mono16 | BufferFormat::MonoFloat32 => 1,
            BufferFormat::Stereo8 | BufferFormat::Stereo16 | BufferFormat::StereoFloat32 => 2,
            BufferFormat::Quad8 | BufferFormat::Quad16 => 4,
            BufferFormat::Surround51Chn8 | BufferFormat::Surround51Chn16 => 6,
            BufferFormat::Surround61Chn8 | BufferFormat::Surround61Chn16 => 7,
            BufferFormat::Surround71Chn8 | BufferFormat::Surround71Chn16 => 8,
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            BufferFormat::Mono8
            | BufferFormat::Stereo8
            | BufferFormat::Quad8
            | BufferFormat::Surround51Chn8
            | BufferFormat::Surround61Chn8
            | BufferFormat::Surround71Chn8 => 8,
            BufferFormat::MonoFloat32 | BufferFormat::StereoFloat32 => 32,
            _ => 16,
        }
    }

    /// Bytes per interleaved frame.
    pub fn frame_size(self) -> usize {
        self.channels() as usize * (self.bits() as usize / 8)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|format| format.name() == name)
    }
}

/// Integer buffer properties.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BufferParam {
    Frequency,
    Bits,
    Channels,
    Size,
}

/// Three-component listener properties.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ListenerParam {
    Position,
    Velocity,
}

/// Trait implemented by audio device backends.
///
/// Methods take `&self`; implementations keep their state behind interior
/// mutability so one backend can be shared between a session and the code
/// that owns buffer ids. The error flag follows get-and-clear semantics: the
/// first error raised since the last [`AudioBackend::take_error`] is kept.
pub trait AudioBackend: Send + Sync {
    /// Open a device by name, or the default device when `name` is `None`.
    fn open_device(&self, name: Option<&str>) -> Option<DeviceId>;
    /// Close a device. Fails while contexts on it are still alive.
    fn close_device(&self, device: DeviceId) -> bool;
    /// Human-readable device name.
    fn device_specifier(&self, device: DeviceId) -> Option<String>;

    fn create_context(&self, device: DeviceId) -> Option<ContextId>;
    /// Make `context` current, or clear the current context with `None`.
    fn make_context_current(&self, context: Option<ContextId>) -> bool;
    fn current_context(&self) -> Option<ContextId>;
    fn destroy_context(&self, context: ContextId);

    fn gen_buffers(&self, count: usize) -> Vec<BufferId>;
    fn delete_buffers(&self, buffers: &[BufferId]);
    fn is_buffer(&self, buffer: BufferId) -> bool;
    /// Upload interleaved little-endian sample bytes into a buffer slot.
    fn buffer_data(&self, buffer: BufferId, format: BufferFormat, data: &[u8], frequency: i32);
    /// Query an integer buffer property. Returns 0 when the query fails.
    fn buffer_param(&self, buffer: BufferId, param: BufferParam) -> i32;

    fn set_listener3f(&self, param: ListenerParam, value: [f32; 3]);
    fn listener3f(&self, param: ListenerParam) -> [f32; 3];

    /// Resolve a format by its enum name. `None` if the backend lacks it.
    fn format_by_name(&self, name: &str) -> Option<BufferFormat>;

    /// Read and clear the error flag.
    fn take_error(&self) -> Option<BackendError>;
}

/// Run `op` with the backend error flag cleared beforehand and checked after.
///
/// Any error left pending by earlier calls is discarded first, so the result
/// reflects only what `op` did.
pub fn checked<B, T>(backend: &B, op: impl FnOnce(&B) -> T) -> Result<T, BackendError>
where
    B: AudioBackend + ?Sized,
{
    let _ = backend.take_error();
    let value = op(backend);
    match backend.take_error() {
        None => Ok(value),
        Some(err) => Err(err),
    }
}

pub mod software;
pub use software::{BackendStats, SoftwareBackend, SoftwareBackendBuilder};

#[cfg(not(target_os = "android"))]
mod cpal;
#[cfg(not(target_os = "android"))]
pub use self::cpal::CpalBackend;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_ids_reject_zero() {
        assert!(BufferId::from_raw(0).is_none());
        assert_eq!(BufferId::from_raw(7).map(BufferId::raw), Some(7));
    }

    #[test]
    fn test_buffer_format_lookup() {
        assert_eq!(
            BufferFormat::from_name("AL_FORMAT_MONO8"),
            Some(BufferFormat::Mono8)
        );
        assert_eq!(BufferFormat::from_name("AL_FORMAT_BOGUS"), None);
        assert_eq!(BufferFormat::Surround51Chn16.frame_size(), 12);
        assert_eq!(BufferFormat::StereoFloat32.frame_size(), 8);
    }

    #[test]
    fn test_backend_error_codes() {
        for err in [
            BackendError::InvalidName,
            BackendError::InvalidEnum,
            BackendError::InvalidValue,
            BackendError::InvalidOperation,
            BackendError::OutOfMemory,
        ] {
            assert_eq!(BackendError::from_code(err.code()), Some(err));
        }
        assert_eq!(BackendError::from_code(0), None);
    }

    #[test]
    fn test_checked_discards_stale_error() {
        let backend = SoftwareBackend::new();
        let device = backend.open_device(None).unwrap();
        let context = backend.create_context(device).unwrap();
        assert!(backend.make_context_current(Some(context)));

        // Leave an error pending from an unrelated call.
        backend.buffer_param(BufferId::from_raw(999).unwrap(), BufferParam::Size);

        let buffers = backend.gen_buffers(1);
        let result = checked(&backend, |b| b.is_buffer(buffers[0]));
        assert_eq!(result, Ok(true));

        let result = checked(&backend, |b| {
            b.buffer_param(BufferId::from_raw(999).unwrap(), BufferParam::Size)
        });
        assert_eq!(result, Err(BackendError::InvalidName));
    }
}
