// AudioSession: owns one device, one context, one wave decoder and one log
//
// Every operation is synchronous and single-threaded. Failures are logged to
// the session log and returned; buffer duration queries use a 0.0 sentinel.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::backend::{
    checked, AudioBackend, BufferId, BufferParam, ContextId, DeviceId, ListenerParam,
};
use crate::config::SessionConfig;
use crate::debug_log::SessionLog;
use crate::error::{AudioError, ErrorCode};
use crate::wave::WaveLoader;

/// Lifecycle of a session. There is no way back from `CleanedUp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    CleanedUp,
}

/// Exclusive owner of a device, its rendering context, a wave decoder and a
/// diagnostic log.
///
/// Buffer ids are not owned: callers generate them on the backend and pass
/// them in. Dropping the session runs [`AudioSession::clean_up`].
///
/// # Example
/// ```ignore
/// let backend = Arc::new(SoftwareBackend::new());
/// let mut session = AudioSession::new(Arc::clone(&backend), SessionConfig::default());
/// session.initialize()?;
/// let buffer = backend.gen_buffers(1)[0];
/// session.load_wave_audio("click.wav", buffer)?;
/// let seconds = session.buffer_length(buffer);
/// ```
pub struct AudioSession<B: AudioBackend> {
    backend: Arc<B>,
    config: SessionConfig,
    device: Option<DeviceId>,
    context: Option<ContextId>,
    wave_loader: Option<WaveLoader>,
    log: SessionLog,
    state: SessionState,
}

impl<B: AudioBackend> AudioSession<B> {
    /// Open the diagnostic log and create the wave decoder.
    ///
    /// No device is touched until [`AudioSession::initialize`].
    pub fn new(backend: Arc<B>, config: SessionConfig) -> Self {
        let log = SessionLog::open(&config.log_path, config.append_log, config.max_log_level());
        let wave_loader = WaveLoader::new();
        log.emit(|| debug!("wave loader created"));

        Self {
            backend,
            config,
            device: None,
            context: None,
            wave_loader: Some(wave_loader),
            log,
            state: SessionState::Uninitialized,
        }
    }

    /// Open the configured device, create a context on it and make it current.
    ///
    /// Single attempt. On failure everything acquired so far is released
    /// before returning, so device and context are either both held or both
    /// absent.
    ///
    /// # Errors
    /// - `AlreadyInitialized` / `SessionClosed` for lifecycle misuse
    /// - `DeviceUnavailable` if no device could be opened
    /// - `ContextCreationFailed` if the device rejected context creation
    /// - `MakeCurrentFailed` if the context could not be made current
    pub fn initialize(&mut self) -> Result<(), AudioError> {
        match self.state {
            SessionState::Initialized => return Err(self.fail(AudioError::AlreadyInitialized)),
            SessionState::CleanedUp => return Err(self.fail(AudioError::SessionClosed)),
            SessionState::Uninitialized => {}
        }

        let requested = self.config.device_name.clone();
        let Some(device) = self.backend.open_device(requested.as_deref()) else {
            return Err(self.fail(AudioError::DeviceUnavailable { requested }));
        };

        let specifier = self
            .backend
            .device_specifier(device)
            .unwrap_or_else(|| device.to_string());
        self.log
            .emit(|| info!(device = %specifier, "audio device created"));

        let Some(context) = self.backend.create_context(device) else {
            self.backend.close_device(device);
            return Err(self.fail(AudioError::ContextCreationFailed { device: specifier }));
        };

        if !self.backend.make_context_current(Some(context)) {
            self.backend.destroy_context(context);
            self.backend.close_device(device);
            return Err(self.fail(AudioError::MakeCurrentFailed));
        }

        self.device = Some(device);
        self.context = Some(context);
        self.state = SessionState::Initialized;
        self.log
            .emit(|| info!(context = context.raw(), "context created"));
        Ok(())
    }

    /// Decode a wave file and upload it into `buffer`.
    ///
    /// The decoder's handle for the file is released before returning on
    /// every path. On failure `buffer` keeps its previous contents.
    ///
    /// # Errors
    /// - `DecoderUnavailable` if the session has no decoder (after clean-up)
    /// - `WaveOpenFailed` if the file cannot be opened or parsed
    /// - `WaveDataUnavailable` if size, data, frequency or format is unavailable
    /// - `BufferUploadFailed` if the backend rejected the upload
    pub fn load_wave_audio(
        &mut self,
        file_path: impl AsRef<Path>,
        buffer: BufferId,
    ) -> Result<(), AudioError> {
        let file_path = file_path.as_ref();
        let display_path = file_path.display().to_string();
        let backend = &*self.backend;
        let log = &self.log;

        let Some(loader) = self.wave_loader.as_mut() else {
            return Err(AudioError::DecoderUnavailable);
        };

        let wave = match loader.open_scoped(file_path) {
            Ok(wave) => wave,
            Err(err) => {
                log.emit(|| error!(file = %display_path, reason = %err, "not able to load audio file"));
                return Err(AudioError::WaveOpenFailed {
                    path: display_path,
                    reason: err.to_string(),
                });
            }
        };

        let decoded = (
            wave.size(),
            wave.data(),
            wave.frequency(),
            wave.buffer_format(|name| backend.format_by_name(name)),
        );
        let (size, data, frequency, format) = match decoded {
            (Ok(size), Ok(data), Ok(frequency), Ok(format)) => {
                match (data.get(..size), i32::try_from(frequency)) {
                    (Some(data), Ok(frequency)) => (size, data, frequency, format),
                    _ => return Err(wave_data_unavailable(log, display_path)),
                }
            }
            _ => return Err(wave_data_unavailable(log, display_path)),
        };
        log.emit(|| info!(format = format.code(), format_name = format.name(), "buffer format"));

        match checked(backend, |b| b.buffer_data(buffer, format, data, frequency)) {
            Ok(()) => {
                log.emit(|| {
                    info!(
                        file = %display_path,
                        buffer = buffer.raw(),
                        bytes = size as u64,
                        frequency,
                        "wav file loaded"
                    )
                });
                Ok(())
            }
            Err(err) => {
                log.emit(|| {
                    error!(
                        file = %display_path,
                        error = err.code(),
                        "not able to load audio data"
                    )
                });
                Err(AudioError::BufferUploadFailed {
                    path: display_path,
                    backend_code: err.code(),
                })
            }
        }
    }

    /// Set the backend listener position. No validation.
    pub fn set_listener_position(&self, x: f32, y: f32, z: f32) {
        self.backend
            .set_listener3f(ListenerParam::Position, [x, y, z]);
    }

    /// Set the backend listener velocity. No validation.
    pub fn set_listener_velocity(&self, x: f32, y: f32, z: f32) {
        self.backend
            .set_listener3f(ListenerParam::Velocity, [x, y, z]);
    }

    /// Duration of the audio in `buffer`, in seconds.
    ///
    /// Returns `0.0` if the backend reports an error for any of the property
    /// queries (unknown buffer, no current context) or if the buffer holds no
    /// data yet.
    pub fn buffer_length(&self, buffer: BufferId) -> f32 {
        let queried = checked(&*self.backend, |b| {
            (
                b.buffer_param(buffer, BufferParam::Size),
                b.buffer_param(buffer, BufferParam::Bits),
                b.buffer_param(buffer, BufferParam::Channels),
                b.buffer_param(buffer, BufferParam::Frequency),
            )
        });

        let (size, bits, channels, frequency) = match queried {
            Ok(values) => values,
            Err(err) => {
                self.log.emit(|| {
                    debug!(buffer = buffer.raw(), error = err.code(), "buffer length query failed")
                });
                return 0.0;
            }
        };

        let bytes_per_sample = bits / 8;
        if size <= 0 || channels <= 0 || bytes_per_sample <= 0 || frequency <= 0 {
            return 0.0;
        }

        let frames = size / channels / bytes_per_sample;
        frames as f32 / frequency as f32
    }

    /// Release context, device, decoder and log, in that order.
    ///
    /// Each step only runs if its resource is still held, so calling this
    /// more than once is harmless. The session cannot be initialized again.
    pub fn clean_up(&mut self) {
        if let Some(context) = self.context.take() {
            if self.backend.current_context() == Some(context) {
                self.backend.make_context_current(None);
            }
            self.backend.destroy_context(context);
        }

        if let Some(device) = self.device.take() {
            if !self.backend.close_device(device) {
                self.log
                    .emit(|| warn!(device = device.raw(), "device reported close failure"));
            }
        }

        if self.wave_loader.take().is_some() {
            self.log.emit(|| info!("wave loader released, audio device destroyed"));
        }

        self.log.close();
        self.state = SessionState::CleanedUp;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == SessionState::Initialized
    }

    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    pub fn context(&self) -> Option<ContextId> {
        self.context
    }

    pub fn has_decoder(&self) -> bool {
        self.wave_loader.is_some()
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    /// Log `err` to the session log and hand it back for returning.
    fn fail(&self, err: AudioError) -> AudioError {
        self.log
            .emit(|| error!(code = err.code(), "{}", err.message()));
        err
    }
}

impl<B: AudioBackend> Drop for AudioSession<B> {
    fn drop(&mut self) {
        self.clean_up();
    }
}

fn wave_data_unavailable(log: &SessionLog, path: String) -> AudioError {
    log.emit(|| error!(file = %path, "not able to load wav data"));
    AudioError::WaveDataUnavailable { path }
}
