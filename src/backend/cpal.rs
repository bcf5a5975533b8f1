//! CPAL-based device resolution for desktop platforms (Linux, macOS, Windows)
//!
//! Devices are looked up through the host audio API so `open_device` fails the
//! same way a native library does when no output hardware is present. Context,
//! buffer and listener state is kept by an embedded [`SoftwareBackend`].

use cpal::traits::{DeviceTrait, HostTrait};

use super::{
    AudioBackend, BackendError, BufferFormat, BufferId, BufferParam, ContextId, DeviceId,
    ListenerParam, SoftwareBackend,
};

/// Backend that resolves output devices through CPAL
pub struct CpalBackend {
    inner: SoftwareBackend,
}

impl CpalBackend {
    /// Create a backend that queries the platform's default host
    pub fn new() -> Self {
        Self {
            inner: SoftwareBackend::builder().without_devices().build(),
        }
    }

    fn resolve(&self, name: Option<&str>) -> Option<String> {
        let host = cpal::default_host();
        let device = match name {
            None => host.default_output_device(),
            Some(wanted) => host
                .output_devices()
                .ok()?
                .find(|device| device.name().map(|n| n == wanted).unwrap_or(false)),
        }?;

        // A device without a usable output config cannot render anything.
        if let Err(err) = device.default_output_config() {
            log::warn!("[CpalBackend] Output device has no usable config: {}", err);
            return None;
        }

        Some(device.name().unwrap_or_else(|_| "Unknown Output Device".to_string()))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn open_device(&self, name: Option<&str>) -> Option<DeviceId> {
        let specifier = self.resolve(name)?;
        log::info!("[CpalBackend] Resolved output device '{}'", specifier);
        Some(self.inner.attach_device(specifier))
    }

    fn close_device(&self, device: DeviceId) -> bool {
        self.inner.close_device(device)
    }

    fn device_specifier(&self, device: DeviceId) -> Option<String> {
        self.inner.device_specifier(device)
    }

    fn create_context(&self, device: DeviceId) -> Option<ContextId> {
        self.inner.create_context(device)
    }

    fn make_context_current(&self, context: Option<ContextId>) -> bool {
        self.inner.make_context_current(context)
    }

    fn current_context(&self) -> Option<ContextId> {
        self.inner.current_context()
    }

    fn destroy_context(&self, context: ContextId) {
        self.inner.destroy_context(context)
    }

    fn gen_buffers(&self, count: usize) -> Vec<BufferId> {
        self.inner.gen_buffers(count)
    }

    fn delete_buffers(&self, buffers: &[BufferId]) {
        self.inner.delete_buffers(buffers)
    }

    fn is_buffer(&self, buffer: BufferId) -> bool {
        self.inner.is_buffer(buffer)
    }

    fn buffer_data(&self, buffer: BufferId, format: BufferFormat, data: &[u8], frequency: i32) {
        self.inner.buffer_data(buffer, format, data, frequency)
    }

    fn buffer_param(&self, buffer: BufferId, param: BufferParam) -> i32 {
        self.inner.buffer_param(buffer, param)
    }

    fn set_listener3f(&self, param: ListenerParam, value: [f32; 3]) {
        self.inner.set_listener3f(param, value)
    }

    fn listener3f(&self, param: ListenerParam) -> [f32; 3] {
        self.inner.listener3f(param)
    }

    fn format_by_name(&self, name: &str) -> Option<BufferFormat> {
        self.inner.format_by_name(name)
    }

    fn take_error(&self) -> Option<BackendError> {
        self.inner.take_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires an audio output device"]
    fn test_default_output_device_opens() {
        let backend = CpalBackend::new();
        let device = backend
            .open_device(None)
            .expect("default output device should resolve");

        let specifier = backend.device_specifier(device).unwrap();
        assert!(!specifier.is_empty());

        let context = backend.create_context(device).unwrap();
        assert!(backend.make_context_current(Some(context)));
        assert!(backend.make_context_current(None));
        backend.destroy_context(context);
        assert!(backend.close_device(device));
    }

    #[test]
    #[ignore = "queries the host audio API"]
    fn test_unknown_device_name_is_not_opened() {
        let backend = CpalBackend::new();
        assert!(backend.open_device(Some("no such device")).is_none());
        assert_eq!(backend.inner.open_device_count(), 0);
    }
}
