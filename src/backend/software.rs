use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{
    AudioBackend, BackendError, BufferFormat, BufferId, BufferParam, ContextId, DeviceId,
    ListenerParam,
};

const DEFAULT_DEVICE: &str = "Software Mixer";

/// Counters of lifecycle calls that reached the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub devices_opened: u32,
    pub devices_closed: u32,
    pub contexts_created: u32,
    pub contexts_destroyed: u32,
    pub current_context_changes: u32,
}

#[derive(Debug, Default, Clone, Copy)]
struct Listener {
    position: [f32; 3],
    velocity: [f32; 3],
}

#[derive(Debug)]
struct ContextSlot {
    device: DeviceId,
    listener: Listener,
}

#[derive(Debug, Default)]
struct BufferSlot {
    format: Option<BufferFormat>,
    data: Vec<u8>,
    frequency: i32,
}

#[derive(Debug)]
struct State {
    available_devices: Vec<String>,
    formats: Vec<BufferFormat>,
    fail_context_creation: bool,
    fail_make_current: bool,

    devices: HashMap<DeviceId, String>,
    contexts: HashMap<ContextId, ContextSlot>,
    current: Option<ContextId>,
    buffers: HashMap<BufferId, BufferSlot>,
    error: Option<BackendError>,
    next_handle: u32,
    stats: BackendStats,
}

impl State {
    fn raise(&mut self, err: BackendError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn next_raw(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Raises `InvalidOperation` and returns false when no context is current.
    fn require_context(&mut self) -> bool {
        if self.current.is_none() {
            self.raise(BackendError::InvalidOperation);
            return false;
        }
        true
    }
}

/// In-process audio backend.
///
/// Keeps device, context, buffer and listener state in memory with the same
/// rules a native device library applies: buffer and listener calls need a
/// current context, invalid handles raise `InvalidName`, and the error flag
/// keeps the first error until it is read. Used for tests, headless runs and
/// as the state store behind [`super::CpalBackend`].
pub struct SoftwareBackend {
    state: Mutex<State>,
}

/// Builder for [`SoftwareBackend`] with fault injection.
pub struct SoftwareBackendBuilder {
    devices: Vec<String>,
    formats: Vec<BufferFormat>,
    fail_context_creation: bool,
    fail_make_current: bool,
}

impl SoftwareBackendBuilder {
    /// Replace the list of devices that can be opened.
    pub fn devices<I, S>(mut self, devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.devices = devices.into_iter().map(Into::into).collect();
        self
    }

    /// No device can be opened.
    pub fn without_devices(mut self) -> Self {
        self.devices.clear();
        self
    }

    /// Only the four core mono/stereo 8/16-bit formats resolve by name.
    pub fn core_formats_only(mut self) -> Self {
        self.formats = vec![
            BufferFormat::Mono8,
            BufferFormat::Mono16,
            BufferFormat::Stereo8,
            BufferFormat::Stereo16,
        ];
        self
    }

    pub fn fail_context_creation(mut self) -> Self {
        self.fail_context_creation = true;
        self
    }

    pub fn fail_make_current(mut self) -> Self {
        self.fail_make_current = true;
        self
    }

    pub fn build(self) -> SoftwareBackend {
        SoftwareBackend {
            state: Mutex::new(State {
                available_devices: self.devices,
                formats: self.formats,
                fail_context_creation: self.fail_context_creation,
                fail_make_current: self.fail_make_current,
                devices: HashMap::new(),
                contexts: HashMap::new(),
                current: None,
                buffers: HashMap::new(),
                error: None,
                next_handle: 0,
                stats: BackendStats::default(),
            }),
        }
    }
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> SoftwareBackendBuilder {
        SoftwareBackendBuilder {
            devices: vec![DEFAULT_DEVICE.to_string()],
            formats: BufferFormat::ALL.to_vec(),
            fail_context_creation: false,
            fail_make_current: false,
        }
    }

    /// Snapshot of lifecycle counters.
    pub fn stats(&self) -> BackendStats {
        self.lock().stats.clone()
    }

    /// Raw bytes currently stored in a buffer slot.
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.lock().buffers.get(&buffer).map(|slot| slot.data.clone())
    }

    /// Number of devices currently open.
    pub fn open_device_count(&self) -> usize {
        self.lock().devices.len()
    }

    /// Number of contexts currently alive.
    pub fn context_count(&self) -> usize {
        self.lock().contexts.len()
    }

    /// Register an already-resolved device and open it under `specifier`.
    pub(crate) fn attach_device(&self, specifier: String) -> DeviceId {
        let mut state = self.lock();
        let id = new_id(&mut state, DeviceId::from_raw);
        state.devices.insert(id, specifier);
        state.stats.devices_opened += 1;
        id
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn new_id<T>(state: &mut State, make: fn(u32) -> Option<T>) -> T {
    loop {
        // Handle values never wrap back to zero in practice; skip it if they do.
        if let Some(id) = make(state.next_raw()) {
            return id;
        }
    }
}

impl AudioBackend for SoftwareBackend {
    fn open_device(&self, name: Option<&str>) -> Option<DeviceId> {
        let mut state = self.lock();
        let specifier = match name {
            None => state.available_devices.first().cloned(),
            Some(name) => state
                .available_devices
                .iter()
                .find(|candidate| candidate.as_str() == name)
                .cloned(),
        }?;

        let id = new_id(&mut state, DeviceId::from_raw);
        state.devices.insert(id, specifier);
        state.stats.devices_opened += 1;
        Some(id)
    }

    fn close_device(&self, device: DeviceId) -> bool {
        let mut state = self.lock();
        if !state.devices.contains_key(&device) {
            return false;
        }
        if state.contexts.values().any(|ctx| ctx.device == device) {
            return false;
        }
        state.devices.remove(&device);
        state.stats.devices_closed += 1;
        true
    }

    fn device_specifier(&self, device: DeviceId) -> Option<String> {
        self.lock().devices.get(&device).cloned()
    }

    fn create_context(&self, device: DeviceId) -> Option<ContextId> {
        let mut state = self.lock();
        if !state.devices.contains_key(&device) || state.fail_context_creation {
            return None;
        }
        let id = new_id(&mut state, ContextId::from_raw);
        state.contexts.insert(
            id,
            ContextSlot {
                device,
                listener: Listener::default(),
            },
        );
        state.stats.contexts_created += 1;
        Some(id)
    }

    fn make_context_current(&self, context: Option<ContextId>) -> bool {
        let mut state = self.lock();
        match context {
            None => {
                state.current = None;
            }
            Some(id) => {
                if state.fail_make_current || !state.contexts.contains_key(&id) {
                    return false;
                }
                state.current = Some(id);
            }
        }
        state.stats.current_context_changes += 1;
        true
    }

    fn current_context(&self) -> Option<ContextId> {
        self.lock().current
    }

    fn destroy_context(&self, context: ContextId) {
        let mut state = self.lock();
        if !state.contexts.contains_key(&context) {
            state.raise(BackendError::InvalidName);
            return;
        }
        if state.current == Some(context) {
            state.raise(BackendError::InvalidOperation);
            return;
        }
        state.contexts.remove(&context);
        state.stats.contexts_destroyed += 1;
    }

    fn gen_buffers(&self, count: usize) -> Vec<BufferId> {
        let mut state = self.lock();
        if !state.require_context() {
            return Vec::new();
        }
        (0..count)
            .map(|_| {
                let id = new_id(&mut state, BufferId::from_raw);
                state.buffers.insert(id, BufferSlot::default());
                id
            })
            .collect()
    }

    fn delete_buffers(&self, buffers: &[BufferId]) {
        let mut state = self.lock();
        if !state.require_context() {
            return;
        }
        if buffers.iter().any(|id| !state.buffers.contains_key(id)) {
            state.raise(BackendError::InvalidName);
            return;
        }
        for id in buffers {
            state.buffers.remove(id);
        }
    }

    fn is_buffer(&self, buffer: BufferId) -> bool {
        self.lock().buffers.contains_key(&buffer)
    }

    fn buffer_data(&self, buffer: BufferId, format: BufferFormat, data: &[u8], frequency: i32) {
        let mut state = self.lock();
        if !state.require_context() {
            return;
        }
        if !state.formats.contains(&format) {
            state.raise(BackendError::InvalidEnum);
            return;
        }
        if frequency <= 0 || data.len() % format.frame_size() != 0 {
            state.raise(BackendError::InvalidValue);
            return;
        }
        let Some(slot) = state.buffers.get_mut(&buffer) else {
            state.raise(BackendError::InvalidName);
            return;
        };
        slot.format = Some(format);
        slot.data = data.to_vec();
        slot.frequency = frequency;
    }

    fn buffer_param(&self, buffer: BufferId, param: BufferParam) -> i32 {
        let mut state = self.lock();
        if !state.require_context() {
            return 0;
        }
        let Some(slot) = state.buffers.get(&buffer) else {
            state.raise(BackendError::InvalidName);
            return 0;
        };
        match param {
            BufferParam::Frequency => slot.frequency,
            BufferParam::Bits => slot.format.map_or(0, |f| i32::from(f.bits())),
            BufferParam::Channels => slot.format.map_or(0, |f| i32::from(f.channels())),
            BufferParam::Size => i32::try_from(slot.data.len()).unwrap_or(i32::MAX),
        }
    }

    fn set_listener3f(&self, param: ListenerParam, value: [f32; 3]) {
        let mut state = self.lock();
        if !state.require_context() {
            return;
        }
        let Some(current) = state.current else {
            return;
        };
        if let Some(ctx) = state.contexts.get_mut(&current) {
            match param {
                ListenerParam::Position => ctx.listener.position = value,
                ListenerParam::Velocity => ctx.listener.velocity = value,
            }
        }
    }

    fn listener3f(&self, param: ListenerParam) -> [f32; 3] {
        let mut state = self.lock();
        if !state.require_context() {
            return [0.0; 3];
        }
        let listener = state
            .current
            .and_then(|id| state.contexts.get(&id))
            .map(|ctx| ctx.listener)
            .unwrap_or_default();
        match param {
            ListenerParam::Position => listener.position,
            ListenerParam::Velocity => listener.velocity,
        }
    }

    fn format_by_name(&self, name: &str) -> Option<BufferFormat> {
        let format = BufferFormat::from_name(name)?;
        self.lock().formats.contains(&format).then_some(format)
    }

    fn take_error(&self) -> Option<BackendError> {
        self.lock().error.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_current_context() -> SoftwareBackend {
        let backend = SoftwareBackend::new();
        let device = backend.open_device(None).unwrap();
        let context = backend.create_context(device).unwrap();
        assert!(backend.make_context_current(Some(context)));
        backend
    }

    #[test]
    fn test_default_device_is_software_mixer() {
        let backend = SoftwareBackend::new();
        let device = backend.open_device(None).unwrap();
        assert_eq!(
            backend.device_specifier(device).as_deref(),
            Some(DEFAULT_DEVICE)
        );
        assert!(backend.open_device(Some("Missing Device")).is_none());
    }

    #[test]
    fn test_close_device_refused_while_context_alive() {
        let backend = SoftwareBackend::new();
        let device = backend.open_device(None).unwrap();
        let context = backend.create_context(device).unwrap();

        assert!(!backend.close_device(device));
        backend.destroy_context(context);
        assert!(backend.close_device(device));
        assert!(!backend.close_device(device));
        assert_eq!(backend.stats().devices_closed, 1);
    }

    #[test]
    fn test_destroying_current_context_is_refused() {
        let backend = SoftwareBackend::new();
        let device = backend.open_device(None).unwrap();
        let context = backend.create_context(device).unwrap();
        assert!(backend.make_context_current(Some(context)));

        backend.destroy_context(context);
        assert_eq!(backend.take_error(), Some(BackendError::InvalidOperation));
        assert_eq!(backend.context_count(), 1);

        assert!(backend.make_context_current(None));
        backend.destroy_context(context);
        assert_eq!(backend.take_error(), None);
        assert_eq!(backend.context_count(), 0);
    }

    #[test]
    fn test_buffer_ops_need_current_context() {
        let backend = SoftwareBackend::new();
        assert!(backend.gen_buffers(2).is_empty());
        assert_eq!(backend.take_error(), Some(BackendError::InvalidOperation));

        backend.set_listener3f(ListenerParam::Position, [1.0, 2.0, 3.0]);
        assert_eq!(backend.take_error(), Some(BackendError::InvalidOperation));
    }

    #[test]
    fn test_error_flag_keeps_first_error() {
        let backend = with_current_context();
        let buffer = backend.gen_buffers(1)[0];
        let missing = BufferId::from_raw(4242).unwrap();

        backend.buffer_data(buffer, BufferFormat::Mono16, &[0u8; 3], 8000);
        backend.buffer_param(missing, BufferParam::Size);

        assert_eq!(backend.take_error(), Some(BackendError::InvalidValue));
        assert_eq!(backend.take_error(), None);
    }

    #[test]
    fn test_buffer_data_and_queries() {
        let backend = with_current_context();
        let buffer = backend.gen_buffers(1)[0];

        backend.buffer_data(buffer, BufferFormat::Stereo16, &[0u8; 400], 22050);
        assert_eq!(backend.take_error(), None);
        assert_eq!(backend.buffer_param(buffer, BufferParam::Size), 400);
        assert_eq!(backend.buffer_param(buffer, BufferParam::Bits), 16);
        assert_eq!(backend.buffer_param(buffer, BufferParam::Channels), 2);
        assert_eq!(backend.buffer_param(buffer, BufferParam::Frequency), 22050);
    }

    #[test]
    fn test_failed_upload_leaves_slot_unchanged() {
        let backend = with_current_context();
        let buffer = backend.gen_buffers(1)[0];
        backend.buffer_data(buffer, BufferFormat::Mono8, &[1, 2, 3], 8000);

        backend.buffer_data(buffer, BufferFormat::Mono8, &[9, 9], 0);
        assert_eq!(backend.take_error(), Some(BackendError::InvalidValue));
        assert_eq!(backend.buffer_contents(buffer), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_core_formats_only_hides_extensions() {
        let backend = SoftwareBackend::builder().core_formats_only().build();
        assert_eq!(
            backend.format_by_name("AL_FORMAT_MONO16"),
            Some(BufferFormat::Mono16)
        );
        assert_eq!(backend.format_by_name("AL_FORMAT_QUAD16"), None);
    }

    #[test]
    fn test_listener_state_is_per_context() {
        let backend = with_current_context();
        backend.set_listener3f(ListenerParam::Velocity, [0.5, 0.0, -1.0]);
        assert_eq!(
            backend.listener3f(ListenerParam::Velocity),
            [0.5, 0.0, -1.0]
        );
        assert_eq!(backend.listener3f(ListenerParam::Position), [0.0; 3]);
    }

    #[test]
    fn test_delete_buffers_is_all_or_nothing() {
        let backend = with_current_context();
        let buffers = backend.gen_buffers(2);
        let missing = BufferId::from_raw(9999).unwrap();

        backend.delete_buffers(&[buffers[0], missing]);
        assert_eq!(backend.take_error(), Some(BackendError::InvalidName));
        assert!(backend.is_buffer(buffers[0]));

        backend.delete_buffers(&buffers);
        assert!(!backend.is_buffer(buffers[0]));
        assert!(!backend.is_buffer(buffers[1]));
    }
}
