//! Wave-file decoder with per-file handles.
//!
//! [`WaveLoader`] parses RIFF/WAVE files with `hound` and keeps the decoded
//! sample bytes under a [`WaveId`] until the handle is deleted. Samples are
//! stored exactly as a device buffer expects them: interleaved little-endian,
//! with 8-bit PCM unsigned.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use crate::backend::BufferFormat;

/// Maximum number of wave handles open at once
pub const MAX_OPEN_WAVES: usize = 1024;

/// Handle to a decoded wave held by a [`WaveLoader`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct WaveId(NonZeroU32);

impl fmt::Display for WaveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wave decoder errors
#[derive(Debug, Clone, PartialEq)]
pub enum WaveError {
    /// File missing, unreadable, or not a valid RIFF/WAVE stream
    BadWaveFile { path: PathBuf, reason: String },

    /// Sample layout the decoder or the backend cannot represent
    UnsupportedFormat {
        channels: u16,
        bits_per_sample: u16,
        float: bool,
    },

    /// Handle was never issued or was already deleted
    InvalidWaveId,

    /// [`MAX_OPEN_WAVES`] handles are already open
    TooManyWaves,
}

impl fmt::Display for WaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaveError::BadWaveFile { path, reason } => {
                write!(f, "bad wave file {}: {}", path.display(), reason)
            }
            WaveError::UnsupportedFormat {
                channels,
                bits_per_sample,
                float,
            } => write!(
                f,
                "unsupported wave format: {} channels, {} bits{}",
                channels,
                bits_per_sample,
                if *float { " float" } else { "" }
            ),
            WaveError::InvalidWaveId => write!(f, "invalid wave id"),
            WaveError::TooManyWaves => {
                write!(f, "too many open waves (max {})", MAX_OPEN_WAVES)
            }
        }
    }
}

impl std::error::Error for WaveError {}

#[derive(Debug)]
struct DecodedWave {
    bytes: Vec<u8>,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    float: bool,
}

/// Decoder holding every wave opened through it until deleted
#[derive(Debug, Default)]
pub struct WaveLoader {
    waves: HashMap<WaveId, DecodedWave>,
    next_id: u32,
}

impl WaveLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles currently open
    pub fn open_count(&self) -> usize {
        self.waves.len()
    }

    /// Parse a wave file and keep its decoded samples under a new handle.
    pub fn load_wave_file(&mut self, path: impl AsRef<Path>) -> Result<WaveId, WaveError> {
        let path = path.as_ref();
        if self.waves.len() >= MAX_OPEN_WAVES {
            return Err(WaveError::TooManyWaves);
        }

        let wave = decode(path)?;
        log::debug!(
            "[WaveLoader] Decoded {}: {} Hz, {} ch, {} bits, {} bytes",
            path.display(),
            wave.sample_rate,
            wave.channels,
            wave.bits_per_sample,
            wave.bytes.len()
        );

        let id = self.next_wave_id();
        self.waves.insert(id, wave);
        Ok(id)
    }

    /// Open a wave whose handle is deleted when the guard drops.
    pub fn open_scoped(&mut self, path: impl AsRef<Path>) -> Result<ScopedWave<'_>, WaveError> {
        let id = self.load_wave_file(path)?;
        Ok(ScopedWave { loader: self, id })
    }

    /// Size of the sample data in bytes
    pub fn wave_size(&self, id: WaveId) -> Result<usize, WaveError> {
        self.get(id).map(|wave| wave.bytes.len())
    }

    pub fn wave_data(&self, id: WaveId) -> Result<&[u8], WaveError> {
        self.get(id).map(|wave| wave.bytes.as_slice())
    }

    /// Sample rate in Hz
    pub fn wave_frequency(&self, id: WaveId) -> Result<u32, WaveError> {
        self.get(id).map(|wave| wave.sample_rate)
    }

    /// Resolve the backend buffer format for a wave.
    ///
    /// `lookup` maps a format enum name to the backend's format, the way the
    /// backend's own enum lookup does. Layouts with no format name, or names
    /// the backend does not know, are reported as unsupported.
    pub fn buffer_format<F>(&self, id: WaveId, lookup: F) -> Result<BufferFormat, WaveError>
    where
        F: Fn(&str) -> Option<BufferFormat>,
    {
        let wave = self.get(id)?;
        let unsupported = || WaveError::UnsupportedFormat {
            channels: wave.channels,
            bits_per_sample: wave.bits_per_sample,
            float: wave.float,
        };
        let name = format_name(wave.channels, wave.bits_per_sample, wave.float)
            .ok_or_else(unsupported)?;
        lookup(name).ok_or_else(unsupported)
    }

    /// Release a handle and its sample data.
    pub fn delete_wave_file(&mut self, id: WaveId) -> Result<(), WaveError> {
        self.waves
            .remove(&id)
            .map(|_| ())
            .ok_or(WaveError::InvalidWaveId)
    }

    fn get(&self, id: WaveId) -> Result<&DecodedWave, WaveError> {
        self.waves.get(&id).ok_or(WaveError::InvalidWaveId)
    }

    fn next_wave_id(&mut self) -> WaveId {
        loop {
            self.next_id = self.next_id.wrapping_add(1);
            if let Some(raw) = NonZeroU32::new(self.next_id) {
                let id = WaveId(raw);
                if !self.waves.contains_key(&id) {
                    return id;
                }
            }
        }
    }
}

/// Wave handle scoped to a borrow of its loader
///
/// Queries go through the guard; the handle is deleted on drop, whichever path
/// the caller leaves by.
pub struct ScopedWave<'a> {
    loader: &'a mut WaveLoader,
    id: WaveId,
}

impl ScopedWave<'_> {
    pub fn size(&self) -> Result<usize, WaveError> {
        self.loader.wave_size(self.id)
    }

    pub fn data(&self) -> Result<&[u8], WaveError> {
        self.loader.wave_data(self.id)
    }

    pub fn frequency(&self) -> Result<u32, WaveError> {
        self.loader.wave_frequency(self.id)
    }

    pub fn buffer_format<F>(&self, lookup: F) -> Result<BufferFormat, WaveError>
    where
        F: Fn(&str) -> Option<BufferFormat>,
    {
        self.loader.buffer_format(self.id, lookup)
    }
}

impl Drop for ScopedWave<'_> {
    fn drop(&mut self) {
        let _ = self.loader.delete_wave_file(self.id);
    }
}

fn format_name(channels: u16, bits_per_sample: u16, float: bool) -> Option<&'static str> {
    let name = match (channels, bits_per_sample, float) {
        (1, 8, false) => "AL_FORMAT_MONO8",
        (1, 16, false) => "AL_FORMAT_MONO16",
        (2, 8, false) => "AL_FORMAT_STEREO8",
        (2, 16, false) => "AL_FORMAT_STEREO16",
        (4, 8, false) => "AL_FORMAT_QUAD8",
        (4, 16, false) => "AL_FORMAT_QUAD16",
        (6, 8, false) => "AL_FORMAT_51CHN8",
        (6, 16, false) => "AL_FORMAT_51CHN16",
        (7, 8, false) => "AL_FORMAT_61CHN8",
        (7, 16, false) => "AL_FORMAT_61CHN16",
        (8, 8, false) => "AL_FORMAT_71CHN8",
        (8, 16, false) => "AL_FORMAT_71CHN16",
        (1, 32, true) => "AL_FORMAT_MONO_FLOAT32",
        (2, 32, true) => "AL_FORMAT_STEREO_FLOAT32",
        _ => return None,
    };
    Some(name)
}

fn decode(path: &Path) -> Result<DecodedWave, WaveError> {
    let bad_file = |err: hound::Error| WaveError::BadWaveFile {
        path: path.to_path_buf(),
        reason: err.to_string(),
    };

    let mut reader = hound::WavReader::open(path).map_err(bad_file)?;
    let spec = reader.spec();
    let float = spec.sample_format == hound::SampleFormat::Float;
    let unsupported = WaveError::UnsupportedFormat {
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        float,
    };

    let mut bytes = Vec::with_capacity(reader.len() as usize * (spec.bits_per_sample as usize / 8));
    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 8) => {
            for sample in reader.samples::<i8>() {
                // Device buffers take 8-bit PCM unsigned, as stored on disk.
                bytes.push((sample.map_err(bad_file)? as u8) ^ 0x80);
            }
        }
        (hound::SampleFormat::Int, 16) => {
            for sample in reader.samples::<i16>() {
                bytes.extend_from_slice(&sample.map_err(bad_file)?.to_le_bytes());
            }
        }
        (hound::SampleFormat::Float, 32) => {
            for sample in reader.samples::<f32>() {
                bytes.extend_from_slice(&sample.map_err(bad_file)?.to_le_bytes());
            }
        }
        _ => return Err(unsupported),
    }

    Ok(DecodedWave {
        bytes,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        float,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav(dir: &TempDir, name: &str, spec: hound::WavSpec, frames: usize) -> PathBuf {
        let path = dir.path().join(name);
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..frames * spec.channels as usize {
            match (spec.sample_format, spec.bits_per_sample) {
                (hound::SampleFormat::Int, 8) => writer.write_sample((i % 100) as i8).unwrap(),
                (hound::SampleFormat::Int, 16) => writer.write_sample(i as i16).unwrap(),
                (hound::SampleFormat::Int, _) => writer.write_sample(i as i32).unwrap(),
                (hound::SampleFormat::Float, _) => writer.write_sample(0.25f32).unwrap(),
            }
        }
        writer.finalize().unwrap();
        path
    }

    fn spec(channels: u16, bits: u16, format: hound::SampleFormat) -> hound::WavSpec {
        hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: bits,
            sample_format: format,
        }
    }

    #[test]
    fn test_eight_bit_samples_are_stored_unsigned() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "u8.wav", spec(1, 8, hound::SampleFormat::Int), 4);

        let mut loader = WaveLoader::new();
        let id = loader.load_wave_file(&path).unwrap();

        assert_eq!(loader.wave_size(id), Ok(4));
        assert_eq!(loader.wave_data(id).unwrap(), &[0x80, 0x81, 0x82, 0x83]);
        assert_eq!(loader.wave_frequency(id), Ok(8000));
        assert_eq!(
            loader.buffer_format(id, BufferFormat::from_name),
            Ok(BufferFormat::Mono8)
        );
    }

    #[test]
    fn test_sixteen_bit_stereo() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "s16.wav", spec(2, 16, hound::SampleFormat::Int), 10);

        let mut loader = WaveLoader::new();
        let id = loader.load_wave_file(&path).unwrap();

        assert_eq!(loader.wave_size(id), Ok(40));
        assert_eq!(&loader.wave_data(id).unwrap()[..4], &[0, 0, 1, 0]);
        assert_eq!(
            loader.buffer_format(id, BufferFormat::from_name),
            Ok(BufferFormat::Stereo16)
        );
    }

    #[test]
    fn test_float_mono_resolves_extension_format() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "f32.wav", spec(1, 32, hound::SampleFormat::Float), 3);

        let mut loader = WaveLoader::new();
        let id = loader.load_wave_file(&path).unwrap();

        assert_eq!(loader.wave_size(id), Ok(12));
        assert_eq!(
            loader.buffer_format(id, BufferFormat::from_name),
            Ok(BufferFormat::MonoFloat32)
        );
        assert!(matches!(
            loader.buffer_format(id, |_| None),
            Err(WaveError::UnsupportedFormat { float: true, .. })
        ));
    }

    #[test]
    fn test_twenty_four_bit_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "s24.wav", spec(1, 24, hound::SampleFormat::Int), 3);

        let mut loader = WaveLoader::new();
        assert!(matches!(
            loader.load_wave_file(&path),
            Err(WaveError::UnsupportedFormat {
                bits_per_sample: 24,
                ..
            })
        ));
        assert_eq!(loader.open_count(), 0);
    }

    #[test]
    fn test_missing_file_is_bad_wave_file() {
        let dir = TempDir::new().unwrap();
        let mut loader = WaveLoader::new();
        let result = loader.load_wave_file(dir.path().join("nope.wav"));
        assert!(matches!(result, Err(WaveError::BadWaveFile { .. })));
    }

    #[test]
    fn test_garbage_file_is_bad_wave_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not RIFF").unwrap();

        let mut loader = WaveLoader::new();
        assert!(matches!(
            loader.load_wave_file(&path),
            Err(WaveError::BadWaveFile { .. })
        ));
    }

    #[test]
    fn test_deleted_handle_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "a.wav", spec(1, 16, hound::SampleFormat::Int), 2);

        let mut loader = WaveLoader::new();
        let id = loader.load_wave_file(&path).unwrap();
        assert_eq!(loader.delete_wave_file(id), Ok(()));
        assert_eq!(loader.wave_size(id), Err(WaveError::InvalidWaveId));
        assert_eq!(loader.delete_wave_file(id), Err(WaveError::InvalidWaveId));
    }

    #[test]
    fn test_scoped_wave_releases_handle_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "a.wav", spec(1, 16, hound::SampleFormat::Int), 2);

        let mut loader = WaveLoader::new();
        {
            let wave = loader.open_scoped(&path).unwrap();
            assert_eq!(wave.size(), Ok(4));
        }
        assert_eq!(loader.open_count(), 0);
    }

    #[test]
    fn test_open_handle_limit() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "tiny.wav", spec(1, 8, hound::SampleFormat::Int), 1);

        let mut loader = WaveLoader::new();
        for _ in 0..MAX_OPEN_WAVES {
            loader.load_wave_file(&path).unwrap();
        }
        assert_eq!(loader.load_wave_file(&path), Err(WaveError::TooManyWaves));
    }
}
