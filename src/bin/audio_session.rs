use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Result};
use audio_session::error::log_audio_error;
use audio_session::{AudioBackend, AudioSession, SessionConfig, SoftwareBackend};
use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "audio_session",
    about = "Load wave files into audio buffers and report their durations"
)]
struct Cli {
    /// JSON session config (defaults apply to missing fields)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Device backend to open
    #[arg(long, value_enum, default_value_t = BackendKind::Software)]
    backend: BackendKind,
    /// Override the diagnostic log path
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Listener position applied after initialization
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    listener_position: Option<Vec<f32>>,
    /// Listener velocity applied after initialization
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    listener_velocity: Option<Vec<f32>>,
    /// Wave files to load
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// In-process backend, no audio hardware needed
    Software,
    /// Output devices resolved through the host audio API
    Cpal,
}

fn main() -> ExitCode {
    // stdout carries the duration report; diagnostics go to stderr.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = cli
        .config
        .as_ref()
        .map(SessionConfig::load_from_file)
        .unwrap_or_default();
    if let Some(log_file) = &cli.log_file {
        config.log_path = log_file.clone();
    }

    match cli.backend {
        BackendKind::Software => run_with(Arc::new(SoftwareBackend::new()), config, &cli),
        BackendKind::Cpal => run_cpal(config, &cli),
    }
}

#[cfg(not(target_os = "android"))]
fn run_cpal(config: SessionConfig, cli: &Cli) -> Result<ExitCode> {
    run_with(Arc::new(audio_session::CpalBackend::new()), config, cli)
}

#[cfg(target_os = "android")]
fn run_cpal(_config: SessionConfig, _cli: &Cli) -> Result<ExitCode> {
    bail!("cpal backend is not available on this platform")
}

fn run_with<B: AudioBackend>(backend: Arc<B>, config: SessionConfig, cli: &Cli) -> Result<ExitCode> {
    let mut session = AudioSession::new(Arc::clone(&backend), config);
    if let Err(err) = session.initialize() {
        log_audio_error(&err, "initialize");
        bail!(err);
    }

    if let Some([x, y, z]) = cli.listener_position.as_deref() {
        session.set_listener_position(*x, *y, *z);
    }
    if let Some([x, y, z]) = cli.listener_velocity.as_deref() {
        session.set_listener_velocity(*x, *y, *z);
    }

    let buffers = backend.gen_buffers(cli.files.len());
    if buffers.len() != cli.files.len() {
        bail!("backend could not allocate {} buffers", cli.files.len());
    }

    let mut failures = 0usize;
    for (path, buffer) in cli.files.iter().zip(&buffers) {
        match session.load_wave_audio(path, *buffer) {
            Ok(()) => println!("{}\t{:.3}", path.display(), session.buffer_length(*buffer)),
            Err(err) => {
                log_audio_error(&err, "load_wave_audio");
                eprintln!("{}\t{}", path.display(), err);
                failures += 1;
            }
        }
    }

    backend.delete_buffers(&buffers);
    session.clean_up();

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
