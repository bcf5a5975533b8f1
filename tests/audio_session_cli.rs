use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_audio_session"))
}

fn write_silence(path: &Path, channels: u16, frames: usize) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    for _ in 0..frames * channels as usize {
        writer.write_sample(0i16).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

#[test]
fn prints_duration_per_file() {
    let dir = TempDir::new().unwrap();
    let short = dir.path().join("short.wav");
    let long = dir.path().join("long.wav");
    write_silence(&short, 1, 2000);
    write_silence(&long, 2, 16000);
    let log_path = dir.path().join("cli.log");

    let output = cli()
        .args(["--log-file", log_path.to_str().unwrap()])
        .args(["--listener-position", "0", "-1.5", "2"])
        .arg(&short)
        .arg(&long)
        .output()
        .expect("run audio_session");

    assert!(
        output.status.success(),
        "audio_session exited with {:?}",
        output.status.code()
    );
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "unexpected stdout: {stdout}");
    assert!(lines[0].ends_with("\t0.250"));
    assert!(lines[1].ends_with("\t2.000"));

    let log = std::fs::read_to_string(&log_path).expect("log written");
    assert!(log.contains("wav file loaded"));
}

#[test]
fn missing_file_sets_failure_exit_code() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.wav");
    write_silence(&good, 1, 800);

    let output = cli()
        .args(["--log-file", dir.path().join("cli.log").to_str().unwrap()])
        .arg(&good)
        .arg(dir.path().join("missing.wav"))
        .output()
        .expect("run audio_session");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    assert!(stdout.contains("good.wav\t0.100"));
}

#[test]
fn unopenable_log_file_is_reported_on_stdout() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.wav");
    write_silence(&good, 1, 800);
    let log_path = dir.path().join("no-such-dir").join("cli.log");

    let output = cli()
        .args(["--log-file", log_path.to_str().unwrap()])
        .arg(&good)
        .output()
        .expect("run audio_session");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    assert!(
        stdout.contains("Not able to open audio session debug log"),
        "unexpected stdout: {stdout}"
    );
    assert!(stdout.contains(&log_path.display().to_string()));
    assert!(stdout.contains("good.wav\t0.100"));
    assert!(!log_path.exists());
}
