use std::path::{Path, PathBuf};

use audioclip_cli::{execute, Cli};
use clap::Parser;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("audioclip-cli-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Silence with a single full-scale click at `click_sec`
fn write_click(path: &Path, seconds: f64, rate: u32, channels: u16, click_sec: f64) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (seconds * rate as f64) as usize;
    let click = (click_sec * rate as f64) as usize;
    for i in 0..frames {
        let v: i16 = if i == click { 16000 } else { 0 };
        for _ in 0..channels {
            writer.write_sample(v).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("audioclip-factory").chain(args.iter().copied())).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_render_command_writes_mix_report_and_markers() {
    let dir = scratch_dir("render");
    let music = dir.join("music.wav");
    let voice = dir.join("voice.wav");
    write_click(&music, 2.0, 22050, 1, 1.0);
    write_click(&voice, 1.0, 44100, 2, 0.5);

    let assets = dir.join("assets.json");
    std::fs::write(
        &assets,
        format!(
            r#"[ {{ "parameters": {{ "url": "{}" }} }},
                {{ "parameters": {{ "url": "{}", "offset": 0.5 }},
                   "actions": [ {{ "type": "volume_percentage", "param": 0.5 }} ] }} ]"#,
            music.display(),
            voice.display()
        ),
    )
    .unwrap();

    let output = dir.join("out").join("mix.wav");
    let report = dir.join("out").join("report.json");
    let markers = dir.join("out").join("markers.csv");

    execute(cli(&[
        "render",
        assets.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--report",
        report.to_str().unwrap(),
        "--markers",
        markers.to_str().unwrap(),
    ]))
    .await
    .unwrap();

    // Both clicks sit at 1.0s on the timeline
    let mut reader = hound::WavReader::open(&output).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(spec.channels, 2);
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), 2 * 44100 * 2);

    let loudest = samples
        .iter()
        .enumerate()
        .max_by_key(|(_, s)| s.unsigned_abs())
        .map(|(i, _)| i / 2)
        .unwrap() as i64;
    assert!((loudest - 44100).abs() <= 1, "loudest frame {}", loudest);

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(written["clip_count"], 2);
    assert_eq!(written["sample_rate"], 44100);
    assert_eq!(written["clips"][1]["start"], 0.5);
    assert_eq!(written["clips"][1]["actions"][0], "volume_percentage(0.5)");

    let csv = std::fs::read_to_string(&markers).unwrap();
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "start,end,source,actions");
    assert!(lines[2].starts_with("0.500,1.500,"));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_render_command_reports_missing_source() {
    let dir = scratch_dir("missing");
    let assets = dir.join("assets.json");
    std::fs::write(&assets, r#"{ "parameters": { "url": "/no/such/file.wav" } }"#).unwrap();

    let output = dir.join("mix.wav");
    let result = execute(cli(&[
        "render",
        assets.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
    ]))
    .await;

    assert!(result.is_err());
    assert!(!output.exists());

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_info_command() {
    let dir = scratch_dir("info");
    let src = dir.join("click.wav");
    write_click(&src, 0.25, 8000, 1, 0.1);

    execute(cli(&["info", src.to_str().unwrap()])).await.unwrap();

    let missing = dir.join("absent.wav");
    assert!(execute(cli(&["info", missing.to_str().unwrap()])).await.is_err());

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_clip_command_cuts_range() {
    let dir = scratch_dir("clip");
    let src = dir.join("click.wav");
    let out = dir.join("cut.wav");
    write_click(&src, 2.0, 44100, 1, 1.5);

    execute(cli(&[
        "clip",
        src.to_str().unwrap(),
        "--start",
        "1.0",
        "--end",
        "1.75",
        "-o",
        out.to_str().unwrap(),
    ]))
    .await
    .unwrap();

    let reader = hound::WavReader::open(&out).unwrap();
    assert_eq!(reader.spec().sample_rate, 44100);
    assert_eq!(reader.duration(), (0.75 * 44100.0) as u32);

    std::fs::remove_dir_all(&dir).ok();
}
