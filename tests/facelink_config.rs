use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use facelink::config::{DetectorKind, FacelinkConfig, PlatformKind, RenderMode};
use facelink::{FacelinkError, Resolution};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "FACELINK_CONFIG",
        "FACELINK_SERIAL_PORT",
        "FACELINK_BAUD_RATE",
        "FACELINK_VIDEO_URL",
        "FACELINK_PLATFORM",
        "FACELINK_RENDER_MODE",
        "FACELINK_THROTTLE_MS",
        "FACELINK_SETTLE_MS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "identities": [
            { "name": "Dana", "image": "faces/dana.png", "signal": "1" },
            { "name": "Eli", "signal": "2" }
        ],
        "unknown_signal": "9",
        "serial": { "port": "/dev/ttyACM0", "throttle_ms": 250 },
        "video": { "url": "stub://drone", "working_width": 160, "working_height": 120 },
        "platform": { "kind": "simulated" },
        "render": { "mode": "headless", "quit_key": "x" }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("FACELINK_CONFIG", file.path());
    std::env::set_var("FACELINK_SERIAL_PORT", "stub://mcu");
    std::env::set_var("FACELINK_SETTLE_MS", "5");

    let cfg = FacelinkConfig::load().expect("load config");

    assert_eq!(cfg.identities.len(), 2);
    assert_eq!(cfg.identities[0].image.to_str(), Some("faces/dana.png"));
    assert_eq!(cfg.identities[1].image.to_str(), Some("Eli.jpeg"));
    assert_eq!(cfg.unknown_signal, '9');
    assert_eq!(cfg.serial.port, "stub://mcu");
    assert_eq!(cfg.serial.baud_rate, 9600);
    assert_eq!(cfg.serial.throttle, Duration::from_millis(250));
    assert_eq!(cfg.serial.settle, Duration::from_millis(5));
    assert_eq!(cfg.video.url, "stub://drone");
    assert_eq!(cfg.video.working, Resolution::new(160, 120));
    assert_eq!(cfg.detector.working, Resolution::new(160, 120));
    assert_eq!(cfg.detector.kind, DetectorKind::Stub);
    assert_eq!(cfg.platform.kind, PlatformKind::Simulated);
    assert_eq!(cfg.render.mode, RenderMode::Headless);
    assert_eq!(cfg.render.quit_key, 'x');

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
unknown_signal = "4"

[[identities]]
name = "Yarin"
signal = "1"

[platform]
kind = "tello"
address = "127.0.0.1:8889"
command_timeout_ms = 1500

[render]
display_width = 640
display_height = 480
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = FacelinkConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.identities.len(), 1);
    assert_eq!(cfg.platform.address, "127.0.0.1:8889");
    assert_eq!(cfg.platform.command_timeout, Duration::from_millis(1500));
    assert_eq!(cfg.render.display, Resolution::new(640, 480));
    assert_eq!(cfg.render.window_title, "video");

    clear_env();
}

#[test]
fn rejects_signal_colliding_with_unknown() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "identities": [{ "name": "Dana", "signal": "4" }],
        "unknown_signal": "4"
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    let err = FacelinkConfig::load_from(Some(file.path())).unwrap_err();
    let kind = FacelinkError::classify(&err).expect("classified");
    assert_eq!(kind.code(), "CONFIG");
    assert!(kind.is_fatal());

    clear_env();
}

#[test]
fn rejects_malformed_env_override() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FACELINK_THROTTLE_MS", "soon");
    let err = FacelinkConfig::load_from(None).unwrap_err();
    assert!(err.to_string().contains("FACELINK_THROTTLE_MS"));

    std::env::set_var("FACELINK_THROTTLE_MS", "0");
    assert!(FacelinkConfig::load_from(None).is_err());

    clear_env();
}
