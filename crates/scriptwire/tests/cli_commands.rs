#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::{Command, Output};

const DECLARATIONS: &str = r#"{
    "types": [{ "name": "Pos", "fields": { "x": "int32", "y": "int32" } }],
    "packets": [{ "name": "Move", "fields": ["Pos", "float32"] }]
}"#;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "scriptwire-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn write_declarations(tag: &str, content: &str) -> PathBuf {
    let path = unique_temp_dir(tag).join("types.json");
    std::fs::write(&path, content).expect("declarations should be writable");
    path
}

fn scriptwire(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_scriptwire"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .env("SCRIPTWIRE_SEED", "42")
        .output()
        .expect("scriptwire should run")
}

fn json_stdout(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn encode_prints_bytes_and_payload() {
    let path = write_declarations("encode", DECLARATIONS);
    let output = scriptwire(&[
        "encode",
        path.to_str().unwrap(),
        "Pos",
        "--json",
        r#"{"x": -5, "y": 1000000}"#,
    ]);
    let out = json_stdout(&output);

    assert_eq!(out["name"], "Pos");
    assert_eq!(out["kind"], "type");
    assert_eq!(out["id"], 15);
    assert_eq!(out["bytes"], 8);
    assert_eq!(out["hex"], "fffffffb000f4240");
    assert_eq!(out["payload"].as_str().unwrap().chars().count(), 8);
    assert!(out["chunks"].as_array().unwrap().is_empty());
}

#[test]
fn encode_packet_lists_chunk_headers() {
    let path = write_declarations("encode-packet", DECLARATIONS);
    let output = scriptwire(&[
        "encode",
        path.to_str().unwrap(),
        "Move",
        "--json",
        r#"[{"x": 1, "y": 2}, 0.5]"#,
        "--max-message-size",
        "7",
    ]);
    let out = json_stdout(&output);

    assert_eq!(out["id"], 16);
    assert_eq!(out["bytes"], 12);
    let chunks = out["chunks"].as_array().unwrap();
    assert_eq!(chunks.len(), 3);
    for chunk in chunks {
        assert!(chunk["id"].as_str().unwrap().starts_with("packet:"));
    }
    assert!(chunks[0]["id"].as_str().unwrap().ends_with("-2.3"));
    // y = 2 transcodes to a quote, which is escaped inside the 7 character limit.
    for chunk in chunks {
        assert!(chunk["body"].as_str().unwrap().chars().count() <= 7);
    }
    assert!(chunks[1]["body"].as_str().unwrap().contains("\\\""));
}

#[test]
fn decode_hex_prints_value() {
    let path = write_declarations("decode", DECLARATIONS);
    let output = scriptwire(&[
        "decode",
        path.to_str().unwrap(),
        "Pos",
        "--hex",
        "fffffffb000f4240",
    ]);
    let out = json_stdout(&output);

    assert_eq!(out["bytes"], 8);
    assert_eq!(out["value"], serde_json::json!({"x": -5, "y": 1000000}));
}

#[test]
fn decode_rejects_trailing_bytes() {
    let path = write_declarations("decode-trailing", DECLARATIONS);
    let output = scriptwire(&[
        "decode",
        path.to_str().unwrap(),
        "Pos",
        "--hex",
        "fffffffb000f424000",
    ]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn registry_prints_agreed_ids() {
    let path = write_declarations("registry", DECLARATIONS);
    let output = scriptwire(&["registry", path.to_str().unwrap(), "--peers", "3"]);
    let out = json_stdout(&output);

    assert_eq!(out["peers"], 3);
    let types = out["types"].as_array().unwrap();
    assert_eq!(types.len(), 2);
    assert_eq!(types[0]["name"], "Pos");
    assert_eq!(types[0]["id"], 15);
    assert_eq!(types[1]["name"], "Move");
    assert_eq!(types[1]["kind"], "packet");
    assert_eq!(types[1]["id"], 16);
}

#[test]
fn registry_can_list_builtins() {
    let path = write_declarations("registry-builtins", DECLARATIONS);
    let output = scriptwire(&["registry", path.to_str().unwrap(), "--builtins"]);
    let out = json_stdout(&output);

    let types = out["types"].as_array().unwrap();
    assert_eq!(types.len(), 17);
    assert_eq!(types[0]["name"], "ch");
    assert_eq!(types[14]["name"], "array");
}

#[test]
fn unknown_type_is_a_usage_error() {
    let path = write_declarations("unknown", DECLARATIONS);
    let output = scriptwire(&["encode", path.to_str().unwrap(), "Nope", "--json", "{}"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Nope"));
}

#[test]
fn invalid_declarations_are_data_errors() {
    let path = write_declarations(
        "invalid",
        r#"{ "types": [{ "name": "Area", "fields": ["Pos"] }] }"#,
    );
    let output = scriptwire(&["registry", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn missing_file_fails() {
    let output = scriptwire(&["registry", "/nonexistent/scriptwire/types.json"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn version_reports_package_version() {
    let output = scriptwire(&["version"]);
    let out = json_stdout(&output);
    assert_eq!(out["name"], "scriptwire");
    assert_eq!(out["version"], env!("CARGO_PKG_VERSION"));
    assert!(out.get("target").is_none());
}

#[test]
fn extended_version_reports_build_target_and_profile() {
    let output = scriptwire(&["version", "--extended"]);
    let out = json_stdout(&output);
    assert!(!out["target"].as_str().unwrap().is_empty());
    let profile = out["profile"].as_str().unwrap();
    assert!(profile == "debug" || profile == "release", "{profile}");
    assert_eq!(out["features"]["cli"], true);
}
