use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::tempdir;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_meshcap")
}

fn write_file(path: &Path, content: &str) {
    fs::write(path, content).expect("failed to write test file");
}

fn run(args: &[&str]) -> Output {
    Command::new(bin())
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("MESHCAP_CONFIG")
        .output()
        .expect("command should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

const CAPTURE: &str = concat!(
    r#"{"format":"meshcap-json","version":"1.0","packet":{"fromId":"!12345678","toId":"!87654321","rxTime":1697731200,"decoded":{"portnum":"TEXT_MESSAGE_APP","text":"hi"}}}"#,
    "\n",
    r#"{"format":"meshcap-json","version":"1.0","packet":{"fromId":"!99999999","toId":"!87654321","rxTime":1697731201,"decoded":{"portnum":"TEXT_MESSAGE_APP","text":"other"}}}"#,
    "\n",
    r#"{"format":"meshcap-json","version":"1.0","packet":{"fromId":"!12345678","toId":"^all","rxTime":1697731202,"hopLimit":1,"decoded":{"portnum":"POSITION_APP","position":{"latitude":1.5,"longitude":2.25}}}}"#,
    "\n",
    r#"{"format":"meshcap-json","version":"1.0","packet":{"fromId":"!12345678","toId":"!87654321","rxTime":1697731203,"encrypted":{"__type__":"bytes","__value__":"AQIDBA=="}}}"#,
    "\n",
);

fn capture_file(dir: &Path) -> String {
    let path = dir.join("capture.jsonl");
    write_file(&path, CAPTURE);
    path.to_str().expect("utf8 path").to_string()
}

#[test]
fn test_filter_selects_matching_packets() {
    let dir = tempdir().expect("temp dir");
    let capture = capture_file(dir.path());

    let output = run(&[
        "-r", &capture, "--color", "never", "src", "node", "!12345678", "and", "port", "text",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert_eq!(out.lines().count(), 1, "stdout:\n{out}");
    assert!(out.contains("from:!12345678 to:!87654321 text:hi"));
    assert!(stderr(&output).contains("Using filter: src node !12345678 and port text"));
    assert!(stderr(&output).contains("Processed 1 matching packets."));
}

#[test]
fn test_no_filter_prints_everything() {
    let dir = tempdir().expect("temp dir");
    let capture = capture_file(dir.path());

    let output = run(&["--read-file", &capture, "--color", "never"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[2].contains("pos:1.5000,2.2500 0m"));
    assert!(lines[2].contains("to:!ffffffff"));
    assert!(lines[3].ends_with("encrypted:len=4"));
    assert!(!stderr(&output).contains("Using filter"));
}

#[test]
fn test_count_stops_early() {
    let dir = tempdir().expect("temp dir");
    let capture = capture_file(dir.path());

    let output = run(&["-r", &capture, "-c", "2", "--color", "never"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).lines().count(), 2);
    assert!(stderr(&output).contains("Processed 2 matching packets."));
}

#[test]
fn test_invalid_filter_exits_with_error() {
    let dir = tempdir().expect("temp dir");
    let capture = capture_file(dir.path());

    let output = run(&["-r", &capture, "src", "port", "text"]);
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("Error: Invalid filter expression:"),
        "stderr: {}",
        stderr(&output)
    );
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_write_file_keeps_capture_format() {
    let dir = tempdir().expect("temp dir");
    let capture = capture_file(dir.path());
    let written = dir.path().join("matches.jsonl");

    let output = run(&[
        "-r",
        &capture,
        "-w",
        written.to_str().expect("utf8 path"),
        "--color",
        "never",
        "encrypted",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let content = fs::read_to_string(&written).expect("capture should be written");
    assert_eq!(content.lines().count(), 1);
    assert!(content.starts_with(r#"{"format":"meshcap-json""#));
    assert!(content.contains(r#""__value__":"AQIDBA==""#));
}

#[test]
fn test_nodes_file_resolves_names_and_users() {
    let dir = tempdir().expect("temp dir");
    let capture = capture_file(dir.path());
    let nodes = dir.path().join("nodes.json");
    write_file(
        &nodes,
        r#"{"!12345678": {"user": {"longName": "Base Camp", "shortName": "BC"}},
            "!87654321": {"userInfo": {"long_name": "Trail"}}}"#,
    );
    let nodes = nodes.to_str().expect("utf8 path");

    let output = run(&[
        "-r", &capture, "--nodes", nodes, "--color", "never", "dst", "user", "Trail", "and",
        "port", "text",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert_eq!(out.lines().count(), 2, "stdout:\n{out}");
    assert!(out.contains("from:BC (!12345678) to:Trail (!87654321) text:hi"));

    let output = run(&[
        "-r", &capture, "--nodes", nodes, "--color", "never", "-n", "user", "BC",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert_eq!(out.lines().count(), 3, "stdout:\n{out}");
    assert!(!out.contains("BC"));
}

#[test]
fn test_label_mode_from_config_and_flag() {
    let dir = tempdir().expect("temp dir");
    let capture = capture_file(dir.path());
    let nodes = dir.path().join("nodes.json");
    write_file(&nodes, r#"{"!12345678": {"user": {"shortName": "BC"}}}"#);
    let config = dir.path().join("meshcap.toml");
    write_file(&config, "[display]\nlabel_mode = \"named-only\"\n");

    let base = [
        "-r",
        capture.as_str(),
        "--nodes",
        nodes.to_str().expect("utf8 path"),
        "--config",
        config.to_str().expect("utf8 path"),
        "--color",
        "never",
        "-c",
        "1",
    ];

    let output = run(&base);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("from:BC to:!87654321"));

    let mut with_flag = base.to_vec();
    with_flag.extend(["--label-mode", "hex-only"]);
    let output = run(&with_flag);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("from:!12345678 to:!87654321"));
}

#[test]
fn test_config_port_aliases() {
    let dir = tempdir().expect("temp dir");
    let capture = capture_file(dir.path());
    let config = dir.path().join("meshcap.toml");
    write_file(&config, "[ports]\naliases = { where = \"POSITION_APP\" }\n");

    let output = run(&[
        "-r",
        &capture,
        "--config",
        config.to_str().expect("utf8 path"),
        "--color",
        "never",
        "port",
        "where",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).lines().count(), 1);
}

#[test]
fn test_broken_config_is_reported() {
    let dir = tempdir().expect("temp dir");
    let config = dir.path().join("meshcap.toml");
    write_file(&config, "[cache\ncapacity = ");

    let output = run(&["--config", config.to_str().expect("utf8 path")]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to load config"));
}

#[test]
fn test_reads_stdin() {
    let mut child = Command::new(bin())
        .args(["--color", "never", "-r", "-", "--stats", "port", "position"])
        .env_remove("RUST_LOG")
        .env_remove("MESHCAP_CONFIG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("command should start");

    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(CAPTURE.as_bytes())
        .expect("stdin should accept the capture");

    let output = child.wait_with_output().expect("command should finish");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).lines().count(), 1);

    let err = stderr(&output);
    assert!(err.contains("Processed 1 matching packets."));
    assert!(err.contains("Hit rate"), "stderr: {err}");
}

#[test]
fn test_bad_lines_are_skipped() {
    let dir = tempdir().expect("temp dir");
    let capture = dir.path().join("mixed.jsonl");
    write_file(
        &capture,
        &format!("garbage line\n{CAPTURE}{{\"format\":\"other\",\"packet\":{{}}}}\n"),
    );

    let output = run(&["-r", capture.to_str().expect("utf8 path"), "--color", "never"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).lines().count(), 4);
    assert!(stderr(&output).contains("skipping unreadable capture line"));
}

#[test]
fn test_non_utf8_line_is_skipped() {
    let dir = tempdir().expect("temp dir");
    let capture = dir.path().join("binary.jsonl");
    let mut content = b"\xff\xfe\x00 not text\n".to_vec();
    content.extend_from_slice(CAPTURE.as_bytes());
    fs::write(&capture, content).expect("failed to write test file");

    let output = run(&["-r", capture.to_str().expect("utf8 path"), "--color", "never"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).lines().count(), 4);
    assert!(stderr(&output).contains("skipping unreadable capture line"));
}
