use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;

/// Write a big-endian image file under the temp directory.
fn image_file(name: &str, words: &[u16]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("weft-{name}-{}.lc3", std::process::id()));
    let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_be_bytes()).collect();
    fs::write(&path, bytes).unwrap();
    path
}

fn weft() -> Command {
    Command::cargo_bin("weft").unwrap()
}

#[test]
fn no_images_is_usage_error() {
    weft().assert().failure().code(2);
}

#[test]
fn missing_image_fails_to_load() {
    weft().arg("does-not-exist.lc3").assert().failure().code(1);
}

#[test]
fn unaligned_image_fails_to_load() {
    let path = std::env::temp_dir().join(format!("weft-unaligned-{}.lc3", std::process::id()));
    fs::write(&path, [0x30, 0x00, 0x12]).unwrap();
    weft().arg(&path).assert().failure().code(1);
    fs::remove_file(&path).ok();
}

#[test]
fn add_program_runs_to_halt() {
    // ADD R0, R0, #5; TRAP x25
    let path = image_file("add", &[0x3000, 0x1025, 0xF025]);
    let assert = weft().arg(&path).assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert!(stdout.contains("Halted"), "{stdout}");
    fs::remove_file(&path).ok();
}

#[test]
fn puts_program_prints_string() {
    // LEA R0, #+2; TRAP x22; TRAP x25; "Hi\0"
    let path = image_file(
        "puts",
        &[0x3000, 0xE002, 0xF022, 0xF025, 0x0048, 0x0069, 0x0000],
    );
    let assert = weft().arg(&path).assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert!(stdout.contains("Hi"), "{stdout}");
    fs::remove_file(&path).ok();
}

#[test]
fn getc_echoes_through_out() {
    // TRAP x20; TRAP x21; TRAP x25
    let path = image_file("echo", &[0x3000, 0xF020, 0xF021, 0xF025]);
    let assert = weft().arg(&path).write_stdin("Z").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert!(stdout.contains('Z'), "{stdout}");
    fs::remove_file(&path).ok();
}

#[test]
fn reserved_opcode_is_fatal() {
    let path = image_file("fault", &[0x3000, 0xD000]);
    let assert = weft().arg(&path).assert().failure().code(1);
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("0x3000"), "{stderr}");
    fs::remove_file(&path).ok();
}
