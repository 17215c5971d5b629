use assert_cmd::Command;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const HELLO_LOOT_MD5: &str = "a71d10b6e5336fdea7edcedbb315a329";

fn cartage() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("cartage"))
}

fn combined_output(output: &std::process::Output) -> String {
    format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn json_stdout(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!("stdout is not JSON ({e}): {}", combined_output(output))
    })
}

#[test]
fn single_file_offload_verifies_and_reports_md5() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("hello.txt");
    fs::write(&src, "Hello LOOT").expect("write source");
    let dst = tmp.path().join("backup");
    fs::create_dir(&dst).expect("create dest");

    let output = cartage()
        .arg(&src)
        .arg(&dst)
        .args(["--md5", "--json", "--metadata-mode", "off"])
        .output()
        .expect("cartage runs");
    assert!(output.status.success(), "{}", combined_output(&output));

    // The replica exists with identical bytes
    let copied = dst.join("hello.txt");
    assert_eq!(fs::read_to_string(&copied).expect("read replica"), "Hello LOOT");

    let result = json_stdout(&output);
    assert_eq!(result["status"], "success");
    assert_eq!(result["total_files"], 1);
    assert_eq!(result["total_bytes"], 10);
    assert_eq!(result["files"][0]["rel_path"], "hello.txt");
    assert_eq!(result["files"][0]["hash"]["md5"], HELLO_LOOT_MD5);
}

#[test]
fn tree_offload_to_two_destinations_excludes_system_files() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("card");
    fs::create_dir_all(src.join("A001")).expect("mkdir");
    fs::write(src.join("A001/clip.mov"), vec![0x42u8; 64 * 1024]).expect("write clip");
    fs::create_dir_all(src.join(".Spotlight-V100/Store-V2")).expect("mkdir junk");
    fs::write(
        src.join(".Spotlight-V100/Store-V2/0.directoryStoreFile"),
        b"index",
    )
    .expect("write junk");

    let dst1 = tmp.path().join("backup1");
    let dst2 = tmp.path().join("backup2");

    let output = cartage()
        .arg(&src)
        .arg("-d")
        .arg(&dst1)
        .arg("-d")
        .arg(&dst2)
        .args(["--json", "--metadata-mode", "off"])
        .output()
        .expect("cartage runs");
    assert!(output.status.success(), "{}", combined_output(&output));

    for dst in [&dst1, &dst2] {
        assert!(dst.join("A001/clip.mov").exists(), "missing replica in {}", dst.display());
        assert!(!dst.join(".Spotlight-V100").exists(), "system junk copied to {}", dst.display());
    }

    let result = json_stdout(&output);
    assert_eq!(result["status"], "success");
    assert_eq!(result["total_files"], 1);
}

#[test]
fn mhl_sidecar_lands_next_to_each_destination() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("card");
    fs::create_dir(&src).expect("mkdir");
    fs::write(src.join("clip.mov"), b"Hello LOOT").expect("write");
    let dst = tmp.path().join("backup");

    let output = cartage()
        .arg(&src)
        .arg(&dst)
        .args(["--dual-hash", "--quiet", "--metadata-mode", "off"])
        .output()
        .expect("cartage runs");
    assert!(output.status.success(), "{}", combined_output(&output));

    let mhl = fs::read_to_string(tmp.path().join("backup.mhl")).expect("MHL side-car");
    assert!(mhl.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(mhl.contains("<hashlist version=\"1.0\">"));
    assert!(mhl.contains("<filename>clip.mov</filename>"));
    assert!(mhl.contains("<size>10</size>"));
    assert!(mhl.contains(&format!("<md5>{}</md5>", HELLO_LOOT_MD5)));
    assert!(mhl.contains("<xxhash64>"));
}

#[test]
fn skip_existing_retry_still_verifies_pre_existing_replicas() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("card");
    fs::create_dir(&src).expect("mkdir");
    fs::write(src.join("clip.mov"), b"original content").expect("write");
    let dst = tmp.path().join("backup");

    let first = cartage()
        .arg(&src)
        .arg(&dst)
        .args(["--quiet", "--metadata-mode", "off"])
        .output()
        .expect("first run");
    assert!(first.status.success(), "{}", combined_output(&first));

    // Clean retry: nothing to copy, verification still passes
    let retry = cartage()
        .arg(&src)
        .arg(&dst)
        .args(["--skip-existing", "--quiet", "--metadata-mode", "off"])
        .output()
        .expect("retry run");
    assert!(retry.status.success(), "{}", combined_output(&retry));

    // Corrupt the replica at identical size: the copy skips it, but the
    // independent readback must still catch the damage
    fs::write(dst.join("clip.mov"), b"original-content").expect("corrupt");
    let output = cartage()
        .arg(&src)
        .arg(&dst)
        .args(["--resume", "--json", "--metadata-mode", "off"])
        .output()
        .expect("corrupt retry run");
    assert!(!output.status.success(), "{}", combined_output(&output));

    let result = json_stdout(&output);
    assert_eq!(result["status"], "failed");
    assert!(
        result["error"].as_str().unwrap().contains("mismatch"),
        "unexpected error: {}",
        result["error"]
    );
}

#[test]
fn dry_run_writes_nothing_and_exits_zero() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("card");
    fs::create_dir(&src).expect("mkdir");
    fs::write(src.join("clip.mov"), vec![1u8; 4096]).expect("write");
    let dst = tmp.path().join("backup");

    let output = cartage()
        .arg(&src)
        .arg(&dst)
        .args(["--dry-run", "--json"])
        .output()
        .expect("dry run");
    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(!dst.exists(), "dry run created the destination");

    let report = json_stdout(&output);
    assert_eq!(report["total_size"], 4096);
    assert_eq!(report["files"][0]["rel_path"], "clip.mov");
    assert_eq!(
        report["destinations"][0]["path"].as_str().unwrap(),
        dst.to_string_lossy()
    );
}

#[test]
fn missing_source_exits_one() {
    let tmp = TempDir::new().expect("tempdir");
    let output = cartage()
        .arg(tmp.path().join("no-such-card"))
        .arg(tmp.path().join("backup"))
        .output()
        .expect("cartage runs");
    assert_eq!(output.status.code(), Some(1), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("does not exist"));
}

#[test]
fn missing_destination_exits_one() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("card");
    fs::create_dir(&src).expect("mkdir");

    let output = cartage().arg(&src).output().expect("cartage runs");
    assert_eq!(output.status.code(), Some(1), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("destination is required"));
}

#[test]
fn sha256_convenience_flag_wins_over_algorithm() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("hello.txt");
    fs::write(&src, "test").expect("write");
    let dst = tmp.path().join("backup");
    fs::create_dir(&dst).expect("mkdir");

    let output = cartage()
        .arg(&src)
        .arg(&dst)
        .args(["--algorithm", "md5", "--sha256", "--json", "--metadata-mode", "off"])
        .output()
        .expect("cartage runs");
    assert!(output.status.success(), "{}", combined_output(&output));

    let result = json_stdout(&output);
    assert_eq!(
        result["files"][0]["hash"]["sha256"],
        "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
    );
    assert!(result["files"][0]["hash"].get("md5").is_none());
}

#[test]
fn help_covers_the_documented_surface() {
    let output = cartage().arg("--help").output().expect("--help runs");
    assert!(output.status.success());
    let text = combined_output(&output);
    for flag in [
        "--algorithm",
        "--dual-hash",
        "--no-verify",
        "--buffer-size",
        "--concurrency",
        "--skip-existing",
        "--dry-run",
        "--json",
        "--metadata-mode",
        "--job-name",
        "--camera",
        "--reel",
    ] {
        assert!(text.contains(flag), "help text missing {flag}: {text}");
    }
}

#[test]
fn version_flag_prints_version() {
    let output = cartage().arg("-v").output().expect("-v runs");
    assert!(output.status.success());
    assert!(combined_output(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn volumes_listing_always_has_the_root_volume() {
    let output = cartage().arg("--volumes").output().expect("--volumes runs");
    assert!(output.status.success());
    let text = combined_output(&output);
    assert!(text.contains("Volume"), "missing header: {text}");
    assert!(text.lines().count() >= 2, "no volumes listed: {text}");
}

#[test]
fn no_verify_skips_the_readback_pass() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("card");
    fs::create_dir(&src).expect("mkdir");
    fs::write(src.join("clip.mov"), b"payload").expect("write");
    let dst = tmp.path().join("backup");

    let output = cartage()
        .arg(&src)
        .arg(&dst)
        .args(["--no-verify", "--json", "--metadata-mode", "off"])
        .output()
        .expect("cartage runs");
    assert!(output.status.success(), "{}", combined_output(&output));

    let result = json_stdout(&output);
    assert_eq!(result["status"], "success");
    // Without verification there is no readback, so no per-file records
    assert_eq!(result["total_files"], 0);
    assert!(dst.join("clip.mov").exists());
}
