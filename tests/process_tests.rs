//! Child-process substrate and the CLI binary.

use cvfanout::pipeline::{Coordinator, WriteReply, serve_stdio};
use cvfanout::{
    Destination, PoolConfig, RunState, Substrate, WorkItem, WriteRequest, artifact_file_name,
};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

const BIN: &str = env!("CARGO_BIN_EXE_cvfanout");

fn item(id: u64, category: &str) -> WorkItem {
    WorkItem::new(
        id,
        vec![
            ("Name".to_string(), format!("p{id}")),
            ("Category".to_string(), category.to_string()),
        ],
    )
}

fn request(root: &Path, id: u64, category: &str) -> WriteRequest {
    WriteRequest {
        item: item(id, category),
        destination: Destination {
            root: root.to_path_buf(),
            category: category.to_string(),
        },
    }
}

#[test]
fn test_serve_stdio_replies_per_line() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("Broken"), b"in the way").unwrap();

    let mut input = String::new();
    for req in [request(tmp.path(), 0, "Eng"), request(tmp.path(), 1, "Broken")] {
        input.push_str(&serde_json::to_string(&req).unwrap());
        input.push('\n');
    }
    input.push_str("{not json}\n\n");

    let mut output = Vec::new();
    let served = serve_stdio(Cursor::new(input), &mut output).unwrap();
    assert_eq!(served, 3);

    let replies: Vec<WriteReply> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(
        replies[0],
        WriteReply::Written {
            item_id: 0,
            path: tmp.path().join("Eng").join(artifact_file_name(0)),
        }
    );
    assert!(matches!(&replies[1], WriteReply::Failed { item_id: Some(1), .. }));
    assert!(
        matches!(&replies[2], WriteReply::Failed { item_id: None, reason } if reason.starts_with("bad request"))
    );
}

#[test]
fn test_process_substrate_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("Broken"), b"in the way").unwrap();
    let items: Vec<_> = (0..12)
        .map(|id| item(id, if id == 5 { "Broken" } else { ["A", "B"][(id % 2) as usize] }))
        .map(Ok)
        .collect();
    let config = PoolConfig {
        worker_count: 3,
        queue_capacity: 2,
        max_concurrent_active: Some(2),
        join_timeout: Duration::from_secs(30),
    };
    let summary = Coordinator::new(tmp.path(), config)
        .with_substrate(Substrate::Processes {
            program: PathBuf::from(BIN),
        })
        .run(items)
        .unwrap();

    assert_eq!(summary.drained_via, RunState::Joined);
    assert_eq!((summary.submitted, summary.succeeded, summary.failed), (12, 11, 1));
    assert_eq!(summary.failures()[0].0, 5);
    assert_eq!(
        fs::read_to_string(tmp.path().join("A/item_4.txt")).unwrap(),
        "=== CV 4 ===\nName: p4\nCategory: A\n"
    );
    assert!(tmp.path().join("B/item_11.txt").is_file());
}

#[test]
fn test_missing_worker_program_aborts_run() {
    let tmp = tempfile::tempdir().unwrap();
    let config = PoolConfig {
        worker_count: 2,
        queue_capacity: 2,
        max_concurrent_active: None,
        join_timeout: Duration::from_secs(5),
    };
    let result = Coordinator::new(tmp.path(), config)
        .with_substrate(Substrate::Processes {
            program: tmp.path().join("no-such-worker"),
        })
        .run(vec![Ok(item(0, "A"))]);
    assert!(result.is_err());
}

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(BIN);
    cmd.current_dir(dir).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_run() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("in.csv"), "Name,Category\nAda,Eng\nBob,\n").unwrap();
    let out = cli(tmp.path())
        .args(["in.csv", "-o", "out", "-w", "2", "-t", "10"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("succeeded: 2"), "{stdout}");
    assert!(stdout.contains("failed: 0"), "{stdout}");
    assert!(tmp.path().join("out/Eng/item_0.txt").is_file());
    assert!(tmp.path().join("out/Unknown/item_1.txt").is_file());
}

#[test]
fn test_cli_processes_flag() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("in.csv"), "Name,skills\nAda,Rust\n").unwrap();
    let out = cli(tmp.path())
        .args(["in.csv", "-o", "out", "--processes"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(tmp.path().join("out/Rust/item_0.txt").is_file());
}

#[test]
fn test_cli_reads_config_file() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("in.csv"), "Name,Dept\nAda,Ops\nBob,\n").unwrap();
    fs::write(
        tmp.path().join(".cvfanout.toml"),
        "[settings]\noutput = \"from_file\"\nworkers = 1\ncategory_fields = [\"Dept\"]\ndefault_category = \"None\"\n",
    )
    .unwrap();
    let out = cli(tmp.path()).arg("in.csv").output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(tmp.path().join("from_file/Ops/item_0.txt").is_file());
    assert!(tmp.path().join("from_file/None/item_1.txt").is_file());
}

#[test]
fn test_cli_missing_input_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let out = cli(tmp.path()).args(["missing.csv", "-o", "out"]).output().unwrap();
    assert!(!out.status.success());
    assert!(!tmp.path().join("out").exists());
}

#[test]
fn test_cli_invalid_pool_fails() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("in.csv"), "Name\nAda\n").unwrap();
    let out = cli(tmp.path()).args(["in.csv", "-w", "0"]).output().unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("worker_count"));
}

#[test]
fn test_cli_malformed_config_is_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("in.csv"), "Name,Category\nAda,Eng\n").unwrap();
    fs::write(tmp.path().join(".cvfanout.toml"), "[settings]\nthreads = 3\n").unwrap();
    let out = cli(tmp.path()).args(["in.csv", "-o", "out"]).output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stderr).contains("ignored"));
    assert!(tmp.path().join("out/Eng/item_0.txt").is_file());
}

#[test]
fn test_cli_verbose_keeps_logs_from_option_building() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("in.csv"), "Name,Category\nAda,Eng\n").unwrap();
    let out = cli(tmp.path())
        .args(["in.csv", "-o", "out", "-v"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("pool defaults"), "{stderr}");
}

#[test]
fn test_cli_verbose_from_config_file() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("in.csv"), "Name,Category\nAda,Eng\n").unwrap();
    fs::write(tmp.path().join(".cvfanout.toml"), "[settings]\nverbose = true\n").unwrap();
    let out = cli(tmp.path()).args(["in.csv", "-o", "out"]).output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stderr).contains("pool defaults"));
}

#[test]
fn test_cli_zero_max_concurrent_disables_throttle() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("in.csv"), "Name,Category\nAda,Eng\nBob,Ops\n").unwrap();
    let out = cli(tmp.path())
        .args(["in.csv", "-o", "out", "-w", "2", "-s", "0", "-v"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stderr).contains("throttle None"));
}

#[test]
fn test_cli_reads_workbook() {
    let tmp = tempfile::tempdir().unwrap();
    let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/cvs.xlsx");
    fs::copy(fixture, tmp.path().join("cvs.xlsx")).unwrap();
    let out = cli(tmp.path()).args(["cvs.xlsx", "-o", "out"]).output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("succeeded: 4"));
    assert!(tmp.path().join("out/Chef/item_2.txt").is_file());
}
