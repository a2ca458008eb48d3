// tests/cli_binary.rs
//
// Drives the compiled `within` binary end to end.

use std::error::Error;
use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

fn workspace(dirs: &[&str]) -> Result<TempDir, Box<dyn Error>> {
    let root = TempDir::new()?;
    for dir in dirs {
        fs::create_dir(root.path().join(dir))?;
    }
    Ok(root)
}

fn within(root: &TempDir, args: &[&str]) -> Result<Output, Box<dyn Error>> {
    Ok(Command::new(env!("CARGO_BIN_EXE_within"))
        .args(args)
        .current_dir(root.path())
        .env_remove("WITHIN_CONFIG")
        .env_remove("WITHIN_LOG")
        .output()?)
}

#[test]
fn runs_command_in_each_directory() -> TestResult {
    let root = workspace(&["a", "b"])?;
    let out = within(&root, &["a", "b", "--", "echo", "hi"])?;

    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8(out.stdout)?, "a: hi\nb: hi\n");
    assert!(out.stderr.is_empty());
    Ok(())
}

#[test]
fn parallel_run_keeps_lines_whole() -> TestResult {
    let root = workspace(&["a", "b", "c"])?;
    let out = within(&root, &["-j", "3", "a", "b", "c", "--", "echo", "hi"])?;

    assert_eq!(out.status.code(), Some(0));
    let mut lines: Vec<String> = String::from_utf8(out.stdout)?
        .lines()
        .map(str::to_string)
        .collect();
    lines.sort();
    assert_eq!(lines, ["a: hi", "b: hi", "c: hi"]);
    Ok(())
}

#[test]
fn single_directory_form() -> TestResult {
    let root = workspace(&["repo"])?;
    let out = within(&root, &["repo", "sh", "-c", "echo out; echo err >&2"])?;

    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8(out.stdout)?, "repo: out\n");
    assert_eq!(String::from_utf8(out.stderr)?, "repo: err\n");
    Ok(())
}

#[test]
fn failing_job_gives_exit_status_one() -> TestResult {
    let root = workspace(&["a", "b"])?;
    let out = within(&root, &["-j", "2", "a", "b", "--", "false"])?;

    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    assert!(out.stderr.is_empty());

    let out = within(&root, &["a", "sh", "-c", "exit 7"])?;
    assert_eq!(out.status.code(), Some(1));
    Ok(())
}

#[test]
fn missing_directory_is_reported_with_its_prefix() -> TestResult {
    let root = workspace(&["a"])?;
    let out = within(&root, &["missing", "a", "--", "echo", "hi"])?;

    assert_eq!(out.status.code(), Some(1));
    assert_eq!(String::from_utf8(out.stdout)?, "a: hi\n");
    let stderr = String::from_utf8(out.stderr)?;
    assert!(stderr.starts_with("missing: within: chdir: "), "stderr was {stderr:?}");
    Ok(())
}

#[test]
fn usage_errors_exit_with_two() -> TestResult {
    let root = workspace(&["a"])?;
    for args in [&[][..], &["a"][..], &["a", "--"][..], &["-j", "0", "a", "true"][..]] {
        let out = within(&root, args)?;
        assert_eq!(out.status.code(), Some(2), "{args:?}");
        assert!(out.stdout.is_empty(), "{args:?}");
    }
    Ok(())
}

#[test]
fn config_file_supplies_jobs_and_bad_config_is_fatal() -> TestResult {
    let root = workspace(&["a"])?;
    fs::write(root.path().join("good.toml"), "jobs = 2\n")?;
    fs::write(root.path().join("bad.toml"), "jobs = 0\n")?;

    let out = within(&root, &["--config", "good.toml", "a", "true"])?;
    assert_eq!(out.status.code(), Some(0));

    let out = within(&root, &["--config", "bad.toml", "a", "true"])?;
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8(out.stderr)?;
    assert!(stderr.starts_with("within: config: "), "stderr was {stderr:?}");
    Ok(())
}
