use assert_cmd::Command;
use predicates::prelude::*;
use rusqlite::{params, Connection};
use std::fs;
use tempfile::TempDir;

fn workspace() -> TempDir {
    let dir = TempDir::new().expect("temp dir");

    let conn = Connection::open(dir.path().join("tweets.db")).expect("create db");
    conn.execute_batch(
        "CREATE TABLE tweets (
            tweet_id INTEGER PRIMARY KEY,
            usnmtext TEXT,
            search_term TEXT,
            term_present INTEGER,
            corr_def REAL
        );",
    )
    .expect("schema");
    for (id, label) in [(1, None), (2, None), (3, Some(1.0))] {
        conn.execute(
            "INSERT INTO tweets VALUES (?1, ?2, 'canyon', 1, ?3)",
            params![id, format!("hiking the canyon, day {id}"), label],
        )
        .expect("insert");
    }

    fs::write(
        dir.path().join("tasks.csv"),
        "canyon,a deep gorge with a river\nmesa,a flat-topped hill\n",
    )
    .expect("write tasks");

    dir
}

fn labeler(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("labeler").expect("binary builds");
    cmd.current_dir(dir.path())
        .env_remove("GEMINI_API_KEY")
        .env_remove("GOOGLE_API_KEY")
        .env_remove("LABELER_TABLE")
        .env_remove("LABELER_BATCH_SIZE")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let dir = workspace();
    labeler(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("prompt"));
}

#[test]
fn test_status_reports_counts() {
    let dir = workspace();
    labeler(&dir)
        .args(["status", "--db", "tweets.db", "--tasks", "tasks.csv"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"canyon\s+2\s+1\s+1").expect("valid regex"))
        .stdout(predicate::str::is_match(r"mesa\s+0\s+0\s+0").expect("valid regex"));
}

#[test]
fn test_prompt_prints_first_batch() {
    let dir = workspace();
    labeler(&dir)
        .args([
            "prompt", "--db", "tweets.db", "--tasks", "tasks.csv", "--phrase", "canyon",
            "--batch-size", "1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Target Phrase: canyon"))
        .stdout(predicate::str::contains("ID: 1 | Tweet: hiking the canyon, day 1"))
        .stdout(predicate::str::contains("ID: 2 |").not());
}

#[test]
fn test_prompt_unknown_phrase_fails() {
    let dir = workspace();
    labeler(&dir)
        .args(["prompt", "--db", "tweets.db", "--tasks", "tasks.csv", "--phrase", "butte"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_run_without_api_key_fails() {
    let dir = workspace();
    labeler(&dir)
        .args(["run", "--db", "tweets.db", "--tasks", "tasks.csv"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("GEMINI_API_KEY"))
        .stdout(predicate::str::contains("Missing API key").not())
        .stderr(predicate::str::contains("Missing API key").count(1));
}

#[test]
fn test_missing_database_fails() {
    let dir = workspace();
    labeler(&dir)
        .args(["status", "--db", "missing.db", "--tasks", "tasks.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open record store"));
}
