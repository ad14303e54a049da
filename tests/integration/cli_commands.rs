#![allow(missing_docs)]

mod support;

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use csv::ReaderBuilder;
use serde_json::Value;
use support::{scenario, Fixture};

fn jobscope(fixture: &Fixture) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("jobscope");
    cmd.env_remove("JOBSCOPE_DATASET")
        .env_remove("JOBSCOPE_CONFIG")
        .arg("--dataset")
        .arg(fixture.path())
        .arg("--config")
        .arg(missing_config(fixture.dir()));
    cmd
}

fn missing_config(dir: &Path) -> std::path::PathBuf {
    dir.join("none.toml")
}

fn stdout_json(cmd: &mut assert_cmd::Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("valid json")
}

fn stderr_of(cmd: &mut assert_cmd::Command) -> String {
    let output = cmd.assert().failure().get_output().stderr.clone();
    String::from_utf8(output).expect("utf8 stderr")
}

#[test]
fn page_json_reports_totals_and_entities() {
    let fixture = scenario(false);
    let json = stdout_json(jobscope(&fixture).args([
        "--format",
        "json",
        "page",
        "--filter",
        "city=Chisinau",
        "--page-size",
        "1",
    ]));
    assert_eq!(json["total_count"], 2);
    assert_eq!(json["total_pages"], 2);
    assert_eq!(json["page"], 1);
    let entities = json["entities"].as_array().expect("entities");
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0]["id"], 2);
}

#[test]
fn page_csv_has_one_record_per_job() {
    let fixture = scenario(false);
    let output = jobscope(&fixture)
        .args(["--format", "csv", "page", "--filter", "hard_skills=SQL"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let mut reader = ReaderBuilder::new().from_reader(output.as_slice());
    let headers = reader.headers().expect("headers").clone();
    assert_eq!(headers.get(0), Some("id"));
    assert_eq!(headers.get(5), Some("salary"));
    let ids: Vec<String> = reader
        .records()
        .map(|r| r.expect("record")[0].to_string())
        .collect();
    assert_eq!(ids, ["2", "4", "3"]);
}

#[test]
fn facets_exclude_their_own_selection() {
    let fixture = scenario(false);
    let json = stdout_json(jobscope(&fixture).args([
        "--format",
        "json",
        "facets",
        "city",
        "--filter",
        "city=Balti",
    ]));
    let labels: Vec<(&str, u64)> = json
        .as_array()
        .expect("facets")
        .iter()
        .map(|f| (f["label"].as_str().unwrap(), f["count"].as_u64().unwrap()))
        .collect();
    assert_eq!(labels, [("Chisinau", 2), ("Balti", 1), ("Cahul", 1)]);
}

#[test]
fn job_prints_hydrated_view() {
    let fixture = scenario(false);
    let json = stdout_json(jobscope(&fixture).args(["--format", "json", "job", "1"]));
    assert_eq!(json["company"], "Acme");
    assert_eq!(json["requirements"]["languages"][0], "Romanian");

    let text = jobscope(&fixture)
        .args(["--quiet", "--color", "never", "job", "1"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(text).expect("utf8");
    assert!(text.contains("Job #1"), "{text}");
    assert!(text.contains("1,000 - 2,000 EUR"), "{text}");
    assert!(text.contains("Hard skills\n  - Python"), "{text}");
    assert!(!text.contains('\u{1b}'), "{text}");
}

#[test]
fn missing_job_fails() {
    let fixture = scenario(false);
    let stderr = stderr_of(jobscope(&fixture).args(["job", "99"]));
    assert!(stderr.contains("job 99 not found"), "{stderr}");
}

#[test]
fn analyses_do_not_need_a_dataset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = cargo_bin_cmd!("jobscope")
        .env_remove("JOBSCOPE_DATASET")
        .arg("--config")
        .arg(missing_config(dir.path()))
        .args(["--format", "json", "analyses"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    let names: Vec<&str> = json
        .as_array()
        .expect("templates")
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert!(names.contains(&"in_demand_skills"));
    assert!(names.contains(&"salary_by_experience"));

    let output = cargo_bin_cmd!("jobscope")
        .env_remove("JOBSCOPE_DATASET")
        .arg("--config")
        .arg(missing_config(dir.path()))
        .args(["--format", "csv", "analyses", "--category", "skills"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let mut reader = ReaderBuilder::new().from_reader(output.as_slice());
    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.expect("record")).collect();
    assert!(records.iter().all(|r| &r[0] == "skills"));
    assert!(records.iter().any(|r| &r[1] == "skill_pairs"));
    assert!(!records.iter().any(|r| &r[1] == "salary_by_experience"));

    let stderr = String::from_utf8(
        cargo_bin_cmd!("jobscope")
            .env_remove("JOBSCOPE_DATASET")
            .arg("--config")
            .arg(missing_config(dir.path()))
            .args(["analyses", "--category", "astrology"])
            .assert()
            .failure()
            .get_output()
            .stderr
            .clone(),
    )
    .expect("utf8 stderr");
    assert!(stderr.contains("error[UnknownCategory]"), "{stderr}");
}

#[test]
fn remote_preset_pages_like_the_default() {
    let fixture = scenario(false);
    let args = ["--format", "json", "page", "--filter", "hard_skills=SQL"];
    let local = stdout_json(jobscope(&fixture).args(args));
    let remote = stdout_json(jobscope(&fixture).args(["--preset", "remote"]).args(args));
    assert_eq!(local, remote);
    assert_eq!(remote["total_count"], 3);
}

#[test]
fn analyze_returns_rows() {
    let fixture = scenario(false);
    let json = stdout_json(jobscope(&fixture).args([
        "--format",
        "json",
        "analyze",
        "in_demand_skills",
    ]));
    assert_eq!(json["title"], "Most In-Demand Skills");
    assert_eq!(json["category"], "skills");
    let rows = json["rows"].as_array().expect("rows");
    assert_eq!(rows[0]["skill"], "Python");
    assert_eq!(rows[0]["job_count"], 3);
}

#[test]
fn unknown_field_reports_its_code() {
    let fixture = scenario(false);
    let stderr = stderr_of(jobscope(&fixture).args(["page", "--filter", "planet=Mars"]));
    assert!(stderr.contains("error[UnknownField]"), "{stderr}");
}

#[test]
fn malformed_filter_is_rejected() {
    let fixture = scenario(false);
    let stderr = stderr_of(jobscope(&fixture).args(["page", "--filter", "city"]));
    assert!(stderr.contains("expected FIELD=VALUE"), "{stderr}");

    let stderr = stderr_of(jobscope(&fixture).args(["page", "--range", "salary=lots.."]));
    assert!(stderr.contains("invalid bound"), "{stderr}");
}

#[test]
fn csv_is_refused_for_single_jobs() {
    let fixture = scenario(false);
    let stderr = stderr_of(jobscope(&fixture).args(["--format", "csv", "job", "1"]));
    assert!(stderr.contains("csv output"), "{stderr}");
}

#[test]
fn sql_is_read_only() {
    let fixture = scenario(false);
    let stderr = stderr_of(jobscope(&fixture).args(["sql", "DELETE FROM job_details"]));
    assert!(stderr.contains("error[QueryFailed]"), "{stderr}");
}
