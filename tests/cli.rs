use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SALES_CSV: &str = "\
date,category,quantity,total_amount
2024-03-12,SHOP,,85000
2024-03-12,SALON,,40000
2024-03-13,CHARCOAL,30,600000
";

const DAILY_LOG: &str = "\
12/3/24
Shop sales: 85,000
Salon: nil
Charcoal(30bags): 600000
Shop exp: 12000
";

fn estate(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("estate").unwrap();
    cmd.env("HOME", home)
        .env("ESTATE_DATA_DIR", home.join("data"))
        .env("NO_COLOR", "1")
        .env_remove("ESTATE_LOG");
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().to_string()
}

#[test]
fn template_prints_sales_columns() {
    let home = TempDir::new().unwrap();
    estate(home.path())
        .args(["template", "--kind", "sales"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "date,category,description,quantity,unit_price,total_amount",
        ));
}

#[test]
fn template_writes_asset_file() {
    let home = TempDir::new().unwrap();
    let out = home.path().join("assets.csv");
    estate(home.path())
        .args(["template", "--kind", "assets", "--output"])
        .arg(&out)
        .assert()
        .success();
    let written = std::fs::read_to_string(out).unwrap();
    assert!(written.starts_with("name,category,purchase_date"));
}

#[test]
fn unknown_kind_is_rejected() {
    let home = TempDir::new().unwrap();
    estate(home.path())
        .args(["template", "--kind", "tenants"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown import kind: tenants"));
}

#[test]
fn check_flags_unknown_category() {
    let home = TempDir::new().unwrap();
    let file = write(
        &home,
        "bad.csv",
        "date,category,total_amount\n2024-03-12,SHOP,100\n2024-03-12,BOGUS,200\n",
    );
    estate(home.path())
        .args(["check", &file])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Row 2"))
        .stdout(predicate::str::contains("Invalid category 'BOGUS'"))
        .stdout(predicate::str::contains("2 rows, 1 valid, 1 error(s), 0 warning(s)"))
        .stderr(predicate::str::contains("Import blocked"));
}

#[test]
fn check_json_reports_daily_log() {
    let home = TempDir::new().unwrap();
    let output = estate(home.path())
        .args(["check", "-", "--json"])
        .write_stdin(DAILY_LOG)
        .output()
        .unwrap();
    assert!(output.status.success());
    let batch: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(batch["format"], "Freeform");
    assert_eq!(batch["summary"]["total"], 3);
    assert_eq!(batch["summary"]["error_count"], 0);
    assert_eq!(batch["rows"][2]["fields"]["unit_price"], "20000");
    assert_eq!(batch["rows"][1]["fields"]["payment_status"], "PENDING");
}

#[test]
fn check_reads_greeting_first_daily_log() {
    let home = TempDir::new().unwrap();
    estate(home.path())
        .args(["check", "-"])
        .write_stdin("Good evening boss\nMonday 12/3/24\nSalon: 40000\nCinema: 15000\nMM: 7500\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Parsed freeform input"))
        .stdout(predicate::str::contains("MOBILE_MONEY"))
        .stdout(predicate::str::contains("3 rows, 3 valid"));
}

#[test]
fn check_reads_undated_asset_log() {
    let home = TempDir::new().unwrap();
    estate(home.path())
        .args(["check", "--kind", "assets", "-"])
        .write_stdin("Main house: 120,000,000\nTractor: 4500000\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Parsed freeform input"))
        .stdout(predicate::str::contains("VEHICLE"))
        .stdout(predicate::str::contains("2 rows, 2 valid"));
}

#[test]
fn import_then_rerun_skips_duplicates() {
    let home = TempDir::new().unwrap();
    let file = write(&home, "sales.csv", SALES_CSV);

    estate(home.path())
        .args(["import", &file, "--kind", "sales", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 imported, 0 skipped (duplicates), 0 failed"));

    estate(home.path())
        .args(["import", &file, "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("imported before"))
        .stdout(predicate::str::contains("0 imported, 3 skipped (duplicates), 0 failed"));

    estate(home.path())
        .args(["sales", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CHARCOAL"))
        .stdout(predicate::str::contains("BULK_SALE"))
        .stdout(predicate::str::contains("600,000"));
}

#[test]
fn import_daily_log_from_stdin() {
    let home = TempDir::new().unwrap();
    estate(home.path())
        .args(["import", "-", "--yes"])
        .write_stdin(DAILY_LOG)
        .assert()
        .success()
        .stdout(predicate::str::contains("Parsed freeform input"))
        .stdout(predicate::str::contains("3 imported"));

    estate(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sales:         3 (685,000)"))
        .stdout(predicate::str::contains("Last import:   sales from stdin"));
}

#[test]
fn import_with_errors_is_blocked() {
    let home = TempDir::new().unwrap();
    let file = write(&home, "bad.csv", "date,category,total_amount\n,SHOP,100\n");
    estate(home.path())
        .args(["import", &file, "--yes"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Date is required"))
        .stderr(predicate::str::contains("Import blocked: 1 row error(s)"));

    estate(home.path())
        .args(["sales", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No sales recorded yet."));
}

#[test]
fn import_without_yes_on_pipe_only_previews() {
    let home = TempDir::new().unwrap();
    let file = write(&home, "sales.csv", SALES_CSV);
    estate(home.path())
        .args(["import", &file])
        .assert()
        .success()
        .stdout(predicate::str::contains("Re-run with --yes"));

    estate(home.path())
        .args(["sales", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No sales recorded yet."));
}

#[test]
fn import_assets_and_list() {
    let home = TempDir::new().unwrap();
    let file = write(
        &home,
        "assets.csv",
        "name,category,purchase_price,condition\nTractor,vehicle,45000000,FAIR\nMain House,BUILDING,120000000,\n",
    );
    estate(home.path())
        .args(["import", &file, "--kind", "assets", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 imported"));

    estate(home.path())
        .args(["assets", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tractor"))
        .stdout(predicate::str::contains("VEHICLE"))
        .stdout(predicate::str::contains("Total current value: 165,000,000"));
}

#[test]
fn init_creates_database() {
    let home = TempDir::new().unwrap();
    let data = home.path().join("books");
    estate(home.path())
        .env_remove("ESTATE_DATA_DIR")
        .args(["init", "--data-dir"])
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized estate at"));
    assert!(data.join("estate.db").exists());
    assert!(home.path().join(".config/estate/settings.json").exists());
}
