use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("forgedb-cli").unwrap();
    cmd.arg("--non-interactive");
    cmd
}

#[test]
fn create_insert_select_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let script = "CREATE TABLE t(id INT PRIMARY KEY, v TEXT);\n\
                  INSERT INTO t(id, v) VALUES (1, 'hello');\n\
                  SELECT id, v FROM t;\n";

    cmd()
        .arg(format!("--query={}", script))
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATE TABLE t"))
        .stdout(predicate::str::contains("INSERT 1 row(s)"))
        .stdout(predicate::str::contains("hello"));

    Ok(())
}

#[test]
fn unknown_table_reports_a_schema_error() -> Result<(), Box<dyn std::error::Error>> {
    cmd()
        .arg("--query=SELECT * FROM nosuchtable;")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nosuchtable"));

    Ok(())
}

#[test]
fn transaction_rolls_back_an_insert() -> Result<(), Box<dyn std::error::Error>> {
    let script = "CREATE TABLE t(id INT PRIMARY KEY, v INT);\n\
                  BEGIN;\n\
                  INSERT INTO t(id, v) VALUES (1, 9);\n\
                  ROLLBACK;\n\
                  SELECT COUNT(*) FROM t;\n";

    cmd()
        .arg(format!("--query={}", script))
        .assert()
        .success()
        .stdout(predicate::str::contains("ROLLBACK"))
        .stdout(predicate::str::contains("0"));

    Ok(())
}
