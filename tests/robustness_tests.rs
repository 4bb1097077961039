use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod common;

#[test]
fn test_malformed_csv_handling() {
    let csv = common::write_batch(&[
        &["open", "1", "main", "", "", "USD"],
        // Valid deposit
        &["deposit", "1", "main", "", "1.0"],
        // Unknown command
        &["refund", "1", "main", "", "1.0"],
        // Missing amount
        &["deposit", "1", "main", "", ""],
        // Valid deposit again
        &["deposit", "1", "main", "", "2.0"],
    ]);

    let mut cmd = Command::new(cargo_bin!("bankledger"));
    cmd.arg(csv.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("command rejected"))
        .stdout(predicate::str::contains("main,"))
        .stdout(predicate::str::contains(",USD,3.00,true"));
}

#[test]
fn test_invalid_data_types() {
    let csv = common::write_batch(&[
        &["open", "1", "main", "", "", "USD"],
        // Text in amount field
        &["deposit", "1", "main", "", "not_a_number"],
        // Non-integer user alias
        &["deposit", "abc", "main", "", "1.0"],
        // Bad currency code
        &["open", "1", "other", "", "", "DOLLARS"],
        // Valid deposit
        &["deposit", "1", "main", "", "5.0"],
    ]);

    let mut cmd = Command::new(cargo_bin!("bankledger"));
    cmd.arg(csv.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("CSV error"))
        .stdout(predicate::str::contains(",USD,5.00,true"))
        .stdout(predicate::str::contains("other,").not());
}

#[test]
fn test_unknown_account_reference() {
    let csv = common::write_batch(&[
        &["open", "1", "main", "", "", "USD"],
        &["deposit", "1", "main", "", "10"],
        &["transfer", "1", "main", "nowhere", "5"],
    ]);

    let mut cmd = Command::new(cargo_bin!("bankledger"));
    cmd.arg(csv.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Account nowhere not found"))
        .stdout(predicate::str::contains(",USD,10.00,true"));
}
