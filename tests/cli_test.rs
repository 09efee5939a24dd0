use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_cli_checkout_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("farmart"));
    cmd.args(["--catalog", "tests/fixtures/catalog.csv"])
        .args(["checkout", "--buyer", "20", "tests/fixtures/cart.csv"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("order,buyer,status,lines,total"))
        .stdout(predicate::str::contains("1,20,CONFIRMED,2,35000.00"));

    Ok(())
}

#[test]
fn test_cli_listings() {
    let mut cmd = Command::new(cargo_bin!("farmart"));
    cmd.args(["--catalog", "tests/fixtures/catalog.csv", "listings"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1,10,Goat-X,goat,15000.00,3,3,false,true"))
        .stdout(predicate::str::contains("3,11,Friesian heifer,cow,85000.00,1,1,false,true"));
}

#[test]
fn test_cli_self_purchase_fails() {
    let mut cmd = Command::new(cargo_bin!("farmart"));
    cmd.args(["--catalog", "tests/fixtures/catalog.csv"])
        .args(["checkout", "--buyer", "10", "tests/fixtures/cart.csv"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("cannot order your own listing"));
}

#[test]
fn test_cli_callback_always_acknowledged() {
    let mut cmd = Command::new(cargo_bin!("farmart"));
    cmd.args(["callback", "tests/fixtures/callback_unmatched.json"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#"{"ResultCode":0,"ResultDesc":"Accepted"}"#))
        .stderr(predicate::str::contains("Unmatched payment callback acknowledged"));
}

#[test]
fn test_cli_malformed_callback_acknowledged() {
    let payload = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(payload.path(), "{ not json").unwrap();

    let mut cmd = Command::new(cargo_bin!("farmart"));
    cmd.arg("callback").arg(payload.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#"{"ResultCode":0,"ResultDesc":"Accepted"}"#))
        .stderr(predicate::str::contains("Malformed payment callback"));
}

#[test]
fn test_cli_unknown_order_is_opaque_to_buyers() {
    let mut cmd = Command::new(cargo_bin!("farmart"));
    cmd.args(["--catalog", "tests/fixtures/catalog.csv"]).args([
        "transition", "--actor", "20", "--role", "buyer", "--order", "1", "--status", "paid",
    ]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("forbidden"));
}
