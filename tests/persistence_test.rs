#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: seed the catalog and check out
    let mut cmd1 = Command::new(cargo_bin!("farmart"));
    cmd1.arg("--db-path")
        .arg(&db_path)
        .args(["--catalog", "tests/fixtures/catalog.csv"])
        .args(["checkout", "--buyer", "20", "tests/fixtures/cart.csv"]);

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("1,20,CONFIRMED,2,35000.00"));

    // 2. Second run: the seed file is ignored and the order is still there
    let mut cmd2 = Command::new(cargo_bin!("farmart"));
    cmd2.arg("--db-path")
        .arg(&db_path)
        .args(["--catalog", "tests/fixtures/catalog.csv"])
        .args(["orders", "--actor", "10", "--role", "farmer"]);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    assert!(stdout2.contains("1,20,CONFIRMED,2,35000.00"));

    // 3. Third run: reserved stock was persisted with the order
    let mut cmd3 = Command::new(cargo_bin!("farmart"));
    cmd3.arg("--db-path").arg(&db_path).arg("listings");

    let output3 = cmd3.output().expect("Failed to execute command");
    assert!(output3.status.success());
    let stdout3 = String::from_utf8_lossy(&output3.stdout);
    assert!(stdout3.contains("1,10,Goat-X,goat,15000.00,1,1,false,true"));
    assert!(stdout3.contains("2,10,Goat-Y,goat,5000.00,0,0,true,true"));
}
