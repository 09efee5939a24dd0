use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_malformed_catalog_rows_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("catalog.csv");
    let mut wtr = csv::Writer::from_path(&catalog).unwrap();
    wtr.write_record([
        "farmer", "name", "kind", "breed", "age_months", "price", "quantity", "description",
    ])
    .unwrap();

    // Valid listing
    wtr.write_record(["10", "Goat-X", "goat", "", "", "15000.00", "3", ""])
        .unwrap();
    // Unknown animal kind
    wtr.write_record(["10", "Nemo", "fish", "", "", "10.00", "1", ""])
        .unwrap();
    // Price that is not a number
    wtr.write_record(["10", "Goat-Z", "goat", "", "", "cheap", "1", ""])
        .unwrap();
    // Valid listing again
    wtr.write_record(["11", "Dorper ram", "sheep", "Dorper", "9", "12000.00", "2", ""])
        .unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let mut cmd = Command::new(cargo_bin!("farmart"));
    cmd.arg("--catalog").arg(&catalog).arg("listings");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Skipping unreadable catalog row"))
        .stdout(predicate::str::contains("1,10,Goat-X,goat,15000.00,3,3,false,true"))
        .stdout(predicate::str::contains("2,11,Dorper ram,sheep,12000.00,2,2,false,true"));
}

#[test]
fn test_invalid_price_rejected_at_publish() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("catalog.csv");
    std::fs::write(
        &catalog,
        "farmer,name,kind,breed,age_months,price,quantity,description\n10,Goat-X,goat,,,0,3,\n",
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("farmart"));
    cmd.arg("--catalog").arg(&catalog).arg("listings");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unit price must be positive"));
}

#[test]
fn test_over_quantity_cart_fails_without_order() {
    let dir = tempfile::tempdir().unwrap();
    let cart = dir.path().join("cart.csv");
    std::fs::write(&cart, "listing,quantity\n1,2\n2,5\n").unwrap();

    let mut cmd = Command::new(cargo_bin!("farmart"));
    cmd.args(["--catalog", "tests/fixtures/catalog.csv", "checkout", "--buyer", "20"])
        .arg(&cart);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("requested 5, available 1"))
        .stdout(predicate::str::contains("CONFIRMED").not());
}
