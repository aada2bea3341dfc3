mod common;

use predicates::prelude::*;
use predicates::str::contains;

use common::{tally, tally_home, tally_script};

const SETUP: &str = "\
company add Studio
client add Acme
contract add Acme Main hourly 100
track add Acme 2024-06-03 3 --contract Main
track add Acme 2024-06-04 2 --contract Main
";

#[test]
fn script_mode_bills_tracked_time() {
    let home = tally_home();
    let script = format!("{SETUP}unbilled\ninvoice create Acme\ninvoice list\nexit\n");

    tally_script(&home, &script)
        .assert()
        .success()
        .stdout(contains("5.00"))
        .stdout(contains("500.00 USD"))
        .stdout(contains("Invoice INV-"))
        .stdout(contains("-ACME-001"));

    assert!(home.path().join("tally.db").exists());
}

#[test]
fn state_persists_between_invocations() {
    let home = tally_home();
    tally_script(&home, SETUP).assert().success();

    tally(&home)
        .args(["invoice", "all"])
        .assert()
        .success()
        .stdout(contains("1 invoice(s) created, 0 group(s) skipped."));

    tally(&home)
        .args(["unbilled"])
        .assert()
        .success()
        .stdout(contains("Nothing to invoice."));
}

#[test]
fn batch_reports_groups_it_cannot_price() {
    let home = tally_home();
    let script = format!("{SETUP}client add Gamma\ntrack add Gamma 2024-06-05 4\ninvoice all\n");

    tally_script(&home, &script)
        .assert()
        .success()
        .stdout(contains("Skipped Gamma: No rate configured"))
        .stdout(contains("1 invoice(s) created, 1 group(s) skipped."));
}

#[test]
fn one_shot_failure_exits_non_zero() {
    let home = tally_home();
    tally(&home)
        .args(["invoice", "create", "Nobody"])
        .assert()
        .failure()
        .stderr(contains("Error: Not found: client `Nobody`"));
}

#[test]
fn unknown_command_suggests_closest_match() {
    let home = tally_home();
    tally(&home)
        .arg("invioce")
        .assert()
        .failure()
        .stdout(contains("Suggestion: `invoice`?"))
        .stderr(contains("unknown command"));
}

#[test]
fn config_set_survives_restart() {
    let home = tally_home();
    tally(&home)
        .args(["config", "set", "payment_terms_days", "14"])
        .assert()
        .success();

    tally(&home)
        .args(["config", "show", "--json"])
        .assert()
        .success()
        .stdout(contains("\"payment_terms_days\": 14"));
}

#[test]
fn version_and_help_render() {
    let home = tally_home();
    tally(&home)
        .arg("version")
        .assert()
        .success()
        .stdout(contains("Tally").and(contains("Schema ver")));

    tally(&home)
        .args(["help", "track"])
        .assert()
        .success()
        .stdout(contains("track start <client>"));
}
