use assert_cmd::Command;
use tempfile::TempDir;

/// A private `TALLY_HOME` that lives as long as the returned guard.
pub fn tally_home() -> TempDir {
    TempDir::new().expect("create temp dir")
}

/// The `tally` binary pointed at `home`, with colours off.
pub fn tally(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tally").expect("tally binary");
    cmd.env("TALLY_HOME", home.path())
        .env("NO_COLOR", "1")
        .env_remove("TALLY_CLI_SCRIPT")
        .env_remove("RUST_LOG");
    cmd
}

/// Same as [`tally`] but reading commands from stdin.
pub fn tally_script(home: &TempDir, script: &str) -> Command {
    let mut cmd = tally(home);
    cmd.env("TALLY_CLI_SCRIPT", "1").write_stdin(script.to_string());
    cmd
}
