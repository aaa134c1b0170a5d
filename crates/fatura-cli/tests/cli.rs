use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A `fatura` command isolated from the user's config and credentials.
fn fatura(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fatura").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.path())
        .env("HOME", home.path())
        .env_remove("OPENAI_API_KEY")
        .env_remove("TELEGRAM_BOT_TOKEN")
        .env_remove("TELEGRAM_CHAT_APROVACAO")
        .env_remove("TELEGRAM_CHAT_PAGAMENTO");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    fatura(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("session"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn config_init_get_set() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("fatura.json");
    let path = path.to_str().unwrap();

    fatura(&home)
        .args(["config", "init", "--output", path])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));

    fatura(&home)
        .args(["--config", path, "config", "get", "extraction.model"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"gpt-4\""));

    fatura(&home)
        .args(["--config", path, "config", "set", "extraction.max_retries", "2"])
        .assert()
        .success();

    fatura(&home)
        .args(["--config", path, "config", "get", "extraction.max_retries"])
        .assert()
        .success()
        .stdout(predicate::str::diff("2\n"));

    fatura(&home)
        .args(["--config", path, "config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn config_set_rejects_unknown_key() {
    let home = TempDir::new().unwrap();
    fatura(&home)
        .args(["config", "set", "extraction.modle", "gpt-4o"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("extraction.modle"));
}

#[test]
fn config_show_defaults() {
    let home = TempDir::new().unwrap();
    fatura(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TELEGRAM_CHAT_APROVACAO"))
        .stdout(predicate::str::contains("\"max_input_chars\": 3000"));
}

#[test]
fn process_missing_file() {
    let home = TempDir::new().unwrap();
    fatura(&home)
        .args(["process", "does-not-exist.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn process_requires_api_key() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("nota.txt");
    std::fs::write(&input, "NOTA FISCAL 123\nTotal R$ 873,71").unwrap();

    fatura(&home)
        .arg("process")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn session_requires_credentials() {
    let home = TempDir::new().unwrap();
    fatura(&home)
        .env("OPENAI_API_KEY", "sk-test")
        .arg("session")
        .write_stdin("quit\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TELEGRAM_BOT_TOKEN"));
}

#[test]
fn explicit_config_must_exist() {
    let home = TempDir::new().unwrap();
    fatura(&home)
        .args(["--config", "/nonexistent/fatura.json", "config", "get", "extraction.model"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}
