//! Integration tests for swcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    /// Command isolated from the user's config, storage and environment
    fn swcache(home: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("swcache");
        cmd.env_remove("SWCACHE_GENERATION")
            .env_remove("SWCACHE_CONFIG")
            .env_remove("SWCACHE_STORAGE")
            .current_dir(home.path())
            .arg("--no-local")
            .arg("--config")
            .arg(home.path().join("config.toml"))
            .arg("--storage")
            .arg(home.path().join("storage"));
        cmd
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("swcache")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Versioned offline caching layer"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("swcache")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("swcache"));
    }

    #[test]
    fn config_path() {
        let home = TempDir::new().unwrap();
        swcache(&home)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let home = TempDir::new().unwrap();
        swcache(&home)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("erp-admin"));
    }

    #[test]
    fn config_init_then_refuses_overwrite() {
        let home = TempDir::new().unwrap();
        swcache(&home)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(home.path().join("config.toml").exists());

        swcache(&home)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let home = TempDir::new().unwrap();
        fs::write(home.path().join("config.toml"), "[cache\nprefix = ").unwrap();
        swcache(&home)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn stamp_writes_generation_and_descriptor() {
        let home = TempDir::new().unwrap();
        let script = home.path().join("sw.js");
        fs::write(&script, "const GENERATION = '__SW_GENERATION__';\n").unwrap();

        swcache(&home)
            .args(["stamp", "--generation", "20260101120000"])
            .arg(&script)
            .assert()
            .success()
            .stdout(predicate::str::contains("20260101120000"));

        let stamped = fs::read_to_string(&script).unwrap();
        assert_eq!(stamped, "const GENERATION = '20260101120000';\n");

        let descriptor = fs::read_to_string(home.path().join("version.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&descriptor).unwrap();
        assert_eq!(value["version"], "20260101120000");
        assert!(value["builtAt"].is_string());
    }

    #[test]
    fn stamp_without_placeholder_fails() {
        let home = TempDir::new().unwrap();
        let script = home.path().join("sw.js");
        fs::write(&script, "const GENERATION = 'already';\n").unwrap();

        swcache(&home)
            .args(["stamp", "--generation", "g1"])
            .arg(&script)
            .assert()
            .failure()
            .stderr(predicate::str::contains("__SW_GENERATION__"));
        assert!(!home.path().join("version.json").exists());
    }

    #[test]
    fn namespaces_empty_storage() {
        let home = TempDir::new().unwrap();
        swcache(&home)
            .arg("namespaces")
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache namespaces found"));
    }

    #[test]
    fn namespaces_json_empty() {
        let home = TempDir::new().unwrap();
        swcache(&home)
            .args(["namespaces", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn clear_with_nothing_to_clear() {
        let home = TempDir::new().unwrap();
        swcache(&home)
            .args(["clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No namespaces under prefix"));
    }

    #[test]
    fn install_requires_generation() {
        let home = TempDir::new().unwrap();
        swcache(&home)
            .args(["install", "--scope", "https://admin.test/"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No generation given"));
    }

    #[test]
    fn install_rejects_bad_scope() {
        let home = TempDir::new().unwrap();
        swcache(&home)
            .args(["install", "--scope", "https://admin.test/app", "--generation", "g1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn offline_navigation_without_cache_is_error_response() {
        let home = TempDir::new().unwrap();
        swcache(&home)
            .args([
                "fetch",
                "https://admin.test/orders",
                "--scope",
                "https://admin.test/",
                "--generation",
                "g1",
                "--navigate",
                "--offline",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("network error"));
    }

    #[test]
    fn offline_static_miss_fails() {
        let home = TempDir::new().unwrap();
        swcache(&home)
            .args([
                "fetch",
                "https://admin.test/assets/app.js",
                "--scope",
                "https://admin.test/",
                "--generation",
                "g1",
                "--offline",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Network request"));
    }
}
