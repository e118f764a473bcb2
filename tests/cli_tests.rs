use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod common;
use common::{assertions, repository::*};

const REQUIRED_VARS: [&str; 7] = [
    "GRAFANA_URL",
    "GRAFANA_SA_TOKEN",
    "SSH_URL",
    "SSH_KEY",
    "SSH_USER",
    "SSH_EMAIL",
    "REPO_SAVE_PATH",
];

fn bin() -> anyhow::Result<Command> {
    let mut cmd = Command::cargo_bin("grafana-git-sync")?;
    cmd.env_clear();
    Ok(cmd)
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[test]
    fn test_help_lists_flags() -> anyhow::Result<()> {
        bin()?
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--dry-run"))
            .stdout(predicate::str::contains("--once"))
            .stdout(predicate::str::contains("--debug"));
        Ok(())
    }

    #[test]
    fn test_missing_environment_exits_with_failure() -> anyhow::Result<()> {
        bin()?
            .assert()
            .failure()
            .code(1)
            .stderr(assertions::has_error_prefix())
            .stderr(assertions::missing_variable("GRAFANA_URL"));
        Ok(())
    }

    #[test]
    fn test_invalid_branch_strategy_is_rejected() -> anyhow::Result<()> {
        let mut cmd = bin()?;
        for name in REQUIRED_VARS {
            cmd.env(name, "x");
        }
        cmd.env("BRANCH_STRATEGY", "sometimes")
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("BRANCH_STRATEGY"));
        Ok(())
    }

    #[test]
    fn test_missing_ssh_key_fails_validation() -> anyhow::Result<()> {
        let mut cmd = bin()?;
        for name in REQUIRED_VARS {
            cmd.env(name, "x");
        }
        cmd.env("GRAFANA_URL", "http://127.0.0.1:3000")
            .env("SSH_KEY", "/definitely/missing/id_ed25519")
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("SSH key file does not exist"));
        Ok(())
    }

    #[test]
    fn test_once_syncs_grafana_into_remote_branch() -> anyhow::Result<()> {
        let remote = setup_remote()?;
        let key = remote.temp_dir.path().join("id_ed25519");
        std::fs::write(&key, "not a real key")?;

        let mut server = Server::new();
        for (path, body) in [
            ("/api/folders", r#"[{"id":7,"title":"Ops"}]"#),
            (
                "/api/search",
                r#"[{"uid":"a","title":"A","folderId":7},{"uid":"b","title":"B","folderId":0}]"#,
            ),
            ("/api/dashboards/uid/a", r#"{"dashboard":{"uid":"a"}}"#),
            ("/api/dashboards/uid/b", r#"{"dashboard":{"uid":"b"}}"#),
        ] {
            server
                .mock("GET", path)
                .match_query(Matcher::Any)
                .with_header("content-type", "application/json")
                .with_body(body)
                .create();
        }

        bin()?
            .arg("--once")
            .env("GRAFANA_URL", server.url())
            .env("GRAFANA_SA_TOKEN", "token")
            .env("SSH_URL", remote.url())
            .env("SSH_KEY", &key)
            .env("SSH_USER", "Sync Bot")
            .env("SSH_EMAIL", "sync-bot@example.com")
            .env("SSH_ACCEPT_UNKNOWN_HOSTS", "true")
            .env("REPO_CLONE_PATH", remote.clone_path())
            .env("REPO_SAVE_PATH", "dashboards")
            .env("RUN_MODE", "periodic")
            .assert()
            .success()
            .stdout(predicate::str::contains("2 written, 0 deleted"))
            .stdout(predicate::str::contains("committed and pushed"));

        let branches = remote.branches()?;
        assert_eq!(branches.len(), 2);
        let sync_branch = branches
            .iter()
            .find(|b| b.starts_with("grafana-git-sync-"))
            .expect("sync branch pushed");
        assert_eq!(
            remote.changed_paths(sync_branch)?,
            vec!["dashboards/Ops/a.json", "dashboards/b.json"]
        );
        Ok(())
    }
}
