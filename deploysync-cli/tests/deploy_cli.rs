//! Exit codes and output of the `deploysync` binary against local bare repositories.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const MANIFEST_PATH: &str = "apps/example03/deployment.yaml";

const MANIFEST: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: example03
spec:
  template:
    spec:
      containers:
        - name: api
          image: \"registry.example.com:8443/example03:old999\"
";

/// Every variable the binary reads; cleared so the host environment cannot leak in.
const SETTINGS_ENV: &[&str] = &[
    "REGISTRY_HOST",
    "PROJECT_PATH",
    "COMMIT_ID",
    "MANIFEST_REPO_URL",
    "MANIFEST_BRANCH",
    "MANIFEST_FILE_PATH",
    "CONTAINER_SELECTOR",
    "CREDENTIAL",
    "CREDENTIAL_USERNAME",
    "COMMIT_AUTHOR_NAME",
    "COMMIT_AUTHOR_EMAIL",
    "GIT_TIMEOUT_SECS",
    "MAX_CONFLICT_RETRIES",
    "MAX_NETWORK_RETRIES",
    "DEPLOYSYNC_CONFIG",
    "RUST_LOG",
];

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_AUTHOR_NAME", "fixture")
        .env("GIT_AUTHOR_EMAIL", "fixture@example.com")
        .env("GIT_COMMITTER_NAME", "fixture")
        .env("GIT_COMMITTER_EMAIL", "fixture@example.com")
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_owned()
}

struct Remote {
    root: TempDir,
    bare: PathBuf,
}

impl Remote {
    fn new() -> Self {
        let root = TempDir::new().expect("tempdir");
        let bare = root.path().join("deploy.git");
        let seed = root.path().join("seed");
        fs::create_dir_all(&bare).expect("mkdir");
        fs::create_dir_all(seed.join("apps/example03")).expect("mkdir");

        git(&bare, &["init", "--quiet", "--bare"]);
        git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&seed, &["init", "--quiet"]);
        git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        fs::write(seed.join(MANIFEST_PATH), MANIFEST).expect("write");
        git(&seed, &["add", "--all"]);
        git(&seed, &["commit", "--quiet", "-m", "initial"]);
        git(&seed, &["push", "--quiet", bare.to_str().expect("utf8"), "HEAD:refs/heads/main"]);
        Self { root, bare }
    }

    fn url(&self) -> String {
        format!("file://{}", self.bare.display())
    }

    fn tip(&self) -> String {
        git(&self.bare, &["rev-parse", "refs/heads/main"])
    }

    fn commit_count(&self) -> usize {
        git(&self.bare, &["rev-list", "--count", "refs/heads/main"])
            .parse()
            .expect("count")
    }

    fn manifest(&self) -> String {
        git(&self.bare, &["show", &format!("refs/heads/main:{MANIFEST_PATH}")])
    }

    #[cfg(unix)]
    fn refuse_pushes_with(&self, message: &str) {
        use std::os::unix::fs::PermissionsExt;

        let hook = self.bare.join("hooks").join("pre-receive");
        fs::create_dir_all(hook.parent().expect("hooks")).expect("mkdir");
        fs::write(&hook, format!("#!/bin/sh\necho '{message}' >&2\nexit 1\n")).expect("hook");
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).expect("chmod");
    }
}

fn deploysync() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("deploysync"));
    for name in SETTINGS_ENV {
        cmd.env_remove(name);
    }
    cmd
}

fn deploysync_for(remote: &Remote, commit_id: &str) -> Command {
    let mut cmd = deploysync();
    cmd.env("REGISTRY_HOST", "registry.example.com:8443")
        .env("PROJECT_PATH", "example03")
        .env("COMMIT_ID", commit_id)
        .env("MANIFEST_REPO_URL", remote.url())
        .env("MANIFEST_BRANCH", "main")
        .env("MANIFEST_FILE_PATH", MANIFEST_PATH)
        .env("CONTAINER_SELECTOR", "api");
    cmd
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

#[test]
fn resolve_prints_image_reference() {
    deploysync()
        .args([
            "resolve",
            "--registry-host",
            "registry.example.com:8443",
            "--project-path",
            "example03",
            "--commit-id",
            "abc1234",
        ])
        .assert()
        .success()
        .stdout("registry.example.com:8443/example03:abc1234\n");
}

#[test]
fn resolve_rejects_malformed_commit_id_with_exit_1() {
    deploysync()
        .env("REGISTRY_HOST", "ghcr.io")
        .env("PROJECT_PATH", "org/app")
        .env("COMMIT_ID", "not-a-sha")
        .arg("resolve")
        .assert()
        .code(1)
        .stderr(contains("ConfigurationError").and(contains("not-a-sha")));
}

// ---------------------------------------------------------------------------
// deploy
// ---------------------------------------------------------------------------

#[test]
fn deploy_commits_then_rerun_is_noop() {
    let remote = Remote::new();
    let before = remote.commit_count();

    deploysync_for(&remote, "abc1234")
        .arg("deploy")
        .assert()
        .success()
        .stdout(contains("deployed registry.example.com:8443/example03:abc1234"));

    assert_eq!(remote.commit_count(), before + 1);
    assert_eq!(
        git(&remote.bare, &["log", "-1", "--format=%s", "refs/heads/main"]),
        "Deploy abc1234"
    );
    assert!(remote
        .manifest()
        .contains("image: \"registry.example.com:8443/example03:abc1234\""));

    let tip = remote.tip();
    deploysync_for(&remote, "abc1234")
        .arg("deploy")
        .assert()
        .code(0)
        .stdout(contains("nothing to commit"));
    assert_eq!(remote.tip(), tip);
    assert_eq!(remote.commit_count(), before + 1);
}

#[test]
fn deploy_json_report_is_clean_stdout() {
    let remote = Remote::new();

    let output = deploysync_for(&remote, "abc1234")
        .args(["deploy", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["outcome"], "deployed");
    assert_eq!(report["revision"], remote.tip());
    assert_eq!(report["attempts"][0]["result"], "success");
    assert_eq!(report["attempts"][0]["message"], "Deploy abc1234");
}

#[test]
fn dry_run_prints_diff_and_pushes_nothing() {
    let remote = Remote::new();
    let tip = remote.tip();

    deploysync_for(&remote, "abc1234")
        .args(["deploy", "--dry-run"])
        .assert()
        .success()
        .stdout(
            contains("[dry-run]")
                .and(contains("-          image: \"registry.example.com:8443/example03:old999\""))
                .and(contains("+          image: \"registry.example.com:8443/example03:abc1234\"")),
        );
    assert_eq!(remote.tip(), tip);
}

#[test]
fn diff_subcommand_prints_only_the_diff() {
    let remote = Remote::new();

    deploysync_for(&remote, "abc1234")
        .arg("diff")
        .assert()
        .success()
        .stdout(contains("--- a/apps/example03/deployment.yaml").and(contains("[dry-run]").not()));
}

#[test]
fn flags_take_precedence_over_environment() {
    let remote = Remote::new();

    deploysync_for(&remote, "abc1234")
        .args(["deploy", "--dry-run", "--commit-id", "fedcba9"])
        .assert()
        .success()
        .stdout(contains("example03:fedcba9"));
}

#[test]
fn unknown_selector_exits_4_and_names_it() {
    let remote = Remote::new();
    let tip = remote.tip();

    deploysync_for(&remote, "abc1234")
        .env("CONTAINER_SELECTOR", "worker")
        .arg("deploy")
        .assert()
        .code(4)
        .stderr(contains("ValidationError").and(contains("worker")));
    assert_eq!(remote.tip(), tip);
}

#[test]
fn missing_settings_exit_1() {
    deploysync()
        .env("REGISTRY_HOST", "ghcr.io")
        .env("PROJECT_PATH", "org/app")
        .env("COMMIT_ID", "abc1234")
        .arg("deploy")
        .assert()
        .code(1)
        .stderr(contains("MANIFEST_REPO_URL"));
}

#[test]
fn config_file_supplies_defaults_but_not_secrets() {
    let remote = Remote::new();
    let config = remote.root.path().join("deploysync.yaml");

    fs::write(
        &config,
        format!(
            "registry_host: registry.example.com:8443\n\
             project_path: example03\n\
             manifest_repo_url: {}\n\
             manifest_file_path: {MANIFEST_PATH}\n\
             container_selector: api\n",
            remote.url()
        ),
    )
    .expect("write config");
    deploysync()
        .env("COMMIT_ID", "abc1234")
        .args(["deploy", "--dry-run", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("example03:abc1234"));

    fs::write(&config, "container_selector: api\ncredential: glpat-leaked\n").expect("write");
    deploysync()
        .env("COMMIT_ID", "abc1234")
        .args(["deploy", "--config"])
        .arg(&config)
        .assert()
        .code(1)
        .stderr(contains("must not contain a credential").and(contains("glpat-leaked").not()));
}

#[cfg(unix)]
#[test]
fn rejected_credential_exits_1_without_echoing_it() {
    let remote = Remote::new();
    remote.refuse_pushes_with("HTTP Basic: Access denied");
    let tip = remote.tip();

    deploysync_for(&remote, "abc1234")
        .env("CREDENTIAL", "glpat-very-secret")
        .arg("deploy")
        .assert()
        .code(1)
        .stderr(contains("AuthenticationError").and(contains("glpat-very-secret").not()));
    assert_eq!(remote.tip(), tip);
}

#[cfg(unix)]
#[test]
fn endless_conflicts_exit_2() {
    let remote = Remote::new();
    remote.refuse_pushes_with("non-fast-forward");

    deploysync_for(&remote, "abc1234")
        .env("MAX_CONFLICT_RETRIES", "2")
        .arg("deploy")
        .assert()
        .code(2)
        .stderr(contains("ConflictError").and(contains("2 time(s)")));
}

#[test]
fn silent_remote_exits_3() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let remote = Remote::new();

    deploysync_for(&remote, "abc1234")
        .env("MANIFEST_REPO_URL", format!("http://127.0.0.1:{port}/deploy.git"))
        .env("GIT_TIMEOUT_SECS", "1")
        .arg("deploy")
        .assert()
        .code(3)
        .stderr(contains("TimeoutError"));
    drop(listener);
}

#[test]
fn invalid_numeric_setting_exits_1() {
    deploysync()
        .env("GIT_TIMEOUT_SECS", "soon")
        .arg("deploy")
        .assert()
        .code(1);
}
