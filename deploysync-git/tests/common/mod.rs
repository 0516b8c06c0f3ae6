//! Local bare-repository fixtures for synchronizer tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use deploysync_core::config::{Settings, DEFAULT_NETWORK_ATTEMPTS};
use deploysync_core::SyncConfig;
use deploysync_git::RetryPolicy;
use tempfile::TempDir;

pub const MANIFEST_PATH: &str = "apps/example03/deployment.yaml";

pub const EXAMPLE_MANIFEST: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: example03
spec:
  replicas: 2
  template:
    spec:
      containers:
        - name: api
          image: \"registry.example.com:8443/example03:old999\"
          ports:
            - containerPort: 8080
        - name: proxy
          image: envoyproxy/envoy:v1.29.1
";

/// Run git with an isolated configuration and a fixed identity.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_AUTHOR_NAME", "fixture")
        .env("GIT_AUTHOR_EMAIL", "fixture@example.com")
        .env("GIT_COMMITTER_NAME", "fixture")
        .env("GIT_COMMITTER_EMAIL", "fixture@example.com")
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_owned()
}

/// A bare repository with `main` seeded from a single manifest commit.
pub struct Remote {
    root: TempDir,
    pub bare: PathBuf,
}

impl Remote {
    pub fn with_manifest(path: &str, content: &str) -> Self {
        let root = TempDir::new().expect("tempdir");
        let bare = root.path().join("deploy.git");
        let seed = root.path().join("seed");
        fs::create_dir_all(&bare).expect("mkdir bare");
        fs::create_dir_all(&seed).expect("mkdir seed");

        git(&bare, &["init", "--quiet", "--bare"]);
        git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&seed, &["init", "--quiet"]);
        git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        let file = seed.join(path);
        fs::create_dir_all(file.parent().expect("parent")).expect("mkdir manifest dir");
        fs::write(&file, content).expect("write manifest");
        fs::write(seed.join("README.md"), "deploy repo\n").expect("write readme");
        git(&seed, &["add", "--all"]);
        git(&seed, &["commit", "--quiet", "-m", "initial"]);
        git(
            &seed,
            &["push", "--quiet", bare.to_str().expect("utf8"), "HEAD:refs/heads/main"],
        );

        Self { root, bare }
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.bare.display())
    }

    pub fn tip(&self) -> String {
        git(&self.bare, &["rev-parse", "refs/heads/main"])
    }

    pub fn commit_count(&self) -> usize {
        git(&self.bare, &["rev-list", "--count", "refs/heads/main"])
            .parse()
            .expect("count")
    }

    pub fn file_at_tip(&self, path: &str) -> String {
        let output = Command::new("git")
            .current_dir(&self.bare)
            .args(["show", &format!("refs/heads/main:{path}")])
            .output()
            .expect("git show");
        String::from_utf8(output.stdout).expect("utf8")
    }

    pub fn tip_subject(&self) -> String {
        git(&self.bare, &["log", "-1", "--format=%s", "refs/heads/main"])
    }

    pub fn tip_body(&self) -> String {
        git(&self.bare, &["log", "-1", "--format=%b", "refs/heads/main"])
    }

    /// Install a server-side hook that prints `message` and refuses every push.
    #[cfg(unix)]
    pub fn refuse_pushes_with(&self, message: &str) {
        use std::os::unix::fs::PermissionsExt;

        let hook = self.bare.join("hooks").join("pre-receive");
        fs::create_dir_all(hook.parent().expect("hooks dir")).expect("mkdir hooks");
        fs::write(&hook, format!("#!/bin/sh\necho '{message}' >&2\nexit 1\n")).expect("hook");
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }
}

pub fn settings(url: &str, commit_id: &str, selector: &str) -> Settings {
    Settings {
        registry_host: Some("registry.example.com:8443".into()),
        project_path: Some("example03".into()),
        commit_id: Some(commit_id.into()),
        manifest_repo_url: Some(url.into()),
        manifest_branch: Some("main".into()),
        manifest_file_path: Some(MANIFEST_PATH.into()),
        container_selector: Some(selector.into()),
        commit_author_name: Some("deploy-bot".into()),
        commit_author_email: Some("deploy-bot@example.com".into()),
        git_timeout_secs: Some(30),
        ..Settings::default()
    }
}

pub fn config(url: &str, commit_id: &str) -> SyncConfig {
    SyncConfig::from_settings(settings(url, commit_id, "api"), None).expect("valid config")
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: DEFAULT_NETWORK_ATTEMPTS,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
    }
}
