//! Git subprocess runner: deadlines, isolated environment, in-memory credentials.
//!
//! The credential reaches git only through `GIT_CONFIG_COUNT` /
//! `GIT_CONFIG_KEY_<n>` / `GIT_CONFIG_VALUE_<n>` as an `http.extraHeader`
//! entry. It never appears in argv, in the remote URL, or in `.git/config`,
//! and every stderr capture is scrubbed before it is stored in an error.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use base64::Engine as _;
use tokio::process::Command;
use tracing::debug;

use deploysync_core::{CommitIdentity, Credential, RepositoryTarget};

use crate::error::SyncError;

const REDACTED: &str = "<redacted>";

/// Why a git invocation did not succeed.
#[derive(Debug)]
pub(crate) enum GitFailure {
    /// git could not be started at all.
    Spawn(std::io::Error),
    TimedOut { after: Duration },
    /// Non-zero exit. `stderr` is already scrubbed.
    Exited { code: Option<i32>, stderr: String },
}

/// Coarse classification of a failed git command, by its stderr text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureClass {
    Authentication,
    BranchNotFound,
    RepositoryNotFound,
    /// Push refused because the remote branch moved.
    PushRejected,
    Network,
    Other,
}

const AUTH_MARKERS: &[&str] = &[
    "authentication failed",
    "http basic: access denied",
    "could not read username",
    "could not read password",
    "terminal prompts disabled",
    "invalid username or password",
    "invalid credentials",
    "returned error: 401",
    "returned error: 403",
    "permission denied (publickey",
    "permission to ",
];

const BRANCH_MARKERS: &[&str] = &["could not find remote branch", "not found in upstream"];

const REPOSITORY_MARKERS: &[&str] = &[
    "repository not found",
    "does not appear to be a git repository",
    "returned error: 404",
    "not a git repository",
];

const REJECTED_MARKERS: &[&str] = &[
    "[rejected]",
    "non-fast-forward",
    "fetch first",
    "updates were rejected",
    "failed to update ref",
    "cannot lock ref",
    "stale info",
    "incorrect old value provided",
];

const NETWORK_MARKERS: &[&str] = &[
    "could not resolve host",
    "failed to connect",
    "couldn't connect to server",
    "connection refused",
    "connection reset",
    "connection timed out",
    "operation timed out",
    "network is unreachable",
    "the remote end hung up unexpectedly",
    "early eof",
    "rpc failed",
    "ssl_error",
    "gnutls_handshake",
    "unable to access",
    "http/2 stream",
];

pub(crate) fn classify(stderr: &str) -> FailureClass {
    let text = stderr.to_ascii_lowercase();
    let any = |markers: &[&str]| markers.iter().any(|m| text.contains(m));
    if any(AUTH_MARKERS) {
        FailureClass::Authentication
    } else if any(BRANCH_MARKERS) {
        FailureClass::BranchNotFound
    } else if any(REPOSITORY_MARKERS) {
        FailureClass::RepositoryNotFound
    } else if any(REJECTED_MARKERS) {
        FailureClass::PushRejected
    } else if any(NETWORK_MARKERS) {
        FailureClass::Network
    } else {
        FailureClass::Other
    }
}

impl GitFailure {
    /// Map onto the run's error taxonomy.
    ///
    /// Push rejection is not an error here; callers that push check for it
    /// with [`GitFailure::is_push_rejection`] first.
    pub(crate) fn into_sync_error(
        self,
        operation: &'static str,
        repository: &RepositoryTarget,
    ) -> SyncError {
        match self {
            GitFailure::Spawn(e) => SyncError::Git {
                operation,
                detail: format!("failed to run git: {e}"),
            },
            GitFailure::TimedOut { after } => SyncError::Timeout { operation, after },
            GitFailure::Exited { code, stderr } => {
                let detail = summarize(&stderr, code);
                match classify(&stderr) {
                    FailureClass::Authentication => SyncError::AuthenticationFailed {
                        repository: repository.to_string(),
                        detail,
                    },
                    FailureClass::BranchNotFound => SyncError::BranchNotFound {
                        repository: repository.remote_url.clone(),
                        branch: repository.branch.clone(),
                    },
                    FailureClass::RepositoryNotFound => SyncError::RepositoryNotFound {
                        repository: repository.remote_url.clone(),
                        detail,
                    },
                    FailureClass::Network => SyncError::NetworkFailure { operation, detail },
                    FailureClass::PushRejected | FailureClass::Other => {
                        SyncError::Git { operation, detail }
                    }
                }
            }
        }
    }

    pub(crate) fn stderr(&self) -> &str {
        match self {
            GitFailure::Exited { stderr, .. } => stderr,
            _ => "",
        }
    }

    pub(crate) fn is_push_rejection(&self) -> bool {
        matches!(
            self,
            GitFailure::Exited { stderr, .. } if classify(stderr) == FailureClass::PushRejected
        )
    }
}

/// Last meaningful stderr lines, for error messages.
fn summarize(stderr: &str, code: Option<i32>) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("hint:"))
        .collect();
    let tail = lines[lines.len().saturating_sub(3)..].join("; ");
    match (tail.is_empty(), code) {
        (true, Some(code)) => format!("exit status {code}"),
        (true, None) => "terminated by signal".to_owned(),
        (false, _) => tail,
    }
}

/// Runs git for one synchronizer run.
///
/// `Debug` output goes through [`Credential`]'s redacting impl.
#[derive(Debug, Clone)]
pub(crate) struct GitClient {
    timeout: Duration,
    credential: Option<Credential>,
    identity: CommitIdentity,
}

impl GitClient {
    pub(crate) fn new(
        timeout: Duration,
        credential: Option<Credential>,
        identity: CommitIdentity,
    ) -> Self {
        Self {
            timeout,
            credential,
            identity,
        }
    }

    /// Run `git <args>` in `cwd` and return its stdout.
    pub(crate) async fn run<I, S>(&self, cwd: &Path, args: I) -> Result<String, GitFailure>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = self.command(cwd);
        cmd.args(args);
        debug!(cwd = %cwd.display(), "running git");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                return Err(GitFailure::TimedOut {
                    after: self.timeout,
                })
            }
            Ok(Err(e)) => return Err(GitFailure::Spawn(e)),
            Ok(Ok(output)) => output,
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(GitFailure::Exited {
                code: output.status.code(),
                stderr: self.scrub(&String::from_utf8_lossy(&output.stderr)),
            })
        }
    }

    fn command(&self, cwd: &Path) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_ASKPASS", "")
            .env("SSH_ASKPASS", "")
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env_remove("GIT_INDEX_FILE")
            .env("GIT_AUTHOR_NAME", &self.identity.name)
            .env("GIT_AUTHOR_EMAIL", &self.identity.email)
            .env("GIT_COMMITTER_NAME", &self.identity.name)
            .env("GIT_COMMITTER_EMAIL", &self.identity.email);

        #[cfg(unix)]
        cmd.env("GIT_CONFIG_GLOBAL", "/dev/null");

        let entries = self.config_entries();
        cmd.env("GIT_CONFIG_COUNT", entries.len().to_string());
        for (i, (key, value)) in entries.into_iter().enumerate() {
            cmd.env(format!("GIT_CONFIG_KEY_{i}"), key);
            cmd.env(format!("GIT_CONFIG_VALUE_{i}"), value);
        }
        cmd
    }

    fn config_entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![
            ("commit.gpgsign", "false".to_owned()),
            ("credential.helper", String::new()),
            ("core.askPass", String::new()),
        ];
        if let Some(header) = self.auth_header() {
            entries.push(("http.extraHeader", header));
        }
        entries
    }

    fn basic_auth(&self) -> Option<String> {
        self.credential.as_ref().map(|c| {
            base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", c.username(), c.token()))
        })
    }

    fn auth_header(&self) -> Option<String> {
        self.basic_auth()
            .map(|encoded| format!("Authorization: Basic {encoded}"))
    }

    /// Remove every form of the credential from `text`.
    pub(crate) fn scrub(&self, text: &str) -> String {
        let Some(credential) = &self.credential else {
            return text.to_owned();
        };
        let mut out = text.to_owned();
        if let Some(encoded) = self.basic_auth() {
            out = out.replace(&encoded, REDACTED);
        }
        if !credential.token().is_empty() {
            out = out.replace(credential.token(), REDACTED);
        }
        out
    }
}
