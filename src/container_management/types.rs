//! Core types used by the container management subsystem.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Host path bound to a path inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub host_path: PathBuf,
    pub container_path: String,
}

impl BindMount {
    pub fn new(host_path: impl Into<PathBuf>, container_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
        }
    }
}

/// `host:container`, the form both the engine API and `docker -v` accept.
impl fmt::Display for BindMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_path.display(), self.container_path)
    }
}

/// Everything needed to launch one container instance.
///
/// Built once per invocation and consumed by [`super::ContainerRuntime::run`].
/// Bind order is preserved as given. Environment entries are kept in a
/// sorted map, so no positional meaning can be attached to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub args: Vec<String>,
    pub binds: Vec<BindMount>,
    pub privileged: bool,
    pub env: BTreeMap<String, String>,
}

impl ContainerSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            args: Vec::new(),
            binds: Vec::new(),
            privileged: false,
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn bind(mut self, host_path: impl AsRef<Path>, container_path: impl Into<String>) -> Self {
        self.binds
            .push(BindMount::new(host_path.as_ref(), container_path));
        self
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Binds rendered as `host:container`, in caller order.
    pub fn bind_strings(&self) -> Vec<String> {
        self.binds.iter().map(ToString::to_string).collect()
    }

    /// Environment rendered as `KEY=VALUE`.
    pub fn env_pairs(&self) -> Vec<String> {
        self.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
    }
}

/// Identifier of a created container instance.
///
/// Owned by the runtime for the duration of one run. Not `Clone`: release
/// consumes the handle, so it can only be removed once.
#[derive(Debug, PartialEq, Eq)]
pub struct ContainerHandle {
    id: String,
}

impl ContainerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Short form used in log lines.
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_id())
    }
}

/// Output recovered from a failed instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostics {
    /// Full combined stdout/stderr history.
    Collected(Vec<u8>),
    /// Log retrieval itself failed; the reason is only ever a warning.
    Unavailable(String),
}

impl Diagnostics {
    /// Collected output as lossy UTF-8, if any was retrieved.
    pub fn text(&self) -> Option<String> {
        match self {
            Diagnostics::Collected(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Diagnostics::Unavailable(_) => None,
        }
    }
}

/// Final status of one container run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub exit_code: i64,
    /// Present only when `exit_code != 0`.
    pub diagnostics: Option<Diagnostics>,
}

impl CompletionResult {
    pub fn success() -> Self {
        Self {
            exit_code: 0,
            diagnostics: None,
        }
    }

    pub fn failed(exit_code: i64, diagnostics: Diagnostics) -> Self {
        Self {
            exit_code,
            diagnostics: Some(diagnostics),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    pub fn diagnostics_text(&self) -> Option<String> {
        self.diagnostics.as_ref().and_then(Diagnostics::text)
    }
}

/// Supported invocation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// Docker Engine API client.
    #[default]
    Api,
    /// `docker run` subprocess.
    Cli,
}

impl std::str::FromStr for RuntimeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "api" => Ok(RuntimeKind::Api),
            "cli" => Ok(RuntimeKind::Cli),
            other => Err(format!("unknown runtime '{}', expected 'api' or 'cli'", other)),
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeKind::Api => f.write_str("api"),
            RuntimeKind::Cli => f.write_str("cli"),
        }
    }
}
