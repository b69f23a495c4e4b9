//! Domain models for fragments, sessions, compilation units, and verdicts.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Sentinel scope name shared by every session for include lookup.
pub const GLOBAL_SCOPE: &str = "global";

/// Severity attached to a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Hidden,
    Info,
    Warning,
    #[default]
    Error,
}

/// A single message produced upstream by the fragment parser or by the compiler service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    #[serde(default)]
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub location: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{location}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// The options recognised on an annotated code fence.
///
/// Paths are absolute once they leave the fragment adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentOptions {
    pub session: Option<String>,
    pub editable: bool,
    pub project_or_package: Option<String>,
    pub destination_file: Option<PathBuf>,
    pub region: Option<String>,
    pub source_file: Option<PathBuf>,
}

impl Default for FragmentOptions {
    fn default() -> Self {
        Self {
            session: None,
            editable: true,
            project_or_package: None,
            destination_file: None,
            region: None,
            source_file: None,
        }
    }
}

impl FragmentOptions {
    /// Non-blank project or package identity, if any.
    pub fn identity(&self) -> Option<&str> {
        non_blank(self.project_or_package.as_deref())
    }

    /// Non-blank region name, if any.
    pub fn region(&self) -> Option<&str> {
        non_blank(self.region.as_deref())
    }
}

/// One annotated code block extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFragment {
    pub document: PathBuf,
    /// Zero-based line of the opening fence.
    pub position: usize,
    pub source_text: String,
    pub options: FragmentOptions,
    pub linkage_diagnostics: Vec<Diagnostic>,
}

impl CodeFragment {
    pub fn has_linkage_errors(&self) -> bool {
        !self.linkage_diagnostics.is_empty()
    }
}

/// Raw declared session value used to group fragments.
///
/// An absent value is its own group; no defaulting happens here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SessionKey(pub Option<String>);

impl SessionKey {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_deref().unwrap_or_default())
    }
}

/// Include scope: the shared global scope or one session's own scope.
///
/// Keys compare case-insensitively. A session literally named `global` lands in the shared scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey(String);

impl ScopeKey {
    pub fn global() -> Self {
        Self(GLOBAL_SCOPE.to_owned())
    }

    /// Scope for a declared session value; blank values fall back to the global scope.
    pub fn for_session(session: Option<&str>) -> Self {
        match non_blank(session) {
            Some(name) => Self(name.to_lowercase()),
            None => Self::global(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_global(&self) -> bool {
        self.0 == GLOBAL_SCOPE
    }
}

/// Identity of a buffer inside a compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferId {
    pub file: PathBuf,
    pub region: Option<String>,
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}@{region}", self.file.display()),
            None => write!(f, "{}", self.file.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buffer {
    pub id: BufferId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeFile {
    pub path: PathBuf,
    pub content: String,
}

/// Everything submitted to the compiler service for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CompilationUnit {
    pub package: Option<String>,
    pub buffers: Vec<Buffer>,
    pub files: Vec<IncludeFile>,
}

/// Raw answer from the compiler service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CompileResult {
    pub succeeded: bool,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
    #[serde(default)]
    pub project_diagnostics: Vec<Diagnostic>,
}

/// Per-session outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    ProjectFailed(Vec<Diagnostic>),
    SamplesFailed(Vec<Diagnostic>),
}

impl Verdict {
    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Ok)
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}
