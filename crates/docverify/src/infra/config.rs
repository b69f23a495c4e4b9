//! Configuration management utilities.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".docverify/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub ignore: Ignore,
    #[serde(default)]
    pub compiler: Compiler,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "Defaults::default_document_globs")]
    pub document_globs: Vec<String>,
    #[serde(default)]
    pub show_hidden: bool,
    #[serde(default = "Defaults::default_color")]
    pub color: String,
}

impl Defaults {
    fn default_document_globs() -> Vec<String> {
        vec!["**/*.md".into()]
    }

    fn default_color() -> String {
        "auto".into()
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            document_globs: Self::default_document_globs(),
            show_hidden: false,
            color: Self::default_color(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ignore {
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub globs: Vec<String>,
}

impl Default for Ignore {
    fn default() -> Self {
        Self {
            paths: vec![
                "target/".into(),
                "node_modules/".into(),
                ".git/".into(),
                "bin/".into(),
                "obj/".into(),
            ],
            globs: Vec::new(),
        }
    }
}

/// How the external compiler service is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Compiler {
    /// Program and arguments; the compilation unit is written to its stdin as JSON.
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    parallel: Option<bool>,
}

impl Compiler {
    fn default_timeout_secs() -> u64 {
        120
    }

    /// Per-session compile timeout. Zero disables the timeout.
    pub fn timeout(&self) -> Option<Duration> {
        let secs = self.timeout_secs.unwrap_or_else(Self::default_timeout_secs);
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    pub fn parallel(&self) -> bool {
        self.parallel.unwrap_or(false)
    }

    pub fn set_timeout_secs(&mut self, secs: u64) {
        self.timeout_secs = Some(secs);
    }

    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = Some(parallel);
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    compiler: Option<String>,
    color: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            compiler: env::var("DOCVERIFY_COMPILER").ok(),
            color: env::var("DOCVERIFY_COLOR").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(compiler: &str, color: &str) -> Self {
        Self {
            compiler: Some(compiler.to_owned()),
            color: Some(color.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration for a verification root from defaults, user config, the workspace
    /// config found above `root`, and env overrides.
    pub fn load(root: &Path) -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = Some(workspace_config_path(root));
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            tracing::debug!(path = %global_path.display(), "loading user config");
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            tracing::debug!(path = %workspace_path.display(), "loading workspace config");
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            defaults: merge_defaults(self.defaults, other.defaults),
            ignore: merge_ignore(self.ignore, other.ignore),
            compiler: merge_compiler(self.compiler, other.compiler),
        }
    }
}

fn merge_defaults(base: Defaults, overlay: Defaults) -> Defaults {
    Defaults {
        document_globs: if overlay.document_globs != Defaults::default_document_globs() {
            overlay.document_globs
        } else {
            base.document_globs
        },
        show_hidden: overlay.show_hidden || base.show_hidden,
        color: if overlay.color != Defaults::default_color() {
            overlay.color
        } else {
            base.color
        },
    }
}

fn merge_ignore(base: Ignore, overlay: Ignore) -> Ignore {
    let mut paths: BTreeSet<String> = base.paths.into_iter().collect();
    paths.extend(overlay.paths);

    let mut globs: BTreeSet<String> = base.globs.into_iter().collect();
    globs.extend(overlay.globs);

    Ignore {
        paths: paths.into_iter().collect(),
        globs: globs.into_iter().collect(),
    }
}

fn merge_compiler(mut base: Compiler, overlay: Compiler) -> Compiler {
    if !overlay.command.is_empty() {
        base.command = overlay.command;
    }
    if let Some(value) = overlay.timeout_secs {
        base.timeout_secs = Some(value);
    }
    if let Some(value) = overlay.parallel {
        base.parallel = Some(value);
    }
    base
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("docverify/config.toml"))
}

fn workspace_config_path(root: &Path) -> PathBuf {
    let base = find_repo_root(root).unwrap_or_else(|| root.to_path_buf());
    base.join(DEFAULT_WORKSPACE_CONFIG_PATH)
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

/// Split a command line or fence info string into words.
///
/// Whitespace separates words unless it sits inside single or double quotes; the quotes
/// themselves are dropped. An unterminated quote runs to the end of the input.
pub fn split_words(raw: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for ch in raw.chars() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(ch);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(command) = env.compiler {
        let command = split_words(&command);
        if !command.is_empty() {
            config.compiler.command = command;
        }
    }
    if let Some(color) = env.color {
        config.defaults.color = color;
    }
    config
}
