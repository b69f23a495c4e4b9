//! Document discovery under a verification root.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder, WalkState};

use crate::infra::config::Config;

const DOCVERIFY_IGNORE: &str = ".docverifyignore";

/// A markdown document discovered under the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub display_path: String,
}

/// Configuration inputs for discovery.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub root: PathBuf,
    pub config: Config,
}

impl DiscoveryConfig {
    pub fn from_root(root: PathBuf, config: Config) -> Self {
        Self { root, config }
    }
}

/// Walks the root respecting ignore rules and returns matching documents sorted by path.
#[derive(Debug, Default)]
pub struct DocumentScanner;

impl DocumentScanner {
    pub fn new() -> Self {
        Self
    }

    pub fn scan(&self, cfg: &DiscoveryConfig) -> Result<Vec<Document>> {
        if !cfg.root.is_dir() {
            bail!("root directory {} does not exist", cfg.root.display());
        }

        let matcher = Arc::new(build_matcher(&cfg.root, cfg)?);
        let mut builder = WalkBuilder::new(&cfg.root);
        builder
            .git_ignore(true)
            .hidden(!cfg.config.defaults.show_hidden);

        let root = cfg.root.clone();
        builder.filter_entry({
            let matcher = matcher.clone();
            move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                !matcher.should_skip(rel)
            }
        });

        let documents = Mutex::new(Vec::new());

        builder.build_parallel().run(|| {
            let documents = &documents;
            let matcher = matcher.clone();
            let root = cfg.root.clone();
            Box::new(move |result| match result {
                Ok(entry) => {
                    if let Some(document) = process_entry(&entry, &root, &matcher)
                        && let Ok(mut guard) = documents.lock()
                    {
                        guard.push(document);
                    }
                    WalkState::Continue
                }
                Err(err) => {
                    tracing::warn!(error = %err, "discovery error");
                    WalkState::Continue
                }
            })
        });

        let mut documents = documents.into_inner().unwrap_or_default();
        documents.sort_by(|a, b| a.display_path.cmp(&b.display_path));
        tracing::debug!(count = documents.len(), root = %cfg.root.display(), "discovered documents");

        Ok(documents)
    }
}

fn process_entry(entry: &DirEntry, root: &Path, matcher: &DocumentMatcher) -> Option<Document> {
    if !entry.file_type()?.is_file() {
        return None;
    }
    let path = entry.path();
    let rel = path.strip_prefix(root).unwrap_or(path);
    if !matcher.is_document(rel) {
        return None;
    }

    Some(Document {
        path: path.to_path_buf(),
        display_path: rel.display().to_string(),
    })
}

#[derive(Debug, Clone)]
struct DocumentMatcher {
    documents: GlobSet,
    ignored: GlobSet,
}

impl DocumentMatcher {
    fn should_skip(&self, rel: &Path) -> bool {
        self.ignored.is_match(rel)
    }

    fn is_document(&self, rel: &Path) -> bool {
        self.documents.is_match(rel)
    }
}

fn build_matcher(root: &Path, cfg: &DiscoveryConfig) -> Result<DocumentMatcher> {
    let mut documents = GlobSetBuilder::new();
    for pattern in &cfg.config.defaults.document_globs {
        documents.add(Glob::new(pattern).context("invalid document glob")?);
    }

    let mut ignored = GlobSetBuilder::new();

    for pattern in &cfg.config.ignore.paths {
        for expanded in expand_dir_pattern(pattern) {
            let glob = Glob::new(&expanded).context("invalid ignore path pattern")?;
            ignored.add(glob);
        }
    }

    for glob in &cfg.config.ignore.globs {
        let glob = Glob::new(glob).context("invalid ignore glob")?;
        ignored.add(glob);
    }

    for pattern in load_docverifyignore(root)? {
        for expanded in expand_dir_pattern(&pattern) {
            let glob = Glob::new(&expanded).context("invalid .docverifyignore pattern")?;
            ignored.add(glob);
        }
    }

    Ok(DocumentMatcher {
        documents: documents.build().context("failed to build document matcher")?,
        ignored: ignored.build().context("failed to build ignore matcher")?,
    })
}

fn expand_dir_pattern(raw: &str) -> Vec<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    vec![
        trimmed.to_owned(),
        format!("{trimmed}/**"),
        format!("**/{trimmed}"),
        format!("**/{trimmed}/**"),
    ]
}

fn load_docverifyignore(root: &Path) -> Result<Vec<String>> {
    let path = root.join(DOCVERIFY_IGNORE);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut patterns = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        patterns.push(trimmed.to_owned());
    }
    Ok(patterns)
}
