//! Merging read-only fragments into shared include content.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::domain::model::{Buffer, BufferId, CodeFragment, IncludeFile, ScopeKey};

/// Where a read-only fragment's text accumulates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncludeKey {
    pub scope: ScopeKey,
    /// Destination file, plus a region name for region buckets.
    pub target: BufferId,
}

/// Immutable result of collecting one document's read-only fragments.
///
/// Iteration order follows first insertion, so the same document always yields the same units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeSnapshot {
    buckets: IndexMap<IncludeKey, String>,
}

impl IncludeSnapshot {
    /// Whole-file includes for one scope.
    pub fn files(&self, scope: &ScopeKey) -> Vec<IncludeFile> {
        self.buckets
            .iter()
            .filter(|(key, _)| &key.scope == scope && key.target.region.is_none())
            .map(|(key, content)| IncludeFile {
                path: key.target.file.clone(),
                content: content.clone(),
            })
            .collect()
    }

    /// Region includes for one scope.
    pub fn regions(&self, scope: &ScopeKey) -> Vec<Buffer> {
        self.buckets
            .iter()
            .filter(|(key, _)| &key.scope == scope && key.target.region.is_some())
            .map(|(key, content)| Buffer {
                id: key.target.clone(),
                content: content.clone(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }
}

/// Builds [`IncludeSnapshot`]s, resolving destinations against the verification root.
#[derive(Debug, Clone)]
pub struct IncludeCollector {
    root: PathBuf,
}

impl IncludeCollector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Generated destination used when a fragment names no file.
    pub fn default_destination(&self, scope: &ScopeKey) -> PathBuf {
        self.root
            .join(format!("generated_include_file_{}", scope.as_str()))
    }

    /// Merge the read-only fragments, in document order, into per-scope buckets.
    ///
    /// Editable fragments are skipped; they go straight into the compilation unit.
    pub fn collect<'a>(
        &self,
        fragments: impl IntoIterator<Item = &'a CodeFragment>,
    ) -> IncludeSnapshot {
        let mut buckets: IndexMap<IncludeKey, String> = IndexMap::new();

        for fragment in fragments.into_iter().filter(|f| !f.options.editable) {
            let scope = ScopeKey::for_session(fragment.options.session.as_deref());
            let file = match &fragment.options.destination_file {
                Some(path) => self.absolute(path),
                None => self.default_destination(&scope),
            };
            let key = IncludeKey {
                scope,
                target: BufferId {
                    file,
                    region: fragment.options.region().map(str::to_owned),
                },
            };

            let content = buckets.entry(key).or_default();
            content.push_str(&fragment.source_text);
            content.push('\n');
        }

        tracing::debug!(buckets = buckets.len(), "collected includes");
        IncludeSnapshot { buckets }
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
