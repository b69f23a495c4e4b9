//! Grouping fragments into compilation sessions.

use indexmap::{IndexMap, IndexSet};

use crate::domain::model::{CodeFragment, SessionKey};

/// All fragments of one document sharing a declared session value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGroup {
    pub key: SessionKey,
    /// Fragments in document order.
    pub fragments: Vec<CodeFragment>,
    /// Distinct non-blank project/package identities in first-seen order.
    pub identities: Vec<String>,
}

impl SessionGroup {
    /// A session may reference at most one project or package.
    pub fn is_valid(&self) -> bool {
        self.identities.len() <= 1
    }

    pub fn has_linkage_errors(&self) -> bool {
        self.fragments.iter().any(CodeFragment::has_linkage_errors)
    }

    /// Valid and free of linkage diagnostics.
    pub fn is_compilable(&self) -> bool {
        self.is_valid() && !self.has_linkage_errors()
    }

    /// First non-blank identity in fragment order.
    pub fn identity(&self) -> Option<&str> {
        self.identities.first().map(String::as_str)
    }

    pub fn editable(&self) -> impl Iterator<Item = &CodeFragment> {
        self.fragments.iter().filter(|fragment| fragment.options.editable)
    }
}

/// Partition a document's fragments by raw session value, preserving first-seen order.
pub fn aggregate(fragments: Vec<CodeFragment>) -> Vec<SessionGroup> {
    let mut groups: IndexMap<SessionKey, Vec<CodeFragment>> = IndexMap::new();
    for fragment in fragments {
        let key = SessionKey(fragment.options.session.clone());
        groups.entry(key).or_default().push(fragment);
    }

    groups
        .into_iter()
        .map(|(key, fragments)| {
            let identities: IndexSet<String> = fragments
                .iter()
                .filter_map(|fragment| fragment.options.identity())
                .map(|identity| identity.trim().to_owned())
                .collect();
            let group = SessionGroup {
                key,
                fragments,
                identities: identities.into_iter().collect(),
            };
            if !group.is_valid() {
                tracing::debug!(
                    session = %group.key,
                    identities = ?group.identities,
                    "session spans multiple projects"
                );
            }
            group
        })
        .collect()
}
