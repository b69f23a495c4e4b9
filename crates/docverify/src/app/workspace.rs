//! Assembling a compilation unit for one session.

use crate::app::includes::{IncludeCollector, IncludeSnapshot};
use crate::app::sessions::SessionGroup;
use crate::domain::model::{Buffer, BufferId, CompilationUnit, ScopeKey, non_blank};

/// Combines a session's editable fragments with the global and session includes.
#[derive(Debug, Clone, Copy)]
pub struct WorkspaceBuilder<'a> {
    includes: &'a IncludeCollector,
}

impl<'a> WorkspaceBuilder<'a> {
    pub fn new(includes: &'a IncludeCollector) -> Self {
        Self { includes }
    }

    /// Build the unit. Session-scope includes are appended after the global ones, never
    /// replacing them. A session literally named `global` therefore sees the global includes
    /// twice.
    pub fn build(&self, group: &SessionGroup, snapshot: &IncludeSnapshot) -> CompilationUnit {
        let own_scope = ScopeKey::for_session(group.key.as_deref());
        let session_scope = non_blank(group.key.as_deref()).map(|_| own_scope.clone());

        let mut buffers: Vec<Buffer> = group
            .editable()
            .map(|fragment| {
                let file = fragment
                    .options
                    .destination_file
                    .clone()
                    .or_else(|| fragment.options.source_file.clone())
                    .unwrap_or_else(|| self.includes.default_destination(&own_scope));
                Buffer {
                    id: BufferId {
                        file,
                        region: fragment.options.region().map(str::to_owned),
                    },
                    content: fragment.source_text.clone(),
                }
            })
            .collect();

        let global = ScopeKey::global();
        let mut files = snapshot.files(&global);
        if let Some(scope) = &session_scope {
            files.extend(snapshot.files(scope));
        }

        buffers.extend(snapshot.regions(&global));
        if let Some(scope) = &session_scope {
            buffers.extend(snapshot.regions(scope));
        }

        CompilationUnit {
            package: group.identity().map(str::to_owned),
            buffers,
            files,
        }
    }
}
