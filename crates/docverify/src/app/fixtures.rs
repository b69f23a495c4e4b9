//! Shared builders for unit tests.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::errors::CompilerError;
use crate::domain::model::{CodeFragment, CompilationUnit, CompileResult, FragmentOptions};
use crate::infra::compiler::CompilerService;

pub(crate) fn fragment(position: usize, session: Option<&str>, project: Option<&str>) -> CodeFragment {
    CodeFragment {
        document: PathBuf::from("/docs/doc.md"),
        position,
        source_text: format!("// fragment {position}"),
        options: FragmentOptions {
            session: session.map(str::to_owned),
            project_or_package: project.map(str::to_owned),
            ..FragmentOptions::default()
        },
        linkage_diagnostics: Vec::new(),
    }
}

pub(crate) fn read_only(
    position: usize,
    session: Option<&str>,
    destination: Option<&str>,
    region: Option<&str>,
    text: &str,
) -> CodeFragment {
    let mut fragment = fragment(position, session, None);
    fragment.source_text = text.to_owned();
    fragment.options.editable = false;
    fragment.options.destination_file = destination.map(PathBuf::from);
    fragment.options.region = region.map(str::to_owned);
    fragment
}

type Respond = dyn Fn(&CompilationUnit) -> Result<CompileResult, CompilerError> + Send + Sync;

/// Compiler double recording every unit it receives.
pub(crate) struct ScriptedCompiler {
    respond: Box<Respond>,
    pub(crate) calls: Mutex<Vec<CompilationUnit>>,
}

impl ScriptedCompiler {
    pub(crate) fn new(
        respond: impl Fn(&CompilationUnit) -> Result<CompileResult, CompilerError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn succeeding() -> Self {
        Self::new(|_| {
            Ok(CompileResult {
                succeeded: true,
                ..CompileResult::default()
            })
        })
    }

    pub(crate) fn units(&self) -> Vec<CompilationUnit> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompilerService for ScriptedCompiler {
    async fn compile(&self, unit: &CompilationUnit) -> Result<CompileResult, CompilerError> {
        self.calls.lock().unwrap().push(unit.clone());
        (self.respond)(unit)
    }
}
