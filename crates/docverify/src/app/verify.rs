//! End-to-end verification run.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::app::compile::CompileOrchestrator;
use crate::app::discover::{DiscoveryConfig, Document, DocumentScanner};
use crate::app::fragments::{FragmentSource, load_all};
use crate::app::includes::IncludeCollector;
use crate::app::report::{Report, ReportGenerator};
use crate::app::sessions::aggregate;
use crate::app::workspace::WorkspaceBuilder;
use crate::domain::model::{CodeFragment, CompilationUnit, Verdict};
use crate::infra::compiler::CompilerService;
use crate::infra::config::Config;

/// Verifies every document under a root, one document and session at a time.
pub struct Verifier<'a> {
    root: PathBuf,
    config: Config,
    fragments: &'a dyn FragmentSource,
    compiler: &'a dyn CompilerService,
}

impl<'a> Verifier<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        config: Config,
        fragments: &'a dyn FragmentSource,
        compiler: &'a dyn CompilerService,
    ) -> Self {
        Self {
            root: root.into(),
            config,
            fragments,
            compiler,
        }
    }

    /// Discover documents and verify them. An empty root yields the no-input report without
    /// touching any other stage.
    pub async fn run(&self) -> Result<Report> {
        let discovery = DiscoveryConfig::from_root(self.root.clone(), self.config.clone());
        let documents = DocumentScanner::new()
            .scan(&discovery)
            .context("failed to discover documents")?;

        if documents.is_empty() {
            tracing::warn!(root = %self.root.display(), "no documents found");
            return Ok(Report::no_input(&self.root.display().to_string()));
        }

        Ok(self.verify(&documents).await)
    }

    /// Verify an explicit list of documents in the given order.
    ///
    /// A document whose fragments cannot be loaded is reported as failed and the run moves on.
    pub async fn verify(&self, documents: &[Document]) -> Report {
        let loaded = load_all(self.fragments, documents);

        let mut report = ReportGenerator::new();
        for (document, fragments) in documents.iter().zip(loaded) {
            report.document(&document.path.display().to_string());
            match fragments {
                Ok(fragments) => self.verify_document(document, fragments, &mut report).await,
                Err(err) => {
                    let message = format!("{err:#}");
                    tracing::warn!(
                        document = %document.display_path,
                        error = %message,
                        "skipping unreadable document"
                    );
                    report.unreadable(message);
                }
            }
        }
        report.finish()
    }

    async fn verify_document(
        &self,
        document: &Document,
        fragments: Vec<CodeFragment>,
        report: &mut ReportGenerator,
    ) {
        tracing::debug!(
            document = %document.display_path,
            fragments = fragments.len(),
            "verifying document"
        );

        let collector = IncludeCollector::new(&self.root);
        let snapshot = collector.collect(&fragments);
        let groups = aggregate(fragments);

        let builder = WorkspaceBuilder::new(&collector);
        let (indices, units): (Vec<usize>, Vec<CompilationUnit>) = groups
            .iter()
            .enumerate()
            .filter(|(_, group)| group.is_compilable())
            .map(|(index, group)| (index, builder.build(group, &snapshot)))
            .unzip();

        let orchestrator = CompileOrchestrator::new(self.compiler, self.config.compiler.timeout());
        let verdicts = orchestrator
            .compile_all(&units, self.config.compiler.parallel())
            .await;

        let mut slots: Vec<Option<Verdict>> = vec![None; groups.len()];
        for (index, verdict) in indices.into_iter().zip(verdicts) {
            slots[index] = Some(verdict);
        }

        for (group, verdict) in groups.iter().zip(&slots) {
            report.session(group, verdict.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::fixtures::{ScriptedCompiler, fragment, read_only};
    use crate::app::fragments::MarkdownFragments;
    use crate::app::report::RunStatus;
    use crate::domain::errors::CompilerError;
    use crate::domain::model::{CompileResult, Diagnostic};
    use std::collections::HashMap;
    use std::fs;

    /// Serves pre-built fragments keyed by display path.
    struct StaticFragments(HashMap<String, Vec<CodeFragment>>);

    impl FragmentSource for StaticFragments {
        fn fragments(&self, document: &Document) -> Result<Vec<CodeFragment>> {
            Ok(self.0.get(&document.display_path).cloned().unwrap_or_default())
        }
    }

    fn document(name: &str) -> Document {
        Document {
            path: PathBuf::from("/docs").join(name),
            display_path: name.to_owned(),
        }
    }

    async fn verify(
        docs: Vec<(&str, Vec<CodeFragment>)>,
        compiler: &ScriptedCompiler,
        config: Config,
    ) -> Report {
        let documents: Vec<_> = docs.iter().map(|(name, _)| document(name)).collect();
        let source = StaticFragments(
            docs.into_iter()
                .map(|(name, fragments)| (name.to_owned(), fragments))
                .collect(),
        );
        Verifier::new("/docs", config, &source, compiler)
            .verify(&documents)
            .await
    }

    fn texts(report: &Report) -> Vec<String> {
        report.lines.iter().map(|line| line.text.clone()).collect()
    }

    #[tokio::test]
    async fn single_valid_session_passes() {
        let compiler = ScriptedCompiler::succeeding();
        let report = verify(
            vec![("a.md", vec![fragment(0, Some("s1"), None)])],
            &compiler,
            Config::default(),
        )
        .await;

        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(compiler.units().len(), 1);
        assert!(
            texts(&report)
                .contains(&"    ✓  No errors found within samples for session \"s1\"".to_string())
        );
    }

    #[tokio::test]
    async fn mixed_projects_never_reach_compiler() {
        let compiler = ScriptedCompiler::succeeding();
        let report = verify(
            vec![(
                "a.md",
                vec![
                    fragment(0, Some("s1"), Some("P1")),
                    fragment(5, Some("s1"), Some("P2")),
                ],
            )],
            &compiler,
            Config::default(),
        )
        .await;

        assert!(compiler.units().is_empty());
        assert_eq!(report.exit_code(), 1);
        assert!(texts(&report).contains(
            &"  Session cannot span projects or packages: --session s1".to_string()
        ));
    }

    #[tokio::test]
    async fn linkage_errors_skip_compile_for_that_session_only() {
        let mut broken = fragment(0, Some("bad"), None);
        broken
            .linkage_diagnostics
            .push(Diagnostic::error("File not found: /docs/x.cs"));

        let compiler = ScriptedCompiler::succeeding();
        let report = verify(
            vec![("a.md", vec![broken, fragment(3, Some("good"), None)])],
            &compiler,
            Config::default(),
        )
        .await;

        let units = compiler.units();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].buffers[0].content, "// fragment 3");
        assert_eq!(report.status, RunStatus::Failure);
    }

    #[tokio::test]
    async fn region_include_is_merged_once_in_document_order() {
        let mut sample = fragment(2, Some("s1"), None);
        sample.options.region = Some("main".into());

        let compiler = ScriptedCompiler::succeeding();
        verify(
            vec![(
                "a.md",
                vec![
                    read_only(0, Some("s1"), Some("Program.cs"), Some("setup"), "var a = 1;"),
                    sample,
                    read_only(6, Some("s1"), Some("Program.cs"), Some("setup"), "var b = a;"),
                ],
            )],
            &compiler,
            Config::default(),
        )
        .await;

        let units = compiler.units();
        let setup: Vec<_> = units[0]
            .buffers
            .iter()
            .filter(|buffer| buffer.id.region.as_deref() == Some("setup"))
            .collect();
        assert_eq!(setup.len(), 1);
        assert_eq!(setup[0].content, "var a = 1;\nvar b = a;\n");
    }

    #[tokio::test]
    async fn includes_do_not_leak_between_documents() {
        let compiler = ScriptedCompiler::succeeding();
        verify(
            vec![
                (
                    "a.md",
                    vec![
                        read_only(0, None, Some("Shared.cs"), None, "class A {}"),
                        fragment(3, Some("s1"), None),
                    ],
                ),
                ("b.md", vec![fragment(0, Some("s1"), None)]),
            ],
            &compiler,
            Config::default(),
        )
        .await;

        let units = compiler.units();
        assert_eq!(units.len(), 3);
        assert_eq!(units[1].files.len(), 1);
        assert!(units[2].files.is_empty());
    }

    #[tokio::test]
    async fn parallel_compilation_keeps_report_identical() {
        let docs = || {
            vec![(
                "a.md",
                vec![
                    fragment(0, Some("one"), None),
                    fragment(2, Some("two"), Some("broken")),
                    fragment(4, Some("three"), None),
                ],
            )]
        };
        let respond = |unit: &CompilationUnit| {
            Ok::<_, CompilerError>(CompileResult {
                succeeded: unit.package.is_none(),
                diagnostics: vec![Diagnostic::error("CS1002: ; expected")],
                project_diagnostics: Vec::new(),
            })
        };

        let sequential = verify(docs(), &ScriptedCompiler::new(respond), Config::default()).await;
        let mut config = Config::default();
        config.compiler.set_parallel(true);
        let parallel = verify(docs(), &ScriptedCompiler::new(respond), config).await;

        assert_eq!(sequential, parallel);
        assert_eq!(sequential.status, RunStatus::Failure);
    }

    #[tokio::test]
    async fn empty_root_reports_no_input() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("notes.txt"), "not markdown").unwrap();
        let compiler = ScriptedCompiler::succeeding();
        let source = StaticFragments(HashMap::new());

        let report = Verifier::new(temp.path(), Config::default(), &source, &compiler)
            .run()
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::NoInput);
        assert_eq!(report.exit_code(), -1);
        assert!(compiler.units().is_empty());
    }

    #[tokio::test]
    async fn unreadable_document_fails_without_stopping_the_run() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a.md"), "```cs --session s1\nx();\n```\n").unwrap();
        fs::write(temp.path().join("b.md"), b"\xff\xfe").unwrap();
        let compiler = ScriptedCompiler::succeeding();
        let source = MarkdownFragments::new();

        let report = Verifier::new(temp.path(), Config::default(), &source, &compiler)
            .run()
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Failure);
        assert_eq!(compiler.units().len(), 1);
        let texts = texts(&report);
        assert!(
            texts.contains(&"    ✓  No errors found within samples for session \"s1\"".to_string())
        );
        let b_header = texts.iter().position(|text| text.ends_with("b.md")).unwrap();
        assert!(texts[b_header + 2].starts_with("\t\tfailed to read document"));
        assert_eq!(texts.last().unwrap(), "2 documents, 1 sessions, 0 failed");
    }
}
