//! Driving the compiler service and classifying its answers.

use std::time::Duration;

use futures::future::join_all;

use crate::domain::errors::CompilerError;
use crate::domain::model::{CompilationUnit, CompileResult, Diagnostic, Verdict};
use crate::infra::compiler::CompilerService;

/// Submits units to a [`CompilerService`], one call per session with no retries.
#[derive(Clone, Copy)]
pub struct CompileOrchestrator<'a> {
    service: &'a dyn CompilerService,
    timeout: Option<Duration>,
}

impl<'a> CompileOrchestrator<'a> {
    pub fn new(service: &'a dyn CompilerService, timeout: Option<Duration>) -> Self {
        Self { service, timeout }
    }

    /// Compile one unit. Service failures and timeouts become [`Verdict::ProjectFailed`].
    #[tracing::instrument(skip_all, fields(package = unit.package.as_deref().unwrap_or_default()))]
    pub async fn compile(&self, unit: &CompilationUnit) -> Verdict {
        let call = self.service.compile(unit);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(CompilerError::Timeout(limit)),
            },
            None => call.await,
        };

        match result {
            Ok(result) => classify(result),
            Err(err) => {
                tracing::warn!(error = %err, "compiler service failed");
                Verdict::ProjectFailed(vec![Diagnostic::error(error_chain(&err))])
            }
        }
    }

    /// Compile several units, either one after another or concurrently.
    ///
    /// Verdicts come back in the order of `units` either way.
    pub async fn compile_all(&self, units: &[CompilationUnit], parallel: bool) -> Vec<Verdict> {
        if parallel {
            return join_all(units.iter().map(|unit| self.compile(unit))).await;
        }

        let mut verdicts = Vec::with_capacity(units.len());
        for unit in units {
            verdicts.push(self.compile(unit).await);
        }
        verdicts
    }
}

/// Project-level errors win over sample-level failure.
pub fn classify(result: CompileResult) -> Verdict {
    let project_errors: Vec<Diagnostic> = result
        .project_diagnostics
        .into_iter()
        .filter(Diagnostic::is_error)
        .collect();

    if !project_errors.is_empty() {
        Verdict::ProjectFailed(project_errors)
    } else if !result.succeeded {
        Verdict::SamplesFailed(result.diagnostics)
    } else {
        Verdict::Ok
    }
}

fn error_chain(err: &CompilerError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
