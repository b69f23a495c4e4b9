//! Adapters for the external compiler service.

use std::io::ErrorKind;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::domain::errors::CompilerError;
use crate::domain::model::{CompilationUnit, CompileResult};

/// Black-box compiler: one assembled unit in, success flag plus diagnostics out.
#[async_trait]
pub trait CompilerService: Send + Sync {
    async fn compile(&self, unit: &CompilationUnit) -> Result<CompileResult, CompilerError>;
}

/// Runs a configured program per unit, exchanging JSON over stdin/stdout.
///
/// The program's exit status is ignored; only the JSON it prints matters. An empty command is
/// accepted here and reported per session, so runs without samples never need a compiler.
#[derive(Debug, Clone, Default)]
pub struct ProcessCompiler {
    command: Vec<String>,
}

impl ProcessCompiler {
    pub fn new(command: impl Into<Vec<String>>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl CompilerService for ProcessCompiler {
    async fn compile(&self, unit: &CompilationUnit) -> Result<CompileResult, CompilerError> {
        let (program, args) = self.command.split_first().ok_or(CompilerError::NoCommand)?;
        let request = serde_json::to_vec(unit)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CompilerError::Spawn {
                command: self.command.join(" "),
                source,
            })?;

        let stdin = child.stdin.take();
        let write = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&request).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        // Output is read while input is still being written; the compiler may answer early.
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output?;
        match written {
            Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                tracing::debug!("compiler closed stdin before reading the whole unit");
            }
            written => written?,
        }
        if !output.status.success() {
            tracing::debug!(status = %output.status, "compiler exited with failure status");
        }

        let result = serde_json::from_slice(&output.stdout)?;
        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::model::{Buffer, BufferId};
    use std::fs;
    use std::time::Duration;

    fn script(dir: &std::path::Path, body: &str) -> Vec<String> {
        let path = dir.join("compiler.sh");
        fs::write(&path, body).expect("write script");
        vec!["sh".into(), path.display().to_string()]
    }

    #[tokio::test]
    async fn empty_command_fails_at_compile_time() {
        let compiler = ProcessCompiler::default();
        let result = compiler.compile(&CompilationUnit::default()).await;
        assert!(matches!(result, Err(CompilerError::NoCommand)));
    }

    #[tokio::test]
    async fn parses_json_written_by_program() {
        let temp = tempfile::tempdir().unwrap();
        let command = script(
            temp.path(),
            "cat > /dev/null\necho '{\"succeeded\": false, \"diagnostics\": [{\"message\": \"CS1002\"}]}'\n",
        );
        let compiler = ProcessCompiler::new(command);

        let result = compiler.compile(&CompilationUnit::default()).await.unwrap();

        assert!(!result.succeeded);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].message, "CS1002");
        assert!(result.project_diagnostics.is_empty());
    }

    #[tokio::test]
    async fn unreadable_output_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let command = script(temp.path(), "cat > /dev/null\necho 'not json'\n");
        let compiler = ProcessCompiler::new(command);

        let result = compiler.compile(&CompilationUnit::default()).await;

        assert!(matches!(result, Err(CompilerError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn large_output_before_reading_input_does_not_stall() {
        let temp = tempfile::tempdir().unwrap();
        let command = script(
            temp.path(),
            "head -c 300000 /dev/zero | tr '\\0' ' '\ncat > /dev/null\necho '{\"succeeded\": true}'\n",
        );
        let compiler = ProcessCompiler::new(command);
        let unit = CompilationUnit {
            buffers: vec![Buffer {
                id: BufferId {
                    file: "Program.cs".into(),
                    region: None,
                },
                content: "x".repeat(300_000),
            }],
            ..CompilationUnit::default()
        };

        let result = tokio::time::timeout(Duration::from_secs(30), compiler.compile(&unit))
            .await
            .expect("compiler exchange finished")
            .unwrap();

        assert!(result.succeeded);
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let compiler = ProcessCompiler::new(vec!["/definitely/not/a/compiler".to_string()]);

        let result = compiler.compile(&CompilationUnit::default()).await;

        assert!(matches!(result, Err(CompilerError::Spawn { .. })));
    }
}
