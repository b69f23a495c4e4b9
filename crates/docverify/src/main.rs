use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use docverify::app::fragments::MarkdownFragments;
use docverify::app::report::{ColorMode, render};
use docverify::app::verify::Verifier;
use docverify::infra::compiler::ProcessCompiler;
use docverify::infra::config::{Config, split_words};

#[derive(Parser)]
#[command(author, version, about = "Verify that code samples in markdown documentation compile", long_about = None)]
struct Cli {
    /// Emit a debug span tree on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every session of every markdown document under ROOT
    Verify {
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Compiler command receiving each unit as JSON on stdin
        #[arg(long)]
        compiler: Option<String>,
        /// Per-session timeout in seconds, 0 to disable
        #[arg(long)]
        timeout: Option<u64>,
        /// Compile the sessions of a document concurrently
        #[arg(long)]
        parallel: bool,
        #[arg(long, value_enum)]
        color: Option<ColorMode>,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    docverify::init(cli.verbose);

    match cli.command {
        Commands::Verify {
            root,
            compiler,
            timeout,
            parallel,
            color,
        } => {
            let code = verify(root, compiler, timeout, parallel, color).await?;
            process::exit(code);
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "docverify", &mut io::stdout());
            Ok(())
        }
    }
}

async fn verify(
    root: PathBuf,
    compiler: Option<String>,
    timeout: Option<u64>,
    parallel: bool,
    color: Option<ColorMode>,
) -> Result<i32> {
    let root = root
        .canonicalize()
        .with_context(|| format!("root directory {} does not exist", root.display()))?;

    let mut config = Config::load(&root)?;
    if let Some(command) = compiler {
        config.compiler.command = split_words(&command);
    }
    if let Some(secs) = timeout {
        config.compiler.set_timeout_secs(secs);
    }
    if parallel {
        config.compiler.set_parallel(true);
    }

    let color = match color {
        Some(mode) => mode,
        None => config.defaults.color.parse().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "falling back to automatic colour");
            ColorMode::Auto
        }),
    };

    let fragments = MarkdownFragments::new();
    let compiler = ProcessCompiler::new(config.compiler.command.clone());
    let report = Verifier::new(root, config, &fragments, &compiler)
        .run()
        .await?;

    let enabled = color.enabled();
    let mut stdout = io::stdout().lock();
    stdout.write_all(render(report.stdout_lines(), enabled).as_bytes())?;
    stdout.flush()?;
    let mut stderr = io::stderr().lock();
    stderr.write_all(render(report.stderr_lines(), enabled).as_bytes())?;
    stderr.flush()?;

    Ok(report.exit_code())
}
