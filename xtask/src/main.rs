use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::Command;

#[derive(Parser)]
#[command(author, version, about = "Project automation commands", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cargo nextest with default configuration
    Nextest {
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        release: bool,
    },
    /// Verify the samples in this repository's own markdown
    VerifyDocs {
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Compiler command forwarded to docverify
        #[arg(long)]
        compiler: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Nextest { profile, release } => run_nextest(profile, release)?,
        Commands::VerifyDocs { root, compiler } => run_verify_docs(root, compiler)?,
    }
    Ok(())
}

fn run_nextest(profile: Option<String>, release: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("nextest").arg("run");
    if let Some(profile) = profile {
        cmd.arg("--profile").arg(profile);
    }
    if release {
        cmd.arg("--release");
    }
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("cargo nextest run failed");
    }
    Ok(())
}

fn run_verify_docs(root: PathBuf, compiler: Option<String>) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.args(["run", "--quiet", "-p", "docverify", "--", "verify"])
        .arg(root);
    if let Some(compiler) = compiler {
        cmd.arg("--compiler").arg(compiler);
    }
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("documentation samples failed verification");
    }
    Ok(())
}
