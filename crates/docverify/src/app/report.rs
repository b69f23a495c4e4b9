//! Report records and their rendering.
//!
//! Every stage hands back plain [`ReportLine`]s; colour is applied once, by [`render`].

use std::io::IsTerminal;
use std::str::FromStr;

use clap::ValueEnum;
use crossterm::style::Stylize;
use serde::{Deserialize, Serialize};

use crate::app::sessions::SessionGroup;
use crate::domain::model::{CodeFragment, Verdict};

const UNKNOWN: &str = "UNKNOWN";

/// What a report line describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    DocumentPath,
    Underline,
    Checking,
    Fragment,
    Diagnostic,
    SessionError,
    SessionHeader,
    Verdict,
    Summary,
    NoInput,
}

/// How a line should be highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub kind: LineKind,
    pub tone: Tone,
    pub text: String,
}

impl ReportLine {
    fn new(kind: LineKind, tone: Tone, text: impl Into<String>) -> Self {
        Self {
            kind,
            tone,
            text: text.into(),
        }
    }

    fn blank() -> Self {
        Self::new(LineKind::Blank, Tone::Plain, "")
    }

    /// Lines destined for stderr rather than the report on stdout.
    pub fn is_error_stream(&self) -> bool {
        self.kind == LineKind::NoInput
    }
}

/// Run-level outcome. Only ever escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum RunStatus {
    #[default]
    Success,
    Failure,
    NoInput,
}

impl RunStatus {
    pub fn escalate(&mut self, to: RunStatus) {
        *self = (*self).max(to);
    }

    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failure => 1,
            RunStatus::NoInput => -1,
        }
    }
}

/// Finished report for a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Report {
    pub lines: Vec<ReportLine>,
    pub status: RunStatus,
}

impl Report {
    /// Report for a root that contains no documents.
    pub fn no_input(root: &str) -> Self {
        Self {
            lines: vec![ReportLine::new(
                LineKind::NoInput,
                Tone::Failure,
                format!("No markdown files found under {root}"),
            )],
            status: RunStatus::NoInput,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    pub fn stdout_lines(&self) -> impl Iterator<Item = &ReportLine> {
        self.lines.iter().filter(|line| !line.is_error_stream())
    }

    pub fn stderr_lines(&self) -> impl Iterator<Item = &ReportLine> {
        self.lines.iter().filter(|line| line.is_error_stream())
    }
}

/// Accumulates report lines in document and session order.
#[derive(Debug, Default)]
pub struct ReportGenerator {
    lines: Vec<ReportLine>,
    status: RunStatus,
    documents: usize,
    sessions: usize,
    failed_sessions: usize,
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&mut self, path: &str) {
        self.documents += 1;
        self.lines.push(ReportLine::blank());
        self.lines
            .push(ReportLine::new(LineKind::DocumentPath, Tone::Plain, path));
        self.lines.push(ReportLine::new(
            LineKind::Underline,
            Tone::Plain,
            "-".repeat(path.chars().count()),
        ));
    }

    /// Report one session: the span error if any, every fragment's linkage result, and the
    /// verdict when the session was compiled.
    pub fn session(&mut self, group: &SessionGroup, verdict: Option<&Verdict>) {
        self.sessions += 1;
        let mut failed = false;

        if !group.is_valid() {
            failed = true;
            self.lines.push(ReportLine::new(
                LineKind::SessionError,
                Tone::Failure,
                format!(
                    "  Session cannot span projects or packages: --session {}",
                    group.key
                ),
            ));
        }

        for fragment in &group.fragments {
            failed |= fragment.has_linkage_errors();
            self.fragment(fragment);
        }

        if let Some(verdict) = verdict.filter(|_| group.is_compilable()) {
            failed |= !verdict.is_ok();
            self.verdict(group, verdict);
        }

        if failed {
            self.failed_sessions += 1;
            self.status.escalate(RunStatus::Failure);
        }
    }

    fn fragment(&mut self, fragment: &CodeFragment) {
        let failed = fragment.has_linkage_errors();
        let (tone, symbol) = if failed {
            (Tone::Failure, "X")
        } else {
            (Tone::Success, "✓")
        };

        let source = fragment
            .options
            .source_file
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| UNKNOWN.to_owned());
        let project = fragment.options.identity().unwrap_or(UNKNOWN);

        self.lines.push(ReportLine::new(
            LineKind::Checking,
            Tone::Plain,
            "  Checking Markdown...",
        ));
        self.lines.push(ReportLine::new(
            LineKind::Fragment,
            tone,
            format!(
                "    {symbol}  Line {}:\t{source} (in project {project})",
                fragment.position + 1
            ),
        ));
        for diagnostic in &fragment.linkage_diagnostics {
            self.diagnostic(tone, diagnostic.to_string());
        }
    }

    fn verdict(&mut self, group: &SessionGroup, verdict: &Verdict) {
        let key = &group.key;
        self.lines.push(ReportLine::blank());
        self.lines.push(ReportLine::new(
            LineKind::SessionHeader,
            Tone::Plain,
            format!("  Compiling samples for session \"{key}\""),
        ));
        self.lines.push(ReportLine::blank());

        match verdict {
            Verdict::Ok => self.lines.push(ReportLine::new(
                LineKind::Verdict,
                Tone::Success,
                format!("    ✓  No errors found within samples for session \"{key}\""),
            )),
            Verdict::ProjectFailed(diagnostics) => {
                self.lines.push(ReportLine::new(
                    LineKind::Verdict,
                    Tone::Failure,
                    format!(
                        "    Build failed for project {}",
                        group.identity().unwrap_or(UNKNOWN)
                    ),
                ));
                for diagnostic in diagnostics {
                    self.diagnostic(Tone::Failure, diagnostic.to_string());
                }
            }
            Verdict::SamplesFailed(diagnostics) => {
                self.lines.push(ReportLine::new(
                    LineKind::Verdict,
                    Tone::Failure,
                    format!("    X  Errors found within samples for session \"{key}\""),
                ));
                for diagnostic in diagnostics {
                    self.diagnostic(Tone::Failure, diagnostic.message.clone());
                }
            }
        }
    }

    /// Report a document whose fragments could not be loaded.
    pub fn unreadable(&mut self, message: String) {
        self.diagnostic(Tone::Failure, message);
        self.status.escalate(RunStatus::Failure);
    }

    fn diagnostic(&mut self, tone: Tone, text: String) {
        self.lines.push(ReportLine::new(
            LineKind::Diagnostic,
            tone,
            format!("\t\t{text}"),
        ));
    }

    pub fn finish(mut self) -> Report {
        let tone = if self.status == RunStatus::Success {
            Tone::Success
        } else {
            Tone::Failure
        };
        self.lines.push(ReportLine::blank());
        self.lines.push(ReportLine::new(
            LineKind::Summary,
            tone,
            format!(
                "{} documents, {} sessions, {} failed",
                self.documents, self.sessions, self.failed_sessions
            ),
        ));

        Report {
            lines: self.lines,
            status: self.status,
        }
    }
}

/// When to colour rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum ColorMode {
    /// Colour when stdout is a terminal and NO_COLOR is unset.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn enabled(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
            }
        }
    }
}

impl FromStr for ColorMode {
    type Err = ColorModeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ColorMode::Auto),
            "always" | "on" => Ok(ColorMode::Always),
            "never" | "off" => Ok(ColorMode::Never),
            other => Err(ColorModeParseError::UnknownMode(other.to_string())),
        }
    }
}

/// Error returned when parsing a [`ColorMode`] fails.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ColorModeParseError {
    #[error("unknown color mode '{0}'")]
    UnknownMode(String),
}

/// Render lines as newline-terminated text.
pub fn render<'a>(lines: impl IntoIterator<Item = &'a ReportLine>, color: bool) -> String {
    let mut out = String::new();
    for line in lines {
        let styled = match (color, line.tone) {
            (true, Tone::Success) => line.text.clone().green().to_string(),
            (true, Tone::Failure) => line.text.clone().red().to_string(),
            _ => line.text.clone(),
        };
        out.push_str(&styled);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::fixtures::fragment;
    use crate::app::sessions::aggregate;
    use crate::domain::model::Diagnostic;
    use pretty_assertions::assert_eq;

    fn texts(report: &Report) -> Vec<&str> {
        report.lines.iter().map(|line| line.text.as_str()).collect()
    }

    #[test]
    fn status_never_downgrades() {
        let mut status = RunStatus::Success;
        status.escalate(RunStatus::Failure);
        status.escalate(RunStatus::Success);
        assert_eq!(status, RunStatus::Failure);
        assert_eq!(status.exit_code(), 1);
        assert_eq!(RunStatus::NoInput.exit_code(), -1);
    }

    #[test]
    fn document_header_is_underlined() {
        let mut report = ReportGenerator::new();
        report.document("/docs/intro.md");
        let report = report.finish();

        assert_eq!(
            &texts(&report)[..3],
            &["", "/docs/intro.md", "--------------"]
        );
        assert_eq!(report.status, RunStatus::Success);
    }

    #[test]
    fn invalid_session_reports_fragments_without_verdict() {
        let groups = aggregate(vec![
            fragment(0, Some("s1"), Some("P1")),
            fragment(4, Some("s1"), Some("P2")),
        ]);

        let mut report = ReportGenerator::new();
        report.session(&groups[0], Some(&Verdict::Ok));
        let report = report.finish();

        let texts = texts(&report);
        assert_eq!(texts[0], "  Session cannot span projects or packages: --session s1");
        assert_eq!(texts[2], "    ✓  Line 1:\tUNKNOWN (in project P1)");
        assert_eq!(texts[4], "    ✓  Line 5:\tUNKNOWN (in project P2)");
        assert!(!texts.iter().any(|t| t.contains("Compiling samples")));
        assert_eq!(report.status, RunStatus::Failure);
    }

    #[test]
    fn linkage_diagnostics_mark_failure() {
        let mut broken = fragment(2, None, None);
        broken
            .linkage_diagnostics
            .push(Diagnostic::error("File not found: /docs/missing.cs"));
        let groups = aggregate(vec![broken]);

        let mut report = ReportGenerator::new();
        report.session(&groups[0], None);
        let report = report.finish();

        let texts = texts(&report);
        assert_eq!(texts[1], "    X  Line 3:\tUNKNOWN (in project UNKNOWN)");
        assert_eq!(texts[2], "\t\tFile not found: /docs/missing.cs");
        assert_eq!(report.status, RunStatus::Failure);
    }

    #[test]
    fn verdict_lines_follow_fragments() {
        let groups = aggregate(vec![fragment(0, Some("s1"), Some("console"))]);
        let failed = Verdict::ProjectFailed(vec![
            Diagnostic::error("CS0246").with_location("Shared.cs(1,1)"),
        ]);

        let mut report = ReportGenerator::new();
        report.session(&groups[0], Some(&failed));
        let report = report.finish();

        let texts = texts(&report);
        assert_eq!(texts[3], "  Compiling samples for session \"s1\"");
        assert_eq!(texts[5], "    Build failed for project console");
        assert_eq!(texts[6], "\t\tShared.cs(1,1): CS0246");
        assert_eq!(texts.last(), Some(&"0 documents, 1 sessions, 1 failed"));
        assert_eq!(report.status, RunStatus::Failure);
    }

    #[test]
    fn render_plain_and_coloured() {
        let lines = vec![
            ReportLine::new(LineKind::Verdict, Tone::Success, "ok"),
            ReportLine::new(LineKind::Verdict, Tone::Failure, "bad"),
        ];

        assert_eq!(render(&lines, false), "ok\nbad\n");
        let coloured = render(&lines, true);
        assert!(coloured.contains("\u{1b}["));
        assert!(coloured.contains("ok"));
    }

    #[test]
    fn no_input_goes_to_stderr() {
        let report = Report::no_input("/docs");
        assert_eq!(report.exit_code(), -1);
        assert_eq!(report.stdout_lines().count(), 0);
        assert_eq!(
            render(report.stderr_lines(), false),
            "No markdown files found under /docs\n"
        );
    }

    #[test]
    fn color_mode_parses_aliases() {
        assert_eq!("ALWAYS".parse::<ColorMode>(), Ok(ColorMode::Always));
        assert_eq!("off".parse::<ColorMode>(), Ok(ColorMode::Never));
        assert!("rainbow".parse::<ColorMode>().is_err());
    }
}
