//! Extraction of annotated code fragments from markdown documents.
//!
//! A fragment is a fenced code block whose info string carries options:
//!
//! ````markdown
//! ```cs --source-file ./Program.cs --project ./Sample.csproj --region main --session one
//! ```
//! ````
//!
//! Recognised options are `--session`, `--editable <bool>`, `--project`, `--package`,
//! `--destination-file`, `--region` and `--source-file`. Values containing spaces may be quoted,
//! as in `--session "getting started"`. Fences without any option are plain prose examples and
//! are ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser as ClapParser};
use once_cell::sync::Lazy;
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use rayon::prelude::*;
use regex::Regex;

use crate::app::discover::Document;
use crate::domain::errors::LinkageError;
use crate::domain::model::{CodeFragment, Diagnostic, FragmentOptions};
use crate::infra::config::split_words;

static REGION_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#region\s+(\S+)\s*$").expect("valid region start pattern"));
static REGION_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#endregion\b").expect("valid region end pattern"));

/// Produces the ordered fragments of one document.
pub trait FragmentSource: Send + Sync {
    fn fragments(&self, document: &Document) -> Result<Vec<CodeFragment>>;
}

/// Load fragments for every document in parallel, keeping document order.
///
/// Each document gets its own result so one unreadable file does not hide the others.
pub fn load_all(
    source: &dyn FragmentSource,
    documents: &[Document],
) -> Vec<Result<Vec<CodeFragment>>> {
    documents
        .par_iter()
        .map(|document| source.fragments(document))
        .collect()
}

/// Reads markdown from disk and links fragment options against the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownFragments;

impl MarkdownFragments {
    pub fn new() -> Self {
        Self
    }

    /// Extract fragments from markdown text located at `path`.
    pub fn parse(&self, path: &Path, markdown: &str) -> Vec<CodeFragment> {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut fragments: Vec<CodeFragment> = fenced_blocks(markdown)
            .into_iter()
            .filter_map(|fence| link_fence(path, base, fence))
            .collect();
        fragments.sort_by_key(|fragment| fragment.position);
        fragments
    }
}

impl FragmentSource for MarkdownFragments {
    fn fragments(&self, document: &Document) -> Result<Vec<CodeFragment>> {
        let markdown = fs::read_to_string(&document.path)
            .with_context(|| format!("failed to read document {}", document.path.display()))?;
        Ok(self.parse(&document.path, &markdown))
    }
}

#[derive(Debug)]
struct Fence {
    line: usize,
    info: String,
    body: String,
}

fn fenced_blocks(markdown: &str) -> Vec<Fence> {
    let mut fences = Vec::new();
    let mut current: Option<Fence> = None;

    for (event, range) in Parser::new(markdown).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                current = Some(Fence {
                    line: markdown[..range.start].matches('\n').count(),
                    info: info.to_string(),
                    body: String::new(),
                });
            }
            Event::Text(text) => {
                if let Some(fence) = current.as_mut() {
                    fence.body.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(mut fence) = current.take() {
                    if fence.body.ends_with('\n') {
                        fence.body.pop();
                    }
                    fences.push(fence);
                }
            }
            _ => {}
        }
    }

    fences
}

#[derive(Debug, ClapParser)]
#[command(
    name = "fence",
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct FenceArgs {
    #[arg(long)]
    session: Option<String>,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    editable: bool,
    #[arg(long, conflicts_with = "package")]
    project: Option<PathBuf>,
    #[arg(long)]
    package: Option<String>,
    #[arg(long)]
    destination_file: Option<PathBuf>,
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    source_file: Option<PathBuf>,
}

fn link_fence(document: &Path, base: &Path, fence: Fence) -> Option<CodeFragment> {
    let mut words = split_words(&fence.info).into_iter().peekable();
    // language tag
    words.next_if(|word| !word.starts_with("--"));
    let words: Vec<String> = words.collect();
    if !words.iter().any(|word| word.starts_with("--")) {
        return None;
    }

    let mut linkage = Vec::new();
    let mut source_text = fence.body;

    let options = match FenceArgs::try_parse_from(&words) {
        Ok(args) => {
            let project = args.project.clone().map(|path| resolve_path(base, path));
            let options = resolve_options(base, args);
            if let Some(loaded) = load_source(&options, &mut linkage) {
                source_text = loaded;
            }
            if let Some(project) = project.filter(|path| !path.exists()) {
                linkage.push(LinkageError::ProjectNotFound(project));
            }
            options
        }
        Err(err) => {
            linkage.push(LinkageError::InvalidOptions(clap_summary(&err)));
            FragmentOptions::default()
        }
    };

    Some(CodeFragment {
        document: document.to_path_buf(),
        position: fence.line,
        source_text,
        options,
        linkage_diagnostics: linkage
            .into_iter()
            .map(|error| Diagnostic::error(error.to_string()))
            .collect(),
    })
}

fn resolve_path(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn resolve_options(base: &Path, args: FenceArgs) -> FragmentOptions {
    let resolve = |path: PathBuf| resolve_path(base, path);

    let project_or_package = match (args.project, args.package) {
        (Some(project), _) => Some(resolve(project).display().to_string()),
        (None, package) => package,
    };

    FragmentOptions {
        session: args.session,
        editable: args.editable,
        project_or_package,
        destination_file: args.destination_file.map(resolve),
        region: args.region,
        source_file: args.source_file.map(resolve),
    }
}

fn load_source(options: &FragmentOptions, linkage: &mut Vec<LinkageError>) -> Option<String> {
    let path = options.source_file.as_ref()?;
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            linkage.push(LinkageError::SourceFileNotFound(path.clone()));
            return None;
        }
        Err(err) => {
            linkage.push(LinkageError::SourceFileUnreadable {
                file: path.clone(),
                reason: err.to_string(),
            });
            return None;
        }
    };

    match options.region() {
        None => Some(contents),
        Some(region) => {
            let extracted = extract_region(&contents, region);
            if extracted.is_none() {
                linkage.push(LinkageError::RegionNotFound {
                    region: region.to_owned(),
                    file: path.clone(),
                });
            }
            extracted
        }
    }
}

/// Lines strictly between `#region <name>` and its matching `#endregion`.
pub fn extract_region(contents: &str, region: &str) -> Option<String> {
    let mut lines = contents.lines();
    lines.by_ref().find(|line| {
        REGION_START
            .captures(line)
            .is_some_and(|caps| &caps[1] == region)
    })?;

    let mut depth = 0usize;
    let mut body = Vec::new();
    for line in lines {
        if REGION_START.is_match(line) {
            depth += 1;
        } else if REGION_END.is_match(line) {
            if depth == 0 {
                return Some(body.join("\n"));
            }
            depth -= 1;
        }
        body.push(line);
    }
    None
}

fn clap_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).to_owned()
}
