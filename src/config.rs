use crate::error::{NotebookError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_OUTPUT: &str = "./notebook.pdf";
pub const DEFAULT_FONT_SIZE: &str = "8";
pub const DEFAULT_COLUMNS: u32 = 3;
pub const DEFAULT_PAPER: &str = "letter";
pub const DEFAULT_COMPILER: &str = "latexmk";
/// Engine selection and shell escape (needed by `minted`)
pub const DEFAULT_COMPILER_ARGS: [&str; 2] = ["-xelatex", "-shell-escape"];

/// Raw, all-optional options as given on the command line or in a JSON file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct NotebookOptions {
    pub output: Option<PathBuf>,
    pub author: Option<String>,
    pub initials: Option<String>,
    pub size: Option<String>,
    pub columns: Option<u32>,
    pub paper: Option<String>,
    pub image: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub exclude: Vec<String>,
    pub sort: Option<bool>,
    pub compiler: Option<String>,
    pub compiler_args: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
    pub keep_scratch: Option<bool>,
}

impl NotebookOptions {
    /// Reads options from a JSON file
    ///
    /// # Errors
    ///
    /// Returns `NotebookError::Options` if the file cannot be read or is not a
    /// valid options object.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| NotebookError::Options {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&contents).map_err(|e| NotebookError::Options {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Layers `overrides` on top of `self`; any value set in `overrides` wins.
    ///
    /// Exclude patterns from both layers are kept.
    #[must_use]
    pub fn merge(self, overrides: Self) -> Self {
        let mut exclude = self.exclude;
        exclude.extend(overrides.exclude);
        Self {
            output: overrides.output.or(self.output),
            author: overrides.author.or(self.author),
            initials: overrides.initials.or(self.initials),
            size: overrides.size.or(self.size),
            columns: overrides.columns.or(self.columns),
            paper: overrides.paper.or(self.paper),
            image: overrides.image.or(self.image),
            template: overrides.template.or(self.template),
            exclude,
            sort: overrides.sort.or(self.sort),
            compiler: overrides.compiler.or(self.compiler),
            compiler_args: overrides.compiler_args.or(self.compiler_args),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            keep_scratch: overrides.keep_scratch.or(self.keep_scratch),
        }
    }
}

/// Resolved configuration for one notebook run
#[derive(Debug, Clone)]
pub struct NotebookConfig {
    /// Where the finished PDF goes; `-` streams it to stdout
    pub output: PathBuf,
    pub author: String,
    pub initials: String,
    /// Font size as given; the template renderer appends `pt` when missing
    pub size: String,
    pub columns: u32,
    pub paper: String,
    pub image: Option<PathBuf>,
    /// Custom header template, the built-in one when `None`
    pub template: Option<PathBuf>,
    pub exclude: Option<GlobSet>,
    pub sort: bool,
    pub compiler: String,
    pub compiler_args: Vec<String>,
    pub timeout: Option<Duration>,
    /// Preserve the scratch workspace when the build produces nothing
    pub keep_scratch: bool,
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_OUTPUT),
            author: String::new(),
            initials: String::new(),
            size: DEFAULT_FONT_SIZE.to_string(),
            columns: DEFAULT_COLUMNS,
            paper: DEFAULT_PAPER.to_string(),
            image: None,
            template: None,
            exclude: None,
            sort: false,
            compiler: DEFAULT_COMPILER.to_string(),
            compiler_args: DEFAULT_COMPILER_ARGS.iter().map(ToString::to_string).collect(),
            timeout: None,
            keep_scratch: false,
        }
    }
}

impl NotebookConfig {
    /// Applies defaults to raw options without touching the input.
    ///
    /// # Errors
    ///
    /// Returns `NotebookError::Glob` if an exclude pattern is invalid.
    pub fn from_options(options: NotebookOptions) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            output: options.output.unwrap_or(defaults.output),
            author: options.author.unwrap_or(defaults.author),
            initials: options.initials.unwrap_or(defaults.initials),
            size: options.size.unwrap_or(defaults.size),
            columns: options.columns.unwrap_or(defaults.columns),
            paper: options.paper.unwrap_or(defaults.paper),
            image: options.image,
            template: options.template,
            exclude: build_exclude_set(&options.exclude)?,
            sort: options.sort.unwrap_or(defaults.sort),
            compiler: options.compiler.unwrap_or(defaults.compiler),
            compiler_args: options.compiler_args.unwrap_or(defaults.compiler_args),
            timeout: options.timeout_secs.map(Duration::from_secs),
            keep_scratch: options.keep_scratch.unwrap_or(defaults.keep_scratch),
        })
    }

    pub fn writes_to_stdout(&self) -> bool {
        self.output.as_path() == Path::new("-")
    }
}

fn build_exclude_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}
