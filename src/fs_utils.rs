use crate::error::{NotebookError, Result};
use crate::language::Language;
use globset::GlobSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Sectioning commands by nesting level; deeper directories reuse the last one
pub const SECTIONS: [&str; 3] = ["\\section{", "\\subsection{", "\\subsubsection{"];

/// Reads a source file to embed it in the notebook.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected, since the
/// listing environment only needs text.
///
/// # Errors
///
/// Returns `NotebookError::ReadFile` if the file cannot be read (missing,
/// permission denied, broken symlink).
pub fn read_file_contents(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| NotebookError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    match String::from_utf8(bytes) {
        Ok(contents) => Ok(contents),
        Err(err) => Ok(String::from_utf8_lossy(err.as_bytes()).into_owned()),
    }
}

/// Sectioning command for a given depth, clamped to the deepest level
pub fn section_command(depth: usize) -> &'static str {
    SECTIONS[depth.min(SECTIONS.len() - 1)]
}

/// Section title for a file: its name up to the first `.`
pub fn file_title(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// Extension of a path with the leading `.` included, as the classifier expects it
fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
}

/// Transcribes a directory tree into notebook body markup
#[derive(Debug, Clone)]
pub struct TreeWalker {
    /// Root the exclude patterns are matched against
    root: PathBuf,
    exclude: Option<GlobSet>,
    sort_entries: bool,
}

impl TreeWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude: None,
            sort_entries: false,
        }
    }

    /// Skip entries whose path relative to the root matches any pattern
    #[must_use]
    pub fn with_exclude(mut self, exclude: Option<GlobSet>) -> Self {
        self.exclude = exclude;
        self
    }

    /// List entries by file name instead of filesystem order
    #[must_use]
    pub fn sorted(mut self, sort_entries: bool) -> Self {
        self.sort_entries = sort_entries;
        self
    }

    /// Walks the whole tree from the root at depth 0
    ///
    /// # Errors
    ///
    /// See [`TreeWalker::walk`].
    pub fn walk_root(&self) -> Result<String> {
        self.walk(&self.root, 0)
    }

    /// Generates the markup for everything below `dir`.
    ///
    /// Each subdirectory gets a sectioning command at `min(depth, 2)` followed
    /// by its own subtree; each recognized file gets a sectioning command and
    /// its contents, wrapped in a `minted` block unless it is raw LaTeX.
    /// Hidden entries, excluded entries and unrecognized files produce nothing.
    ///
    /// # Errors
    ///
    /// - `NotebookError::DirectoryNotFound` if `dir` is not a directory.
    /// - `NotebookError::WalkDir` if a directory cannot be listed.
    /// - `NotebookError::ReadFile` if a recognized file cannot be read.
    pub fn walk(&self, dir: &Path, depth: usize) -> Result<String> {
        if !dir.is_dir() {
            return Err(NotebookError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut listing = WalkDir::new(dir).min_depth(1).max_depth(1);
        if self.sort_entries {
            listing = listing.sort_by_file_name();
        }

        let section = section_command(depth);
        let mut body = String::new();

        for entry in listing {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy();

            if name.starts_with('.') {
                trace!(path = %entry.path().display(), "skipping hidden entry");
                continue;
            }
            if self.is_excluded(entry.path()) {
                debug!(path = %entry.path().display(), "skipping excluded entry");
                continue;
            }

            if entry.file_type().is_dir() {
                body.push('\n');
                body.push_str(section);
                body.push_str(&name);
                body.push_str("}\n");
                body.push_str(&self.walk(entry.path(), depth + 1)?);
                continue;
            }

            let Some(language) =
                dotted_extension(entry.path()).and_then(|ext| Language::from_extension(&ext))
            else {
                trace!(path = %entry.path().display(), "skipping unrecognized file");
                continue;
            };

            debug!(path = %entry.path().display(), language = language.label(), "embedding file");
            let contents = read_file_contents(entry.path())?;

            body.push('\n');
            body.push_str(section);
            body.push_str(file_title(&name));
            body.push_str("}\n");
            if language.is_raw_markup() {
                body.push_str(&contents);
            } else {
                body.push_str("\\begin{minted}{");
                body.push_str(language.label());
                body.push_str("}\n");
                body.push_str(&contents);
                if !contents.is_empty() && !contents.ends_with('\n') {
                    body.push('\n');
                }
                body.push_str("\\end{minted}\n");
            }
        }

        Ok(body)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let Some(exclude) = &self.exclude else {
            return false;
        };
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        exclude.is_match(relative)
    }
}
