//! # notebookgen
//!
//! Turns a directory of source code into a printable code notebook: every
//! recognized file becomes a syntax-highlighted `minted` listing under a
//! section mirroring its folder, the result is dropped into a LaTeX header
//! template, and `latexmk` typesets it into a PDF.
//!
//! ## Features
//!
//! - Sections nest with the directory tree (`\section`, `\subsection`,
//!   `\subsubsection`; deeper folders reuse the last level)
//! - C, C++, Java, Python and Go listings; `.tex` files are embedded as-is
//! - Hidden files and folders are skipped, as are unknown extensions
//! - Author, initials, font size, columns, paper and cover image are
//!   substituted into the header
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```no_run
//! use notebookgen::{NotebookConfig, NotebookOptions};
//! use std::path::Path;
//!
//! # async fn run() -> notebookgen::Result<()> {
//! let config = NotebookConfig::from_options(NotebookOptions {
//!     author: Some("Team Rocket".to_string()),
//!     size: Some("9".to_string()),
//!     ..NotebookOptions::default()
//! })?;
//!
//! let bytes = notebookgen::generate_notebook(Path::new("library"), &config).await?;
//! println!("wrote {bytes} bytes to {}", config.output.display());
//! # Ok(())
//! # }
//! ```
//!
//! ### As a CLI Tool
//!
//! ```bash
//! # Build ./notebook.pdf from the library folder
//! notebookgen library -a "Team Rocket" -i TR
//!
//! # A4, two columns, 10pt
//! notebookgen library -p a4 -c 2 -s 10 -o team.pdf
//!
//! # Inspect the generated LaTeX without compiling
//! notebookgen library --dry-run
//! ```

pub mod build;
pub mod config;
pub mod error;
pub mod fs_utils;
pub mod language;
pub mod template;

// Re-export main types and functions for convenience
pub use build::{BuildArtifact, Compiler};
pub use config::{NotebookConfig, NotebookOptions};
pub use error::{NotebookError, Result};
pub use fs_utils::TreeWalker;
pub use language::Language;
pub use template::{assemble_document, load_template, render};

use std::path::Path;
use tracing::info;

/// Builds the complete LaTeX source for the tree under `root`.
///
/// # Errors
///
/// - `NotebookError::TemplateLoad` if a configured template cannot be read.
/// - Filesystem errors from walking `root` (see [`TreeWalker::walk`]).
pub fn render_document(root: &Path, config: &NotebookConfig) -> Result<String> {
    let header = render(&load_template(config)?, config)?;
    let body = TreeWalker::new(root)
        .with_exclude(config.exclude.clone())
        .sorted(config.sort)
        .walk_root()?;
    info!(root = %root.display(), body_bytes = body.len(), "document source generated");
    Ok(assemble_document(&header, &body))
}

/// Generates the notebook for `root` and writes the PDF to `config.output`.
///
/// The PDF is staged in a temporary file next to `config.output` and only
/// moved into place once it has been fully relayed, so a failed run never
/// leaves a partial file behind nor clobbers an existing notebook. Returns
/// the number of bytes written.
///
/// # Errors
///
/// Errors from [`render_document`], [`Compiler::build`] and
/// [`BuildArtifact::deliver`], plus `NotebookError::Delivery` if the output
/// file cannot be staged or moved into place.
pub async fn generate_notebook(root: &Path, config: &NotebookConfig) -> Result<u64> {
    let document = render_document(root, config)?;
    let artifact = Compiler::from_config(config).build(&document).await?;

    let bytes = if config.writes_to_stdout() {
        artifact.deliver(&mut tokio::io::stdout()).await?
    } else {
        deliver_to_file(artifact, &config.output).await?
    };

    info!(output = %config.output.display(), bytes, "notebook written");
    Ok(bytes)
}

async fn deliver_to_file(artifact: BuildArtifact, output: &Path) -> Result<u64> {
    let parent = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let staged = tempfile::Builder::new()
        .prefix(".notebookgen-")
        .suffix(".pdf")
        .tempfile_in(parent)
        .map_err(NotebookError::Delivery)?;
    let handle = staged.as_file().try_clone().map_err(NotebookError::Delivery)?;

    let mut sink = tokio::fs::File::from_std(handle);
    let bytes = artifact.deliver(&mut sink).await?;
    drop(sink);

    staged
        .persist(output)
        .map_err(|err| NotebookError::Delivery(err.error))?;
    Ok(bytes)
}
