use crate::config::NotebookConfig;
use crate::error::{NotebookError, Result};
use regex::{Captures, Regex};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Header shipped with the binary, used unless a custom template is configured
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/header.tex");

/// Closes the `multicols` environment opened by the header, then the document
pub const DOCUMENT_TRAILER: &str = "\\end{multicols}\n\\end{document}\n";

/// Placeholder names substituted by [`render`]
pub const PLACEHOLDERS: [&str; 6] = ["author", "initials", "fontSize", "columns", "paper", "image"];

/// Appends the `pt` unit unless the size already carries it
pub fn normalize_font_size(size: &str) -> String {
    if size.ends_with("pt") {
        size.to_string()
    } else {
        format!("{size}pt")
    }
}

/// Cover image markup, centered at a fixed width
///
/// The path is made absolute and written with forward slashes so it survives
/// being compiled from inside the scratch workspace.
pub fn image_directive(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let unix_style = absolute.to_string_lossy().replace('\\', "/");
    format!("\\centering{{\\includegraphics[width=3.5cm]{{{unix_style}}}}}")
}

/// Loads the configured template, or the built-in one when none is set.
///
/// # Errors
///
/// Returns `NotebookError::TemplateLoad` if the configured template cannot be
/// read or is not valid UTF-8. There is no fallback to the built-in template.
pub fn load_template(config: &NotebookConfig) -> Result<String> {
    match &config.template {
        Some(path) => {
            debug!(path = %path.display(), "loading custom template");
            fs::read_to_string(path).map_err(|source| NotebookError::TemplateLoad {
                path: path.clone(),
                source,
            })
        }
        None => Ok(DEFAULT_TEMPLATE.to_string()),
    }
}

/// Value substituted for a placeholder, `None` for names we don't own
fn placeholder_value(name: &str, config: &NotebookConfig) -> Option<String> {
    let value = match name {
        "author" => config.author.clone(),
        "initials" => config.initials.clone(),
        "fontSize" => normalize_font_size(&config.size),
        "columns" => config.columns.to_string(),
        "paper" => config.paper.clone(),
        "image" => config
            .image
            .as_deref()
            .map(image_directive)
            .unwrap_or_default(),
        _ => return None,
    };
    Some(value)
}

/// Replaces every `${name}` placeholder in the template with its configured value.
///
/// Unknown `${...}` tokens are left as they are.
///
/// # Errors
///
/// Returns `NotebookError::Regex` if the placeholder pattern fails to compile.
pub fn render(template: &str, config: &NotebookConfig) -> Result<String> {
    let pattern = Regex::new(r"\$\{(\w+)\}")?;
    let rendered = pattern.replace_all(template, |caps: &Captures| {
        placeholder_value(&caps[1], config).unwrap_or_else(|| caps[0].to_string())
    });
    Ok(rendered.into_owned())
}

/// Glues the rendered header, the walker output and the closing markup together
pub fn assemble_document(header: &str, body: &str) -> String {
    let mut document = String::with_capacity(header.len() + body.len() + DOCUMENT_TRAILER.len());
    document.push_str(header);
    document.push_str(body);
    document.push_str(DOCUMENT_TRAILER);
    document
}
