use anyhow::{Context, Result};
use pulldown_cmark::{Event, Parser, TagEnd};
use std::path::Path;
use tracing::{debug, warn};

use crate::StudyError;

/// An uploaded file after text extraction, before filtering and chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Stable identifier, derived from the file name.
    pub id: String,
    pub file_name: String,
    pub text: String,
}

/// Load every readable file in the upload directory into a [`Document`],
/// using the file name as the document id. Files that cannot be parsed are
/// skipped and logged; the rest of the batch continues.
pub fn load_documents(upload_dir: &Path) -> Result<Vec<Document>> {
    let mut entries: Vec<_> = std::fs::read_dir(upload_dir)
        .with_context(|| format!("Failed to read upload directory: {}", upload_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    let mut documents = Vec::with_capacity(entries.len());

    for path in entries {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        match extract_text(&path) {
            Ok(text) if !text.trim().is_empty() => {
                debug!("Loaded {} ({} chars)", file_name, text.len());
                documents.push(Document {
                    id: file_name.clone(),
                    file_name,
                    text,
                });
            }
            Ok(_) => {
                warn!("Skipping {}: no text content extracted", file_name);
            }
            Err(error) => {
                let error = StudyError::UnreadableInput {
                    path: path.display().to_string(),
                    reason: error.to_string(),
                };
                warn!("{error}");
            }
        }
    }

    Ok(documents)
}

fn extract_text(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "text" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read text file: {}", path.display())),
        "md" | "markdown" => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read markdown file: {}", path.display()))?;
            Ok(extract_markdown_text(&source))
        }
        "pdf" => extract_pdf_text(path),
        other => Err(anyhow::anyhow!("Unsupported file format: {:?}", other)),
    }
}

/// Flatten a Markdown source into plain text, dropping formatting but keeping
/// paragraph structure.
fn extract_markdown_text(source: &str) -> String {
    let mut text = String::with_capacity(source.len());

    for event in Parser::new(source) {
        match event {
            Event::Text(content) | Event::Code(content) => text.push_str(&content),
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock,
            ) => text.push_str("\n\n"),
            _ => {}
        }
    }

    text
}

fn extract_pdf_text(path: &Path) -> Result<String> {
    let document = lopdf::Document::load(path)
        .with_context(|| format!("Failed to parse PDF: {}", path.display()))?;

    let pages = document.get_pages();
    let mut page_texts = Vec::with_capacity(pages.len());
    let mut page_errors = Vec::new();

    for page_num in pages.keys() {
        match document.extract_text(&[*page_num]) {
            Ok(text) => {
                let lines: Vec<String> = text
                    .lines()
                    .map(|line| line.trim_end().to_string())
                    .filter(|line| !line.is_empty())
                    .collect();
                if !lines.is_empty() {
                    page_texts.push(lines.join("\n"));
                }
            }
            Err(error) => {
                page_errors.push(format!("page {page_num}: {error}"));
            }
        }
    }

    if page_texts.is_empty() {
        return Err(anyhow::anyhow!(
            "No text extracted from PDF ({} page errors)",
            page_errors.len()
        ));
    }

    if !page_errors.is_empty() {
        warn!(
            "Extracted {} with {} unreadable pages",
            path.display(),
            page_errors.len()
        );
    }

    Ok(page_texts.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_is_flattened_to_plain_text() {
        let source = "# Title\n\nFirst *paragraph* with `code`.\n\n- item one\n- item two\n";
        let text = extract_markdown_text(source);

        assert!(text.contains("Title"));
        assert!(text.contains("First paragraph with code."));
        assert!(text.contains("item one"));
        assert!(!text.contains('#'));
        assert!(!text.contains('*'));
    }
}
