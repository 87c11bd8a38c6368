// Summary document module
// Renders the per-chunk summaries produced during ingestion into a simple
// paginated text document under a fixed title.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

pub const SUMMARY_TITLE: &str = "Study Material Summary";
pub const SUMMARY_FILE_NAME: &str = "summary.txt";

const LINES_PER_PAGE: usize = 40;
const LINE_WIDTH: usize = 90;

/// A paginated document built from concatenated chunk summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryDocument {
    body: String,
}

impl SummaryDocument {
    /// Concatenate per-chunk summaries, one paragraph each.
    pub fn from_summaries<'a>(summaries: impl IntoIterator<Item = &'a str>) -> Self {
        let body = summaries
            .into_iter()
            .map(str::trim)
            .filter(|summary| !summary.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        Self { body }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Lay the body out into pages, each headed by the fixed title and
    /// footed with its page number.
    pub fn paginate(&self) -> Vec<String> {
        let lines = wrap_lines(&self.body, LINE_WIDTH);
        let total_pages = lines.chunks(LINES_PER_PAGE).count().max(1);

        lines
            .chunks(LINES_PER_PAGE)
            .enumerate()
            .map(|(page_index, page_lines)| {
                let mut page = String::new();
                page.push_str(SUMMARY_TITLE);
                page.push('\n');
                page.push_str(&"=".repeat(SUMMARY_TITLE.len()));
                page.push_str("\n\n");
                page.push_str(&page_lines.join("\n"));
                page.push_str(&format!(
                    "\n\n- page {} of {} -",
                    page_index + 1,
                    total_pages
                ));
                page
            })
            .collect()
    }

    /// Write the paginated document into the summary directory, overwriting
    /// any prior run's output. Returns the written path.
    pub fn write_to(&self, summary_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(summary_dir).with_context(|| {
            format!(
                "Failed to create summary directory: {}",
                summary_dir.display()
            )
        })?;

        let path = summary_dir.join(SUMMARY_FILE_NAME);
        let content = self.paginate().join("\n\u{c}\n");

        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write summary document: {}", path.display()))?;

        info!("Summary document written to {}", path.display());
        Ok(path)
    }
}

/// Greedy word wrap preserving paragraph breaks.
fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split("\n\n") {
        let mut current = String::new();

        for word in paragraph.split_whitespace() {
            if !current.is_empty() && current.len() + 1 + word.len() > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }

        if !current.is_empty() {
            lines.push(current);
        }
        lines.push(String::new());
    }

    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }

    lines
}
