// Quiz module
// Structured quiz rows with schema validation, CSV persistence, the
// retrieval-augmented builder and the interactive runner.


pub mod builder;
pub mod runner;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::StudyError;

pub use builder::QuizBuilder;
pub use runner::{QuizOutcome, Tier, assign_tier, run_quiz, score_answers};

/// One quiz question. Column names match the persisted CSV header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizRow {
    #[serde(rename = "Question_no")]
    pub question_no: u32,
    #[serde(rename = "Question_text")]
    pub question_text: String,
    #[serde(rename = "Option1")]
    pub option1: String,
    #[serde(rename = "Option2")]
    pub option2: String,
    #[serde(rename = "Option3")]
    pub option3: String,
    #[serde(rename = "Option4")]
    pub option4: String,
    #[serde(rename = "Correct_answer")]
    pub correct_answer: String,
    #[serde(rename = "Rationale")]
    pub rationale: String,
}

impl QuizRow {
    pub fn options(&self) -> [&str; 4] {
        [&self.option1, &self.option2, &self.option3, &self.option4]
    }
}

/// A validated set of quiz rows: question numbers are dense and unique
/// (1..=N) and every correct answer equals exactly one of its options.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizRowSet {
    rows: Vec<QuizRow>,
}

impl QuizRowSet {
    pub fn from_rows(rows: Vec<QuizRow>) -> Result<Self, StudyError> {
        if rows.is_empty() {
            return Err(StudyError::QuizParse(
                "quiz contains no questions".to_string(),
            ));
        }

        let mut numbers: Vec<u32> = rows.iter().map(|row| row.question_no).collect();
        numbers.sort_unstable();
        let expected: Vec<u32> = (1..=rows.len() as u32).collect();
        if numbers != expected {
            return Err(StudyError::QuizParse(format!(
                "question numbers must be unique and dense 1..={}, got {:?}",
                rows.len(),
                numbers
            )));
        }

        for row in &rows {
            let matches = row
                .options()
                .iter()
                .filter(|option| **option == row.correct_answer)
                .count();
            if matches != 1 {
                return Err(StudyError::QuizParse(format!(
                    "question {} has {} options equal to the correct answer (exactly one required)",
                    row.question_no, matches
                )));
            }
        }

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[QuizRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fully overwrite the quiz file with this row set.
    pub fn save_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create quiz directory: {}", parent.display())
            })?;
        }

        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create quiz file: {}", path.display()))?;

        for row in &self.rows {
            writer
                .serialize(row)
                .context("Failed to serialize quiz row")?;
        }
        writer.flush().context("Failed to flush quiz file")?;

        debug!("Wrote {} quiz rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    pub fn load_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open quiz file: {}", path.display()))?;

        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: QuizRow = record.context("Failed to parse quiz row")?;
            rows.push(row);
        }

        Ok(Self::from_rows(rows)?)
    }
}
