use anyhow::{Context, Result};
use itertools::Itertools;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use super::{QuizRow, QuizRowSet};
use crate::StudyError;
use crate::config::Config;
use crate::index::{Retriever, StudyIndex};
use crate::llm::{ChatMessage, OpenAiClient};

/// How many chunks ground the quiz-generation prompt.
pub const QUIZ_RETRIEVAL_TOP_K: usize = 4;

/// Generates a quiz over the indexed material and persists it as CSV.
pub struct QuizBuilder<'a> {
    client: &'a OpenAiClient,
    index: &'a StudyIndex,
    language: &'a str,
    quiz_size: u32,
}

impl<'a> QuizBuilder<'a> {
    pub fn new(client: &'a OpenAiClient, index: &'a StudyIndex, config: &'a Config) -> Self {
        Self {
            client,
            index,
            language: &config.study.language,
            quiz_size: config.study.quiz_size,
        }
    }

    /// Retrieve, draft, extract, validate, persist. The quiz file is only
    /// written once the row set passed validation, so a failed generation
    /// never leaves a partial quiz behind.
    pub async fn build_quiz(&self, subject: &str, quiz_file: &Path) -> Result<QuizRowSet> {
        info!("Generating a {}-question quiz about {subject}", self.quiz_size);

        let instruction = quiz_instruction(self.quiz_size, subject, self.language);

        let retriever = self.index.retriever(self.client, QUIZ_RETRIEVAL_TOP_K);
        let chunks = retriever
            .retrieve(&instruction)
            .await
            .context("Failed to retrieve material for quiz generation")?;
        debug!("Retrieved {} chunks for quiz grounding", chunks.len());

        let material = chunks.iter().map(|chunk| chunk.text.as_str()).join("\n\n---\n\n");
        let grounded_prompt = format!(
            "Use only the study material below for the task.\n\n\
             Study material:\n{material}\n\nTask: {instruction}"
        );

        let draft = self
            .client
            .complete(&grounded_prompt)
            .context("Quiz draft generation failed")?;

        let rows = self.extract_rows(&draft)?;
        let row_set = QuizRowSet::from_rows(rows)?;

        row_set
            .save_csv(quiz_file)
            .context("Failed to persist quiz file")?;

        info!("Persisted a quiz with {} questions", row_set.len());
        Ok(row_set)
    }

    /// Second model pass: coerce the free-text draft into the tabular schema.
    fn extract_rows(&self, draft: &str) -> Result<Vec<QuizRow>, StudyError> {
        let messages = [
            ChatMessage::system(
                "You convert quiz text into structured data. Respond with a JSON object \
                 of the form {\"questions\": [...]} where every entry has exactly the keys \
                 question_no (integer, numbered 1 upward without gaps), question_text, \
                 option1, option2, option3, option4, correct_answer and rationale, all \
                 strings except question_no. correct_answer must repeat one of the four \
                 options verbatim.",
            ),
            ChatMessage::user(format!(
                "Convert this quiz into the JSON schema:\n\n{draft}"
            )),
        ];

        let raw = self
            .client
            .chat_json(&messages)
            .map_err(|error| StudyError::QuizParse(error.to_string()))?;

        parse_extraction(&raw)
    }
}

#[derive(Debug, Deserialize)]
struct RawQuiz {
    questions: Vec<RawQuizRow>,
}

#[derive(Debug, Deserialize)]
struct RawQuizRow {
    question_no: u32,
    question_text: String,
    option1: String,
    option2: String,
    option3: String,
    option4: String,
    correct_answer: String,
    rationale: String,
}

/// Parse the extraction model's JSON output into rows. Any deviation from
/// the schema is a parse failure; there is no best-effort repair.
pub(crate) fn parse_extraction(raw: &str) -> Result<Vec<QuizRow>, StudyError> {
    let parsed: RawQuiz = serde_json::from_str(raw)
        .map_err(|error| StudyError::QuizParse(format!("invalid extraction output: {error}")))?;

    Ok(parsed
        .questions
        .into_iter()
        .map(|row| QuizRow {
            question_no: row.question_no,
            question_text: row.question_text,
            option1: row.option1,
            option2: row.option2,
            option3: row.option3,
            option4: row.option4,
            correct_answer: row.correct_answer,
            rationale: row.rationale,
        })
        .collect())
}

fn quiz_instruction(quiz_size: u32, subject: &str, language: &str) -> String {
    format!(
        "Create {quiz_size} different quiz questions relevant for testing a candidate's \
         knowledge about {subject}. You must use the {language} language. Each question \
         will have 4 answer options. Each question will have different answers. No more \
         than 3 questions should be specific to the provided text: in this case they \
         should concern characters and stories. Questions and answers must not refer to \
         websites or URLs. For each question, provide also the correct answer and the \
         answer rationale. Only one answer option should be correct."
    )
}
