use anyhow::{Context, Result};
use itertools::Itertools;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info};

use super::memory::ChatMemoryBuffer;
use super::store::{ChatStore, DEFAULT_STORE_KEY};
use crate::StudyError;
use crate::index::Retriever;
use crate::llm::{ChatMessage, OpenAiClient, ToolSpec};

/// Similarity matches handed to the model per retrieval-tool call.
pub const RETRIEVAL_TOP_K: usize = 3;

/// Upper bound on tool-call rounds within one turn.
pub const MAX_TOOL_ROUNDS: usize = 4;

const ASSISTANT_NAME: &str = "Studymate";
const TOOL_NAME: &str = "study_materials";

#[derive(Debug, Deserialize)]
struct ToolArgs {
    question: String,
}

/// A conversation bound to a memory window over the persisted transcript,
/// one retrieval tool over the indexed material, and a fixed system
/// instruction. The transcript is persisted after every completed turn.
pub struct ConversationEngine<'a, R: Retriever> {
    client: &'a OpenAiClient,
    retriever: R,
    store: ChatStore,
    store_path: PathBuf,
    store_key: String,
    memory: ChatMemoryBuffer,
    system_prompt: String,
    tool_spec: ToolSpec,
}

impl<'a, R: Retriever> ConversationEngine<'a, R> {
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        client: &'a OpenAiClient,
        retriever: R,
        store: ChatStore,
        store_path: PathBuf,
        user_name: &str,
        study_subject: &str,
        context: &str,
        language: &str,
    ) -> Self {
        Self {
            client,
            retriever,
            store,
            store_path,
            store_key: DEFAULT_STORE_KEY.to_string(),
            memory: ChatMemoryBuffer::from_defaults(),
            system_prompt: system_instruction(user_name, study_subject, context, language),
            tool_spec: study_materials_tool_spec(study_subject),
        }
    }

    /// Prior conversation for display, excluding tool exchanges.
    pub fn rendered_history(&self) -> Vec<&ChatMessage> {
        self.store.rendered_history(&self.store_key)
    }

    /// Run one conversation turn. The model decides per invocation whether
    /// to consult the retrieval tool before answering. Only a completed turn
    /// reaches the transcript; a failed one leaves it untouched.
    pub async fn turn(&mut self, user_input: &str) -> Result<String> {
        let mut base = vec![ChatMessage::system(self.system_prompt.clone())];
        base.extend(self.memory.window(self.store.messages(&self.store_key)));

        let mut pending = vec![ChatMessage::user(user_input)];

        for round in 0..MAX_TOOL_ROUNDS {
            let request: Vec<ChatMessage> = base
                .iter()
                .chain(pending.iter())
                .cloned()
                .collect();

            let reply = self
                .client
                .chat(&request, std::slice::from_ref(&self.tool_spec))
                .map_err(|error| StudyError::TurnExecution(error.to_string()))?;

            if !reply.has_tool_calls() {
                let answer = reply.text().trim().to_string();
                if answer.is_empty() {
                    return Err(StudyError::TurnExecution(
                        "model returned an empty reply".to_string(),
                    )
                    .into());
                }

                pending.push(reply);
                self.store.extend(&self.store_key, pending);
                self.store
                    .persist(&self.store_path)
                    .context("Failed to persist transcript")?;

                debug!("Turn completed after {} tool rounds", round);
                return Ok(answer);
            }

            let calls = reply.tool_calls.clone().unwrap_or_default();
            pending.push(reply);

            for call in calls {
                let output = self.execute_tool_call(&call.function.name, &call.function.arguments)
                    .await
                    .map_err(|error| StudyError::TurnExecution(error.to_string()))?;
                pending.push(ChatMessage::tool(call.id, output));
            }
        }

        Err(StudyError::TurnExecution(format!(
            "no final answer after {MAX_TOOL_ROUNDS} tool rounds"
        ))
        .into())
    }

    async fn execute_tool_call(&self, name: &str, arguments: &str) -> Result<String> {
        if name != TOOL_NAME {
            return Ok(format!("Unknown tool: {name}"));
        }

        let args: ToolArgs =
            serde_json::from_str(arguments).context("Invalid retrieval tool arguments")?;

        info!("Retrieval tool called: {}", args.question);
        self.answer_from_materials(&args.question).await
    }

    /// Read-only retrieval plus synthesis: find the closest chunks, then let
    /// the model answer from exactly that material.
    async fn answer_from_materials(&self, question: &str) -> Result<String> {
        let chunks = self
            .retriever
            .retrieve(question)
            .await
            .context("Retrieval over study material failed")?;

        if chunks.is_empty() {
            return Ok("No relevant study material was found for this question.".to_string());
        }

        let material = chunks
            .iter()
            .map(|chunk| format!("[{}] {}", chunk.document_id, chunk.text))
            .join("\n\n");

        let prompt = format!(
            "Answer the question using only the study material excerpts below. \
             If they do not contain the answer, say so.\n\n\
             Study material:\n{material}\n\nQuestion: {question}"
        );

        self.client
            .complete(&prompt)
            .context("Failed to synthesize an answer from the study material")
    }
}

/// Fixed system instruction parameterized by user, subject, extra context
/// and answer language.
pub fn system_instruction(
    user_name: &str,
    study_subject: &str,
    context: &str,
    language: &str,
) -> String {
    format!(
        "Your name is {ASSISTANT_NAME}, you are a virtual study assistant and you \
         answer in {language}. Your purpose is to help {user_name} study and better \
         understand the subject: {study_subject}. We are discussing in particular \
         the following content: {context}"
    )
}

/// The one tool the agent can call: read-only retrieval over the indexed
/// study material.
pub fn study_materials_tool_spec(study_subject: &str) -> ToolSpec {
    ToolSpec {
        name: TOOL_NAME.to_string(),
        description: format!(
            "Provides official information about {study_subject}. \
             Requires a detailed plain-text question as input."
        ),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "A detailed plain-text question about the study material"
                }
            },
            "required": ["question"],
            "additionalProperties": false
        }),
    }
}
