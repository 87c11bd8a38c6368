use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;
use tracing::{info, warn};

use crate::StudyError;
use crate::app::{self, AppState, ConsentChoice};
use crate::chat::engine::ConversationEngine;
use crate::chat::{ChatStore, RETRIEVAL_TOP_K};
use crate::config::Config;
use crate::index::{IndexManager, VECTOR_INDEX_ID};
use crate::ingest::{IngestionPipeline, ProviderEnricher};
use crate::llm::{OpenAiClient, Role};
use crate::quiz::{QuizBuilder, QuizRowSet, run_quiz};
use crate::session::{SessionState, delete_session, load_session, save_session};
use crate::summary::SummaryDocument;

enum TrainingExit {
    NewSession,
    Quit,
}

/// Drive the session state machine: onboarding for new users, a consent
/// prompt for returning ones, then the training menu.
pub async fn run_start(config: &Config) -> Result<()> {
    loop {
        let session = load_session_with_fallback(config)?;

        match app::route(session.as_ref()) {
            AppState::Onboarding => {
                let Some(mut state) = onboarding(config).await? else {
                    return Ok(());
                };
                match training(config, &mut state).await? {
                    TrainingExit::NewSession => {}
                    TrainingExit::Quit => return Ok(()),
                }
            }
            AppState::AwaitingConsent => {
                let mut state = session.unwrap_or_default();
                eprintln!(
                    "Welcome back, {}!",
                    style(&state.user_name).bold().cyan()
                );

                let choice = Select::new()
                    .with_prompt("What would you like to do?")
                    .items(&[
                        format!("Resume studying: {}", state.study_subject),
                        "Start a new session".to_string(),
                    ])
                    .default(0)
                    .interact()?;

                let consent = if choice == 0 {
                    ConsentChoice::Resume
                } else {
                    ConsentChoice::NewSession
                };

                match app::apply_consent(consent) {
                    AppState::InTraining => {
                        state.show_quiz = true;
                        save_session(&state, &config.session_file()?)?;
                        match training(config, &mut state).await? {
                            TrainingExit::NewSession => {}
                            TrainingExit::Quit => return Ok(()),
                        }
                    }
                    _ => {
                        delete_session(&mut state, config)?;
                    }
                }
            }
            AppState::InTraining => unreachable!("route never yields InTraining directly"),
        }
    }
}

/// Generate (or resume) a quiz for the saved session.
pub async fn run_quiz_command(config: &Config) -> Result<()> {
    let Some(mut state) = load_session_with_fallback(config)? else {
        eprintln!("No study session found. Run `studymate start` first.");
        return Ok(());
    };

    quiz_flow(config, &mut state).await
}

/// Chat about the saved session's subject.
pub async fn run_chat_command(config: &Config) -> Result<()> {
    let Some(state) = load_session_with_fallback(config)? else {
        eprintln!("No study session found. Run `studymate start` first.");
        return Ok(());
    };

    chat_loop(config, &state).await
}

/// Report session, index and quiz state.
pub async fn show_status(config: &Config) -> Result<()> {
    eprintln!("{}", style("Studymate Status").bold().cyan());
    eprintln!();

    match load_session(&config.session_file()?) {
        Ok(Some(state)) => {
            eprintln!("Session: {} studying {}", state.user_name, state.study_subject);
            if !state.uploaded_files.is_empty() {
                eprintln!("Uploaded files: {}", state.uploaded_files.join(", "));
            }
        }
        Ok(None) => eprintln!("Session: none (first-time user)"),
        Err(error) => eprintln!(
            "Session: {}",
            style(format!("corrupt ({error})")).yellow()
        ),
    }

    let manager = IndexManager::new(config)?;
    match manager.try_load(VECTOR_INDEX_ID).await? {
        Some(index) => {
            let stats = index.stats().await?;
            eprintln!(
                "Index: {} documents, {} nodes, {} embeddings",
                stats.documents, stats.nodes, stats.embeddings
            );
            for document in index.documents().await? {
                eprintln!("  - {}", document.file_name);
            }
        }
        None => eprintln!("Index: not built yet"),
    }

    let quiz_file = config.quiz_file()?;
    if quiz_file.exists() {
        match QuizRowSet::load_csv(&quiz_file) {
            Ok(quiz) => eprintln!("Quiz: {} questions ready", quiz.len()),
            Err(error) => eprintln!("Quiz: {}", style(format!("unreadable ({error})")).yellow()),
        }
    } else {
        eprintln!("Quiz: none generated yet");
    }

    let transcript = ChatStore::load(&config.conversation_file()?);
    eprintln!(
        "Chat history: {} messages",
        transcript.rendered_history(crate::chat::DEFAULT_STORE_KEY).len()
    );

    Ok(())
}

/// Delete the session, transcript and uploads after confirmation.
pub fn reset_session(config: &Config) -> Result<()> {
    let confirmed = Confirm::new()
        .with_prompt("Delete the current session, chat transcript and uploaded files?")
        .default(false)
        .interact()?;

    if !confirmed {
        eprintln!("Nothing deleted.");
        return Ok(());
    }

    let mut state = load_session_with_fallback(config)?.unwrap_or_default();
    delete_session(&mut state, config)?;
    eprintln!("Session deleted. Run `studymate start` to begin a new one.");
    Ok(())
}

/// Corrupt-session policy: log and treat as a first-time user.
fn load_session_with_fallback(config: &Config) -> Result<Option<SessionState>> {
    match load_session(&config.session_file()?) {
        Ok(session) => Ok(session),
        Err(error) => {
            if matches!(
                error.downcast_ref::<StudyError>(),
                Some(StudyError::SessionCorrupt(_))
            ) {
                warn!("{error}; falling back to onboarding");
                Ok(None)
            } else {
                Err(error)
            }
        }
    }
}

/// Collect name, subject and study material, then ingest and index it.
/// Returns `None` when the user bails out before completing onboarding.
async fn onboarding(config: &Config) -> Result<Option<SessionState>> {
    eprintln!("{}", style("Welcome to Studymate!").bold().cyan());

    let user_name: String = Input::new()
        .with_prompt("What is your name?")
        .allow_empty(true)
        .interact_text()?;
    let user_name = user_name.trim().to_string();
    if user_name.is_empty() {
        return Ok(None);
    }

    eprintln!("Hi {user_name}. Nice to meet you!");

    let study_subject: String = Input::new()
        .with_prompt("What subject would you like to study?")
        .allow_empty(true)
        .interact_text()?;
    let study_subject = study_subject.trim().to_string();
    if study_subject.is_empty() {
        return Ok(None);
    }

    eprintln!("All right {user_name}, let's focus on: '{study_subject}'.");

    let mut state = SessionState {
        user_name,
        study_subject,
        ..SessionState::default()
    };

    collect_uploads(config, &mut state)?;
    ingest_and_index(config, &mut state).await?;

    state.show_quiz = true;
    save_session(&state, &config.session_file()?)?;

    Ok(Some(state))
}

/// Copy user-supplied files into the managed upload directory.
fn collect_uploads(config: &Config, state: &mut SessionState) -> Result<()> {
    let upload_dir = config.upload_dir()?;
    std::fs::create_dir_all(&upload_dir)
        .with_context(|| format!("Failed to create {}", upload_dir.display()))?;

    eprintln!("Add your study material (.txt, .md or .pdf files).");

    loop {
        let input: String = Input::new()
            .with_prompt("Path to a file or directory (empty to finish)")
            .allow_empty(true)
            .interact_text()?;
        let input = input.trim();
        if input.is_empty() {
            break;
        }

        let path = Path::new(input);
        if path.is_dir() {
            for entry in std::fs::read_dir(path)
                .with_context(|| format!("Failed to read {}", path.display()))?
            {
                let entry_path = entry?.path();
                if entry_path.is_file() {
                    copy_upload(&entry_path, &upload_dir, state)?;
                }
            }
        } else if path.is_file() {
            copy_upload(path, &upload_dir, state)?;
        } else {
            eprintln!("{}", style(format!("Not found: {input}")).yellow());
        }
    }

    Ok(())
}

fn copy_upload(source: &Path, upload_dir: &Path, state: &mut SessionState) -> Result<()> {
    let Some(file_name) = source.file_name() else {
        return Ok(());
    };

    let destination = upload_dir.join(file_name);
    std::fs::copy(source, &destination)
        .with_context(|| format!("Failed to copy {}", source.display()))?;

    let name = file_name.to_string_lossy().into_owned();
    eprintln!("Uploaded {name}");
    state.uploaded_files.push(name);
    Ok(())
}

/// Ingest the uploaded material, write the summary document and build or
/// update the persisted index.
async fn ingest_and_index(config: &Config, state: &mut SessionState) -> Result<()> {
    let client = OpenAiClient::new(config)?;
    let enricher = ProviderEnricher::new(&client, &config.study.language);
    let pipeline = IngestionPipeline::new(enricher, config)?;

    eprintln!("Ingesting study material...");
    let nodes = pipeline.ingest(&config.upload_dir()?)?;

    if nodes.is_empty() {
        eprintln!(
            "{}",
            style("No ingestible material found; chat and quiz will have nothing to draw on.")
                .yellow()
        );
    } else {
        let document = SummaryDocument::from_summaries(nodes.iter().map(|n| n.summary.as_str()));
        if !document.is_empty() {
            document.write_to(&config.summary_dir()?)?;
            eprintln!("Summary document ready.");
        }

        eprintln!("Building the index...");
        let manager = IndexManager::new(config)?;
        let index = manager.build_or_update(&nodes).await?;
        let stats = index.stats().await?;
        eprintln!(
            "Index ready: {} documents, {} nodes.",
            stats.documents, stats.nodes
        );
    }

    state.finish_upload = true;
    Ok(())
}

async fn training(config: &Config, state: &mut SessionState) -> Result<TrainingExit> {
    loop {
        eprintln!();
        let choice = Select::new()
            .with_prompt("Train with a quiz or study with the chatbot")
            .items(&[
                "Chat with Studymate",
                "Take a quiz",
                "Start a new session",
                "Quit",
            ])
            .default(0)
            .interact()?;

        match choice {
            0 => chat_loop(config, state).await?,
            1 => quiz_flow(config, state).await?,
            2 => {
                delete_session(state, config)?;
                return Ok(TrainingExit::NewSession);
            }
            _ => return Ok(TrainingExit::Quit),
        }
    }
}

/// Generate a fresh quiz (or reload a quiz that was interrupted mid-run),
/// present it, and record the outcome.
async fn quiz_flow(config: &Config, state: &mut SessionState) -> Result<()> {
    let client = OpenAiClient::new(config)?;
    let manager = IndexManager::new(config)?;
    let index = manager.open(VECTOR_INDEX_ID).await?;

    let quiz_file = config.quiz_file()?;
    let quiz = if state.quiz_running && quiz_file.exists() {
        eprintln!("Resuming the quiz that was already generated.");
        QuizRowSet::load_csv(&quiz_file)?
    } else {
        state.quiz_running = true;
        save_session(state, &config.session_file()?)?;

        eprintln!(
            "Let's check your knowledge of {} with a quiz.",
            style(&state.study_subject).bold()
        );
        eprintln!("Generating questions...");

        let builder = QuizBuilder::new(&client, &index, config);
        builder.build_quiz(&state.study_subject, &quiz_file).await?
    };

    let outcome = run_quiz(&quiz)?;
    info!(
        "Quiz finished: {}/{} ({})",
        outcome.score, outcome.max_score, outcome.tier
    );

    state.quiz_running = false;
    save_session(state, &config.session_file()?)?;
    Ok(())
}

/// Interactive chat loop. Turn-level failures are reported and the loop
/// continues; the persisted transcript is never corrupted by them.
async fn chat_loop(config: &Config, state: &SessionState) -> Result<()> {
    let client = OpenAiClient::new(config)?;
    let manager = IndexManager::new(config)?;
    let index = manager.open(VECTOR_INDEX_ID).await?;

    let conversation_file = config.conversation_file()?;
    let store = ChatStore::load(&conversation_file);
    let retriever = index.retriever(&client, RETRIEVAL_TOP_K);

    let mut engine = ConversationEngine::new(
        &client,
        retriever,
        store,
        conversation_file,
        &state.user_name,
        &state.study_subject,
        "",
        &config.study.language,
    );

    eprintln!(
        "Hi {}. I'm here to answer your questions about: '{}'",
        state.user_name,
        style(&state.study_subject).bold()
    );
    eprintln!("(Press enter on an empty line to leave the chat.)");
    eprintln!();

    for message in engine.rendered_history() {
        render_message(message.role, message.text());
    }

    loop {
        let input: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;
        let question = input.trim();
        if question.is_empty() {
            return Ok(());
        }

        match engine.turn(question).await {
            Ok(answer) => render_message(Role::Assistant, &answer),
            Err(error) => {
                eprintln!("{}", style(format!("That turn failed: {error}")).red());
            }
        }
    }
}

fn render_message(role: Role, text: &str) {
    match role {
        Role::Assistant => eprintln!("{} {text}", style("Studymate:").bold().cyan()),
        Role::User => eprintln!("{} {text}", style("You:").bold()),
        _ => {}
    }
}
