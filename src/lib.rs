use thiserror::Error;

pub type Result<T> = std::result::Result<T, StudyError>;

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot read uploaded file {path}: {reason}")]
    UnreadableInput { path: String, reason: String },

    #[error("Ingestion cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("No study index named \"{0}\" has been built yet")]
    IndexUnavailable(String),

    #[error("Quiz output failed structured extraction: {0}")]
    QuizParse(String),

    #[error("Session file is corrupt: {0}")]
    SessionCorrupt(String),

    #[error("Chat turn failed: {0}")]
    TurnExecution(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Model provider error: {0}")]
    Model(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod app;
pub mod chat;
pub mod commands;
pub mod config;
pub mod database;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod quiz;
pub mod session;
pub mod summary;
