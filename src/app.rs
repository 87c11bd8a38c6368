// Application controller
// A small state machine routing between onboarding, consent and training.
// All business logic lives in the components; this only decides where the
// interactive flow goes next.

use crate::session::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// First-time user: collect name, subject and material, then ingest.
    Onboarding,
    /// Returning user: resume the saved session or start over.
    AwaitingConsent,
    /// Active session: chat and quiz are available.
    InTraining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentChoice {
    Resume,
    NewSession,
}

/// Route at startup. A corrupt session record is degraded to `None` by the
/// caller before routing, so it lands in onboarding like a first run.
pub fn route(session: Option<&SessionState>) -> AppState {
    match session {
        None => AppState::Onboarding,
        Some(_) => AppState::AwaitingConsent,
    }
}

/// Resuming enters training; starting over clears the session first and
/// falls back to onboarding.
pub fn apply_consent(choice: ConsentChoice) -> AppState {
    match choice {
        ConsentChoice::Resume => AppState::InTraining,
        ConsentChoice::NewSession => AppState::Onboarding,
    }
}
