//! Headless backend errors

use thiserror::Error;

/// Why the headless engine refused an operation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeadlessError {
    #[error("display module '{0}' is not available")]
    ModuleUnavailable(String),

    #[error("pipe '{0}' has been released")]
    PipeClosed(String),

    #[error("engine '{0}' has been released")]
    EngineClosed(String),

    #[error("engine produced no surface for window '{0}'")]
    NoSurface(String),

    #[error("window '{0}' is closed")]
    WindowClosed(String),

    #[error("'{0}' is not a camera")]
    NotACamera(String),

    #[error("window '{0}' has zero height")]
    DegenerateWindow(String),

    #[error("'{0}' was already released")]
    AlreadyReleased(String),

    #[error("injected failure")]
    Injected,
}

pub type HeadlessResult<T> = Result<T, HeadlessError>;
