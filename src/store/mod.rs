//! Reducer-style stores for the classroom page forms.
//!
//! Each store is a plain struct updated only through `reduce(action)`. A
//! front end keeps one per open form, feeds it user input as actions and asks
//! it for a typed submission when the user hits send.
use std::error::Error;
use std::fmt;

pub mod grading_settings;
pub mod stream_composer;
pub mod task_composer;

pub use grading_settings::{GradingSettings, GradingSettingsAction, SettingsError};
pub use stream_composer::{PostMode, StreamComposer, StreamComposerAction};
pub use task_composer::{TaskComposer, TaskComposerAction};

/// Why a composer refused to produce a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum ComposerError {
    EmptyContent,
    MissingTitle,
    InvalidPoints(f64),
    MissingSchedule,
    ScheduleInPast,
    InvalidLink(String),
    /// Saved drafts are updated as JSON, so new files cannot be attached.
    DraftUploadsUnsupported,
    AlreadySubmitting,
}

impl fmt::Display for ComposerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposerError::EmptyContent => write!(f, "Write something or attach a file before posting"),
            ComposerError::MissingTitle => write!(f, "A title is required"),
            ComposerError::InvalidPoints(p) => write!(f, "Points must be greater than 0 (got {})", p),
            ComposerError::MissingSchedule => write!(f, "Pick a date and time to schedule"),
            ComposerError::ScheduleInPast => write!(f, "The scheduled time must be in the future"),
            ComposerError::InvalidLink(url) => write!(f, "Not a valid link: {}", url),
            ComposerError::DraftUploadsUnsupported => {
                write!(f, "Files cannot be added to a saved draft. Publish it or create a new post.")
            }
            ComposerError::AlreadySubmitting => write!(f, "Already sending, please wait"),
        }
    }
}

impl Error for ComposerError {}
