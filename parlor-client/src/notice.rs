use std::{fmt, time::Duration};

use crate::error::ChatError;

/// How long a success banner stays visible.
pub const SUCCESS_DISPLAY: Duration = Duration::from_secs(3);

/// How long an error banner stays visible.
pub const ERROR_DISPLAY: Duration = Duration::from_secs(5);

/// Severity of a banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Completed action.
    Success,
    /// Failed action.
    Error,
}

/// Completion or failure signal for the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Human readable text.
    pub text: String,
    /// How long to show the banner before hiding it.
    pub display_for: Duration,
}

impl Notice {
    /// A success banner.
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
            display_for: SUCCESS_DISPLAY,
        }
    }

    /// An error banner.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
            display_for: ERROR_DISPLAY,
        }
    }

    /// Whether this is an error banner.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl From<&ChatError> for Notice {
    fn from(err: &ChatError) -> Self {
        Self::error(err.user_message())
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            NoticeLevel::Success => write!(f, "✔ {}", self.text),
            NoticeLevel::Error => write!(f, "✖ {}", self.text),
        }
    }
}
