//! UI sink trait and implementations.
//!
//! The build tool owns the terminal; the step only pushes human readable
//! progress lines through a [`Ui`].

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Receives progress lines from the step.
pub trait Ui: Send + Sync {
    /// A phase headline, e.g. "Creating Instance...".
    fn say(&self, message: &str);

    /// A detail line under the current headline.
    fn message(&self, message: &str);

    /// A failure line.
    fn error(&self, message: &str);
}

/// A UI that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpUi;

impl Ui for NoOpUi {
    fn say(&self, _message: &str) {}

    fn message(&self, _message: &str) {}

    fn error(&self, _message: &str) {}
}

/// A UI that forwards lines to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LoggingUi {
    /// Prefix identifying the builder in log output.
    builder: Option<String>,
}

impl LoggingUi {
    /// Creates a logging UI.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags every line with a builder name.
    #[must_use]
    pub fn with_builder(mut self, builder: impl Into<String>) -> Self {
        self.builder = Some(builder.into());
        self
    }

    fn builder(&self) -> &str {
        self.builder.as_deref().unwrap_or("uhost")
    }
}

impl Ui for LoggingUi {
    fn say(&self, message: &str) {
        info!(builder = self.builder(), "==> {}", message);
    }

    fn message(&self, message: &str) {
        info!(builder = self.builder(), "    {}", message);
    }

    fn error(&self, message: &str) {
        error!(builder = self.builder(), "{}", message);
    }
}

/// Severity of a recorded line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiLevel {
    /// Headline.
    Say,
    /// Detail.
    Message,
    /// Failure.
    Error,
}

/// A collecting UI for tests.
#[derive(Debug, Default)]
pub struct CollectingUi {
    lines: RwLock<Vec<(UiLevel, String)>>,
}

impl CollectingUi {
    /// Creates a new collecting UI.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected lines.
    #[must_use]
    pub fn lines(&self) -> Vec<(UiLevel, String)> {
        self.lines.read().clone()
    }

    /// Returns the text of lines at one level.
    #[must_use]
    pub fn lines_at(&self, level: UiLevel) -> Vec<String> {
        self.lines
            .read()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Returns true if any line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.read().iter().any(|(_, text)| text.contains(needle))
    }

    /// Clears all collected lines.
    pub fn clear(&self) {
        self.lines.write().clear();
    }

    fn push(&self, level: UiLevel, message: &str) {
        self.lines.write().push((level, message.to_string()));
    }
}

impl Ui for CollectingUi {
    fn say(&self, message: &str) {
        self.push(UiLevel::Say, message);
    }

    fn message(&self, message: &str) {
        self.push(UiLevel::Message, message);
    }

    fn error(&self, message: &str) {
        self.push(UiLevel::Error, message);
    }
}
