//! User-visible notifications.
//!
//! The loader reports progress and failures as short "toasts". How they are
//! shown is up to the host: the CLI prints them to stderr, library users can
//! plug in their own [`Notifier`].

use std::fmt;

/// Visual weight of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastStyle {
    /// Work in progress
    Animated,
    Success,
    Failure,
}

/// A short user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub style: ToastStyle,
    pub title: String,
    pub message: Option<String>,
}

impl Toast {
    pub fn new(style: ToastStyle, title: impl Into<String>) -> Self {
        Self {
            style,
            title: title.into(),
            message: None,
        }
    }

    pub fn animated(title: impl Into<String>) -> Self {
        Self::new(ToastStyle::Animated, title)
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::new(ToastStyle::Success, title)
    }

    pub fn failure(title: impl Into<String>) -> Self {
        Self::new(ToastStyle::Failure, title)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Display for Toast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.style {
            ToastStyle::Animated => "…",
            ToastStyle::Success => "✓",
            ToastStyle::Failure => "✗",
        };
        match &self.message {
            Some(message) => write!(f, "{marker} {}: {message}", self.title),
            None => write!(f, "{marker} {}", self.title),
        }
    }
}

/// Sink for toasts. Must not block; it is called from inside the loader.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Routes toasts into the tracing log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, toast: Toast) {
        match toast.style {
            ToastStyle::Failure => {
                tracing::warn!(title = %toast.title, message = ?toast.message, "Notification")
            }
            _ => tracing::info!(title = %toast.title, message = ?toast.message, "Notification"),
        }
    }
}

/// Prints toasts to stderr so they never mix with command output on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, toast: Toast) {
        eprintln!("{toast}");
    }
}
