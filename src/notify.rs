// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! User-visible notices

use owo_colors::OwoColorize;
use std::sync::{Mutex, PoisonError};

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Neutral information, e.g. nothing to do
    Info,
    /// A mutating action succeeded
    Success,
    /// A mutating action failed
    Failure,
}

/// One message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Text
    pub message: String,
}

impl Notice {
    /// Informational notice
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    /// Success notice
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    /// Failure notice
    pub fn failure(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Failure, message: message.into() }
    }
}

/// Where notices go
pub trait Notifier: Send + Sync {
    /// Show one notice
    fn notify(&self, notice: Notice);
}

/// Sends notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => tracing::info!("{}", notice.message),
            NoticeLevel::Failure => tracing::error!("{}", notice.message),
        }
    }
}

/// Prints notices to the terminal
#[derive(Debug, Clone, Copy)]
pub struct ConsoleNotifier {
    color: bool,
}

impl ConsoleNotifier {
    /// Terminal notifier, optionally colored
    #[must_use]
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        let message = notice.message;
        match (notice.level, self.color) {
            (NoticeLevel::Info, true) => println!("{}", message.cyan()),
            (NoticeLevel::Success, true) => println!("{}", message.green()),
            (NoticeLevel::Failure, true) => eprintln!("{}", message.red()),
            (NoticeLevel::Failure, false) => eprintln!("{message}"),
            (_, false) => println!("{message}"),
        }
    }
}

/// Keeps every notice in memory
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl CollectingNotifier {
    /// Empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices received so far
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}
