// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Error types for the diff engine

use thiserror::Error;

/// Result alias used across the library
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong talking to the backend or driving a session
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("request to {endpoint} failed: {source}")]
    Http {
        /// Endpoint path
        endpoint: &'static str,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// Backend answered with a non-success status
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        /// Endpoint path
        endpoint: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Response body did not match the expected shape
    #[error("could not decode {endpoint} response: {reason}")]
    Decode {
        /// Endpoint path
        endpoint: &'static str,
        /// Parser message
        reason: String,
    },

    /// Backend refused or failed an operation (in-memory backend, scripted failures)
    #[error("{endpoint} failed: {reason}")]
    Backend {
        /// Operation name
        endpoint: &'static str,
        /// Failure description
        reason: String,
    },

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// The reserved default state cannot be deleted
    #[error("state '{0}' is reserved and cannot be deleted")]
    ReservedState(String),

    /// An operation needed an open diff session
    #[error("no diff session is open")]
    SessionClosed,

    /// The session has no entry for this pair
    #[error("no diff entry for {container_id} -> {target_id}")]
    UnknownEntry {
        /// Container ID
        container_id: String,
        /// Target ID
        target_id: String,
    },
}

impl Error {
    /// Shorthand for a scripted or in-process backend failure
    pub fn backend(endpoint: &'static str, reason: impl Into<String>) -> Self {
        Self::Backend {
            endpoint,
            reason: reason.into(),
        }
    }
}
