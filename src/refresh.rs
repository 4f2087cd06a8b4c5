// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Refresh signalling between the engine and dependent views
//!
//! Delivery is best effort: a request reaches whoever is subscribed right
//! now, and nothing is queued for views that subscribe later.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::trace;

/// Requests buffered per subscriber before the slowest one starts lagging
const BUS_CAPACITY: usize = 64;

/// Why a refresh was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// Differences were applied or reverted
    Differences,
    /// A different state became the live graph
    StateSwitched,
}

/// One refresh request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    /// Reason
    pub kind: RefreshKind,
    /// When it was sent
    pub at: DateTime<Utc>,
}

/// Fire-and-forget broadcast of refresh requests
#[derive(Debug, Clone)]
pub struct RefreshBus {
    sender: broadcast::Sender<RefreshRequest>,
}

impl Default for RefreshBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshBus {
    /// Bus with no subscribers
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    /// Receive every request sent from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshRequest> {
        self.sender.subscribe()
    }

    /// Notify current subscribers; returns how many there were
    pub fn request(&self, kind: RefreshKind) -> usize {
        let delivered = self
            .sender
            .send(RefreshRequest { kind, at: Utc::now() })
            .unwrap_or(0);
        trace!("Refresh {:?} delivered to {} listeners", kind, delivered);
        delivered
    }
}
