//! Typed errors returned by the tab lifecycle controller.
//!
//! A failed operation never leaves a tab half-transitioned: every variant is
//! produced before any state is mutated. Idempotent no-ops (pinning an already
//! pinned tab, discarding a discarded tab) are not errors and are reported as
//! `Ok(false)` by the operation itself.

use thiserror::Error;

use crate::ids::{TabId, WindowId};

/// Coarse classification of a [`TabError`], for hosts that only care about
/// the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced window, tab or route does not exist.
    NotFound,
    /// The operation is illegal for the tab's current state.
    InvalidState,
    /// Options received across the process boundary failed validation.
    InvalidOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TabError {
    #[error("tab {0} not found")]
    TabNotFound(TabId),

    #[error("window {0} not found")]
    WindowNotFound(WindowId),

    /// The tab exists (or existed) but has no render route registered.
    #[error("no render route registered for tab {0}")]
    RouteNotFound(TabId),

    #[error("window {window} has no tab at index {index}")]
    SlotNotFound { window: WindowId, index: usize },

    #[error("tab {tab}: {reason}")]
    InvalidState { tab: TabId, reason: &'static str },

    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl TabError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TabNotFound(_)
            | Self::WindowNotFound(_)
            | Self::RouteNotFound(_)
            | Self::SlotNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::InvalidOptions(_) => ErrorKind::InvalidOptions,
        }
    }

    pub(crate) fn invalid_state(tab: TabId, reason: &'static str) -> Self {
        Self::InvalidState { tab, reason }
    }
}

impl From<serde_json::Error> for TabError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidOptions(e.to_string())
    }
}
