//! Host automation runtime boundary.
//!
//! This module defines the [`UiInspector`] trait, the collaborator that hands
//! out the root of the live UI tree. Different hosts (an on-device
//! accessibility service, a saved dump replayed from disk, a test double)
//! implement it so the capturer can work with any of them without knowing
//! how the tree is obtained.

use async_trait::async_trait;
use thiserror::Error;

use crate::element::LiveElement;

/// Errors reported by a host inspector before traversal begins.
#[derive(Error, Debug)]
pub enum InspectorError {
    /// The host runtime is not reachable (service disabled, not attached).
    #[error("Not connected to host automation runtime")]
    NotConnected,

    /// A host operation failed with the given message.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// The UI did not settle within the allotted time.
    #[error("Timed out waiting for the UI to become idle")]
    Timeout,

    /// An I/O error occurred while talking to the host.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of live UI trees.
///
/// Only the idle wait is asynchronous. Handing out the root and walking the
/// tree are synchronous so that a capture never yields mid-walk.
#[async_trait]
pub trait UiInspector: Send + Sync {
    /// Handle type for elements of this host's tree.
    type Element: LiveElement + Send;

    /// Waits until the host reports the UI as idle.
    async fn wait_for_idle(&self) -> Result<(), InspectorError>;

    /// Returns the root of the active window.
    ///
    /// Implementations fall back to the host's general root when no window
    /// is active, and return `None` when neither is available.
    fn root_in_active_window(&self) -> Option<Self::Element>;
}
