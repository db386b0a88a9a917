//! Capture-and-persist operation.
//!
//! [`Capturer`] runs one full capture against a [`UiInspector`]: wait for the
//! UI to go idle, pause for the settle delay, walk the active window's tree,
//! and write the snapshot. The only suspension points are the idle wait and
//! the settle delay, both before the walk starts; the walk and the write are
//! synchronous.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use treesnap_core::capturer::Capturer;
//! use treesnap_core::config::CaptureConfig;
//! use treesnap_core::fixture::FixtureInspector;
//!
//! #[tokio::main]
//! async fn main() {
//!     let inspector = Arc::new(FixtureInspector::load("dump.json").unwrap());
//!     let capturer = Capturer::new(inspector, CaptureConfig::load());
//!
//!     let report = capturer.capture().await.unwrap();
//!     println!("{} nodes written to {}", report.nodes, report.path.display());
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, debug_span, info, Instrument};

use crate::capture::{BuildOutput, CaptureError, SnapshotBuilder};
use crate::config::CaptureConfig;
use crate::inspector::{InspectorError, UiInspector};
use crate::persist::SnapshotWriter;

/// Summary of a completed capture.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    /// Where the snapshot was written.
    pub path: PathBuf,
    /// Whether a root element was available. When `false` the file holds `null`.
    pub root_available: bool,
    pub nodes: usize,
    /// Null child slots and elements that vanished during the walk.
    pub unavailable: usize,
    pub bytes: usize,
    /// When the walk started.
    pub captured_at: DateTime<Utc>,
}

/// Runs captures against one inspector with fixed settings.
pub struct Capturer<I> {
    inspector: Arc<I>,
    config: CaptureConfig,
    builder: SnapshotBuilder,
    writer: SnapshotWriter,
}

impl<I: UiInspector> Capturer<I> {
    pub fn new(inspector: Arc<I>, config: CaptureConfig) -> Self {
        let builder = SnapshotBuilder::new()
            .with_index_mode(config.index_mode)
            .with_limits(config.limits);
        let writer = SnapshotWriter::new(config.output_path.clone()).with_pretty(config.pretty);
        Self {
            inspector,
            config,
            builder,
            writer,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Captures the active window and replaces the output file.
    ///
    /// Unavailable elements are recorded as `null` and do not fail the
    /// capture. Inspector, limit and write failures are returned as-is and
    /// leave any previous output file untouched.
    pub async fn capture(&self) -> Result<CaptureReport, CaptureError> {
        let span = debug_span!("capture", path = %self.writer.path().display());
        async {
            self.settle().await?;

            let captured_at = Utc::now();
            let output = self.snapshot()?;
            let bytes = self.writer.write(output.root.as_ref())?;

            let report = CaptureReport {
                path: self.writer.path().to_path_buf(),
                root_available: output.root.is_some(),
                nodes: output.stats.nodes,
                unavailable: output.stats.unavailable,
                bytes,
                captured_at,
            };
            info!(
                nodes = report.nodes,
                unavailable = report.unavailable,
                bytes = report.bytes,
                "snapshot captured"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Waits for the UI to go idle, then sleeps the settle delay.
    pub async fn settle(&self) -> Result<(), CaptureError> {
        let idle_timeout = self.config.idle_timeout();
        match tokio::time::timeout(idle_timeout, self.inspector.wait_for_idle()).await {
            Ok(result) => result?,
            Err(_) => {
                debug!(?idle_timeout, "UI did not become idle in time");
                return Err(InspectorError::Timeout.into());
            }
        }

        let settle_delay = self.config.settle_delay();
        if !settle_delay.is_zero() {
            debug!(?settle_delay, "settling before walk");
            tokio::time::sleep(settle_delay).await;
        }
        Ok(())
    }

    /// Walks the active window without waiting or writing anything.
    pub fn snapshot(&self) -> Result<BuildOutput, CaptureError> {
        let root = self.inspector.root_in_active_window();
        self.builder.build(root.as_ref(), self.config.root_index)
    }
}
