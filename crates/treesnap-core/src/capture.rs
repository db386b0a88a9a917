//! Snapshot builder: walks a live element tree into an [`ElementSnapshot`].
//!
//! The walk is depth-first pre-order over an explicit stack, so a deep host
//! tree cannot overflow the call stack here. The resulting snapshot drops
//! iteratively and [`crate::persist`] renders it with a heap-grown stack, so
//! depth is bounded only by memory unless [`CaptureLimits::max_depth`] is
//! set. Every node is read exactly once.
//! A node whose handle fails mid-read is recorded as `null` in its parent's
//! children and the walk continues with its siblings.
//!
//! The host tree is not locked while it is walked. If the UI changes during
//! the walk the result can mix before and after states; callers get a
//! best-effort structural snapshot, never an error, in that case.
//!
//! # Example
//!
//! ```no_run
//! use treesnap_core::capture::{CaptureLimits, IndexMode, SnapshotBuilder};
//! use treesnap_core::fixture::{FixtureInspector, HostNode};
//! use treesnap_core::inspector::UiInspector;
//!
//! let inspector = FixtureInspector::new(Some(HostNode::default()));
//! let root = inspector.root_in_active_window();
//!
//! let builder = SnapshotBuilder::new()
//!     .with_index_mode(IndexMode::SiblingLocal)
//!     .with_limits(CaptureLimits { max_depth: Some(256), max_nodes: None });
//! let output = builder.build(root.as_ref(), 0).unwrap();
//! println!("captured {} nodes", output.stats.nodes);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::element::{extract_attributes, LiveElement};
use crate::inspector::InspectorError;
use crate::persist::PersistenceFailure;
use crate::snapshot::ElementSnapshot;

/// Errors that abort a capture.
///
/// Unavailable elements are not listed here: they are recovered locally by
/// substituting `null` for the affected subtree.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The walk hit a configured depth or node-count ceiling.
    #[error("Traversal limit exceeded: {kind} limit is {limit}")]
    TraversalLimitExceeded { kind: LimitKind, limit: usize },

    /// The host automation runtime could not provide a stable tree.
    #[error("Inspector error: {0}")]
    Inspector(#[from] InspectorError),

    /// The snapshot could not be written.
    #[error(transparent)]
    Persistence(#[from] PersistenceFailure),
}

/// Which traversal ceiling was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Depth,
    Nodes,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitKind::Depth => write!(f, "depth"),
            LimitKind::Nodes => write!(f, "node count"),
        }
    }
}

/// How the `index` field of each snapshot is assigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexMode {
    /// Each node's index is its 0-based position among its siblings. The
    /// root takes the caller-supplied index. Indices repeat across the tree.
    #[default]
    SiblingLocal,

    /// Captured nodes are numbered in pre-order starting at the root index,
    /// so every index in the snapshot is unique. Null slots take no number.
    Global,
}

/// Optional ceilings on the walk. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureLimits {
    /// Deepest level that may be captured; the root is depth 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    /// Maximum number of captured nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<usize>,
}

/// Counters gathered during one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Nodes captured.
    pub nodes: usize,
    /// Nodes recorded as `null` because the host reported no element or the
    /// handle failed while being read.
    pub unavailable: usize,
    /// Deepest captured level (root = 0).
    pub max_depth: usize,
}

/// Result of a walk.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// The captured tree, or `None` if no root was available.
    pub root: Option<ElementSnapshot>,
    pub stats: BuildStats,
}

/// A node whose attributes are read but whose children are still pending.
struct Frame<E> {
    snapshot: ElementSnapshot,
    pending: std::vec::IntoIter<Option<E>>,
    next_position: usize,
    depth: usize,
}

/// Builds [`ElementSnapshot`] trees from live elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotBuilder {
    index_mode: IndexMode,
    limits: CaptureLimits,
}

impl SnapshotBuilder {
    /// Creates a builder with sibling-local indices and no limits.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index_mode(mut self, index_mode: IndexMode) -> Self {
        self.index_mode = index_mode;
        self
    }

    pub fn with_limits(mut self, limits: CaptureLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn index_mode(&self) -> IndexMode {
        self.index_mode
    }

    pub fn limits(&self) -> CaptureLimits {
        self.limits
    }

    /// Walks the tree under `root` and returns its snapshot.
    ///
    /// A missing or unavailable root yields `Ok` with `root: None`. The only
    /// error is [`CaptureError::TraversalLimitExceeded`].
    pub fn build<E: LiveElement>(
        &self,
        root: Option<&E>,
        root_index: usize,
    ) -> Result<BuildOutput, CaptureError> {
        let mut stats = BuildStats::default();

        let Some(root) = root else {
            debug!("no root element available");
            return Ok(BuildOutput { root: None, stats });
        };

        let Some(root_frame) = self.open(root, root_index, 0, root_index, &mut stats)? else {
            return Ok(BuildOutput { root: None, stats });
        };

        let mut stack = vec![root_frame];
        let mut captured = None;

        while let Some(frame) = stack.last_mut() {
            match frame.pending.next() {
                Some(slot) => {
                    let position = frame.next_position;
                    frame.next_position += 1;
                    let depth = frame.depth + 1;

                    let child = match slot {
                        Some(element) => {
                            self.open(&element, position, depth, root_index, &mut stats)?
                        }
                        None => {
                            trace!(position, depth, "host reported null child");
                            stats.unavailable += 1;
                            None
                        }
                    };

                    match child {
                        Some(child_frame) => stack.push(child_frame),
                        None => frame.snapshot.children.push(None),
                    }
                }
                None => {
                    if let Some(done) = stack.pop() {
                        match stack.last_mut() {
                            Some(parent) => parent.snapshot.children.push(Some(done.snapshot)),
                            None => captured = Some(done.snapshot),
                        }
                    }
                }
            }
        }

        debug!(
            nodes = stats.nodes,
            unavailable = stats.unavailable,
            max_depth = stats.max_depth,
            "tree walk complete"
        );
        Ok(BuildOutput {
            root: captured,
            stats,
        })
    }

    /// Reads one element and prepares it for child traversal.
    ///
    /// Returns `Ok(None)` when the element is unavailable.
    fn open<E: LiveElement>(
        &self,
        element: &E,
        position: usize,
        depth: usize,
        root_index: usize,
        stats: &mut BuildStats,
    ) -> Result<Option<Frame<E>>, CaptureError> {
        if let Some(limit) = self.limits.max_depth {
            if depth > limit {
                return Err(CaptureError::TraversalLimitExceeded {
                    kind: LimitKind::Depth,
                    limit,
                });
            }
        }

        let read = extract_attributes(element).and_then(|attributes| {
            element.children().map(|children| (attributes, children))
        });
        let (attributes, children) = match read {
            Ok(read) => read,
            Err(e) => {
                debug!(position, depth, error = %e, "element unavailable, recording null");
                stats.unavailable += 1;
                return Ok(None);
            }
        };

        if let Some(limit) = self.limits.max_nodes {
            if stats.nodes >= limit {
                return Err(CaptureError::TraversalLimitExceeded {
                    kind: LimitKind::Nodes,
                    limit,
                });
            }
        }

        let index = match self.index_mode {
            IndexMode::SiblingLocal => position,
            IndexMode::Global => root_index + stats.nodes,
        };
        stats.nodes += 1;
        stats.max_depth = stats.max_depth.max(depth);

        let mut snapshot = ElementSnapshot::new(index, attributes);
        snapshot.children.reserve_exact(children.len());

        Ok(Some(Frame {
            snapshot,
            pending: children.into_iter(),
            next_position: 0,
            depth,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Bounds, ElementUnavailable, StateFlag};
    use crate::fixture::{FixtureInspector, HostNode};
    use crate::inspector::UiInspector;

    /// A single-child chain generated on demand, `remaining` levels deep.
    struct Link {
        remaining: usize,
    }

    impl LiveElement for Link {
        fn text(&self) -> Result<Option<String>, ElementUnavailable> {
            Ok(Some(self.remaining.to_string()))
        }
        fn resource_id(&self) -> Result<Option<String>, ElementUnavailable> {
            Ok(None)
        }
        fn class_name(&self) -> Result<Option<String>, ElementUnavailable> {
            Ok(Some("android.widget.LinearLayout".to_string()))
        }
        fn package_name(&self) -> Result<Option<String>, ElementUnavailable> {
            Ok(None)
        }
        fn content_description(&self) -> Result<Option<String>, ElementUnavailable> {
            Ok(None)
        }
        fn state(&self, flag: StateFlag) -> Result<bool, ElementUnavailable> {
            Ok(flag == StateFlag::Enabled)
        }
        fn bounds(&self) -> Result<Bounds, ElementUnavailable> {
            Ok(Bounds::new(0, 0, 1080, 2340))
        }
        fn children(&self) -> Result<Vec<Option<Self>>, ElementUnavailable> {
            Ok(match self.remaining {
                0 => Vec::new(),
                n => vec![Some(Link { remaining: n - 1 })],
            })
        }
    }

    fn node(text: &str, children: Vec<Option<HostNode>>) -> HostNode {
        HostNode {
            text: Some(text.to_string()),
            children,
            ..Default::default()
        }
    }

    fn chain(depth: usize) -> HostNode {
        let mut current = node("leaf", vec![]);
        for _ in 0..depth {
            current = node("link", vec![Some(current)]);
        }
        current
    }

    fn build(tree: HostNode, builder: SnapshotBuilder) -> Result<BuildOutput, CaptureError> {
        let inspector = FixtureInspector::new(Some(tree));
        let root = inspector.root_in_active_window();
        builder.build(root.as_ref(), 0)
    }

    #[test]
    fn missing_root_is_not_an_error() {
        let inspector = FixtureInspector::new(None);
        let root = inspector.root_in_active_window();
        let output = SnapshotBuilder::new().build(root.as_ref(), 0).unwrap();
        assert!(output.root.is_none());
        assert_eq!(output.stats, BuildStats::default());
    }

    #[test]
    fn sibling_indices_restart_per_parent() {
        let tree = node(
            "root",
            vec![
                Some(node("a", vec![Some(node("a0", vec![])), Some(node("a1", vec![]))])),
                Some(node("b", vec![Some(node("b0", vec![]))])),
            ],
        );
        let root = build(tree, SnapshotBuilder::new()).unwrap().root.unwrap();

        let a = root.children[0].as_ref().unwrap();
        let b = root.children[1].as_ref().unwrap();
        assert_eq!(root.index, 0);
        assert_eq!((a.index, b.index), (0, 1));
        assert_eq!(a.children[1].as_ref().unwrap().index, 1);
        assert_eq!(b.children[0].as_ref().unwrap().index, 0);
    }

    #[test]
    fn root_takes_caller_index() {
        let inspector = FixtureInspector::new(Some(node("root", vec![Some(node("c", vec![]))])));
        let root = inspector.root_in_active_window();
        let snapshot = SnapshotBuilder::new().build(root.as_ref(), 7).unwrap().root.unwrap();
        assert_eq!(snapshot.index, 7);
        assert_eq!(snapshot.children[0].as_ref().unwrap().index, 0);
    }

    #[test]
    fn global_mode_numbers_in_preorder() {
        let tree = node(
            "root",
            vec![
                Some(node("a", vec![Some(node("a0", vec![]))])),
                None,
                Some(node("b", vec![])),
            ],
        );
        let builder = SnapshotBuilder::new().with_index_mode(IndexMode::Global);
        let root = build(tree, builder).unwrap().root.unwrap();

        let a = root.children[0].as_ref().unwrap();
        assert_eq!(root.index, 0);
        assert_eq!(a.index, 1);
        assert_eq!(a.children[0].as_ref().unwrap().index, 2);
        assert!(root.children[1].is_none());
        assert_eq!(root.children[2].as_ref().unwrap().index, 3);
    }

    #[test]
    fn null_and_vanished_children_become_null_slots() {
        let mut gone = node("gone", vec![Some(node("never seen", vec![]))]);
        gone.vanished = true;
        let tree = node("root", vec![None, Some(gone), Some(node("kept", vec![]))]);

        let output = build(tree, SnapshotBuilder::new()).unwrap();
        let root = output.root.unwrap();
        assert_eq!(root.children.len(), 3);
        assert!(root.children[0].is_none());
        assert!(root.children[1].is_none());
        let kept = root.children[2].as_ref().unwrap();
        assert_eq!(kept.index, 2);
        assert_eq!(kept.attributes.text, "kept");
        assert_eq!(output.stats.nodes, 2);
        assert_eq!(output.stats.unavailable, 2);
    }

    #[test]
    fn vanished_root_yields_none() {
        let mut tree = node("root", vec![]);
        tree.vanished = true;
        let output = build(tree, SnapshotBuilder::new()).unwrap();
        assert!(output.root.is_none());
        assert_eq!(output.stats.unavailable, 1);
    }

    #[test]
    fn deep_chain_is_fully_walked() {
        let output = build(chain(2_000), SnapshotBuilder::new()).unwrap();
        assert_eq!(output.stats.nodes, 2_001);
        assert_eq!(output.stats.max_depth, 2_000);
        assert_eq!(output.root.unwrap().node_count(), 2_001);
    }

    #[test]
    fn very_deep_tree_builds_renders_and_drops() {
        let depth = 50_000;
        let output = SnapshotBuilder::new()
            .build(Some(&Link { remaining: depth }), 0)
            .unwrap();
        assert_eq!(output.stats.max_depth, depth);

        let root = output.root.unwrap();
        let json = crate::persist::render(Some(&root), false).unwrap();
        assert!(json.starts_with(r#"{"index":0,"text":"50000""#));
        assert_eq!(json.matches("\"children\":[]").count(), 1);
        drop(root);
    }

    #[test]
    fn depth_limit_is_enforced() {
        let limits = CaptureLimits {
            max_depth: Some(3),
            max_nodes: None,
        };
        let builder = SnapshotBuilder::new().with_limits(limits);

        assert!(build(chain(3), builder).is_ok());
        match build(chain(4), builder) {
            Err(CaptureError::TraversalLimitExceeded { kind, limit }) => {
                assert_eq!(kind, LimitKind::Depth);
                assert_eq!(limit, 3);
            }
            other => panic!("expected depth limit error, got {:?}", other),
        }
    }

    #[test]
    fn node_limit_is_enforced() {
        let wide = node("root", (0..10).map(|i| Some(node(&i.to_string(), vec![]))).collect());
        let limits = CaptureLimits {
            max_depth: None,
            max_nodes: Some(11),
        };
        assert!(build(wide.clone(), SnapshotBuilder::new().with_limits(limits)).is_ok());

        let limits = CaptureLimits {
            max_depth: None,
            max_nodes: Some(10),
        };
        let err = build(wide, SnapshotBuilder::new().with_limits(limits)).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::TraversalLimitExceeded {
                kind: LimitKind::Nodes,
                limit: 10
            }
        ));
    }
}
