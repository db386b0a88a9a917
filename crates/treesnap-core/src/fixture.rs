//! File-backed host used to replay saved UI dumps.
//!
//! A [`HostDump`] is a JSON description of a host tree using native types
//! (real booleans, optional strings, `null` child slots). Window hierarchies
//! saved with `uiautomator dump` are read too, see [`crate::uiautomator`].
//! [`FixtureInspector`]
//! loads it into an in-memory arena and serves [`FixtureElement`] handles that
//! behave like live ones: nodes can be disposed at any time with
//! [`FixtureInspector::vanish`] or after a number of reads with
//! [`FixtureInspector::vanish_after`], after which every read on them fails.
//!
//! # Example
//!
//! ```no_run
//! use treesnap_core::fixture::FixtureInspector;
//!
//! let inspector = FixtureInspector::load("home_screen.json").unwrap();
//! inspector.vanish(&[0, 2]);
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::element::{Bounds, ElementUnavailable, LiveElement, StateFlag};
use crate::inspector::{InspectorError, UiInspector};

/// Errors loading a host dump.
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Failed to read host dump: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("Malformed host dump: {0}")]
    Malformed(String),
}

/// One node of a host tree as stored in a dump file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostNode {
    pub text: Option<String>,
    pub resource_id: Option<String>,
    pub class_name: Option<String>,
    pub package: Option<String>,
    pub content_desc: Option<String>,
    pub checkable: bool,
    pub checked: bool,
    pub clickable: bool,
    pub enabled: bool,
    pub focusable: bool,
    pub focused: bool,
    pub scrollable: bool,
    pub long_clickable: bool,
    pub password: bool,
    pub selected: bool,
    pub bounds: Bounds,
    pub children: Vec<Option<HostNode>>,
    /// Starts out disposed; every read fails.
    pub vanished: bool,
}

impl HostNode {
    fn state(&self, flag: StateFlag) -> bool {
        match flag {
            StateFlag::Checkable => self.checkable,
            StateFlag::Checked => self.checked,
            StateFlag::Clickable => self.clickable,
            StateFlag::Enabled => self.enabled,
            StateFlag::Focusable => self.focusable,
            StateFlag::Focused => self.focused,
            StateFlag::Scrollable => self.scrollable,
            StateFlag::LongClickable => self.long_clickable,
            StateFlag::Password => self.password,
            StateFlag::Selected => self.selected,
        }
    }
}

/// A saved host state: the active window's tree and the general root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostDump {
    pub active_window: Option<HostNode>,
    pub root: Option<HostNode>,
}

/// Takes a dump apart level by level so that deep trees drop without
/// recursing.
pub(crate) fn dismantle(dump: HostDump) {
    let mut pending: Vec<HostNode> = dump.active_window.into_iter().chain(dump.root).collect();
    while let Some(mut node) = pending.pop() {
        pending.extend(std::mem::take(&mut node.children).into_iter().flatten());
    }
}

struct Record {
    text: Option<String>,
    resource_id: Option<String>,
    class_name: Option<String>,
    package: Option<String>,
    content_desc: Option<String>,
    states: [bool; 10],
    bounds: Bounds,
    children: Vec<Option<usize>>,
    vanished: AtomicBool,
}

/// Flattened host tree shared by every handle into it.
struct Arena {
    records: Vec<Record>,
    reads: AtomicUsize,
    /// Pending `(read count, record id)` disposal.
    trigger: Mutex<Option<(usize, usize)>>,
}

impl Arena {
    /// Flattens `root` in pre-order; the root is record 0.
    fn build(root: &HostNode) -> Self {
        let mut records: Vec<Record> = Vec::new();
        let mut stack: Vec<(&HostNode, Option<(usize, usize)>)> = vec![(root, None)];

        while let Some((host, parent)) = stack.pop() {
            let id = records.len();
            records.push(Record {
                text: host.text.clone(),
                resource_id: host.resource_id.clone(),
                class_name: host.class_name.clone(),
                package: host.package.clone(),
                content_desc: host.content_desc.clone(),
                states: StateFlag::ALL.map(|flag| host.state(flag)),
                bounds: host.bounds,
                children: vec![None; host.children.len()],
                vanished: AtomicBool::new(host.vanished),
            });
            if let Some((parent_id, position)) = parent {
                records[parent_id].children[position] = Some(id);
            }
            for (position, child) in host.children.iter().enumerate().rev() {
                if let Some(child) = child {
                    stack.push((child, Some((id, position))));
                }
            }
        }

        Self {
            records,
            reads: AtomicUsize::new(0),
            trigger: Mutex::new(None),
        }
    }

    fn resolve(&self, path: &[usize]) -> Option<usize> {
        let mut id = 0;
        for &position in path {
            id = (*self.records.get(id)?.children.get(position)?)?;
        }
        Some(id)
    }

    fn read(&self, id: usize) -> Result<&Record, ElementUnavailable> {
        let reads = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut trigger) = self.trigger.lock() {
            if let Some((at, target)) = *trigger {
                if reads >= at {
                    if let Some(record) = self.records.get(target) {
                        record.vanished.store(true, Ordering::SeqCst);
                    }
                    *trigger = None;
                }
            }
        }

        let record = self
            .records
            .get(id)
            .ok_or_else(|| ElementUnavailable::new(format!("no node {}", id)))?;
        if record.vanished.load(Ordering::SeqCst) {
            return Err(ElementUnavailable::new(format!("node {} was disposed", id)));
        }
        Ok(record)
    }
}

/// Handle to one node of a [`FixtureInspector`]'s tree.
#[derive(Clone)]
pub struct FixtureElement {
    arena: Arc<Arena>,
    id: usize,
}

impl std::fmt::Debug for FixtureElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureElement").field("id", &self.id).finish()
    }
}

impl LiveElement for FixtureElement {
    fn text(&self) -> Result<Option<String>, ElementUnavailable> {
        Ok(self.arena.read(self.id)?.text.clone())
    }

    fn resource_id(&self) -> Result<Option<String>, ElementUnavailable> {
        Ok(self.arena.read(self.id)?.resource_id.clone())
    }

    fn class_name(&self) -> Result<Option<String>, ElementUnavailable> {
        Ok(self.arena.read(self.id)?.class_name.clone())
    }

    fn package_name(&self) -> Result<Option<String>, ElementUnavailable> {
        Ok(self.arena.read(self.id)?.package.clone())
    }

    fn content_description(&self) -> Result<Option<String>, ElementUnavailable> {
        Ok(self.arena.read(self.id)?.content_desc.clone())
    }

    fn state(&self, flag: StateFlag) -> Result<bool, ElementUnavailable> {
        let record = self.arena.read(self.id)?;
        let slot = StateFlag::ALL
            .iter()
            .position(|f| *f == flag)
            .unwrap_or_default();
        Ok(record.states[slot])
    }

    fn bounds(&self) -> Result<Bounds, ElementUnavailable> {
        Ok(self.arena.read(self.id)?.bounds)
    }

    fn children(&self) -> Result<Vec<Option<Self>>, ElementUnavailable> {
        let record = self.arena.read(self.id)?;
        Ok(record
            .children
            .iter()
            .map(|child| {
                child.map(|id| FixtureElement {
                    arena: Arc::clone(&self.arena),
                    id,
                })
            })
            .collect())
    }
}

/// Inspector serving a [`HostDump`] from memory.
pub struct FixtureInspector {
    active_window: Option<Arc<Arena>>,
    root: Option<Arc<Arena>>,
    connected: AtomicBool,
    idle_delay: Duration,
}

impl FixtureInspector {
    /// Creates an inspector whose active window holds `tree`.
    pub fn new(tree: Option<HostNode>) -> Self {
        Self::from_dump(HostDump {
            active_window: tree,
            root: None,
        })
    }

    pub fn from_dump(dump: HostDump) -> Self {
        let inspector = Self {
            active_window: dump.active_window.as_ref().map(|n| Arc::new(Arena::build(n))),
            root: dump.root.as_ref().map(|n| Arc::new(Arena::build(n))),
            connected: AtomicBool::new(true),
            idle_delay: Duration::ZERO,
        };
        dismantle(dump);
        inspector
    }

    /// Parses a dump from JSON. A bare `null` is an empty host.
    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        let dump: Option<HostDump> = crate::persist::parse_json(json)?;
        Ok(Self::from_dump(dump.unwrap_or_default()))
    }

    /// Parses the output of `uiautomator dump`.
    pub fn from_uiautomator_xml(xml: &str) -> Result<Self, FixtureError> {
        Ok(Self::from_dump(crate::uiautomator::parse_dump(xml)?))
    }

    /// Loads a dump file. Content starting with `<` is read as uiautomator
    /// XML, anything else as a JSON [`HostDump`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let inspector = if contents.trim_start().starts_with('<') {
            Self::from_uiautomator_xml(&contents)?
        } else {
            Self::from_json(&contents)?
        };
        debug!(path = %path.as_ref().display(), "loaded host dump");
        Ok(inspector)
    }

    /// Makes [`UiInspector::wait_for_idle`] take `delay` before returning.
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    /// Simulates the host runtime going away.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Disposes the node at `path` (child positions from the served root).
    ///
    /// Returns `false` if no node exists at that path.
    pub fn vanish(&self, path: &[usize]) -> bool {
        let Some(arena) = self.served() else {
            return false;
        };
        match arena.resolve(path).and_then(|id| arena.records.get(id)) {
            Some(record) => {
                record.vanished.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Disposes the node at `path` once `reads` element reads have been made
    /// against the served tree, counting from when the inspector was created.
    pub fn vanish_after(&self, reads: usize, path: &[usize]) -> bool {
        let Some(arena) = self.served() else {
            return false;
        };
        let Some(id) = arena.resolve(path) else {
            return false;
        };
        match arena.trigger.lock() {
            Ok(mut trigger) => {
                *trigger = Some((reads, id));
                true
            }
            Err(_) => false,
        }
    }

    /// Total element reads made against the served tree.
    pub fn read_count(&self) -> usize {
        self.served()
            .map(|arena| arena.reads.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    fn served(&self) -> Option<&Arc<Arena>> {
        self.active_window.as_ref().or(self.root.as_ref())
    }
}

#[async_trait]
impl UiInspector for FixtureInspector {
    type Element = FixtureElement;

    async fn wait_for_idle(&self) -> Result<(), InspectorError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(InspectorError::NotConnected);
        }
        if !self.idle_delay.is_zero() {
            tokio::time::sleep(self.idle_delay).await;
        }
        Ok(())
    }

    fn root_in_active_window(&self) -> Option<FixtureElement> {
        if !self.connected.load(Ordering::SeqCst) {
            return None;
        }
        self.served().map(|arena| FixtureElement {
            arena: Arc::clone(arena),
            id: 0,
        })
    }
}
