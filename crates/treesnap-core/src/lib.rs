//! # treesnap-core
//!
//! Core library for capturing live accessibility trees into immutable,
//! JSON-serializable snapshots.
//!
//! A host automation runtime exposes its UI as a mutable tree of elements.
//! This crate walks that tree once, copies a fixed set of attributes off
//! every element, and writes the result to a single file.
//!
//! ## Modules
//!
//! - [`element`] - The [`LiveElement`](element::LiveElement) handle trait and attribute extraction
//! - [`snapshot`] - The immutable [`ElementSnapshot`](snapshot::ElementSnapshot) tree
//! - [`capture`] - Stack-based tree walk with index modes and traversal limits
//! - [`persist`] - JSON rendering and atomic file replacement
//! - [`inspector`] - The [`UiInspector`](inspector::UiInspector) host boundary
//! - [`fixture`] - A host backed by saved JSON dumps
//! - [`uiautomator`] - Reader for `uiautomator dump` XML hierarchies
//! - [`capturer`] - The end-to-end capture-and-persist operation
//! - [`config`] - Persistent capture settings
//!
//! ## Output Format
//!
//! ```text
//! {"index":0,"text":"Root","resource_id":"","class_name":"android.widget.FrameLayout",
//!  "package":"com.example","content_desc":"","checkable":"false", ...,
//!  "bounds":"[0,0][1080,2340]","children":[ ... ]}
//! ```
//!
//! Boolean states are the strings `"true"`/`"false"`, and a capture with no
//! root available writes `null`.
//!
//! ## Example
//!
//! ```no_run
//! use treesnap_core::capture::SnapshotBuilder;
//! use treesnap_core::fixture::FixtureInspector;
//! use treesnap_core::inspector::UiInspector;
//! use treesnap_core::persist::SnapshotWriter;
//!
//! let inspector = FixtureInspector::load("dump.json").expect("unreadable dump");
//! let root = inspector.root_in_active_window();
//!
//! let output = SnapshotBuilder::new().build(root.as_ref(), 0).expect("limit exceeded");
//! SnapshotWriter::new("/tmp/ui_tree.json")
//!     .write(output.root.as_ref())
//!     .expect("write failed");
//! ```

pub mod capture;
pub mod capturer;
pub mod config;
pub mod element;
pub mod fixture;
pub mod inspector;
pub mod persist;
pub mod snapshot;
pub mod uiautomator;
