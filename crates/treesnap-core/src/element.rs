//! Live UI element boundary and attribute extraction.
//!
//! This module defines the [`LiveElement`] trait, the handle through which a
//! host automation runtime exposes its live accessibility hierarchy, along
//! with the attribute types read off a single element. Every read on a live
//! element may fail with [`ElementUnavailable`] because the host can dispose
//! of the underlying node at any time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The host no longer has a node behind this handle.
///
/// Raised when an element is disposed concurrently with a read. Traversal
/// treats this the same as a null child rather than aborting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Element unavailable: {0}")]
pub struct ElementUnavailable(pub String);

impl ElementUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// A handle into the host's live, mutable UI hierarchy.
///
/// Implementations are expected to read through to the host on every call;
/// two calls on the same handle may observe different values if the UI
/// changed in between.
pub trait LiveElement: Sized {
    /// The visible text of the element.
    fn text(&self) -> Result<Option<String>, ElementUnavailable>;

    /// The resource identifier (e.g. `com.example:id/login`).
    fn resource_id(&self) -> Result<Option<String>, ElementUnavailable>;

    /// The widget class name (e.g. `android.widget.Button`).
    fn class_name(&self) -> Result<Option<String>, ElementUnavailable>;

    /// The package owning the element's window.
    fn package_name(&self) -> Result<Option<String>, ElementUnavailable>;

    /// The accessibility content description.
    fn content_description(&self) -> Result<Option<String>, ElementUnavailable>;

    /// Reads one of the boolean interaction/state flags.
    fn state(&self, flag: StateFlag) -> Result<bool, ElementUnavailable>;

    /// The element's on-screen rectangle.
    fn bounds(&self) -> Result<Bounds, ElementUnavailable>;

    /// The element's children in host order.
    ///
    /// A `None` entry is a child slot the host reported as null.
    fn children(&self) -> Result<Vec<Option<Self>>, ElementUnavailable>;
}

/// The boolean interaction/state properties captured for every element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateFlag {
    Checkable,
    Checked,
    Clickable,
    Enabled,
    Focusable,
    Focused,
    Scrollable,
    LongClickable,
    Password,
    Selected,
}

impl StateFlag {
    /// All flags, in the order they appear in serialized snapshots.
    pub const ALL: [StateFlag; 10] = [
        StateFlag::Checkable,
        StateFlag::Checked,
        StateFlag::Clickable,
        StateFlag::Enabled,
        StateFlag::Focusable,
        StateFlag::Focused,
        StateFlag::Scrollable,
        StateFlag::LongClickable,
        StateFlag::Password,
        StateFlag::Selected,
    ];

    /// The field name used for this flag in serialized snapshots.
    pub fn wire_name(self) -> &'static str {
        match self {
            StateFlag::Checkable => "checkable",
            StateFlag::Checked => "checked",
            StateFlag::Clickable => "clickable",
            StateFlag::Enabled => "enabled",
            StateFlag::Focusable => "focusable",
            StateFlag::Focused => "focused",
            StateFlag::Scrollable => "scrollable",
            StateFlag::LongClickable => "long_clickable",
            StateFlag::Password => "password",
            StateFlag::Selected => "selected",
        }
    }
}

/// Serde adapter that encodes a `bool` as the string `"true"` or `"false"`.
///
/// Downstream consumers of snapshot files expect string booleans, so the
/// conversion happens only here.
pub mod string_bool {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(D::Error::custom(format!(
                "expected \"true\" or \"false\", got {:?}",
                other
            ))),
        }
    }
}

/// Typed values of the ten state flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFlags {
    #[serde(with = "string_bool")]
    pub checkable: bool,
    #[serde(with = "string_bool")]
    pub checked: bool,
    #[serde(with = "string_bool")]
    pub clickable: bool,
    #[serde(with = "string_bool")]
    pub enabled: bool,
    #[serde(with = "string_bool")]
    pub focusable: bool,
    #[serde(with = "string_bool")]
    pub focused: bool,
    #[serde(with = "string_bool")]
    pub scrollable: bool,
    #[serde(with = "string_bool")]
    pub long_clickable: bool,
    #[serde(with = "string_bool")]
    pub password: bool,
    #[serde(with = "string_bool")]
    pub selected: bool,
}

impl StateFlags {
    pub fn get(&self, flag: StateFlag) -> bool {
        *self.slot(flag)
    }

    pub fn set(&mut self, flag: StateFlag, value: bool) {
        *self.slot_mut(flag) = value;
    }

    fn slot(&self, flag: StateFlag) -> &bool {
        match flag {
            StateFlag::Checkable => &self.checkable,
            StateFlag::Checked => &self.checked,
            StateFlag::Clickable => &self.clickable,
            StateFlag::Enabled => &self.enabled,
            StateFlag::Focusable => &self.focusable,
            StateFlag::Focused => &self.focused,
            StateFlag::Scrollable => &self.scrollable,
            StateFlag::LongClickable => &self.long_clickable,
            StateFlag::Password => &self.password,
            StateFlag::Selected => &self.selected,
        }
    }

    fn slot_mut(&mut self, flag: StateFlag) -> &mut bool {
        match flag {
            StateFlag::Checkable => &mut self.checkable,
            StateFlag::Checked => &mut self.checked,
            StateFlag::Clickable => &mut self.clickable,
            StateFlag::Enabled => &mut self.enabled,
            StateFlag::Focusable => &mut self.focusable,
            StateFlag::Focused => &mut self.focused,
            StateFlag::Scrollable => &mut self.scrollable,
            StateFlag::LongClickable => &mut self.long_clickable,
            StateFlag::Password => &mut self.password,
            StateFlag::Selected => &mut self.selected,
        }
    }
}

/// An element's rectangle in screen pixels, as reported by the host.
///
/// Serialized in the compact `[left,top][right,bottom]` notation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Horizontal extent, saturating at the `i32` range.
    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    /// Vertical extent, saturating at the `i32` range.
    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{}][{},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Error returned when a string is not in `[l,t][r,b]` notation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid bounds {0:?}, expected [left,top][right,bottom]")]
pub struct ParseBoundsError(String);

impl FromStr for Bounds {
    type Err = ParseBoundsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseBoundsError(s.to_string());

        let inner = s
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(err)?;
        let (first, second) = inner.split_once("][").ok_or_else(err)?;

        let point = |pair: &str| -> Result<(i32, i32), ParseBoundsError> {
            let (x, y) = pair.split_once(',').ok_or_else(err)?;
            let x = x.parse().map_err(|_| err())?;
            let y = y.parse().map_err(|_| err())?;
            Ok((x, y))
        };

        let (left, top) = point(first)?;
        let (right, bottom) = point(second)?;
        Ok(Bounds::new(left, top, right, bottom))
    }
}

impl Serialize for Bounds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The scalar, boolean and geometry attributes of one element.
///
/// Field order matches the serialized snapshot format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementAttributes {
    pub text: String,
    pub resource_id: String,
    pub class_name: String,
    #[serde(rename = "package")]
    pub package_name: String,
    #[serde(rename = "content_desc")]
    pub content_description: String,
    #[serde(flatten)]
    pub flags: StateFlags,
    pub bounds: Bounds,
}

/// Reads every captured attribute off a live element.
///
/// Absent strings become `""`. The first failing accessor aborts extraction
/// with [`ElementUnavailable`]; no partially-read attributes are returned.
pub fn extract_attributes<E: LiveElement>(
    element: &E,
) -> Result<ElementAttributes, ElementUnavailable> {
    let mut flags = StateFlags::default();
    for flag in StateFlag::ALL {
        flags.set(flag, element.state(flag)?);
    }

    Ok(ElementAttributes {
        text: element.text()?.unwrap_or_default(),
        resource_id: element.resource_id()?.unwrap_or_default(),
        class_name: element.class_name()?.unwrap_or_default(),
        package_name: element.package_name()?.unwrap_or_default(),
        content_description: element.content_description()?.unwrap_or_default(),
        flags,
        bounds: element.bounds()?,
    })
}
