//! Reader for `uiautomator dump` XML window hierarchies.
//!
//! The document element (normally `<hierarchy>`) becomes the root host node
//! and every nested element becomes a child in document order, so dumps
//! holding several windows keep all of them. Attribute names follow the
//! uiautomator schema (`resource-id`, `class`, `content-desc`,
//! `long-clickable`, ...). A missing boolean reads as `false` and missing or
//! malformed bounds read as `[0,0][0,0]`.
//!
//! ```text
//! <hierarchy rotation="0">
//!   <node index="0" text="" resource-id="" class="android.widget.FrameLayout"
//!         package="com.example.app" content-desc="" checkable="false" ...
//!         bounds="[0,0][1080,2340]">
//!     ...
//!   </node>
//! </hierarchy>
//! ```

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::element::Bounds;
use crate::fixture::{FixtureError, HostDump, HostNode};

/// Parses a uiautomator dump into a [`HostDump`] whose active window is the
/// document element. A document without elements yields an empty dump.
pub fn parse_dump(xml: &str) -> Result<HostDump, FixtureError> {
    let mut reader = Reader::from_str(xml);
    let mut open: Vec<HostNode> = Vec::new();
    let mut root: Option<HostNode> = None;

    loop {
        match reader.read_event()? {
            Event::Start(element) => open.push(host_node(&element)?),
            Event::Empty(element) => {
                let node = host_node(&element)?;
                attach(&mut open, &mut root, node)?;
            }
            Event::End(_) => {
                let node = open
                    .pop()
                    .ok_or_else(|| FixtureError::Malformed("unexpected closing tag".into()))?;
                attach(&mut open, &mut root, node)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !open.is_empty() {
        return Err(FixtureError::Malformed(format!(
            "{} element(s) not closed",
            open.len()
        )));
    }

    Ok(HostDump {
        active_window: root,
        root: None,
    })
}

fn attach(
    open: &mut [HostNode],
    root: &mut Option<HostNode>,
    node: HostNode,
) -> Result<(), FixtureError> {
    match open.last_mut() {
        Some(parent) => parent.children.push(Some(node)),
        None if root.is_none() => *root = Some(node),
        None => {
            return Err(FixtureError::Malformed(
                "more than one document element".into(),
            ))
        }
    }
    Ok(())
}

fn host_node(element: &BytesStart<'_>) -> Result<HostNode, FixtureError> {
    let mut node = HostNode::default();

    for attribute in element.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        let value = attribute.unescape_value()?.into_owned();
        let flag = value == "true";

        match attribute.key.as_ref() {
            b"text" => node.text = Some(value),
            b"resource-id" => node.resource_id = Some(value),
            b"class" => node.class_name = Some(value),
            b"package" => node.package = Some(value),
            b"content-desc" => node.content_desc = Some(value),
            b"checkable" => node.checkable = flag,
            b"checked" => node.checked = flag,
            b"clickable" => node.clickable = flag,
            b"enabled" => node.enabled = flag,
            b"focusable" => node.focusable = flag,
            b"focused" => node.focused = flag,
            b"scrollable" => node.scrollable = flag,
            b"long-clickable" => node.long_clickable = flag,
            b"password" => node.password = flag,
            b"selected" => node.selected = flag,
            b"bounds" => {
                node.bounds = value.parse().unwrap_or_else(|e| {
                    debug!(error = %e, "unreadable bounds, using [0,0][0,0]");
                    Bounds::default()
                })
            }
            _ => {}
        }
    }

    Ok(node)
}
