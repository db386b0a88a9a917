//! Immutable snapshot of a captured UI element tree.
//!
//! An [`ElementSnapshot`] mirrors the shape of the live hierarchy at capture
//! time. Child slots are `Option`s: a `None` marks a child that was null or
//! became unavailable while the tree was being walked, and serializes as
//! `null` so the sibling positions of the remaining children are preserved.

use serde::{Deserialize, Serialize};

use crate::element::ElementAttributes;

/// One captured element and its captured children.
///
/// Serializes as a flat JSON object in the order `index`, the element
/// attributes, then `children`. Dropping releases descendants from a heap
/// stack, so arbitrarily deep trees drop without recursing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Position assigned during traversal (sibling-local by default).
    pub index: usize,

    #[serde(flatten)]
    pub attributes: ElementAttributes,

    /// Captured children in host order. Empty for leaves, never absent.
    pub children: Vec<Option<ElementSnapshot>>,
}

impl ElementSnapshot {
    /// Creates a leaf snapshot.
    pub fn new(index: usize, attributes: ElementAttributes) -> Self {
        Self {
            index,
            attributes,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of captured nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter().flatten());
        }
        count
    }

    /// Number of `null` child slots in this subtree.
    pub fn null_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            for child in &node.children {
                match child {
                    Some(child) => stack.push(child),
                    None => count += 1,
                }
            }
        }
        count
    }

    /// Short one-line label for tree listings.
    ///
    /// Shows the index, the unqualified class name, and the first non-empty
    /// of text, content description, or resource id.
    pub fn display_text(&self) -> String {
        let attrs = &self.attributes;
        let mut parts = Vec::new();

        if !attrs.class_name.is_empty() {
            let short = attrs
                .class_name
                .rsplit('.')
                .next()
                .unwrap_or(&attrs.class_name);
            parts.push(short.to_string());
        }
        if !attrs.text.is_empty() {
            parts.push(format!("text=\"{}\"", attrs.text));
        } else if !attrs.content_description.is_empty() {
            parts.push(format!("desc=\"{}\"", attrs.content_description));
        } else if !attrs.resource_id.is_empty() {
            parts.push(format!("id=\"{}\"", attrs.resource_id));
        }

        format!("({}) {}", self.index, parts.join(" "))
    }
}

impl Drop for ElementSnapshot {
    fn drop(&mut self) {
        let mut pending: Vec<ElementSnapshot> = self.children.drain(..).flatten().collect();
        while let Some(mut node) = pending.pop() {
            pending.extend(node.children.drain(..).flatten());
        }
    }
}
