//! Shared test helpers for treesnap-core integration tests.
//!
//! This module provides host trees and capturer setup reused by tests that
//! exercise the full capture pipeline.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use treesnap_core::capturer::Capturer;
use treesnap_core::config::CaptureConfig;
use treesnap_core::element::Bounds;
use treesnap_core::fixture::{FixtureInspector, HostNode};

// ---------------------------------------------------------------------------
// Host trees
// ---------------------------------------------------------------------------

/// A host node with the given text and children, everything else default.
pub fn host(text: &str, children: Vec<Option<HostNode>>) -> HostNode {
    HostNode {
        text: Some(text.to_string()),
        children,
        ..Default::default()
    }
}

/// Root("Root") -> [A("First"), B("Second") -> [Leaf("Leaf")]]
pub fn three_level_tree() -> HostNode {
    let mut root = host(
        "Root",
        vec![
            Some(host("First", vec![])),
            Some(host("Second", vec![Some(host("Leaf", vec![]))])),
        ],
    );
    root.class_name = Some("android.widget.FrameLayout".to_string());
    root.package = Some("com.example.app".to_string());
    root.enabled = true;
    root.bounds = Bounds::new(0, 66, 1080, 2340);
    root
}

/// A realistic login screen with a mix of states and attributes.
pub fn login_screen() -> HostNode {
    let field = |id: &str, hint: &str, password: bool, top: i32| HostNode {
        resource_id: Some(format!("com.example.app:id/{}", id)),
        class_name: Some("android.widget.EditText".to_string()),
        package: Some("com.example.app".to_string()),
        content_desc: Some(hint.to_string()),
        clickable: true,
        enabled: true,
        focusable: true,
        focused: !password,
        long_clickable: true,
        password,
        bounds: Bounds::new(48, top, 1032, top + 140),
        ..Default::default()
    };

    let remember = HostNode {
        text: Some("Remember me".to_string()),
        class_name: Some("android.widget.CheckBox".to_string()),
        package: Some("com.example.app".to_string()),
        checkable: true,
        checked: true,
        clickable: true,
        enabled: true,
        focusable: true,
        bounds: Bounds::new(48, 980, 540, 1060),
        ..Default::default()
    };

    let submit = HostNode {
        text: Some("Sign in".to_string()),
        resource_id: Some("com.example.app:id/submit".to_string()),
        class_name: Some("android.widget.Button".to_string()),
        package: Some("com.example.app".to_string()),
        clickable: true,
        enabled: true,
        focusable: true,
        bounds: Bounds::new(48, 1100, 1032, 1244),
        ..Default::default()
    };

    let form = HostNode {
        class_name: Some("android.widget.ScrollView".to_string()),
        package: Some("com.example.app".to_string()),
        scrollable: true,
        enabled: true,
        bounds: Bounds::new(0, 400, 1080, 2340),
        children: vec![
            Some(field("username", "Username", false, 600)),
            Some(field("password", "Password", true, 780)),
            Some(remember),
            Some(submit),
        ],
        ..Default::default()
    };

    HostNode {
        class_name: Some("android.widget.FrameLayout".to_string()),
        package: Some("com.example.app".to_string()),
        enabled: true,
        bounds: Bounds::new(0, 0, 1080, 2340),
        children: vec![
            Some(HostNode {
                text: Some("Welcome back".to_string()),
                class_name: Some("android.widget.TextView".to_string()),
                package: Some("com.example.app".to_string()),
                enabled: true,
                bounds: Bounds::new(48, 200, 1032, 320),
                ..Default::default()
            }),
            Some(form),
        ],
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Capturer setup
// ---------------------------------------------------------------------------

/// A capturer writing into a fresh temp dir, with no settle delay.
pub struct Harness {
    pub dir: TempDir,
    pub inspector: Arc<FixtureInspector>,
    pub capturer: Capturer<FixtureInspector>,
}

impl Harness {
    pub fn new(tree: Option<HostNode>) -> Self {
        Self::with_config(tree, |_| {})
    }

    pub fn with_config(tree: Option<HostNode>, configure: impl FnOnce(&mut CaptureConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CaptureConfig {
            output_path: dir.path().join("ui_tree.json"),
            settle_delay_ms: 0,
            ..Default::default()
        };
        configure(&mut config);

        let inspector = Arc::new(FixtureInspector::new(tree));
        let capturer = Capturer::new(Arc::clone(&inspector), config);
        Self {
            dir,
            inspector,
            capturer,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.capturer.config().output_path.clone()
    }

    pub fn read_output(&self) -> String {
        std::fs::read_to_string(self.output_path()).unwrap()
    }

    pub fn read_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.read_output()).unwrap()
    }
}

/// Visits every non-null node object in a serialized snapshot.
pub fn for_each_node(value: &serde_json::Value, mut visit: impl FnMut(&serde_json::Value)) {
    let mut stack = vec![value];
    while let Some(node) = stack.pop() {
        if node.is_null() {
            continue;
        }
        visit(node);
        if let Some(children) = node["children"].as_array() {
            stack.extend(children.iter());
        }
    }
}
