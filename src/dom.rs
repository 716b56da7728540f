//! Page abstraction
//!
//! The pipeline never touches a browser API directly. Everything it needs from
//! the hosting document (selector queries, the HTML5 media contract, fullscreen,
//! focus, and a structural change feed) goes through [`Page`]. Nodes are
//! referenced by opaque [`NodeId`]s which the page owns; the pipeline only
//! observes them and revalidates with [`Page::is_connected`] before each use.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};

use crate::error::DomError;

/// Opaque identity of a node in the page. Equality is element identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural change reported by the page's change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Nodes were added or removed somewhere in the subtree.
    ChildList,
    /// An attribute changed on some node.
    Attribute(String),
}

/// Events delivered through [`Page::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Mutation(MutationKind),
    VisibilityChanged { visible: bool },
    WindowFocused,
}

/// Display mode of a text track, as in the HTML5 `TextTrack.mode` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackMode {
    Disabled,
    Hidden,
    Showing,
}

/// Pending result of `HTMLMediaElement.play()`.
pub type PlayRequest = oneshot::Receiver<Result<(), DomError>>;

/// Access to the hosting document and its media elements.
pub trait Page: Send + Sync {
    /// Hostname of the current location (e.g. `www.youtube.com`).
    fn hostname(&self) -> String;

    /// Full current location; polled to detect in-page navigation.
    fn location(&self) -> String;

    fn is_visible(&self) -> bool;

    /// All nodes matching a comma-separated selector list, in document order.
    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError>;

    /// Nearest inclusive ancestor of `node` matching `selector`.
    fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, DomError>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn is_connected(&self, node: NodeId) -> bool;

    /// Whether the node is rendered (not `display: none` or hidden).
    fn is_displayed(&self, node: NodeId) -> bool;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn inline_style(&self, node: NodeId, property: &str) -> Option<String>;

    fn click(&self, node: NodeId) -> Result<(), DomError>;

    /// Click at a horizontal fraction (0..=1) of the node's box.
    fn click_at(&self, node: NodeId, fraction: f64) -> Result<(), DomError>;

    fn blur_active_element(&self);

    fn current_time(&self, media: NodeId) -> Result<f64, DomError>;
    fn set_current_time(&self, media: NodeId, seconds: f64) -> Result<(), DomError>;
    fn duration(&self, media: NodeId) -> Result<f64, DomError>;
    fn volume(&self, media: NodeId) -> Result<f64, DomError>;
    fn set_volume(&self, media: NodeId, volume: f64) -> Result<(), DomError>;
    fn muted(&self, media: NodeId) -> Result<bool, DomError>;
    fn set_muted(&self, media: NodeId, muted: bool) -> Result<(), DomError>;
    fn paused(&self, media: NodeId) -> Result<bool, DomError>;
    fn play(&self, media: NodeId) -> Result<PlayRequest, DomError>;
    fn pause(&self, media: NodeId) -> Result<(), DomError>;
    fn text_tracks(&self, media: NodeId) -> Result<Vec<TrackMode>, DomError>;
    fn set_text_track_mode(
        &self,
        media: NodeId,
        index: usize,
        mode: TrackMode,
    ) -> Result<(), DomError>;

    fn fullscreen_element(&self) -> Option<NodeId>;
    fn request_fullscreen(&self, node: NodeId) -> Result<(), DomError>;
    fn exit_fullscreen(&self) -> Result<(), DomError>;

    /// Structural change feed.
    fn subscribe(&self) -> broadcast::Receiver<PageEvent>;
}

/// First connected node matching any selector, trying the list in order.
pub fn first_match(page: &dyn Page, selectors: &[&str]) -> Option<NodeId> {
    selectors.iter().find_map(|selector| match page.query_selector_all(selector) {
        Ok(nodes) => nodes.into_iter().find(|node| page.is_connected(*node)),
        Err(e) => {
            tracing::debug!("[Page] Selector '{}' failed: {}", selector, e);
            None
        }
    })
}

/// First connected and displayed node matching any selector.
pub fn first_visible_match(page: &dyn Page, selectors: &[&str]) -> Option<NodeId> {
    selectors.iter().find_map(|selector| match page.query_selector_all(selector) {
        Ok(nodes) => nodes
            .into_iter()
            .find(|node| page.is_connected(*node) && page.is_displayed(*node)),
        Err(e) => {
            tracing::debug!("[Page] Selector '{}' failed: {}", selector, e);
            None
        }
    })
}

/// Reads an inline percentage style such as `width: 42.5%` as a 0..=1 fraction.
pub fn style_fraction(page: &dyn Page, node: NodeId, property: &str) -> Option<f64> {
    let raw = page.inline_style(node, property)?;
    let value: f64 = raw.trim().strip_suffix('%')?.trim().parse().ok()?;
    value.is_finite().then(|| (value / 100.0).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_displays_with_hash() {
        assert_eq!(NodeId(42).to_string(), "#42");
    }

    #[test]
    fn track_mode_serializes_lowercase() {
        let json = serde_json::to_string(&TrackMode::Showing).unwrap();
        assert_eq!(json, "\"showing\"");
    }
}
