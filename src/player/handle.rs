use crate::dom::{NodeId, Page};
use crate::sites::SiteId;

/// Weak references to site-native buttons captured at detection time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlRefs {
    pub skip_intro: Option<NodeId>,
    pub next_episode: Option<NodeId>,
}

/// A located, controllable video surface.
///
/// The video element belongs to the page; the handle only names it. The
/// container and control references may go stale under single-page-app
/// navigation and are revalidated on every use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerHandle {
    video: NodeId,
    container: Option<NodeId>,
    site: SiteId,
    controls: ControlRefs,
}

impl PlayerHandle {
    pub fn new(
        video: NodeId,
        container: Option<NodeId>,
        site: SiteId,
        controls: ControlRefs,
    ) -> Self {
        Self {
            video,
            container,
            site,
            controls,
        }
    }

    pub fn video(&self) -> NodeId {
        self.video
    }

    pub fn site(&self) -> SiteId {
        self.site
    }

    pub fn controls(&self) -> ControlRefs {
        self.controls
    }

    /// Whether the video element is still attached.
    pub fn is_live(&self, page: &dyn Page) -> bool {
        page.is_connected(self.video)
    }

    /// Fullscreen target: the container if still attached, else the video's
    /// parent, else the video itself.
    pub fn container(&self, page: &dyn Page) -> NodeId {
        self.container
            .filter(|container| page.is_connected(*container))
            .or_else(|| page.parent(self.video).filter(|parent| page.is_connected(*parent)))
            .unwrap_or(self.video)
    }

    /// Identity comparison on the underlying element.
    pub fn same_element(&self, other: &PlayerHandle) -> bool {
        self.video == other.video
    }
}
