//! On-screen Notifications
//!
//! Fire-and-forget toasts summarising what a key press did (new position,
//! volume level, caption state). The pipeline only talks to the
//! [`NotificationSink`] trait; rendering belongs to the host.

use std::time::Duration;

use serde::Serialize;
use tracing::info;

/// What kind of change a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationCategory {
    /// Position changes
    Seek,

    /// Volume and mute changes
    Volume,

    /// Play / pause
    Playback,

    /// Caption visibility
    Captions,

    /// Fullscreen enter / exit
    Fullscreen,

    /// Skip intro, next episode
    Navigation,
}

impl NotificationCategory {
    /// Glyph shown next to the title
    pub fn icon(&self) -> &'static str {
        match self {
            NotificationCategory::Seek => "⏩",
            NotificationCategory::Volume => "🔊",
            NotificationCategory::Playback => "⏯",
            NotificationCategory::Captions => "💬",
            NotificationCategory::Fullscreen => "⛶",
            NotificationCategory::Navigation => "⏭",
        }
    }

    /// Display time when the settings do not override it
    pub fn default_duration(&self) -> Duration {
        match self {
            NotificationCategory::Seek => Duration::from_millis(1500),
            NotificationCategory::Volume => Duration::from_millis(1000),
            NotificationCategory::Playback => Duration::from_millis(1000),
            NotificationCategory::Captions => Duration::from_millis(2000),
            NotificationCategory::Fullscreen => Duration::from_millis(1000),
            NotificationCategory::Navigation => Duration::from_millis(2000),
        }
    }
}

/// Displays an ephemeral message. Must never block or fail the caller.
///
/// `show` runs inside key handling: it may read
/// [`Orchestrator::status`](crate::orchestrator::Orchestrator::status) but
/// must not feed keys or toggle the pipeline from within the call.
pub trait NotificationSink: Send + Sync {
    fn show(&self, title: &str, message: &str, category: NotificationCategory, duration: Duration);
}

/// Sink that writes notifications to the log, for headless hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn show(&self, title: &str, message: &str, category: NotificationCategory, duration: Duration) {
        info!(
            "[Notifications] {} {} - {} ({:?}, {}ms)",
            category.icon(),
            title,
            message,
            category,
            duration.as_millis()
        );
    }
}
