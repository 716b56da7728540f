//! Media actions
//!
//! The atomic operations a key press can trigger, applied to the current
//! player through the [`Page`](crate::dom::Page) media contract, with
//! site-specific fallbacks when the contract does not hold.

pub mod executor;
pub mod fallback;
pub mod format;

use std::fmt;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use executor::{ExecutorConfig, MediaExecutor};

/// Symbolic action a key maps to, with its fixed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum MediaAction {
    SeekRelative { seconds: f64 },
    SeekToPercentage { percent: f64 },
    VolumeDelta { step: f64 },
    ToggleMute,
    TogglePlayPause,
    /// Native handler toggles; we only report the resulting state.
    ObservePlayPause,
    ToggleCaptions,
    ToggleFullscreen,
    SkipIntro,
    NextEpisode,
}

impl MediaAction {
    /// The native control the action depends on, if any.
    pub fn native_control(&self) -> Option<NativeControl> {
        match self {
            MediaAction::SkipIntro => Some(NativeControl::SkipIntro),
            MediaAction::NextEpisode => Some(NativeControl::NextEpisode),
            _ => None,
        }
    }

    /// Whether holding the key down should keep applying the action.
    pub fn repeatable(&self) -> bool {
        matches!(self, MediaAction::SeekRelative { .. } | MediaAction::VolumeDelta { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            MediaAction::SeekRelative { .. } => "seekRelative",
            MediaAction::SeekToPercentage { .. } => "seekToPercentage",
            MediaAction::VolumeDelta { .. } => "volumeDelta",
            MediaAction::ToggleMute => "toggleMute",
            MediaAction::TogglePlayPause => "togglePlayPause",
            MediaAction::ObservePlayPause => "observePlayPause",
            MediaAction::ToggleCaptions => "toggleCaptions",
            MediaAction::ToggleFullscreen => "toggleFullscreen",
            MediaAction::SkipIntro => "skipIntro",
            MediaAction::NextEpisode => "nextEpisode",
        }
    }
}

/// Site-native buttons that some keys simply press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NativeControl {
    SkipIntro,
    NextEpisode,
}

/// Result of an action: applied, not applicable, or still in flight.
pub enum Outcome {
    Applied,
    NotApplied,
    /// Resolves to whether the action was eventually applied.
    Deferred(BoxFuture<'static, bool>),
}

impl Outcome {
    pub fn from_bool(applied: bool) -> Self {
        if applied {
            Outcome::Applied
        } else {
            Outcome::NotApplied
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Outcome::Deferred(_))
    }

    /// Waits for a deferred outcome; immediate outcomes resolve at once.
    pub async fn resolve(self) -> bool {
        match self {
            Outcome::Applied => true,
            Outcome::NotApplied => false,
            Outcome::Deferred(pending) => pending.await,
        }
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied => f.write_str("Applied"),
            Outcome::NotApplied => f.write_str("NotApplied"),
            Outcome::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[tokio::test]
    async fn outcomes_resolve() {
        assert!(Outcome::Applied.resolve().await);
        assert!(!Outcome::NotApplied.resolve().await);
        let deferred = Outcome::Deferred(async { true }.boxed());
        assert!(deferred.is_deferred());
        assert!(deferred.resolve().await);
    }

    #[test]
    fn only_stepping_actions_repeat() {
        assert!(MediaAction::SeekRelative { seconds: 5.0 }.repeatable());
        assert!(MediaAction::VolumeDelta { step: -0.1 }.repeatable());
        assert!(!MediaAction::ToggleMute.repeatable());
        assert!(!MediaAction::SeekToPercentage { percent: 50.0 }.repeatable());
    }

    #[test]
    fn actions_serialize_with_tag() {
        let json = serde_json::to_value(MediaAction::SeekRelative { seconds: -5.0 }).unwrap();
        assert_eq!(json["action"], "seekRelative");
        assert_eq!(json["seconds"], -5.0);
        assert_eq!(MediaAction::SkipIntro.native_control(), Some(NativeControl::SkipIntro));
        assert_eq!(MediaAction::ToggleMute.native_control(), None);
    }
}
