/*!
 * StreamKeys Library
 *
 * Keyboard arbitration and media-action dispatch for streaming-video pages.
 */

pub mod dom;
pub mod error;
pub mod keyboard;
pub mod media;
pub mod metrics;
pub mod notifications;
pub mod orchestrator;
pub mod player;
pub mod settings;
pub mod sim;
pub mod sites;
pub mod validation;

// Re-export commonly used types
pub use dom::{NodeId, Page, PageEvent};
pub use error::{DomError, KeyMapError, SettingsError, StartupError};
pub use keyboard::{EventControl, KeyDisposition, KeyEvent, KeyMap, KeyboardArbitrator};
pub use media::{MediaAction, MediaExecutor, Outcome};
pub use orchestrator::{Orchestrator, OrchestratorConfig, PipelineStatus};
pub use player::{PlayerHandle, PlayerLocator};
pub use settings::{PipelineSettings, SettingsProvider, StoredSettings};
pub use sites::{SiteEntry, SiteRegistry};
