//! Keyboard handling
//!
//! Key events as the host delivers them, the mapping table from key codes to
//! media actions, and the arbitrator that decides per event whether to act
//! and whether to cancel the site's own handling.

pub mod arbitrator;
pub mod keymap;

use serde::{Deserialize, Serialize};

pub use arbitrator::{IgnoreReason, KeyDisposition, KeyboardArbitrator};
pub use keymap::{resolve_key_id, KeyCategory, KeyMap, KeyMapping};

/// Modifier keys held during the event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Modifiers {
    /// Ctrl/Alt/Meta belong to browser and OS shortcuts. Shift does not.
    pub fn reserved(&self) -> bool {
        self.ctrl || self.alt || self.meta
    }
}

/// The element that had focus when the key went down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FocusTarget {
    #[default]
    Body,
    TextInput,
    TextArea,
    ContentEditable,
    Select,
    Other,
}

impl FocusTarget {
    pub fn accepts_typing(&self) -> bool {
        matches!(
            self,
            FocusTarget::TextInput
                | FocusTarget::TextArea
                | FocusTarget::ContentEditable
                | FocusTarget::Select
        )
    }
}

/// A keydown event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyEvent {
    /// Layout-independent physical key (`KeyM`, `ArrowLeft`), when known.
    pub code: Option<String>,
    /// Character or named key value (`m`, ` `, `ArrowLeft`).
    pub key: String,
    pub modifiers: Modifiers,
    pub target: FocusTarget,
    pub repeat: bool,
}

impl KeyEvent {
    /// Event carrying a physical key code.
    pub fn code(code: &str) -> Self {
        Self {
            code: Some(code.to_string()),
            ..Self::default()
        }
    }

    /// Event with only a key value, as some older hosts deliver.
    pub fn key(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn in_target(mut self, target: FocusTarget) -> Self {
        self.target = target;
        self
    }

    /// Identifier used for mapping and debounce.
    pub fn key_id(&self) -> Option<String> {
        resolve_key_id(self.code.as_deref(), &self.key)
    }
}

/// Cancellation primitives of the host's event object.
pub trait EventControl {
    fn prevent_default(&mut self);
    fn stop_propagation(&mut self);
    fn stop_immediate_propagation(&mut self);
}
