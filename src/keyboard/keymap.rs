//! Key Mapping table
//!
//! Immutable map from physical key code to media action. Customisation
//! builds a whole new table; entries are never edited in place.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::KeyMapError;
use crate::media::MediaAction;
use crate::settings::PipelineSettings;
use crate::sites::SiteEntry;

/// UI grouping of a shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyCategory {
    Seek,
    Volume,
    Playback,
    Captions,
    Display,
    Navigation,
}

/// One row of the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMapping {
    pub code: String,
    pub action: MediaAction,
    pub category: KeyCategory,
    /// The site's own handler performs the mutation; never suppress it.
    pub platform_handled: bool,
}

impl KeyMapping {
    pub fn new(code: &str, action: MediaAction, category: KeyCategory) -> Self {
        Self {
            code: code.to_string(),
            action,
            category,
            platform_handled: false,
        }
    }

    pub fn platform_handled(mut self) -> Self {
        self.platform_handled = true;
        self
    }
}

/// Shortcut table, at most one entry per key code.
#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    entries: Vec<KeyMapping>,
    index: HashMap<String, usize>,
}

impl KeyMap {
    pub fn new(entries: Vec<KeyMapping>) -> Result<Self, KeyMapError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if index.insert(entry.code.clone(), position).is_some() {
                return Err(KeyMapError::DuplicateKey(entry.code.clone()));
            }
        }
        Ok(Self { entries, index })
    }

    /// The standard shortcuts, shaped by the site and the feature toggles.
    pub fn for_site(site: &SiteEntry, settings: &PipelineSettings) -> Result<Self, KeyMapError> {
        use KeyCategory::*;
        use MediaAction::*;

        let base = settings.seek_amount;
        let step = settings.volume_step;
        let mut entries = vec![
            KeyMapping::new("ArrowLeft", SeekRelative { seconds: -base }, Seek),
            KeyMapping::new("ArrowRight", SeekRelative { seconds: base }, Seek),
            KeyMapping::new("KeyJ", SeekRelative { seconds: -2.0 * base }, Seek),
            KeyMapping::new("KeyL", SeekRelative { seconds: 2.0 * base }, Seek),
        ];

        if settings.volume_control_enabled {
            entries.push(KeyMapping::new("ArrowUp", VolumeDelta { step }, Volume));
            entries.push(KeyMapping::new("ArrowDown", VolumeDelta { step: -step }, Volume));
            entries.push(KeyMapping::new("KeyM", ToggleMute, Volume));
        }

        if settings.playback_control_enabled {
            let space = if site.policy.native_play_pause {
                KeyMapping::new("Space", ObservePlayPause, Playback).platform_handled()
            } else {
                KeyMapping::new("Space", TogglePlayPause, Playback)
            };
            entries.push(space);
            entries.push(KeyMapping::new("KeyK", TogglePlayPause, Playback));
        }

        entries.push(KeyMapping::new("KeyC", ToggleCaptions, Captions));
        entries.push(KeyMapping::new("KeyF", ToggleFullscreen, Display));

        for digit in 0..=9u8 {
            let code = format!("Digit{digit}");
            let percent = f64::from(digit) * 10.0;
            entries.push(KeyMapping::new(&code, SeekToPercentage { percent }, Seek));
        }

        if !site.selectors.skip_intro.is_empty() {
            entries.push(KeyMapping::new("KeyS", SkipIntro, Navigation));
        }
        if !site.selectors.next_episode.is_empty() {
            entries.push(KeyMapping::new("KeyN", NextEpisode, Navigation));
        }

        Self::new(entries)
    }

    pub fn get(&self, code: &str) -> Option<&KeyMapping> {
        self.index.get(code).map(|position| &self.entries[*position])
    }

    pub fn entries(&self) -> &[KeyMapping] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Key identity for mapping: the physical code when present, otherwise a
/// code reconstructed from the key value.
pub fn resolve_key_id(code: Option<&str>, key: &str) -> Option<String> {
    if let Some(code) = code.filter(|code| !code.is_empty()) {
        return Some(code.to_string());
    }

    let named = match key {
        " " | "Spacebar" => Some("Space"),
        "ArrowLeft" | "Left" => Some("ArrowLeft"),
        "ArrowRight" | "Right" => Some("ArrowRight"),
        "ArrowUp" | "Up" => Some("ArrowUp"),
        "ArrowDown" | "Down" => Some("ArrowDown"),
        _ => None,
    };
    if let Some(named) = named {
        return Some(named.to_string());
    }

    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => {
            Some(format!("Key{}", c.to_ascii_uppercase()))
        }
        (Some(c), None) if c.is_ascii_digit() => Some(format!("Digit{c}")),
        _ => None,
    }
}
