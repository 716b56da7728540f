//! Keyboard Arbitrator
//!
//! Per-keydown decision tree: filter, map, debounce, then act and suppress
//! in the order the site's policy dictates. All suppression happens before
//! [`KeyboardArbitrator::handle_key_down`] returns, even when the action
//! itself completes later.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use super::keymap::KeyMap;
use super::{EventControl, KeyEvent};
use crate::media::{MediaAction, MediaExecutor, Outcome};
use crate::metrics::PipelineMetrics;
use crate::sites::Suppression;

/// Why an event was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No pipeline is running for this page.
    Inactive,
    Disabled,
    ReservedModifier,
    TextEntry,
    NoPlayer,
    Unmapped,
    /// Native control for the action is absent or hidden.
    ControlUnavailable,
    Debounced,
}

/// What the arbitrator did with an event.
#[derive(Debug)]
pub enum KeyDisposition {
    Ignored(IgnoreReason),
    Dispatched {
        action: MediaAction,
        outcome: Outcome,
        suppressed: bool,
    },
}

impl KeyDisposition {
    pub fn is_ignored(&self) -> bool {
        matches!(self, KeyDisposition::Ignored(_))
    }
}

/// Routes key events to the executor for one page load.
pub struct KeyboardArbitrator {
    executor: MediaExecutor,
    keymap: Arc<KeyMap>,
    pressed: HashMap<String, Instant>,
    retrigger_interval: Duration,
    enabled: bool,
    metrics: PipelineMetrics,
}

impl KeyboardArbitrator {
    pub fn new(executor: MediaExecutor, keymap: Arc<KeyMap>, retrigger_interval: Duration) -> Self {
        Self {
            executor,
            keymap,
            pressed: HashMap::new(),
            retrigger_interval,
            enabled: true,
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabling also forgets pressed keys.
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.pressed.clear();
        }
        if self.enabled != enabled {
            let mode = if enabled { "enabled" } else { "disabled" };
            debug!("[Arbitrator] Keyboard handling {}", mode);
        }
        self.enabled = enabled;
    }

    /// Swaps in a whole new table.
    pub fn replace_keymap(&mut self, keymap: Arc<KeyMap>) {
        debug!("[Arbitrator] Key map replaced ({} entries)", keymap.len());
        self.keymap = keymap;
        self.pressed.clear();
    }

    pub fn keymap(&self) -> &Arc<KeyMap> {
        &self.keymap
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn handle_key_down(
        &mut self,
        event: &KeyEvent,
        control: &mut dyn EventControl,
    ) -> KeyDisposition {
        let disposition = self.arbitrate(event, control);
        if let KeyDisposition::Ignored(reason) = &disposition {
            trace!("[Arbitrator] {:?} ignored: {:?}", event.code, reason);
            self.metrics.record_ignored();
        }
        disposition
    }

    fn arbitrate(&mut self, event: &KeyEvent, control: &mut dyn EventControl) -> KeyDisposition {
        if !self.enabled {
            return KeyDisposition::Ignored(IgnoreReason::Disabled);
        }
        if event.modifiers.reserved() {
            return KeyDisposition::Ignored(IgnoreReason::ReservedModifier);
        }
        if event.target.accepts_typing() {
            return KeyDisposition::Ignored(IgnoreReason::TextEntry);
        }

        if self.executor.player().is_none() {
            return KeyDisposition::Ignored(IgnoreReason::NoPlayer);
        }

        let Some(mapping) = event.key_id().and_then(|id| self.keymap.get(&id).cloned()) else {
            return KeyDisposition::Ignored(IgnoreReason::Unmapped);
        };

        if let Some(native) = mapping.action.native_control() {
            if !self.executor.native_control_available(native) {
                return KeyDisposition::Ignored(IgnoreReason::ControlUnavailable);
            }
        }

        let policy = self.executor.site().policy;
        let suppress = !mapping.platform_handled && policy.suppression() != Suppression::None;

        let now = Instant::now();
        let interval = self.retrigger_interval;
        self.pressed.retain(|_, accepted| now.duration_since(*accepted) < interval);
        // A held toggle key would flip the state back and forth.
        let held_toggle = event.repeat && !mapping.action.repeatable();
        if held_toggle || self.pressed.contains_key(&mapping.code) {
            // Still suppressed so the site does not act on the repeat in our place.
            if suppress {
                self.suppress(&mapping.code, control);
            }
            return KeyDisposition::Ignored(IgnoreReason::Debounced);
        }
        self.pressed.insert(mapping.code.clone(), now);

        let suppress_first = suppress && policy.suppress_before_action();

        if suppress_first {
            self.suppress(&mapping.code, control);
        }

        let started = std::time::Instant::now();
        let outcome = self.executor.execute(&mapping.action);
        self.metrics.record_dispatch(started.elapsed().as_micros() as u64);

        if suppress && !suppress_first {
            self.suppress(&mapping.code, control);
        }

        if matches!(outcome, Outcome::NotApplied) {
            self.metrics.record_failure();
        }
        debug!(
            "[Arbitrator] {} -> {} ({:?}, suppressed={})",
            mapping.code,
            mapping.action.name(),
            outcome,
            suppress
        );

        KeyDisposition::Dispatched {
            action: mapping.action,
            outcome,
            suppressed: suppress,
        }
    }

    fn suppress(&self, code: &str, control: &mut dyn EventControl) {
        let policy = self.executor.site().policy;
        match policy.suppression() {
            Suppression::None => return,
            Suppression::Full => {
                control.prevent_default();
                control.stop_propagation();
            }
            Suppression::Immediate => {
                control.prevent_default();
                control.stop_propagation();
                control.stop_immediate_propagation();
            }
        }
        if code == "Space" && policy.needs_scroll_prevention {
            self.executor.page().blur_active_element();
        }
        self.metrics.record_suppressed();
    }
}
