//! In-memory page
//!
//! A small DOM-and-media model implementing [`Page`], used by the test suite
//! and the scenario runner. Selectors support compound selectors (tag, `#id`,
//! `.class`, `[attr]`, `[attr=v]`, `[attr*=v]`, `[attr^=v]`, `[attr$=v]`)
//! joined by descendant combinators, in comma-separated lists.
//!
//! Every observable mutation is appended to a shared [`Journal`], so tests can
//! assert the relative order of page effects and event suppression.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};
use url::Url;

use crate::dom::{MutationKind, NodeId, Page, PageEvent, PlayRequest, TrackMode};
use crate::error::DomError;
use crate::keyboard::EventControl;
use crate::notifications::{NotificationCategory, NotificationSink};

/// Ordered log of page effects and event-control calls.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Index of the first entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.0.lock().iter().position(|entry| entry.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|entry| entry.starts_with(prefix)).count()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Media state of a simulated `<video>` element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimMedia {
    pub current_time: f64,
    /// `NaN` until metadata has loaded.
    pub duration: f64,
    pub volume: f64,
    pub muted: bool,
    pub paused: bool,
    pub tracks: Vec<TrackMode>,
    /// Assignments to `currentTime` throw, as some DRM players do.
    pub seek_blocked: bool,
    /// `play()` rejects, as under a strict autoplay policy.
    pub autoplay_blocked: bool,
    /// Writes to `muted` and calls to `play()`/`pause()` throw; only the
    /// site's own buttons drive the element.
    pub controls_blocked: bool,
}

impl SimMedia {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn at(mut self, current_time: f64) -> Self {
        self.current_time = current_time;
        self
    }
}

impl Default for SimMedia {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: f64::NAN,
            volume: 1.0,
            muted: false,
            paused: true,
            tracks: Vec::new(),
            seek_blocked: false,
            autoplay_blocked: false,
            controls_blocked: false,
        }
    }
}

/// What clicking a simulated node does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClickEffect {
    /// Native rewind/forward button.
    SeekBy { media: NodeId, seconds: f64 },
    /// Seek bar: `click_at` seeks to the clicked fraction.
    SeekBar { media: NodeId },
    /// Captions button: toggles the first text track.
    ToggleCaptions { media: NodeId },
    /// Mute button.
    ToggleMute { media: NodeId },
    /// Play/pause button.
    TogglePlay { media: NodeId },
    /// Skip/next buttons: hide themselves once used.
    Dismiss,
}

/// Builder for a simulated element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementSpec {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub styles: BTreeMap<String, String>,
    pub hidden: bool,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn style(mut self, property: &str, value: &str) -> Self {
        self.styles.insert(property.to_string(), value.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

#[derive(Debug)]
struct SimNode {
    spec: ElementSpec,
    parent: Option<NodeId>,
    connected: bool,
    media: Option<SimMedia>,
    on_click: Option<ClickEffect>,
}

impl SimNode {
    fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.spec.id.clone(),
            "class" => (!self.spec.classes.is_empty()).then(|| self.spec.classes.join(" ")),
            _ => self.spec.attributes.get(name).cloned(),
        }
    }
}

#[derive(Debug)]
struct SimState {
    url: Url,
    nodes: Vec<SimNode>,
    visible: bool,
    fullscreen: Option<NodeId>,
    fullscreen_denied: bool,
}

impl SimState {
    fn node(&self, id: NodeId) -> Option<&SimNode> {
        self.nodes.get(id.0 as usize)
    }

    fn media(&self, id: NodeId) -> Result<&SimMedia, DomError> {
        let node = self.node(id).filter(|n| n.connected).ok_or(DomError::Detached(id))?;
        node.media.as_ref().ok_or(DomError::NotMedia(id))
    }

    fn media_mut(&mut self, id: NodeId) -> Result<&mut SimMedia, DomError> {
        let node = self
            .nodes
            .get_mut(id.0 as usize)
            .filter(|n| n.connected)
            .ok_or(DomError::Detached(id))?;
        node.media.as_mut().ok_or(DomError::NotMedia(id))
    }

    fn matches(&self, id: NodeId, selector: &[Compound]) -> bool {
        let Some((last, ancestors)) = selector.split_last() else {
            return false;
        };
        let Some(node) = self.node(id) else {
            return false;
        };
        if !last.matches(node) {
            return false;
        }
        let mut cursor = node.parent;
        for compound in ancestors.iter().rev() {
            loop {
                let Some(ancestor) = cursor.and_then(|a| self.node(a).map(|n| (a, n))) else {
                    return false;
                };
                cursor = ancestor.1.parent;
                if compound.matches(ancestor.1) {
                    break;
                }
            }
        }
        true
    }
}

/// In-memory [`Page`] implementation.
#[derive(Debug)]
pub struct SimPage {
    state: Mutex<SimState>,
    events: broadcast::Sender<PageEvent>,
    journal: Journal,
}

impl SimPage {
    /// Creates a page at `url` containing only a `<body>` root.
    pub fn new(url: &str) -> Result<Self, url::ParseError> {
        Self::with_journal(url, Journal::new())
    }

    pub fn with_journal(url: &str, journal: Journal) -> Result<Self, url::ParseError> {
        let url = Url::parse(url)?;
        let (events, _) = broadcast::channel(64);
        let body = SimNode {
            spec: ElementSpec::new("body"),
            parent: None,
            connected: true,
            media: None,
            on_click: None,
        };
        Ok(Self {
            state: Mutex::new(SimState {
                url,
                nodes: vec![body],
                visible: true,
                fullscreen: None,
                fullscreen_denied: false,
            }),
            events,
            journal,
        })
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn append(&self, parent: NodeId, spec: ElementSpec) -> NodeId {
        self.insert(parent, spec, None)
    }

    pub fn append_media(&self, parent: NodeId, spec: ElementSpec, media: SimMedia) -> NodeId {
        self.insert(parent, spec, Some(media))
    }

    fn insert(&self, parent: NodeId, spec: ElementSpec, media: Option<SimMedia>) -> NodeId {
        let id = {
            let mut state = self.state.lock();
            let connected = state.node(parent).map(|p| p.connected).unwrap_or(false);
            let id = NodeId(state.nodes.len() as u64);
            state.nodes.push(SimNode {
                spec,
                parent: Some(parent),
                connected,
                media,
                on_click: None,
            });
            id
        };
        self.emit(PageEvent::Mutation(MutationKind::ChildList));
        id
    }

    /// Detaches `node` and its whole subtree.
    pub fn remove(&self, node: NodeId) {
        {
            let mut state = self.state.lock();
            let mut doomed = vec![node];
            let mut index = 0;
            while index < doomed.len() {
                let current = doomed[index];
                for (i, candidate) in state.nodes.iter().enumerate() {
                    if candidate.parent == Some(current) {
                        doomed.push(NodeId(i as u64));
                    }
                }
                index += 1;
            }
            for id in doomed {
                if let Some(n) = state.nodes.get_mut(id.0 as usize) {
                    n.connected = false;
                }
            }
            if state.fullscreen == Some(node) {
                state.fullscreen = None;
            }
        }
        self.emit(PageEvent::Mutation(MutationKind::ChildList));
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        {
            let mut state = self.state.lock();
            if let Some(n) = state.nodes.get_mut(node.0 as usize) {
                match name {
                    "id" => n.spec.id = Some(value.to_string()),
                    "class" => {
                        n.spec.classes = value.split_whitespace().map(str::to_string).collect()
                    }
                    _ => {
                        n.spec.attributes.insert(name.to_string(), value.to_string());
                    }
                }
            }
        }
        self.emit(PageEvent::Mutation(MutationKind::Attribute(name.to_string())));
    }

    pub fn set_style(&self, node: NodeId, property: &str, value: &str) {
        if let Some(n) = self.state.lock().nodes.get_mut(node.0 as usize) {
            n.spec.styles.insert(property.to_string(), value.to_string());
        }
        self.emit(PageEvent::Mutation(MutationKind::Attribute("style".into())));
    }

    pub fn set_hidden(&self, node: NodeId, hidden: bool) {
        if let Some(n) = self.state.lock().nodes.get_mut(node.0 as usize) {
            n.spec.hidden = hidden;
        }
        self.emit(PageEvent::Mutation(MutationKind::Attribute("style".into())));
    }

    pub fn on_click(&self, node: NodeId, effect: ClickEffect) {
        if let Some(n) = self.state.lock().nodes.get_mut(node.0 as usize) {
            n.on_click = Some(effect);
        }
    }

    /// Changes the location without any event, as a client-side router would.
    pub fn set_location(&self, url: &str) -> Result<(), url::ParseError> {
        self.state.lock().url = Url::parse(url)?;
        Ok(())
    }

    pub fn set_visible(&self, visible: bool) {
        self.state.lock().visible = visible;
        self.emit(PageEvent::VisibilityChanged { visible });
    }

    pub fn focus_window(&self) {
        self.emit(PageEvent::WindowFocused);
    }

    pub fn deny_fullscreen(&self, denied: bool) {
        self.state.lock().fullscreen_denied = denied;
    }

    pub fn media_state(&self, node: NodeId) -> Option<SimMedia> {
        self.state.lock().node(node).and_then(|n| n.media.clone())
    }

    pub fn update_media(&self, node: NodeId, update: impl FnOnce(&mut SimMedia)) {
        if let Some(media) = self
            .state
            .lock()
            .nodes
            .get_mut(node.0 as usize)
            .and_then(|n| n.media.as_mut())
        {
            update(media);
        }
    }

    fn emit(&self, event: PageEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn with_media<T>(
        &self,
        media: NodeId,
        entry: impl FnOnce(&T) -> String,
        update: impl FnOnce(&mut SimMedia) -> Result<T, DomError>,
    ) -> Result<T, DomError> {
        let value = {
            let mut state = self.state.lock();
            update(state.media_mut(media)?)?
        };
        self.journal.record(entry(&value));
        Ok(value)
    }
}

impl Page for SimPage {
    fn hostname(&self) -> String {
        self.state.lock().url.host_str().unwrap_or_default().to_string()
    }

    fn location(&self) -> String {
        self.state.lock().url.to_string()
    }

    fn is_visible(&self) -> bool {
        self.state.lock().visible
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let selectors = parse_selector_list(selector)?;
        let state = self.state.lock();
        Ok((0..state.nodes.len() as u64)
            .map(NodeId)
            .filter(|id| state.node(*id).map(|n| n.connected).unwrap_or(false))
            .filter(|id| selectors.iter().any(|s| state.matches(*id, s)))
            .collect())
    }

    fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
        let selectors = parse_selector_list(selector)?;
        let state = self.state.lock();
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if selectors.iter().any(|s| state.matches(id, s)) {
                return Ok(Some(id));
            }
            cursor = state.node(id).and_then(|n| n.parent);
        }
        Ok(None)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.state.lock().node(node).and_then(|n| n.parent)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.state.lock().node(node).map(|n| n.connected).unwrap_or(false)
    }

    fn is_displayed(&self, node: NodeId) -> bool {
        let state = self.state.lock();
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            match state.node(id) {
                Some(n) if n.connected && !n.spec.hidden => cursor = n.parent,
                _ => return false,
            }
        }
        true
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.state.lock().node(node).and_then(|n| n.attribute(name))
    }

    fn inline_style(&self, node: NodeId, property: &str) -> Option<String> {
        self.state
            .lock()
            .node(node)
            .and_then(|n| n.spec.styles.get(property).cloned())
    }

    fn click(&self, node: NodeId) -> Result<(), DomError> {
        let mut state = self.state.lock();
        let effect = match state.node(node) {
            Some(n) if n.connected => n.on_click.clone(),
            _ => return Err(DomError::Detached(node)),
        };
        match effect {
            Some(ClickEffect::SeekBy { media, seconds }) => {
                let m = state.media_mut(media)?;
                let duration = if m.duration.is_finite() { m.duration } else { f64::MAX };
                m.current_time = (m.current_time + seconds).clamp(0.0, duration);
            }
            Some(ClickEffect::ToggleCaptions { media }) => {
                let m = state.media_mut(media)?;
                if let Some(track) = m.tracks.first_mut() {
                    *track = if *track == TrackMode::Showing {
                        TrackMode::Hidden
                    } else {
                        TrackMode::Showing
                    };
                }
            }
            Some(ClickEffect::ToggleMute { media }) => {
                let m = state.media_mut(media)?;
                m.muted = !m.muted;
            }
            Some(ClickEffect::TogglePlay { media }) => {
                let m = state.media_mut(media)?;
                m.paused = !m.paused;
            }
            Some(ClickEffect::Dismiss) => {
                if let Some(n) = state.nodes.get_mut(node.0 as usize) {
                    n.spec.hidden = true;
                }
            }
            Some(ClickEffect::SeekBar { .. }) | None => {}
        }
        drop(state);
        self.journal.record(format!("click {node}"));
        Ok(())
    }

    fn click_at(&self, node: NodeId, fraction: f64) -> Result<(), DomError> {
        let mut state = self.state.lock();
        let effect = match state.node(node) {
            Some(n) if n.connected => n.on_click.clone(),
            _ => return Err(DomError::Detached(node)),
        };
        if let Some(ClickEffect::SeekBar { media }) = effect {
            let m = state.media_mut(media)?;
            if m.duration.is_finite() {
                m.current_time = m.duration * fraction.clamp(0.0, 1.0);
            }
        }
        drop(state);
        self.journal.record(format!("click_at {node} {fraction:.3}"));
        Ok(())
    }

    fn blur_active_element(&self) {
        self.journal.record("blur");
    }

    fn current_time(&self, media: NodeId) -> Result<f64, DomError> {
        Ok(self.state.lock().media(media)?.current_time)
    }

    fn set_current_time(&self, media: NodeId, seconds: f64) -> Result<(), DomError> {
        self.with_media(
            media,
            |_| format!("current_time={seconds}"),
            |m| {
                if m.seek_blocked {
                    return Err(DomError::rejected(
                        "set_current_time",
                        "seeking is blocked by the player",
                    ));
                }
                m.current_time = seconds;
                Ok(())
            },
        )
    }

    fn duration(&self, media: NodeId) -> Result<f64, DomError> {
        Ok(self.state.lock().media(media)?.duration)
    }

    fn volume(&self, media: NodeId) -> Result<f64, DomError> {
        Ok(self.state.lock().media(media)?.volume)
    }

    fn set_volume(&self, media: NodeId, volume: f64) -> Result<(), DomError> {
        self.with_media(media, |_| format!("volume={volume}"), |m| {
            m.volume = volume;
            Ok(())
        })
    }

    fn muted(&self, media: NodeId) -> Result<bool, DomError> {
        Ok(self.state.lock().media(media)?.muted)
    }

    fn set_muted(&self, media: NodeId, muted: bool) -> Result<(), DomError> {
        self.with_media(media, |_| format!("muted={muted}"), |m| {
            if m.controls_blocked {
                return Err(DomError::rejected("set_muted", "the player owns this element"));
            }
            m.muted = muted;
            Ok(())
        })
    }

    fn paused(&self, media: NodeId) -> Result<bool, DomError> {
        Ok(self.state.lock().media(media)?.paused)
    }

    fn play(&self, media: NodeId) -> Result<PlayRequest, DomError> {
        let (tx, rx) = oneshot::channel();
        let result = self.with_media(media, |_| "play".to_string(), |m| {
            if m.controls_blocked {
                return Err(DomError::rejected("play", "the player owns this element"));
            }
            if m.autoplay_blocked {
                Ok(Err(DomError::rejected("play", "blocked by autoplay policy")))
            } else {
                m.paused = false;
                Ok(Ok(()))
            }
        })?;
        let _ = tx.send(result);
        Ok(rx)
    }

    fn pause(&self, media: NodeId) -> Result<(), DomError> {
        self.with_media(media, |_| "pause".to_string(), |m| {
            if m.controls_blocked {
                return Err(DomError::rejected("pause", "the player owns this element"));
            }
            m.paused = true;
            Ok(())
        })
    }

    fn text_tracks(&self, media: NodeId) -> Result<Vec<TrackMode>, DomError> {
        Ok(self.state.lock().media(media)?.tracks.clone())
    }

    fn set_text_track_mode(
        &self,
        media: NodeId,
        index: usize,
        mode: TrackMode,
    ) -> Result<(), DomError> {
        self.with_media(media, |_| format!("track[{index}]={mode:?}"), |m| {
            let track = m.tracks.get_mut(index).ok_or_else(|| {
                DomError::rejected("set_text_track_mode", format!("no track {index}"))
            })?;
            *track = mode;
            Ok(())
        })
    }

    fn fullscreen_element(&self) -> Option<NodeId> {
        self.state.lock().fullscreen
    }

    fn request_fullscreen(&self, node: NodeId) -> Result<(), DomError> {
        {
            let mut state = self.state.lock();
            if state.fullscreen_denied {
                return Err(DomError::rejected("request_fullscreen", "permissions policy"));
            }
            if !state.node(node).map(|n| n.connected).unwrap_or(false) {
                return Err(DomError::Detached(node));
            }
            state.fullscreen = Some(node);
        }
        self.journal.record(format!("fullscreen {node}"));
        Ok(())
    }

    fn exit_fullscreen(&self) -> Result<(), DomError> {
        self.state.lock().fullscreen = None;
        self.journal.record("exit_fullscreen");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }
}

/// [`EventControl`] that writes each cancellation call to a [`Journal`].
#[derive(Debug, Clone, Default)]
pub struct RecordingControl {
    journal: Journal,
    pub default_prevented: bool,
    pub propagation_stopped: bool,
    pub immediate_propagation_stopped: bool,
}

impl RecordingControl {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub fn touched(&self) -> bool {
        self.default_prevented || self.propagation_stopped || self.immediate_propagation_stopped
    }
}

impl EventControl for RecordingControl {
    fn prevent_default(&mut self) {
        self.default_prevented = true;
        self.journal.record("prevent_default");
    }

    fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
        self.journal.record("stop_propagation");
    }

    fn stop_immediate_propagation(&mut self) {
        self.immediate_propagation_stopped = true;
        self.journal.record("stop_immediate_propagation");
    }
}

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShownNotification {
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
}

/// Notification sink that keeps everything it is asked to show.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<ShownNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<ShownNotification> {
        self.shown.lock().clone()
    }

    pub fn last(&self) -> Option<ShownNotification> {
        self.shown.lock().last().cloned()
    }
}

impl NotificationSink for RecordingNotifier {
    fn show(
        &self,
        title: &str,
        message: &str,
        category: NotificationCategory,
        _duration: std::time::Duration,
    ) {
        self.shown.lock().push(ShownNotification {
            title: title.to_string(),
            message: message.to_string(),
            category,
        });
    }
}

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeMatcher>,
}

impl Compound {
    fn matches(&self, node: &SimNode) -> bool {
        if let Some(tag) = &self.tag {
            if *tag != node.spec.tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.spec.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| node.spec.classes.contains(c))
            && self.attributes.iter().all(|a| a.matches(node))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeOp {
    Exists,
    Equals,
    Contains,
    Prefix,
    Suffix,
}

#[derive(Debug, Clone)]
struct AttributeMatcher {
    name: String,
    op: AttributeOp,
    value: String,
}

impl AttributeMatcher {
    fn matches(&self, node: &SimNode) -> bool {
        let Some(actual) = node.attribute(&self.name) else {
            return false;
        };
        match self.op {
            AttributeOp::Exists => true,
            AttributeOp::Equals => actual == self.value,
            AttributeOp::Contains => actual.contains(&self.value),
            AttributeOp::Prefix => actual.starts_with(&self.value),
            AttributeOp::Suffix => actual.ends_with(&self.value),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_selector_list(input: &str) -> Result<Vec<Vec<Compound>>, DomError> {
    let invalid = || DomError::InvalidSelector(input.to_string());
    input
        .split(',')
        .map(|selector| {
            let compounds = selector
                .split_whitespace()
                .map(parse_compound)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(invalid)?;
            if compounds.is_empty() {
                Err(invalid())
            } else {
                Ok(compounds)
            }
        })
        .collect()
}

fn parse_compound(input: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let tag_len = input
        .find(|c: char| !(is_ident_char(c) || c == '*'))
        .unwrap_or(input.len());
    let mut rest = &input[tag_len..];
    match &input[..tag_len] {
        "" | "*" => {}
        tag if tag.chars().all(is_ident_char) => compound.tag = Some(tag.to_ascii_lowercase()),
        _ => return None,
    }

    while let Some(first) = rest.chars().next() {
        match first {
            '#' | '.' => {
                let body = &rest[1..];
                let len = body.find(|c: char| !is_ident_char(c)).unwrap_or(body.len());
                if len == 0 {
                    return None;
                }
                let ident = body[..len].to_string();
                if first == '#' {
                    compound.id = Some(ident);
                } else {
                    compound.classes.push(ident);
                }
                rest = &body[len..];
            }
            '[' => {
                let close = rest.find(']')?;
                compound.attributes.push(parse_attribute(&rest[1..close])?);
                rest = &rest[close + 1..];
            }
            _ => return None,
        }
    }
    Some(compound)
}

fn parse_attribute(body: &str) -> Option<AttributeMatcher> {
    let (name, op, value) = match body.find('=') {
        Some(pos) => {
            let lhs = &body[..pos];
            let (name, op) = match lhs.chars().last() {
                Some('*') => (&lhs[..lhs.len() - 1], AttributeOp::Contains),
                Some('^') => (&lhs[..lhs.len() - 1], AttributeOp::Prefix),
                Some('$') => (&lhs[..lhs.len() - 1], AttributeOp::Suffix),
                _ => (lhs, AttributeOp::Equals),
            };
            (name, op, unquote(body[pos + 1..].trim()))
        }
        None => (body, AttributeOp::Exists, String::new()),
    };
    let name = name.trim();
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return None;
    }
    Some(AttributeMatcher {
        name: name.to_string(),
        op,
        value,
    })
}

fn unquote(value: &str) -> String {
    for quote in ['\'', '"'] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
            return inner.to_string();
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> SimPage {
        SimPage::new("https://www.example.com/watch").unwrap()
    }

    #[test]
    fn matches_compound_and_descendant_selectors() {
        let page = page();
        let player = page.append(
            page.root(),
            ElementSpec::new("div").class("watch-video").attr("data-uia", "player"),
        );
        let video =
            page.append_media(player, ElementSpec::new("video").class("main"), SimMedia::new(10.0));
        let other = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(10.0));

        assert_eq!(page.query_selector_all(".watch-video video").unwrap(), vec![video]);
        assert_eq!(page.query_selector_all("video.main").unwrap(), vec![video]);
        assert_eq!(page.query_selector_all("video").unwrap(), vec![video, other]);
        assert_eq!(page.query_selector_all("[data-uia='player']").unwrap(), vec![player]);
        assert_eq!(page.query_selector_all("[class*='watch']").unwrap(), vec![player]);
        assert_eq!(page.query_selector_all("#missing, video.main").unwrap(), vec![video]);
    }

    #[test]
    fn rejects_unsupported_selectors() {
        let page = page();
        assert!(matches!(
            page.query_selector_all("div > video"),
            Err(DomError::InvalidSelector(_))
        ));
        assert!(page.query_selector_all("video:first-child").is_err());
        assert!(page.query_selector_all("").is_err());
    }

    #[test]
    fn removed_subtree_is_disconnected() {
        let page = page();
        let player = page.append(page.root(), ElementSpec::new("div"));
        let video = page.append_media(player, ElementSpec::new("video"), SimMedia::new(10.0));
        page.remove(player);
        assert!(!page.is_connected(video));
        assert!(page.query_selector_all("video").unwrap().is_empty());
        assert_eq!(page.current_time(video), Err(DomError::Detached(video)));
    }

    #[test]
    fn closest_walks_inclusive_ancestors() {
        let page = page();
        let player = page.append(page.root(), ElementSpec::new("div").id("movie_player"));
        let inner = page.append(player, ElementSpec::new("div"));
        let video = page.append_media(inner, ElementSpec::new("video"), SimMedia::new(10.0));
        assert_eq!(page.closest(video, "#movie_player").unwrap(), Some(player));
        assert_eq!(page.closest(video, "video").unwrap(), Some(video));
        assert_eq!(page.closest(video, ".nope").unwrap(), None);
    }

    #[test]
    fn hidden_ancestor_hides_descendants() {
        let page = page();
        let overlay = page.append(page.root(), ElementSpec::new("div").hidden());
        let button = page.append(overlay, ElementSpec::new("button"));
        assert!(!page.is_displayed(button));
        page.set_hidden(overlay, false);
        assert!(page.is_displayed(button));
    }

    #[tokio::test]
    async fn play_rejects_under_autoplay_policy() {
        let page = page();
        let mut media = SimMedia::new(10.0);
        media.autoplay_blocked = true;
        let video = page.append_media(page.root(), ElementSpec::new("video"), media);
        let result = page.play(video).unwrap().await.unwrap();
        assert!(result.is_err());
        assert!(page.paused(video).unwrap());
    }

    #[test]
    fn journal_records_in_order() {
        let page = page();
        let video = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(10.0));
        let mut control = RecordingControl::new(page.journal().clone());
        control.prevent_default();
        page.set_muted(video, true).unwrap();
        assert_eq!(page.journal().entries(), vec!["prevent_default", "muted=true"]);
        assert!(page.journal().position("prevent_default") < page.journal().position("muted"));
    }
}
