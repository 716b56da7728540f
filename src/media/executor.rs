//! Media Action Executor
//!
//! One method per action. Each resolves the current player (or fails fast),
//! mutates it through the page, and reports success with an optional
//! notification. DOM errors are caught here and become
//! [`Outcome::NotApplied`]; nothing propagates to the key-event path.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::fallback::{self, FallbackSeek, Metadata, SeekTarget};
use super::format;
use super::{MediaAction, NativeControl, Outcome};
use crate::dom::{self, NodeId, Page, TrackMode};
use crate::error::DomError;
use crate::notifications::{NotificationCategory, NotificationSink};
use crate::player::{ControlRefs, PlayerHandle};
use crate::settings::PipelineSettings;
use crate::sites::SiteEntry;
use crate::validation;

/// Executor tuning.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Upper bound on waiting for finite timing metadata before seeking.
    pub metadata_wait: Duration,
    pub metadata_poll: Duration,
    /// Settle time before reading the state a native play/pause produced.
    pub observe_delay: Duration,
    pub notifications: bool,
    /// Overrides each category's own display time.
    pub notification_duration: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            metadata_wait: Duration::from_secs(2),
            metadata_poll: Duration::from_millis(100),
            observe_delay: Duration::from_millis(150),
            notifications: true,
            notification_duration: None,
        }
    }
}

impl ExecutorConfig {
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            metadata_wait: settings.metadata_wait,
            notifications: settings.notifications_enabled,
            notification_duration: settings.notification_duration,
            ..Self::default()
        }
    }
}

struct ExecutorInner {
    page: Arc<dyn Page>,
    site: SiteEntry,
    player: watch::Receiver<Option<PlayerHandle>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    config: ExecutorConfig,
}

/// Applies [`MediaAction`]s to the current player.
#[derive(Clone)]
pub struct MediaExecutor {
    inner: Arc<ExecutorInner>,
}

impl MediaExecutor {
    pub fn new(
        page: Arc<dyn Page>,
        site: SiteEntry,
        player: watch::Receiver<Option<PlayerHandle>>,
        notifier: Option<Arc<dyn NotificationSink>>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                page,
                site,
                player,
                notifier,
                config,
            }),
        }
    }

    pub fn site(&self) -> &SiteEntry {
        &self.inner.site
    }

    pub fn page(&self) -> &Arc<dyn Page> {
        &self.inner.page
    }

    /// The current handle if still attached. On supported sites, any
    /// `<video>` on the page stands in while detection catches up.
    pub fn player(&self) -> Option<PlayerHandle> {
        self.inner.player()
    }

    pub fn execute(&self, action: &MediaAction) -> Outcome {
        debug!("[Executor] {}", action.name());
        match *action {
            MediaAction::SeekRelative { seconds } => self.seek_relative(seconds),
            MediaAction::SeekToPercentage { percent } => self.seek_to_percentage(percent),
            MediaAction::VolumeDelta { step } => self.volume_delta(step),
            MediaAction::ToggleMute => self.toggle_mute(),
            MediaAction::TogglePlayPause => self.toggle_play_pause(),
            MediaAction::ObservePlayPause => self.observe_play_pause(),
            MediaAction::ToggleCaptions => self.toggle_captions(),
            MediaAction::ToggleFullscreen => self.toggle_fullscreen(),
            MediaAction::SkipIntro => self.press_native(NativeControl::SkipIntro),
            MediaAction::NextEpisode => self.press_native(NativeControl::NextEpisode),
        }
    }

    pub fn seek_relative(&self, seconds: f64) -> Outcome {
        self.seek(SeekTarget::Relative(seconds))
    }

    /// `percent` must be within `[0, 100]`; anything else is refused.
    pub fn seek_to_percentage(&self, percent: f64) -> Outcome {
        if let Err(e) = validation::validate_percentage(percent) {
            warn!("[Executor] {}", e);
            return Outcome::NotApplied;
        }
        self.seek(SeekTarget::Percentage(percent))
    }

    fn seek(&self, target: SeekTarget) -> Outcome {
        let Some(player) = self.player() else {
            debug!("[Executor] No player for seek");
            return Outcome::NotApplied;
        };
        let video = player.video();

        if let Some(meta) = Metadata::read(self.inner.page.as_ref(), video) {
            return Outcome::from_bool(self.inner.apply_seek(video, target, meta));
        }

        let inner = self.inner.clone();
        Outcome::Deferred(
            async move {
                let page = inner.page.as_ref();
                let (wait, poll) = (inner.config.metadata_wait, inner.config.metadata_poll);
                let waited = fallback::wait_for_metadata(page, video, wait, poll).await;
                match waited {
                    Some(meta) => inner.apply_seek(video, target, meta),
                    None => {
                        debug!(
                            "[Executor] Metadata unavailable after {:?}, using site fallback",
                            inner.config.metadata_wait
                        );
                        inner.fallback_seek(video, target)
                    }
                }
            }
            .boxed(),
        )
    }

    pub fn volume_delta(&self, step: f64) -> Outcome {
        self.inner.guarded("volumeDelta", |page, player| {
            let video = player.video();
            let volume = (page.volume(video)? + step).clamp(0.0, 1.0);
            page.set_volume(video, volume)?;
            if step > 0.0 && page.muted(video)? {
                page.set_muted(video, false)?;
            }
            self.inner
                .notify("Volume", &format::volume_percent(volume), NotificationCategory::Volume);
            Ok(true)
        })
    }

    pub fn toggle_mute(&self) -> Outcome {
        self.inner.guarded("toggleMute", |page, player| {
            let video = player.video();
            let muted = !page.muted(video)?;
            if let Err(e) = page.set_muted(video, muted) {
                self.inner.click_site_control(self.inner.site.selectors.volume, "toggleMute", e)?;
            }
            let (title, message) = if muted {
                ("Muted", String::new())
            } else {
                ("Unmuted", format::volume_percent(page.volume(video)?))
            };
            self.inner.notify(title, &message, NotificationCategory::Volume);
            Ok(true)
        })
    }

    /// Pauses synchronously; playing is requested and settles later.
    pub fn toggle_play_pause(&self) -> Outcome {
        let Some(player) = self.player() else {
            return Outcome::NotApplied;
        };
        let page = self.inner.page.as_ref();
        let video = player.video();

        let paused = match page.paused(video) {
            Ok(paused) => paused,
            Err(e) => {
                warn!("[Executor] togglePlayPause failed: {}", e);
                return Outcome::NotApplied;
            }
        };

        let play_button = self.inner.site.selectors.play_button;
        if !paused {
            let result = page
                .pause(video)
                .or_else(|e| self.inner.click_site_control(play_button, "pause()", e).map(|_| ()));
            return match result {
                Ok(()) => {
                    self.inner.notify("Paused", "", NotificationCategory::Playback);
                    Outcome::Applied
                }
                Err(e) => {
                    warn!("[Executor] pause() failed: {}", e);
                    Outcome::NotApplied
                }
            };
        }

        let request = match page.play(video) {
            Ok(request) => request,
            Err(e) => {
                return match self.inner.click_site_control(play_button, "play()", e) {
                    Ok(_) => {
                        self.inner.notify("Playing", "", NotificationCategory::Playback);
                        Outcome::Applied
                    }
                    Err(e) => {
                        warn!("[Executor] play() failed: {}", e);
                        Outcome::NotApplied
                    }
                };
            }
        };
        let inner = self.inner.clone();
        Outcome::Deferred(
            async move {
                match request.await {
                    Ok(Ok(())) => {
                        inner.notify("Playing", "", NotificationCategory::Playback);
                        true
                    }
                    Ok(Err(e)) => {
                        warn!("[Executor] play() rejected: {}", e);
                        false
                    }
                    Err(_) => {
                        warn!("[Executor] play() request dropped by the page");
                        false
                    }
                }
            }
            .boxed(),
        )
    }

    /// For sites whose own space handler toggles playback: report the
    /// state it produced without touching the element.
    pub fn observe_play_pause(&self) -> Outcome {
        let Some(player) = self.player() else {
            return Outcome::NotApplied;
        };
        let video = player.video();
        let Ok(before) = self.inner.page.paused(video) else {
            return Outcome::NotApplied;
        };
        let inner = self.inner.clone();
        Outcome::Deferred(
            async move {
                tokio::time::sleep(inner.config.observe_delay).await;
                match inner.page.paused(video) {
                    Ok(after) if after != before => {
                        let title = if after { "Paused" } else { "Playing" };
                        inner.notify(title, "", NotificationCategory::Playback);
                        true
                    }
                    Ok(_) => false,
                    Err(e) => {
                        debug!("[Executor] Could not observe play state: {}", e);
                        false
                    }
                }
            }
            .boxed(),
        )
    }

    /// First text track if there is one, else the site's captions button.
    pub fn toggle_captions(&self) -> Outcome {
        self.inner.guarded("toggleCaptions", |page, player| {
            let video = player.video();
            let tracks = page.text_tracks(video)?;
            if let Some(first) = tracks.first() {
                let mode = if *first == TrackMode::Showing {
                    TrackMode::Hidden
                } else {
                    TrackMode::Showing
                };
                page.set_text_track_mode(video, 0, mode)?;
                let title = if mode == TrackMode::Showing { "Captions on" } else { "Captions off" };
                self.inner.notify(title, "", NotificationCategory::Captions);
                return Ok(true);
            }

            match dom::first_visible_match(page, self.inner.site.selectors.captions_button) {
                Some(button) => {
                    page.click(button)?;
                    self.inner.notify("Captions", "Toggled", NotificationCategory::Captions);
                    Ok(true)
                }
                None => {
                    debug!("[Executor] No text tracks or captions button");
                    Ok(false)
                }
            }
        })
    }

    /// Fullscreen API against the container; the site's own button when the
    /// API is denied.
    pub fn toggle_fullscreen(&self) -> Outcome {
        self.inner.guarded("toggleFullscreen", |page, player| {
            let button = self.inner.site.selectors.fullscreen_button;
            if page.fullscreen_element().is_some() {
                if let Err(e) = page.exit_fullscreen() {
                    self.inner.click_site_control(button, "exitFullscreen", e)?;
                }
                self.inner.notify("Exit fullscreen", "", NotificationCategory::Fullscreen);
            } else {
                if let Err(e) = page.request_fullscreen(player.container(page)) {
                    self.inner.click_site_control(button, "requestFullscreen", e)?;
                }
                self.inner.notify("Fullscreen", "", NotificationCategory::Fullscreen);
            }
            Ok(true)
        })
    }

    /// Whether the native control is present and visible right now.
    pub fn native_control_available(&self, control: NativeControl) -> bool {
        self.inner.native_control(control).is_some()
    }

    /// Whether captions can be toggled on the current player.
    pub fn captions_available(&self) -> bool {
        let page = self.inner.page.as_ref();
        let has_tracks = self
            .player()
            .and_then(|player| page.text_tracks(player.video()).ok())
            .is_some_and(|tracks| !tracks.is_empty());
        let button = dom::first_visible_match(page, self.inner.site.selectors.captions_button);
        has_tracks || button.is_some()
    }

    fn press_native(&self, control: NativeControl) -> Outcome {
        let Some(button) = self.inner.native_control(control) else {
            debug!("[Executor] {:?} control not present", control);
            return Outcome::NotApplied;
        };
        match self.inner.page.click(button) {
            Ok(()) => {
                let title = match control {
                    NativeControl::SkipIntro => "Skipped intro",
                    NativeControl::NextEpisode => "Next episode",
                };
                self.inner.notify(title, "", NotificationCategory::Navigation);
                Outcome::Applied
            }
            Err(e) => {
                warn!("[Executor] {:?} click failed: {}", control, e);
                Outcome::NotApplied
            }
        }
    }
}

impl ExecutorInner {
    fn player(&self) -> Option<PlayerHandle> {
        let page = self.page.as_ref();
        let current = self.player.borrow().clone();
        match current {
            Some(handle) if handle.is_live(page) => Some(handle),
            _ if self.site.is_supported() => dom::first_match(page, &["video"])
                .map(|video| PlayerHandle::new(video, None, self.site.id, ControlRefs::default())),
            _ => None,
        }
    }

    /// Runs a synchronous action against the current player, folding DOM
    /// errors into `NotApplied`.
    fn guarded(
        &self,
        action: &str,
        run: impl FnOnce(&dyn Page, &PlayerHandle) -> Result<bool, DomError>,
    ) -> Outcome {
        let Some(player) = self.player() else {
            debug!("[Executor] No player for {}", action);
            return Outcome::NotApplied;
        };
        match run(self.page.as_ref(), &player) {
            Ok(applied) => Outcome::from_bool(applied),
            Err(e) => {
                warn!("[Executor] {} failed: {}", action, e);
                Outcome::NotApplied
            }
        }
    }

    /// Presses the site's own control after the media API refused `action`;
    /// hands back the refusal when the site has no such control.
    fn click_site_control(
        &self,
        selectors: &[&str],
        action: &str,
        refused: DomError,
    ) -> Result<NodeId, DomError> {
        let Some(button) = dom::first_visible_match(self.page.as_ref(), selectors) else {
            return Err(refused);
        };
        info!("[Executor] {} refused ({}), pressing site control {}", action, refused, button);
        self.page.click(button)?;
        Ok(button)
    }

    fn apply_seek(&self, video: NodeId, target: SeekTarget, meta: Metadata) -> bool {
        let position = target.resolve(meta);
        match self.page.set_current_time(video, position) {
            Ok(()) => {
                self.notify_seek(target, Some(Metadata { current: position, ..meta }));
                true
            }
            Err(e) => {
                info!("[Executor] Direct seek refused ({}), using site fallback", e);
                self.fallback_seek(video, target)
            }
        }
    }

    fn fallback_seek(&self, video: NodeId, target: SeekTarget) -> bool {
        match fallback::fallback_seek(self.page.as_ref(), &self.site, video, target) {
            Some(FallbackSeek::NativeButtons { clicks }) => {
                debug!("[Executor] Seeked with {} native button click(s)", clicks);
                self.notify_seek(target, None);
                true
            }
            Some(FallbackSeek::SeekBar { fraction, estimate }) => {
                debug!("[Executor] Seeked via seek bar to {:.1}%", fraction * 100.0);
                let landed = estimate.map(|meta| Metadata {
                    current: fraction * meta.duration,
                    duration: meta.duration,
                });
                self.notify_seek(target, landed);
                true
            }
            None => {
                warn!("[Executor] No seek strategy available on {}", self.site.name);
                false
            }
        }
    }

    fn notify_seek(&self, target: SeekTarget, landed: Option<Metadata>) {
        let title = match target {
            SeekTarget::Relative(delta) => format::seek_title(delta),
            SeekTarget::Percentage(percent) => format!("Jump to {percent:.0}%"),
        };
        let message = landed
            .map(|meta| format::position_summary(meta.current, meta.duration))
            .unwrap_or_default();
        self.notify(&title, &message, NotificationCategory::Seek);
    }

    fn native_control(&self, control: NativeControl) -> Option<NodeId> {
        let page = self.page.as_ref();
        let (stored, selectors) = {
            let refs = self
                .player
                .borrow()
                .as_ref()
                .map(|handle| handle.controls())
                .unwrap_or_default();
            match control {
                NativeControl::SkipIntro => (refs.skip_intro, self.site.selectors.skip_intro),
                NativeControl::NextEpisode => (refs.next_episode, self.site.selectors.next_episode),
            }
        };
        stored
            .filter(|node| page.is_connected(*node) && page.is_displayed(*node))
            .or_else(|| dom::first_visible_match(page, selectors))
    }

    fn notify(&self, title: &str, message: &str, category: NotificationCategory) {
        if !self.config.notifications {
            return;
        }
        if let Some(notifier) = &self.notifier {
            let duration = self
                .config
                .notification_duration
                .unwrap_or_else(|| category.default_duration());
            notifier.show(title, message, category, duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ClickEffect, ElementSpec, RecordingNotifier, SimMedia, SimPage};
    use crate::sites::SiteRegistry;

    struct Fixture {
        page: Arc<SimPage>,
        video: NodeId,
        notifier: Arc<RecordingNotifier>,
        executor: MediaExecutor,
        _player: watch::Sender<Option<PlayerHandle>>,
    }

    fn fixture(url: &str, media: SimMedia) -> Fixture {
        let page = Arc::new(SimPage::new(url).unwrap());
        let container = page.append(page.root(), ElementSpec::new("div").class("player"));
        let video = page.append_media(container, ElementSpec::new("video"), media);
        let site = *SiteRegistry::builtin().lookup(&page.hostname());
        let handle = PlayerHandle::new(video, Some(container), site.id, ControlRefs::default());
        let (tx, rx) = watch::channel(Some(handle));
        let notifier = Arc::new(RecordingNotifier::new());
        let executor = MediaExecutor::new(
            page.clone(),
            site,
            rx,
            Some(notifier.clone()),
            ExecutorConfig::default(),
        );
        Fixture {
            page,
            video,
            notifier,
            executor,
            _player: tx,
        }
    }

    fn current_time(f: &Fixture) -> f64 {
        f.page.media_state(f.video).unwrap().current_time
    }

    #[tokio::test]
    async fn seek_backward_clamps_at_zero() {
        let f = fixture("https://example.org/", SimMedia::new(200.0).at(2.0));
        assert!(f.executor.seek_relative(-5.0).resolve().await);
        assert_eq!(current_time(&f), 0.0);
    }

    #[tokio::test]
    async fn seek_forward_clamps_at_duration() {
        let f = fixture("https://example.org/", SimMedia::new(200.0).at(198.0));
        assert!(matches!(f.executor.seek_relative(5.0), Outcome::Applied));
        assert_eq!(current_time(&f), 200.0);
        let shown = f.notifier.last().unwrap();
        assert_eq!(shown.title, "Forward 5s");
        assert_eq!(shown.message, "3:20 / 3:20 (100%)");
    }

    #[tokio::test]
    async fn seek_to_percentage_of_duration() {
        let f = fixture("https://example.org/", SimMedia::new(200.0));
        assert!(f.executor.seek_to_percentage(50.0).resolve().await);
        assert_eq!(current_time(&f), 100.0);
    }

    #[test]
    fn seek_to_percentage_rejects_out_of_range() {
        let f = fixture("https://example.org/", SimMedia::new(200.0));
        assert!(matches!(f.executor.seek_to_percentage(150.0), Outcome::NotApplied));
        assert_eq!(current_time(&f), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn seek_waits_for_metadata() {
        let f = fixture("https://example.org/", SimMedia::default().at(10.0));
        let outcome = f.executor.seek_relative(5.0);
        assert!(outcome.is_deferred());

        let page = f.page.clone();
        let video = f.video;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            page.update_media(video, |m| m.duration = 100.0);
        });

        assert!(outcome.resolve().await);
        assert_eq!(current_time(&f), 15.0);
    }

    #[tokio::test(start_paused = true)]
    async fn seek_falls_back_when_metadata_never_arrives() {
        let f = fixture("https://www.netflix.com/watch/1", SimMedia::default().at(50.0));
        let forward = f.page.append(
            f.page.root(),
            ElementSpec::new("button").attr("data-uia", "control-forward10"),
        );

        let started = tokio::time::Instant::now();
        assert!(f.executor.seek_relative(10.0).resolve().await);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(f.page.journal().count(&format!("click {forward}")), 1);
    }

    #[tokio::test]
    async fn refused_seek_uses_native_buttons() {
        let mut media = SimMedia::new(300.0).at(100.0);
        media.seek_blocked = true;
        let f = fixture("https://www.netflix.com/watch/1", media);
        let back = f.page.append(
            f.page.root(),
            ElementSpec::new("button").attr("data-uia", "control-back10"),
        );
        f.page.on_click(back, ClickEffect::SeekBy { media: f.video, seconds: -10.0 });

        assert!(f.executor.seek_relative(-10.0).resolve().await);
        assert_eq!(current_time(&f), 90.0);
    }

    #[test]
    fn volume_is_clamped() {
        let mut media = SimMedia::new(10.0);
        media.volume = 0.95;
        let f = fixture("https://example.org/", media);
        assert!(matches!(f.executor.volume_delta(0.1), Outcome::Applied));
        assert_eq!(f.page.media_state(f.video).unwrap().volume, 1.0);

        f.page.update_media(f.video, |m| m.volume = 0.05);
        f.executor.volume_delta(-0.1);
        assert_eq!(f.page.media_state(f.video).unwrap().volume, 0.0);
        assert_eq!(f.notifier.last().unwrap().message, "0%");
    }

    #[test]
    fn volume_up_unmutes() {
        let mut media = SimMedia::new(10.0);
        media.volume = 0.5;
        media.muted = true;
        let f = fixture("https://example.org/", media);
        f.executor.volume_delta(0.1);
        assert!(!f.page.media_state(f.video).unwrap().muted);
    }

    #[test]
    fn toggle_mute_twice_restores_state() {
        let f = fixture("https://example.org/", SimMedia::new(10.0));
        f.executor.toggle_mute();
        assert!(f.page.media_state(f.video).unwrap().muted);
        f.executor.toggle_mute();
        assert!(!f.page.media_state(f.video).unwrap().muted);
    }

    #[tokio::test]
    async fn play_pause_round_trip() {
        let f = fixture("https://example.org/", SimMedia::new(10.0));
        let outcome = f.executor.toggle_play_pause();
        assert!(outcome.is_deferred());
        assert!(outcome.resolve().await);
        assert!(!f.page.media_state(f.video).unwrap().paused);

        assert!(matches!(f.executor.toggle_play_pause(), Outcome::Applied));
        assert!(f.page.media_state(f.video).unwrap().paused);
    }

    #[tokio::test]
    async fn rejected_play_resolves_false() {
        let mut media = SimMedia::new(10.0);
        media.autoplay_blocked = true;
        let f = fixture("https://example.org/", media);
        assert!(!f.executor.toggle_play_pause().resolve().await);
        assert!(f.notifier.shown().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn observe_reports_native_toggle() {
        let f = fixture("https://www.netflix.com/watch/1", SimMedia::new(10.0));
        let outcome = f.executor.observe_play_pause();
        f.page.update_media(f.video, |m| m.paused = false);
        assert!(outcome.resolve().await);
        assert_eq!(f.notifier.last().unwrap().title, "Playing");
        assert_eq!(f.page.journal().count("play"), 0);
    }

    #[test]
    fn captions_toggle_first_track() {
        let mut media = SimMedia::new(10.0);
        media.tracks = vec![TrackMode::Disabled, TrackMode::Showing];
        let f = fixture("https://example.org/", media);
        assert!(matches!(f.executor.toggle_captions(), Outcome::Applied));
        assert_eq!(
            f.page.media_state(f.video).unwrap().tracks,
            vec![TrackMode::Showing, TrackMode::Showing]
        );
    }

    #[test]
    fn captions_fall_back_to_button_or_noop() {
        let f = fixture("https://example.org/", SimMedia::new(10.0));
        assert!(matches!(f.executor.toggle_captions(), Outcome::NotApplied));

        let button = f
            .page
            .append(f.page.root(), ElementSpec::new("button").class("captions-toggle"));
        f.page.on_click(button, ClickEffect::ToggleCaptions { media: f.video });
        assert!(matches!(f.executor.toggle_captions(), Outcome::Applied));
        assert_eq!(f.page.journal().count(&format!("click {button}")), 1);
    }

    #[test]
    fn fullscreen_targets_container_and_survives_denial() {
        let f = fixture("https://example.org/", SimMedia::new(10.0));
        assert!(matches!(f.executor.toggle_fullscreen(), Outcome::Applied));
        assert_eq!(f.page.fullscreen_element(), f.page.parent(f.video));
        assert!(matches!(f.executor.toggle_fullscreen(), Outcome::Applied));
        assert_eq!(f.page.fullscreen_element(), None);

        f.page.deny_fullscreen(true);
        assert!(matches!(f.executor.toggle_fullscreen(), Outcome::NotApplied));
    }

    #[test]
    fn denied_fullscreen_presses_site_button() {
        let f = fixture("https://www.youtube.com/watch?v=1", SimMedia::new(10.0));
        let button = f
            .page
            .append(f.page.root(), ElementSpec::new("button").class("ytp-fullscreen-button"));
        f.page.deny_fullscreen(true);
        assert!(matches!(f.executor.toggle_fullscreen(), Outcome::Applied));
        assert_eq!(f.page.journal().count(&format!("click {button}")), 1);
        assert_eq!(f.notifier.last().unwrap().title, "Fullscreen");
    }

    #[test]
    fn blocked_mute_presses_site_volume_control() {
        let mut media = SimMedia::new(10.0);
        media.controls_blocked = true;
        let f = fixture("https://www.youtube.com/watch?v=1", media);
        assert!(matches!(f.executor.toggle_mute(), Outcome::NotApplied));

        let button = f
            .page
            .append(f.page.root(), ElementSpec::new("button").class("ytp-mute-button"));
        f.page.on_click(button, ClickEffect::ToggleMute { media: f.video });
        assert!(matches!(f.executor.toggle_mute(), Outcome::Applied));
        assert!(f.page.media_state(f.video).unwrap().muted);
    }

    #[tokio::test]
    async fn blocked_play_pause_presses_site_play_button() {
        let mut media = SimMedia::new(10.0);
        media.controls_blocked = true;
        let f = fixture("https://www.youtube.com/watch?v=1", media);
        let button = f
            .page
            .append(f.page.root(), ElementSpec::new("button").class("ytp-play-button"));
        f.page.on_click(button, ClickEffect::TogglePlay { media: f.video });

        assert!(f.executor.toggle_play_pause().resolve().await);
        assert!(!f.page.media_state(f.video).unwrap().paused);
        assert!(matches!(f.executor.toggle_play_pause(), Outcome::Applied));
        assert!(f.page.media_state(f.video).unwrap().paused);
        assert_eq!(f.page.journal().count(&format!("click {button}")), 2);
    }

    #[test]
    fn absent_player_fails_fast_on_generic_site() {
        let f = fixture("https://example.org/", SimMedia::new(10.0));
        f.page.remove(f.video);
        assert!(f.executor.player().is_none());
        assert!(matches!(f.executor.toggle_mute(), Outcome::NotApplied));
    }

    #[test]
    fn supported_site_uses_any_video_while_detection_lags() {
        let page = Arc::new(SimPage::new("https://www.youtube.com/watch?v=1").unwrap());
        let video = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(10.0));
        let site = *SiteRegistry::builtin().lookup("www.youtube.com");
        let (_tx, rx) = watch::channel(None);
        let executor = MediaExecutor::new(page.clone(), site, rx, None, ExecutorConfig::default());
        assert!(matches!(executor.toggle_mute(), Outcome::Applied));
        assert!(page.media_state(video).unwrap().muted);
    }

    #[test]
    fn skip_intro_requires_visible_button() {
        let f = fixture("https://www.netflix.com/watch/1", SimMedia::new(10.0));
        assert!(!f.executor.native_control_available(NativeControl::SkipIntro));

        let skip = f.page.append(
            f.page.root(),
            ElementSpec::new("button").attr("data-uia", "player-skip-intro").hidden(),
        );
        assert!(!f.executor.native_control_available(NativeControl::SkipIntro));
        f.page.set_hidden(skip, false);
        assert!(f.executor.native_control_available(NativeControl::SkipIntro));
        assert!(matches!(f.executor.execute(&MediaAction::SkipIntro), Outcome::Applied));
        assert_eq!(f.notifier.last().unwrap().title, "Skipped intro");
    }

    #[test]
    fn notifications_respect_toggle() {
        let page = Arc::new(SimPage::new("https://example.org/").unwrap());
        let video = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(10.0));
        let site = *SiteRegistry::builtin().lookup("example.org");
        let handle = PlayerHandle::new(video, None, site.id, ControlRefs::default());
        let (_tx, rx) = watch::channel(Some(handle));
        let notifier = Arc::new(RecordingNotifier::new());
        let config = ExecutorConfig {
            notifications: false,
            ..ExecutorConfig::default()
        };
        let executor = MediaExecutor::new(page.clone(), site, rx, Some(notifier.clone()), config);
        executor.toggle_mute();
        assert!(notifier.shown().is_empty());
        assert!(page.media_state(video).unwrap().muted);
    }
}
