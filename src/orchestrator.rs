//! Orchestrator
//!
//! Owns one pipeline per page: waits for settings, builds the locator,
//! executor and arbitrator, and wires the locator's handle channel into the
//! executor. Failed startups are retried with exponential backoff up to a
//! fixed ceiling, after which the page stays inert. In-page navigation tears
//! the pipeline down and rebuilds it once the new page has settled.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dom::Page;
use crate::error::StartupError;
use crate::keyboard::{
    EventControl, IgnoreReason, KeyDisposition, KeyEvent, KeyMap, KeyboardArbitrator,
};
use crate::media::{ExecutorConfig, MediaExecutor, NativeControl, Outcome};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::notifications::NotificationSink;
use crate::player::{LocatorConfig, PlayerLocator};
use crate::settings::{PipelineSettings, SettingsProvider};
use crate::sites::{SiteEntry, SiteRegistry};

/// Startup and lifecycle tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// How long one attempt waits for settings to finish loading.
    pub settings_timeout: Duration,
    /// Delay between a detected navigation and the rebuild.
    pub navigation_settle: Duration,
    pub location_poll: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            settings_timeout: Duration::from_secs(5),
            navigation_settle: Duration::from_millis(500),
            location_poll: Duration::from_secs(1),
        }
    }
}

impl OrchestratorConfig {
    /// Delay after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Site features currently usable on the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableFeatures {
    pub skip_intro: bool,
    pub next_episode: bool,
    pub captions: bool,
}

/// Snapshot for status consumers such as a popup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub session_id: Uuid,
    pub initialized: bool,
    pub site_name: String,
    pub supported_site: bool,
    pub keyboard_enabled: bool,
    pub player_connected: bool,
    pub features: AvailableFeatures,
    pub startup_attempts: u32,
    pub gave_up: bool,
    pub metrics: MetricsSnapshot,
}

struct Pipeline {
    site: SiteEntry,
    locator: Arc<PlayerLocator>,
    executor: MediaExecutor,
    /// Locked on its own so key handling (and the notifications it emits)
    /// never runs under the state lock.
    arbitrator: Arc<Mutex<KeyboardArbitrator>>,
    cancel: CancellationToken,
}

struct State {
    pipeline: Option<Pipeline>,
    attempts: u32,
    gave_up: bool,
    keyboard_enabled: bool,
}

/// Builds and supervises the keyboard pipeline for one page.
pub struct Orchestrator {
    page: Arc<dyn Page>,
    registry: SiteRegistry,
    settings: Arc<dyn SettingsProvider>,
    notifier: Option<Arc<dyn NotificationSink>>,
    config: OrchestratorConfig,
    session_id: Uuid,
    metrics: PipelineMetrics,
    shutdown: CancellationToken,
    state: Mutex<State>,
}

impl Orchestrator {
    pub fn new(
        page: Arc<dyn Page>,
        registry: SiteRegistry,
        settings: Arc<dyn SettingsProvider>,
        notifier: Option<Arc<dyn NotificationSink>>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            page,
            registry,
            settings,
            notifier,
            config,
            session_id: Uuid::new_v4(),
            metrics: PipelineMetrics::new(),
            shutdown: CancellationToken::new(),
            state: Mutex::new(State {
                pipeline: None,
                attempts: 0,
                gave_up: false,
                keyboard_enabled: true,
            }),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Runs the startup sequence with retries. On exhaustion the page stays
    /// inert and exactly one error is logged.
    pub async fn start(&self) -> Result<(), StartupError> {
        {
            let mut state = self.state.lock();
            state.attempts = 0;
            state.gave_up = false;
        }

        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            self.state.lock().attempts = attempt;
            debug!("[Orchestrator] Startup attempt {}/{}", attempt, max_attempts);

            match self.build_pipeline().await {
                Ok(pipeline) => {
                    info!(
                        "[Orchestrator] Pipeline ready on {} (session {}, attempt {})",
                        pipeline.site.name, self.session_id, attempt
                    );
                    self.install(pipeline);
                    return Ok(());
                }
                Err(e) => {
                    if attempt < max_attempts {
                        let delay = self.config.backoff(attempt);
                        warn!(
                            "[Orchestrator] Startup attempt {}/{} failed: {}; retrying in {:?}",
                            attempt, max_attempts, e, delay
                        );
                        tokio::select! {
                            _ = self.shutdown.cancelled() => return Err(e),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    last_error = Some(e);
                }
            }
        }

        self.state.lock().gave_up = true;
        match last_error {
            Some(e) => error!(
                "[Orchestrator] Startup gave up after {} attempts, keyboard control disabled: {}",
                max_attempts, e
            ),
            None => error!("[Orchestrator] Startup gave up after {} attempts", max_attempts),
        }
        Err(StartupError::GaveUp {
            attempts: max_attempts,
        })
    }

    async fn build_pipeline(&self) -> Result<Pipeline, StartupError> {
        tokio::time::timeout(self.config.settings_timeout, self.settings.wait_until_loaded())
            .await
            .map_err(|_| StartupError::SettingsTimeout(self.config.settings_timeout))??;
        let settings = PipelineSettings::from_provider(self.settings.as_ref())?;

        let site = *self.registry.lookup(&self.page.hostname());
        let keymap = Arc::new(KeyMap::for_site(&site, &settings)?);

        let locator = Arc::new(PlayerLocator::new(
            self.page.clone(),
            site,
            LocatorConfig {
                rescan_debounce: settings.rescan_debounce,
                location_poll: self.config.location_poll,
            },
        ));
        locator.rescan();

        let executor = MediaExecutor::new(
            self.page.clone(),
            site,
            locator.subscribe(),
            self.notifier.clone(),
            ExecutorConfig::from_settings(&settings),
        );
        let arbitrator =
            KeyboardArbitrator::new(executor.clone(), keymap, settings.retrigger_interval)
                .with_metrics(self.metrics.clone());

        Ok(Pipeline {
            site,
            locator,
            executor,
            arbitrator: Arc::new(Mutex::new(arbitrator)),
            cancel: self.shutdown.child_token(),
        })
    }

    fn install(&self, pipeline: Pipeline) {
        tokio::spawn(pipeline.locator.clone().run(pipeline.cancel.clone()));
        let previous = {
            let mut state = self.state.lock();
            // Not shared yet, so this lock is uncontended.
            pipeline.arbitrator.lock().set_enabled(state.keyboard_enabled);
            state.pipeline.replace(pipeline)
        };
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
    }

    /// Stops the locator and drops the pipeline; keys are ignored until the
    /// next successful start.
    pub fn teardown(&self) {
        let pipeline = self.state.lock().pipeline.take();
        if let Some(pipeline) = pipeline {
            pipeline.cancel.cancel();
            pipeline.locator.clear();
            debug!("[Orchestrator] Pipeline for {} torn down", pipeline.site.name);
        }
    }

    /// Starts the pipeline, then rebuilds it after every in-page navigation
    /// until `cancel` fires or a restart gives up.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let started = tokio::select! {
            _ = cancel.cancelled() => false,
            result = self.start() => result.is_ok(),
        };

        while started {
            let navigations = self.state.lock().pipeline.as_ref().map(|p| p.locator.navigations());
            let Some(mut navigations) = navigations else {
                break;
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = navigations.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            let location = navigations.borrow_and_update().clone();
            info!("[Orchestrator] Navigation to {}, rebuilding pipeline", location);
            self.teardown();

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.navigation_settle) => {}
            }

            let restarted = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.start() => result.is_ok(),
            };
            if !restarted {
                break;
            }
        }

        debug!("[Orchestrator] Supervisor stopped");
    }

    /// Entry point for keydown events. Deferred work is spawned so it
    /// completes even if the caller drops the returned disposition.
    pub fn handle_key_down(
        &self,
        event: &KeyEvent,
        control: &mut dyn EventControl,
    ) -> KeyDisposition {
        let Some(arbitrator) = self.arbitrator() else {
            self.metrics.record_ignored();
            return KeyDisposition::Ignored(IgnoreReason::Inactive);
        };
        let disposition = arbitrator.lock().handle_key_down(event, control);

        match disposition {
            KeyDisposition::Dispatched {
                action,
                outcome: Outcome::Deferred(pending),
                suppressed,
            } => {
                let metrics = self.metrics.clone();
                let task = tokio::spawn(async move {
                    let applied = pending.await;
                    if !applied {
                        debug!("[Orchestrator] Deferred {} was not applied", action.name());
                        metrics.record_failure();
                    }
                    applied
                });
                KeyDisposition::Dispatched {
                    action,
                    outcome: Outcome::Deferred(async move { task.await.unwrap_or(false) }.boxed()),
                    suppressed,
                }
            }
            other => other,
        }
    }

    fn arbitrator(&self) -> Option<Arc<Mutex<KeyboardArbitrator>>> {
        self.state.lock().pipeline.as_ref().map(|p| p.arbitrator.clone())
    }

    /// Toggled externally, e.g. from a popup.
    pub fn set_enabled(&self, enabled: bool) {
        let arbitrator = {
            let mut state = self.state.lock();
            state.keyboard_enabled = enabled;
            state.pipeline.as_ref().map(|p| p.arbitrator.clone())
        };
        if let Some(arbitrator) = arbitrator {
            arbitrator.lock().set_enabled(enabled);
        }
        info!("[Orchestrator] Keyboard control {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Re-reads settings and swaps in a freshly built key table.
    pub fn reload_keymap(&self) -> Result<(), StartupError> {
        let settings = PipelineSettings::from_provider(self.settings.as_ref())?;
        let current = {
            let state = self.state.lock();
            state.pipeline.as_ref().map(|p| (p.site, p.arbitrator.clone()))
        };
        if let Some((site, arbitrator)) = current {
            let keymap = KeyMap::for_site(&site, &settings)?;
            arbitrator.lock().replace_keymap(Arc::new(keymap));
        }
        Ok(())
    }

    pub fn status(&self) -> PipelineStatus {
        let state = self.state.lock();
        let site = state
            .pipeline
            .as_ref()
            .map(|p| p.site)
            .unwrap_or_else(|| *self.registry.lookup(&self.page.hostname()));

        let (player_connected, features) = match state.pipeline.as_ref() {
            Some(pipeline) => {
                let executor = &pipeline.executor;
                (
                    pipeline.locator.current().is_some(),
                    AvailableFeatures {
                        skip_intro: executor.native_control_available(NativeControl::SkipIntro),
                        next_episode: executor.native_control_available(NativeControl::NextEpisode),
                        captions: executor.captions_available(),
                    },
                )
            }
            None => (false, AvailableFeatures::default()),
        };

        PipelineStatus {
            session_id: self.session_id,
            initialized: state.pipeline.is_some(),
            site_name: site.name.to_string(),
            supported_site: site.is_supported(),
            keyboard_enabled: state.keyboard_enabled,
            player_connected,
            features,
            startup_attempts: state.attempts,
            gave_up: state.gave_up,
            metrics: self.metrics.snapshot(),
        }
    }

    /// Cancels every background task and drops the pipeline.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.teardown();
        info!("[Orchestrator] Shut down session {}", self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationCategory;
    use crate::settings::{keys, StoredSettings};
    use crate::sim::{ElementSpec, RecordingControl, SimMedia, SimPage};
    use serde_json::json;

    fn orchestrator(page: &Arc<SimPage>, settings: Arc<dyn SettingsProvider>) -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(
            page.clone(),
            SiteRegistry::builtin(),
            settings,
            None,
            OrchestratorConfig::default(),
        ))
    }

    /// Sink that reads the status back while a notification is shown.
    #[derive(Default)]
    struct StatusReadingSink {
        orchestrator: std::sync::OnceLock<std::sync::Weak<Orchestrator>>,
        seen: Mutex<Vec<(String, bool)>>,
    }

    impl NotificationSink for StatusReadingSink {
        fn show(
            &self,
            title: &str,
            _message: &str,
            _category: NotificationCategory,
            _duration: Duration,
        ) {
            if let Some(orchestrator) = self.orchestrator.get().and_then(|weak| weak.upgrade()) {
                let status = orchestrator.status();
                self.seen.lock().push((title.to_string(), status.player_connected));
            }
        }
    }

    #[tokio::test]
    async fn notification_sink_may_read_status() {
        let page = Arc::new(SimPage::new("https://www.youtube.com/watch?v=1").unwrap());
        page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(60.0));
        let sink = Arc::new(StatusReadingSink::default());
        let orchestrator = Arc::new(Orchestrator::new(
            page.clone(),
            SiteRegistry::builtin(),
            Arc::new(StoredSettings::in_memory()),
            Some(sink.clone()),
            OrchestratorConfig::default(),
        ));
        let _ = sink.orchestrator.set(Arc::downgrade(&orchestrator));
        orchestrator.start().await.unwrap();

        let mut control = RecordingControl::new(page.journal().clone());
        orchestrator.handle_key_down(&KeyEvent::code("KeyM"), &mut control);
        assert_eq!(*sink.seen.lock(), vec![("Muted".to_string(), true)]);
        orchestrator.shutdown();
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.backoff(1), Duration::from_secs(1));
        assert_eq!(config.backoff(2), Duration::from_secs(2));
        assert_eq!(config.backoff(4), Duration::from_secs(8));
        assert_eq!(config.backoff(5), Duration::from_secs(10));
        assert_eq!(config.backoff(40), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn starts_and_reports_status() {
        let page = Arc::new(SimPage::new("https://www.youtube.com/watch?v=1").unwrap());
        page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(60.0));
        let orchestrator = orchestrator(&page, Arc::new(StoredSettings::in_memory()));

        assert!(!orchestrator.status().initialized);
        orchestrator.start().await.unwrap();

        let status = orchestrator.status();
        assert!(status.initialized);
        assert!(status.player_connected);
        assert!(status.supported_site);
        assert_eq!(status.site_name, "YouTube");
        assert_eq!(status.startup_attempts, 1);
        assert!(!status.features.skip_intro);
        orchestrator.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_settings_load() {
        let page = Arc::new(SimPage::new("https://example.org/").unwrap());
        let settings = Arc::new(StoredSettings::pending());
        let orchestrator = orchestrator(&page, settings.clone());

        let loader = tokio::spawn({
            let settings = settings.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(7)).await;
                settings.finish_loading(Ok(()));
            }
        });

        orchestrator.start().await.unwrap();
        loader.await.unwrap();
        assert_eq!(orchestrator.status().startup_attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_settings_exhaust_attempts() {
        let page = Arc::new(SimPage::new("https://example.org/").unwrap());
        let settings = Arc::new(StoredSettings::in_memory());
        settings.set(keys::SEEK_AMOUNT, json!(-1));
        let orchestrator = orchestrator(&page, settings);

        let err = orchestrator.start().await.unwrap_err();
        assert!(matches!(err, StartupError::GaveUp { attempts: 5 }));
        let status = orchestrator.status();
        assert!(status.gave_up);
        assert!(!status.initialized);

        let page_journal = page.journal().clone();
        let mut control = RecordingControl::new(page_journal);
        assert!(matches!(
            orchestrator.handle_key_down(&KeyEvent::code("KeyM"), &mut control),
            KeyDisposition::Ignored(IgnoreReason::Inactive)
        ));
        assert!(!control.touched());
    }

    #[tokio::test]
    async fn disabled_keyboard_survives_restart() {
        let page = Arc::new(SimPage::new("https://example.org/").unwrap());
        let video = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(60.0));
        let orchestrator = orchestrator(&page, Arc::new(StoredSettings::in_memory()));
        orchestrator.set_enabled(false);
        orchestrator.start().await.unwrap();

        let mut control = RecordingControl::new(page.journal().clone());
        assert!(matches!(
            orchestrator.handle_key_down(&KeyEvent::code("KeyM"), &mut control),
            KeyDisposition::Ignored(IgnoreReason::Disabled)
        ));
        orchestrator.set_enabled(true);
        orchestrator.handle_key_down(&KeyEvent::code("KeyM"), &mut control);
        assert!(page.media_state(video).unwrap().muted);
        orchestrator.shutdown();
    }

    #[tokio::test]
    async fn reload_applies_new_seek_amount() {
        let page = Arc::new(SimPage::new("https://example.org/").unwrap());
        let media = SimMedia::new(100.0).at(50.0);
        let video = page.append_media(page.root(), ElementSpec::new("video"), media);
        let settings = Arc::new(StoredSettings::in_memory());
        let orchestrator = orchestrator(&page, settings.clone());
        orchestrator.start().await.unwrap();

        settings.set(keys::SEEK_AMOUNT, json!(20));
        orchestrator.reload_keymap().unwrap();

        let mut control = RecordingControl::new(page.journal().clone());
        orchestrator.handle_key_down(&KeyEvent::code("ArrowRight"), &mut control);
        assert_eq!(page.media_state(video).unwrap().current_time, 70.0);
        orchestrator.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_rebuilds_pipeline() {
        let page = Arc::new(SimPage::new("https://www.youtube.com/watch?v=1").unwrap());
        let first = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(60.0));
        let orchestrator = orchestrator(&page, Arc::new(StoredSettings::in_memory()));
        let cancel = CancellationToken::new();
        let supervisor = tokio::spawn(orchestrator.clone().run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(orchestrator.status().initialized);

        page.remove(first);
        let second = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(90.0));
        page.set_location("https://www.youtube.com/watch?v=2").unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        let status = orchestrator.status();
        assert!(status.initialized);
        assert!(status.player_connected);

        let mut control = RecordingControl::new(page.journal().clone());
        orchestrator.handle_key_down(&KeyEvent::code("KeyM"), &mut control);
        assert!(page.media_state(second).unwrap().muted);

        cancel.cancel();
        supervisor.await.unwrap();
        orchestrator.shutdown();
    }
}
