//! Player Locator
//!
//! Keeps exactly one current [`PlayerHandle`] in a `watch` channel. A scan
//! tries the site's video selectors in order and falls back to a plain
//! `video` query. Re-scans are triggered by relevant DOM mutations (batched
//! into one scan per debounce window), by location changes found by polling,
//! and by the page becoming visible or focused again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast::error::RecvError, watch};
use tokio::time::{sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handle::{ControlRefs, PlayerHandle};
use crate::dom::{self, MutationKind, NodeId, Page, PageEvent};
use crate::sites::SiteEntry;

const FALLBACK_VIDEO_SELECTOR: &str = "video";
const WATCHED_ATTRIBUTES: &[&str] = &["src", "class", "id"];

/// Re-scan timing.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Mutations inside this window collapse into one re-scan.
    pub rescan_debounce: Duration,
    /// Location polling period for in-page navigation.
    pub location_poll: Duration,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            rescan_debounce: Duration::from_millis(500),
            location_poll: Duration::from_secs(1),
        }
    }
}

/// Tracks the page's active video element.
pub struct PlayerLocator {
    page: Arc<dyn Page>,
    site: SiteEntry,
    config: LocatorConfig,
    current: watch::Sender<Option<PlayerHandle>>,
    location: watch::Sender<String>,
}

impl PlayerLocator {
    pub fn new(page: Arc<dyn Page>, site: SiteEntry, config: LocatorConfig) -> Self {
        let (current, _) = watch::channel(None);
        let (location, _) = watch::channel(page.location());
        Self {
            page,
            site,
            config,
            current,
            location,
        }
    }

    /// Receiver for handle replacements.
    pub fn subscribe(&self) -> watch::Receiver<Option<PlayerHandle>> {
        self.current.subscribe()
    }

    /// Receiver that changes whenever in-page navigation is detected.
    pub fn navigations(&self) -> watch::Receiver<String> {
        self.location.subscribe()
    }

    pub fn current(&self) -> Option<PlayerHandle> {
        self.current.borrow().clone()
    }

    /// One detection pass; never fails.
    pub fn scan(&self) -> Option<PlayerHandle> {
        let page = self.page.as_ref();
        let video = self
            .find_video(self.site.selectors.video)
            .or_else(|| self.find_video(&[FALLBACK_VIDEO_SELECTOR]))?;

        let container = self.site.selectors.container.iter().find_map(|selector| {
            match page.closest(video, selector) {
                Ok(found) => found.filter(|node| *node != video),
                Err(e) => {
                    warn!("[Locator] Container selector '{}' failed: {}", selector, e);
                    None
                }
            }
        });

        let controls = ControlRefs {
            skip_intro: dom::first_match(page, self.site.selectors.skip_intro),
            next_episode: dom::first_match(page, self.site.selectors.next_episode),
        };

        Some(PlayerHandle::new(video, container, self.site.id, controls))
    }

    fn find_video(&self, selectors: &[&str]) -> Option<NodeId> {
        let page = self.page.as_ref();
        for selector in selectors {
            let nodes = match page.query_selector_all(selector) {
                Ok(nodes) => nodes,
                Err(e) => {
                    warn!("[Locator] Video selector '{}' failed: {}", selector, e);
                    continue;
                }
            };
            let connected: Vec<NodeId> =
                nodes.into_iter().filter(|n| page.is_connected(*n)).collect();
            // Prefer a rendered element; background preview players are often hidden.
            let chosen = connected
                .iter()
                .copied()
                .find(|n| page.is_displayed(*n))
                .or_else(|| connected.first().copied());
            if chosen.is_some() {
                return chosen;
            }
        }
        None
    }

    /// Scans and replaces the current handle if the video element changed
    /// (or disappeared). Returns true when dependents were notified.
    pub fn rescan(&self) -> bool {
        let found = self.scan();
        let changed = self.current.send_if_modified(|current| match (current.as_ref(), found) {
            (Some(old), Some(new)) if old.same_element(&new) => false,
            (None, None) => false,
            (_, next) => {
                *current = next;
                true
            }
        });
        if changed {
            match self.current.borrow().as_ref() {
                Some(handle) => info!(
                    "[Locator] Player connected: video={} site={:?}",
                    handle.video(),
                    handle.site()
                ),
                None => info!("[Locator] Player lost, controls inert until a video reappears"),
            }
        }
        changed
    }

    /// Drops the current handle.
    pub fn clear(&self) {
        self.current.send_if_modified(|current| current.take().is_some());
    }

    /// Polls the location; on change, records it and re-scans.
    pub fn check_location(&self) -> bool {
        let location = self.page.location();
        let changed = self.location.send_if_modified(|last| {
            if *last != location {
                *last = location.clone();
                true
            } else {
                false
            }
        });
        if changed {
            info!("[Locator] Navigation detected: {}", location);
            self.rescan();
        }
        changed
    }

    /// Re-scan loop; returns when `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut events = self.page.subscribe();
        let mut feed_open = true;
        let mut poll = tokio::time::interval(self.config.location_poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pending: Option<Instant> = None;

        self.rescan();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep_until(pending.unwrap_or_else(Instant::now)), if pending.is_some() => {
                    pending = None;
                    self.rescan();
                }
                _ = poll.tick() => {
                    self.check_location();
                }
                event = events.recv(), if feed_open => match event {
                    Ok(PageEvent::Mutation(kind)) => {
                        if is_relevant(&kind) && pending.is_none() {
                            pending = Some(Instant::now() + self.config.rescan_debounce);
                        }
                    }
                    Ok(PageEvent::VisibilityChanged { visible: true })
                    | Ok(PageEvent::WindowFocused) => {
                        self.rescan();
                    }
                    Ok(PageEvent::VisibilityChanged { visible: false }) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("[Locator] Change feed lagged by {} events", skipped);
                        pending.get_or_insert_with(|| Instant::now() + self.config.rescan_debounce);
                    }
                    Err(RecvError::Closed) => {
                        warn!("[Locator] Change feed closed, relying on location polling");
                        feed_open = false;
                    }
                },
            }
        }

        debug!("[Locator] Stopped");
    }
}

fn is_relevant(kind: &MutationKind) -> bool {
    match kind {
        MutationKind::ChildList => true,
        MutationKind::Attribute(name) => WATCHED_ATTRIBUTES.contains(&name.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ElementSpec, SimMedia, SimPage};
    use crate::sites::{SelectorSet, SiteRegistry};

    fn locator_for(page: &Arc<SimPage>) -> PlayerLocator {
        let site = *SiteRegistry::builtin().lookup(&page.hostname());
        PlayerLocator::new(page.clone(), site, LocatorConfig::default())
    }

    /// Leading selectors the page cannot parse.
    const UNPARSEABLE: SiteEntry = SiteEntry {
        selectors: SelectorSet {
            video: &["div > video", ".main-player video"],
            container: &["div > .main-player", ".main-player"],
            ..SelectorSet::GENERIC
        },
        ..SiteEntry::GENERIC
    };

    #[test]
    fn selector_errors_fall_through_to_later_selectors() {
        let page = Arc::new(SimPage::new("https://example.org/").unwrap());
        let locator = PlayerLocator::new(page.clone(), UNPARSEABLE, LocatorConfig::default());

        let loose = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(10.0));
        assert_eq!(locator.scan().map(|h| h.video()), Some(loose));

        let player = page.append(page.root(), ElementSpec::new("div").class("main-player"));
        let main = page.append_media(player, ElementSpec::new("video"), SimMedia::new(10.0));
        let handle = locator.scan().unwrap();
        assert_eq!(handle.video(), main);
        assert_eq!(handle.container(page.as_ref()), player);
    }

    #[tokio::test(start_paused = true)]
    async fn selector_errors_do_not_stop_rescanning() {
        let page = Arc::new(SimPage::new("https://example.org/").unwrap());
        let locator =
            Arc::new(PlayerLocator::new(page.clone(), UNPARSEABLE, LocatorConfig::default()));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(locator.clone().run(cancel.clone()));
        tokio::task::yield_now().await;
        assert!(locator.current().is_none());

        let first = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(10.0));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(locator.current().map(|h| h.video()), Some(first));

        page.remove(first);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(locator.current().is_none());

        let second = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(10.0));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(locator.current().map(|h| h.video()), Some(second));
        assert!(!task.is_finished());

        cancel.cancel();
        task.await.unwrap();
    }

    #[test]
    fn prefers_site_selector_and_finds_container() {
        let page = Arc::new(SimPage::new("https://www.youtube.com/watch?v=1").unwrap());
        let _preview =
            page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(10.0));
        let player = page.append(page.root(), ElementSpec::new("div").id("movie_player"));
        let main = page.append_media(
            player,
            ElementSpec::new("video").class("html5-main-video"),
            SimMedia::new(10.0),
        );

        let handle = locator_for(&page).scan().unwrap();
        assert_eq!(handle.video(), main);
        assert_eq!(handle.container(page.as_ref()), player);
    }

    #[test]
    fn falls_back_to_plain_video() {
        let page = Arc::new(SimPage::new("https://www.youtube.com/shorts/1").unwrap());
        let video = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(10.0));
        assert_eq!(locator_for(&page).scan().unwrap().video(), video);
    }

    #[test]
    fn prefers_displayed_video() {
        let page = Arc::new(SimPage::new("https://example.org/").unwrap());
        let _hidden =
            page.append_media(page.root(), ElementSpec::new("video").hidden(), SimMedia::new(10.0));
        let shown = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(10.0));
        assert_eq!(locator_for(&page).scan().unwrap().video(), shown);
    }

    #[test]
    fn rescan_replaces_only_on_identity_change() {
        let page = Arc::new(SimPage::new("https://example.org/").unwrap());
        let locator = locator_for(&page);
        let mut rx = locator.subscribe();

        assert!(!locator.rescan());
        let first = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(10.0));
        assert!(locator.rescan());
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        page.append(page.root(), ElementSpec::new("div"));
        assert!(!locator.rescan());
        assert!(!rx.has_changed().unwrap());

        page.remove(first);
        let second = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(10.0));
        assert!(locator.rescan());
        assert_eq!(locator.current().unwrap().video(), second);
    }

    #[test]
    fn loss_clears_handle() {
        let page = Arc::new(SimPage::new("https://example.org/").unwrap());
        let video = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(10.0));
        let locator = locator_for(&page);
        locator.rescan();
        page.remove(video);
        assert!(locator.rescan());
        assert!(locator.current().is_none());
    }

    #[test]
    fn location_change_is_reported_once() {
        let page = Arc::new(SimPage::new("https://example.org/a").unwrap());
        let locator = locator_for(&page);
        assert!(!locator.check_location());
        page.set_location("https://example.org/b").unwrap();
        assert!(locator.check_location());
        assert!(!locator.check_location());
        assert_eq!(*locator.navigations().borrow(), "https://example.org/b");
    }

    #[tokio::test(start_paused = true)]
    async fn mutations_are_batched_into_one_rescan() {
        let page = Arc::new(SimPage::new("https://example.org/").unwrap());
        let locator = Arc::new(locator_for(&page));
        let mut rx = locator.subscribe();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(locator.clone().run(cancel.clone()));
        tokio::task::yield_now().await;

        let video = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(10.0));
        page.set_attribute(video, "class", "loaded");
        tokio::task::yield_now().await;
        assert!(locator.current().is_none(), "re-scan must wait for the debounce window");

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(locator.current().map(|h| h.video()), Some(video));
        assert!(rx.has_changed().unwrap());

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn becoming_visible_triggers_immediate_rescan() {
        let page = Arc::new(SimPage::new("https://example.org/").unwrap());
        let locator = Arc::new(locator_for(&page));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(locator.clone().run(cancel.clone()));
        tokio::task::yield_now().await;

        let video = page.append_media(page.root(), ElementSpec::new("video"), SimMedia::new(10.0));
        page.set_visible(true);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(locator.current().map(|h| h.video()), Some(video));

        cancel.cancel();
        task.await.unwrap();
    }
}
