//! Site Registry
//!
//! Static table of supported streaming sites. Each row carries the behaviour
//! flags the arbitrator needs (how hard to suppress the site's own key
//! handling and in which order) plus ordered selector lists for the player
//! and its native controls. Lookups are pure; unknown hosts get the generic
//! HTML5 entry.

use serde::{Deserialize, Serialize};

/// Identifier of a supported site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SiteId {
    YouTube,
    Netflix,
    PrimeVideo,
    DisneyPlus,
    Max,
    Hulu,
    Generic,
}

/// Ordering between running our action and suppressing the site's handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Aggressiveness {
    /// The native handler wins races against page listeners: suppress first.
    SuppressFirst,
    /// The site reacts to having seen the event: act first, suppress after.
    ActFirst,
}

/// How much of the event to cancel once suppression runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// Leave the event alone; the site has no conflicting handler.
    None,
    /// `preventDefault` + `stopPropagation`.
    Full,
    /// `Full` plus `stopImmediatePropagation`.
    Immediate,
}

/// Behaviour flags for one site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SitePolicy {
    pub needs_conflict_prevention: bool,
    pub needs_scroll_prevention: bool,
    pub aggressiveness: Aggressiveness,
    /// The site's own space handler performs play/pause reliably.
    pub native_play_pause: bool,
    /// Seconds moved by one click on the native rewind/forward buttons.
    pub native_seek_step: Option<f64>,
}

impl SitePolicy {
    /// HTML5-only policy for hosts with no registry entry.
    pub const GENERIC: SitePolicy = SitePolicy {
        needs_conflict_prevention: false,
        needs_scroll_prevention: false,
        aggressiveness: Aggressiveness::ActFirst,
        native_play_pause: false,
        native_seek_step: None,
    };

    pub fn suppression(&self) -> Suppression {
        match (self.needs_conflict_prevention, self.aggressiveness) {
            (false, _) => Suppression::None,
            (true, Aggressiveness::ActFirst) => Suppression::Full,
            (true, Aggressiveness::SuppressFirst) => Suppression::Immediate,
        }
    }

    pub fn suppress_before_action(&self) -> bool {
        self.aggressiveness == Aggressiveness::SuppressFirst
    }
}

/// Ordered selector lists; within each list the first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorSet {
    pub video: &'static [&'static str],
    pub container: &'static [&'static str],
    pub seek_bar: &'static [&'static str],
    /// Filled portion of the progress bar; its inline `width` is the position.
    pub progress: &'static [&'static str],
    /// Native controls pressed when the media API refuses the write.
    pub play_button: &'static [&'static str],
    /// Clicking it toggles mute.
    pub volume: &'static [&'static str],
    pub fullscreen_button: &'static [&'static str],
    pub captions_button: &'static [&'static str],
    pub rewind_button: &'static [&'static str],
    pub forward_button: &'static [&'static str],
    pub skip_intro: &'static [&'static str],
    pub next_episode: &'static [&'static str],
}

impl SelectorSet {
    pub const EMPTY: SelectorSet = SelectorSet {
        video: &[],
        container: &[],
        seek_bar: &[],
        progress: &[],
        play_button: &[],
        volume: &[],
        fullscreen_button: &[],
        captions_button: &[],
        rewind_button: &[],
        forward_button: &[],
        skip_intro: &[],
        next_episode: &[],
    };

    /// Broad, low-specificity selectors for unknown sites.
    pub const GENERIC: SelectorSet = SelectorSet {
        video: &["video"],
        container: &["[class*='player']", "[class*='video']"],
        seek_bar: &["[role='slider'][class*='progress']", "[class*='seek']"],
        progress: &["[class*='progress'][class*='play']"],
        play_button: &["[class*='play-button']", "[aria-label*='Play']"],
        volume: &["[class*='volume']"],
        fullscreen_button: &["[class*='fullscreen']"],
        captions_button: &["[class*='caption']", "[class*='subtitle']"],
        ..SelectorSet::EMPTY
    };
}

/// One registry row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteEntry {
    pub id: SiteId,
    pub name: &'static str,
    /// Hostname substrings that select this entry.
    pub hosts: &'static [&'static str],
    pub policy: SitePolicy,
    pub selectors: SelectorSet,
}

impl SiteEntry {
    pub const GENERIC: SiteEntry = SiteEntry {
        id: SiteId::Generic,
        name: "Generic HTML5",
        hosts: &[],
        policy: SitePolicy::GENERIC,
        selectors: SelectorSet::GENERIC,
    };

    pub fn is_supported(&self) -> bool {
        self.id != SiteId::Generic
    }

    pub fn matches(&self, hostname: &str) -> bool {
        let hostname = hostname.to_ascii_lowercase();
        self.hosts.iter().any(|host| hostname.contains(host))
    }
}

const BUILTIN_SITES: &[SiteEntry] = &[
    SiteEntry {
        id: SiteId::YouTube,
        name: "YouTube",
        hosts: &["youtube.com", "youtube-nocookie.com"],
        policy: SitePolicy {
            needs_conflict_prevention: true,
            needs_scroll_prevention: true,
            aggressiveness: Aggressiveness::ActFirst,
            native_play_pause: false,
            native_seek_step: None,
        },
        selectors: SelectorSet {
            video: &["video.html5-main-video", "video.video-stream"],
            container: &["#movie_player", ".html5-video-player"],
            seek_bar: &[".ytp-progress-bar"],
            progress: &[".ytp-play-progress"],
            play_button: &[".ytp-play-button"],
            volume: &[".ytp-mute-button"],
            fullscreen_button: &[".ytp-fullscreen-button"],
            captions_button: &[".ytp-subtitles-button"],
            next_episode: &[".ytp-next-button"],
            ..SelectorSet::EMPTY
        },
    },
    SiteEntry {
        id: SiteId::Netflix,
        name: "Netflix",
        hosts: &["netflix.com"],
        policy: SitePolicy {
            needs_conflict_prevention: true,
            needs_scroll_prevention: true,
            aggressiveness: Aggressiveness::SuppressFirst,
            native_play_pause: true,
            native_seek_step: Some(10.0),
        },
        selectors: SelectorSet {
            video: &[".watch-video video", "video"],
            container: &[".watch-video", "[data-uia='video-canvas']"],
            seek_bar: &["[data-uia='timeline-bar']"],
            progress: &["[data-uia='timeline-knob']"],
            play_button: &[
                "[data-uia='control-play-pause-play']",
                "[data-uia='control-play-pause-pause']",
            ],
            volume: &["[data-uia='control-volume-high']"],
            fullscreen_button: &["[data-uia='control-fullscreen-enter']"],
            captions_button: &["[data-uia='control-audio-subtitle']"],
            rewind_button: &["[data-uia='control-back10']"],
            forward_button: &["[data-uia='control-forward10']"],
            skip_intro: &["[data-uia='player-skip-intro']", "[data-uia='player-skip-recap']"],
            next_episode: &[
                "[data-uia='next-episode-seamless-button']",
                "[data-uia='control-next']",
            ],
        },
    },
    SiteEntry {
        id: SiteId::PrimeVideo,
        name: "Prime Video",
        hosts: &["primevideo.com", "amazon."],
        policy: SitePolicy {
            needs_conflict_prevention: true,
            needs_scroll_prevention: true,
            aggressiveness: Aggressiveness::SuppressFirst,
            native_play_pause: false,
            native_seek_step: Some(10.0),
        },
        selectors: SelectorSet {
            video: &[".webPlayerSDKContainer video", "video"],
            container: &[".webPlayerSDKContainer", ".webPlayerContainer"],
            seek_bar: &[".atvwebplayersdk-seekbar-range"],
            progress: &[".atvwebplayersdk-progress-bar"],
            play_button: &[".atvwebplayersdk-playpause-button"],
            volume: &[".atvwebplayersdk-volume-button"],
            fullscreen_button: &[".atvwebplayersdk-fullscreen-button"],
            captions_button: &[".atvwebplayersdk-captions-button"],
            rewind_button: &[".atvwebplayersdk-fastseekback-button"],
            forward_button: &[".atvwebplayersdk-fastseekforward-button"],
            skip_intro: &[".atvwebplayersdk-skipelement-button"],
            next_episode: &[".atvwebplayersdk-nextupcard-button"],
        },
    },
    SiteEntry {
        id: SiteId::DisneyPlus,
        name: "Disney+",
        hosts: &["disneyplus.com"],
        policy: SitePolicy {
            needs_conflict_prevention: true,
            needs_scroll_prevention: false,
            aggressiveness: Aggressiveness::ActFirst,
            native_play_pause: true,
            native_seek_step: Some(10.0),
        },
        selectors: SelectorSet {
            video: &["video.btm-media-client-element", "video"],
            container: &[".btm-media-player", "[class*='media-player']"],
            seek_bar: &[".progress-bar", "[role='slider']"],
            progress: &[".progress-bar__seekable-range"],
            play_button: &[".play-pause-icon"],
            volume: &[".volume-control"],
            fullscreen_button: &[".fullscreen-icon"],
            captions_button: &[".audio-subtitles-control"],
            rewind_button: &[".quick-rewind-icon"],
            forward_button: &[".quick-fast-forward-icon"],
            skip_intro: &[".skip__button"],
            next_episode: &["[data-testid='up-next-play-button']"],
        },
    },
    SiteEntry {
        id: SiteId::Max,
        name: "Max",
        hosts: &["max.com", "hbomax.com"],
        policy: SitePolicy {
            needs_conflict_prevention: true,
            needs_scroll_prevention: true,
            aggressiveness: Aggressiveness::ActFirst,
            native_play_pause: false,
            native_seek_step: Some(10.0),
        },
        selectors: SelectorSet {
            video: &["video"],
            container: &["[data-testid='playerContainer']", "[class*='PlayerRoot']"],
            seek_bar: &["[data-testid='player-ux-timeline']"],
            progress: &["[data-testid='player-ux-timeline-progress']"],
            play_button: &["[data-testid='player-ux-play-pause-button']"],
            volume: &["[data-testid='player-ux-volume-button']"],
            fullscreen_button: &["[data-testid='player-ux-fullscreen-button']"],
            captions_button: &["[data-testid='player-ux-track-selector-button']"],
            rewind_button: &["[data-testid='player-ux-skip-back-button']"],
            forward_button: &["[data-testid='player-ux-skip-forward-button']"],
            skip_intro: &["[data-testid='player-ux-skip-button']"],
            next_episode: &["[data-testid='player-ux-up-next-button']"],
        },
    },
    SiteEntry {
        id: SiteId::Hulu,
        name: "Hulu",
        hosts: &["hulu.com"],
        policy: SitePolicy {
            needs_conflict_prevention: true,
            needs_scroll_prevention: true,
            aggressiveness: Aggressiveness::SuppressFirst,
            native_play_pause: false,
            native_seek_step: Some(10.0),
        },
        selectors: SelectorSet {
            video: &["video#content-video-player", "video"],
            container: &[".Player__container", "#web-player-app"],
            seek_bar: &[".Timeline__Slider"],
            progress: &[".Timeline__Progress"],
            play_button: &[".PlayButton"],
            volume: &[".VolumeButton"],
            fullscreen_button: &[".FullScreenButton"],
            captions_button: &[".CaptionsButton"],
            rewind_button: &[".RewindButton"],
            forward_button: &[".FastForwardButton"],
            skip_intro: &[".SkipButton"],
            next_episode: &[".EndCardButton"],
        },
    },
];

/// Hostname to site lookup.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    sites: Vec<SiteEntry>,
    generic: SiteEntry,
}

impl SiteRegistry {
    /// Registry with caller-supplied rows, tried in order.
    pub fn new(sites: Vec<SiteEntry>, generic: SiteEntry) -> Self {
        Self { sites, generic }
    }

    /// Registry with the built-in site table.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_SITES.to_vec(), SiteEntry::GENERIC)
    }

    /// First entry whose host pattern is a substring of `hostname`,
    /// or the generic entry.
    pub fn lookup(&self, hostname: &str) -> &SiteEntry {
        self.sites
            .iter()
            .find(|site| site.matches(hostname))
            .unwrap_or(&self.generic)
    }

    pub fn sites(&self) -> &[SiteEntry] {
        &self.sites
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
