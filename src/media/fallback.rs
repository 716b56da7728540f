//! Seek fallbacks
//!
//! Some players never publish finite timing metadata, or throw when
//! `currentTime` is assigned. For those, a seek is re-expressed through the
//! site's own controls: native rewind/forward buttons, or a click on the seek
//! bar at the target fraction, estimated from the progress bar when needed.

use std::time::Duration;

use tracing::debug;

use crate::dom::{self, NodeId, Page};
use crate::sites::SiteEntry;

/// Finite timing metadata of a media element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metadata {
    pub current: f64,
    pub duration: f64,
}

impl Metadata {
    /// Reads timing; `None` until both values are finite and the duration is positive.
    pub fn read(page: &dyn Page, media: NodeId) -> Option<Self> {
        let current = page.current_time(media).ok()?;
        let duration = page.duration(media).ok()?;
        (current.is_finite() && duration.is_finite() && duration > 0.0)
            .then_some(Self { current, duration })
    }
}

/// Polls for metadata until it appears or `timeout` elapses.
pub async fn wait_for_metadata(
    page: &dyn Page,
    media: NodeId,
    timeout: Duration,
    poll: Duration,
) -> Option<Metadata> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(meta) = Metadata::read(page, media) {
            return Some(meta);
        }
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if !page.is_connected(media) || remaining.is_zero() {
            return None;
        }
        tokio::time::sleep(poll.min(remaining)).await;
    }
}

/// Where a seek should land.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    Relative(f64),
    Percentage(f64),
}

impl SeekTarget {
    /// Absolute position, always within `[0, duration]`.
    pub fn resolve(&self, meta: Metadata) -> f64 {
        let target = match *self {
            SeekTarget::Relative(delta) => meta.current + delta,
            SeekTarget::Percentage(percent) => meta.duration * percent / 100.0,
        };
        target.clamp(0.0, meta.duration)
    }
}

/// What a fallback managed to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FallbackSeek {
    /// Pressed the native rewind/forward button this many times.
    NativeButtons { clicks: u32 },
    /// Clicked the seek bar at this fraction.
    SeekBar { fraction: f64, estimate: Option<Metadata> },
}

/// Position and duration as shown by the site's progress UI.
pub fn estimate_position(page: &dyn Page, site: &SiteEntry, media: NodeId) -> Option<Metadata> {
    let selectors = &site.selectors;

    if let Some(bar) = dom::first_match(page, selectors.seek_bar) {
        let now = numeric_attribute(page, bar, "aria-valuenow");
        let max = numeric_attribute(page, bar, "aria-valuemax");
        if let (Some(now), Some(max)) = (now, max) {
            if max > 0.0 {
                return Some(Metadata {
                    current: now.clamp(0.0, max),
                    duration: max,
                });
            }
        }
    }

    let fraction = dom::first_match(page, selectors.progress)
        .and_then(|progress| dom::style_fraction(page, progress, "width"))?;
    let duration = page
        .duration(media)
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
        .or_else(|| {
            dom::first_match(page, selectors.seek_bar)
                .and_then(|bar| numeric_attribute(page, bar, "aria-valuemax"))
                .filter(|max| *max > 0.0)
        })?;
    Some(Metadata {
        current: fraction * duration,
        duration,
    })
}

fn numeric_attribute(page: &dyn Page, node: NodeId, name: &str) -> Option<f64> {
    page.attribute(node, name)?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Tries the site's fallbacks in order. `None` when nothing applies.
pub fn fallback_seek(
    page: &dyn Page,
    site: &SiteEntry,
    media: NodeId,
    target: SeekTarget,
) -> Option<FallbackSeek> {
    if let SeekTarget::Relative(delta) = target {
        if let Some(clicks) = seek_with_buttons(page, site, delta) {
            return Some(FallbackSeek::NativeButtons { clicks });
        }
    }

    let bar = dom::first_match(page, site.selectors.seek_bar)?;
    let estimate = estimate_position(page, site, media);
    let fraction = match target {
        SeekTarget::Percentage(percent) => percent / 100.0,
        SeekTarget::Relative(_) => {
            let meta = estimate?;
            target.resolve(meta) / meta.duration
        }
    }
    .clamp(0.0, 1.0);

    match page.click_at(bar, fraction) {
        Ok(()) => Some(FallbackSeek::SeekBar { fraction, estimate }),
        Err(e) => {
            debug!("[Executor] Seek bar click failed: {}", e);
            None
        }
    }
}

fn seek_with_buttons(page: &dyn Page, site: &SiteEntry, delta: f64) -> Option<u32> {
    let step = site.policy.native_seek_step?;
    let selectors = if delta < 0.0 {
        site.selectors.rewind_button
    } else {
        site.selectors.forward_button
    };
    let button = dom::first_match(page, selectors)?;
    let clicks = ((delta.abs() / step).round() as u32).max(1);
    for _ in 0..clicks {
        if let Err(e) = page.click(button) {
            debug!("[Executor] Native seek button click failed: {}", e);
            return None;
        }
    }
    Some(clicks)
}
