//! streamkeys: replays a keyboard scenario against an in-memory page.
//!
//! The scenario describes a page (URL, video state, native controls) and a
//! sequence of key presses, waits and navigations. The run prints the final
//! media state and the pipeline status as JSON.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamkeys::keyboard::KeyDisposition;
use streamkeys::notifications::TracingNotifier;
use streamkeys::sim::{ClickEffect, ElementSpec, RecordingControl, SimMedia, SimPage};
use streamkeys::{
    KeyEvent, NodeId, Orchestrator, OrchestratorConfig, PipelineStatus, SettingsProvider,
    SiteRegistry, StoredSettings,
};

#[derive(Debug, Parser)]
#[command(
    name = "streamkeys",
    version,
    about = "Replay keyboard scenarios against a simulated streaming page"
)]
struct Args {
    /// Scenario file (JSON)
    #[arg(long)]
    scenario: PathBuf,

    /// Settings file to load and persist; in-memory defaults when omitted
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Overrides the scenario's page URL
    #[arg(long)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scenario {
    url: String,
    #[serde(default)]
    video: Option<SimMedia>,
    /// Wraps the video, e.g. the site's player container.
    #[serde(default)]
    container: Option<ElementSpec>,
    #[serde(default)]
    controls: Vec<ControlSpec>,
    #[serde(default)]
    settings: Map<String, Value>,
    #[serde(default)]
    steps: Vec<Step>,
}

/// A native control placed on the page.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ControlSpec {
    element: ElementSpec,
    #[serde(default)]
    effect: Option<ControlEffect>,
}

/// Click behaviour, always applied to the scenario's video.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ControlEffect {
    SeekBy { seconds: f64 },
    SeekBar,
    ToggleCaptions,
    ToggleMute,
    TogglePlay,
    Dismiss,
}

impl ControlEffect {
    fn bind(&self, video: NodeId) -> ClickEffect {
        match *self {
            ControlEffect::SeekBy { seconds } => ClickEffect::SeekBy { media: video, seconds },
            ControlEffect::SeekBar => ClickEffect::SeekBar { media: video },
            ControlEffect::ToggleCaptions => ClickEffect::ToggleCaptions { media: video },
            ControlEffect::ToggleMute => ClickEffect::ToggleMute { media: video },
            ControlEffect::TogglePlay => ClickEffect::TogglePlay { media: video },
            ControlEffect::Dismiss => ClickEffect::Dismiss,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Step {
    Key { event: KeyEvent },
    Wait { ms: u64 },
    Navigate { url: String },
    SetEnabled { enabled: bool },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    media: Option<SimMedia>,
    status: PipelineStatus,
    journal: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let raw = tokio::fs::read_to_string(&args.scenario)
        .await
        .with_context(|| format!("Failed to read scenario {}", args.scenario.display()))?;
    let scenario: Scenario = serde_json::from_str(&raw).context("Failed to parse scenario")?;
    let url = args.url.clone().unwrap_or_else(|| scenario.url.clone());

    let page = Arc::new(SimPage::new(&url).with_context(|| format!("Invalid page URL '{url}'"))?);
    let video = build_page(&page, &scenario);

    let settings = Arc::new(match &args.settings {
        Some(path) => StoredSettings::open(path).await,
        None => StoredSettings::in_memory(),
    });
    for (key, value) in &scenario.settings {
        settings.set(key, value.clone());
    }

    let orchestrator = Arc::new(Orchestrator::new(
        page.clone(),
        SiteRegistry::builtin(),
        settings.clone(),
        Some(Arc::new(TracingNotifier)),
        OrchestratorConfig::default(),
    ));
    info!("[Demo] Session {} on {}", orchestrator.session_id(), url);

    let cancel = CancellationToken::new();
    let supervisor = tokio::spawn(orchestrator.clone().run(cancel.clone()));
    // Let the first startup attempt finish before replaying keys.
    tokio::time::sleep(Duration::from_millis(50)).await;

    for step in &scenario.steps {
        match step {
            Step::Key { event } => {
                let mut control = RecordingControl::new(page.journal().clone());
                match orchestrator.handle_key_down(event, &mut control) {
                    KeyDisposition::Dispatched { action, outcome, suppressed } => {
                        let applied = outcome.resolve().await;
                        info!(
                            "[Demo] {:?} -> {} applied={} suppressed={}",
                            event.key_id(),
                            action.name(),
                            applied,
                            suppressed
                        );
                    }
                    KeyDisposition::Ignored(reason) => {
                        info!("[Demo] {:?} ignored: {:?}", event.key_id(), reason)
                    }
                }
            }
            Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Step::Navigate { url } => {
                if let Err(e) = page.set_location(url) {
                    warn!("[Demo] Skipping navigation to '{}': {}", url, e);
                }
            }
            Step::SetEnabled { enabled } => orchestrator.set_enabled(*enabled),
        }
    }

    let report = Report {
        media: video.and_then(|video| page.media_state(video)),
        status: orchestrator.status(),
        journal: page.journal().entries(),
    };

    cancel.cancel();
    if let Err(e) = supervisor.await {
        warn!("[Demo] Supervisor task failed: {}", e);
    }
    orchestrator.shutdown();
    settings.flush().await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn build_page(page: &SimPage, scenario: &Scenario) -> Option<NodeId> {
    let parent = match &scenario.container {
        Some(container) => page.append(page.root(), container.clone()),
        None => page.root(),
    };
    let video = scenario
        .video
        .clone()
        .map(|media| page.append_media(parent, ElementSpec::new("video"), media));

    for control in &scenario.controls {
        let node = page.append(page.root(), control.element.clone());
        match (&control.effect, video) {
            (Some(effect), Some(video)) => page.on_click(node, effect.bind(video)),
            (Some(ControlEffect::Dismiss), None) => page.on_click(node, ClickEffect::Dismiss),
            _ => {}
        }
    }
    video
}
