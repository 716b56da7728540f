#![allow(dead_code)]

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use streamkeys::orchestrator::{Orchestrator, OrchestratorConfig};
use streamkeys::sim::{ElementSpec, RecordingControl, SimMedia, SimPage};
use streamkeys::{NodeId, SettingsProvider, SiteRegistry, StoredSettings};

/// Log lines captured by [`CaptureLayer`].
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<(Level, String)>>>);

impl CapturedLogs {
    pub fn matching(&self, level: Level, needle: &str) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|(l, message)| *l == level && message.contains(needle))
            .count()
    }
}

pub struct CaptureLayer(pub CapturedLogs);

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0 .0.lock().push((*event.metadata().level(), visitor.0));
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

/// A page with one video and a started pipeline.
pub struct Harness {
    pub page: Arc<SimPage>,
    pub video: NodeId,
    pub orchestrator: Arc<Orchestrator>,
}

impl Harness {
    pub async fn start(url: &str, media: SimMedia) -> Self {
        Self::start_with(url, media, StoredSettings::in_memory()).await
    }

    pub async fn start_with(url: &str, media: SimMedia, settings: StoredSettings) -> Self {
        let page = Arc::new(SimPage::new(url).expect("valid url"));
        let video = page.append_media(page.root(), ElementSpec::new("video"), media);
        let settings: Arc<dyn SettingsProvider> = Arc::new(settings);
        let orchestrator = Arc::new(Orchestrator::new(
            page.clone(),
            SiteRegistry::builtin(),
            settings,
            None,
            OrchestratorConfig::default(),
        ));
        orchestrator.start().await.expect("pipeline starts");
        Self {
            page,
            video,
            orchestrator,
        }
    }

    pub fn control(&self) -> RecordingControl {
        RecordingControl::new(self.page.journal().clone())
    }

    pub fn media(&self) -> SimMedia {
        self.page.media_state(self.video).expect("video exists")
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.orchestrator.shutdown();
    }
}
