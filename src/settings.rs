//! User Settings
//!
//! Flat key/value preferences with typed defaults. The pipeline reads them
//! through [`SettingsProvider`] and snapshots what it needs into
//! [`PipelineSettings`] at startup. [`StoredSettings`] is the bundled
//! provider: an in-memory map optionally backed by a JSON file that is
//! rewritten on every `set`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::SettingsError;
use crate::validation;

/// Setting keys understood by the pipeline.
pub mod keys {
    pub const SEEK_AMOUNT: &str = "seekAmount";
    pub const VOLUME_STEP: &str = "volumeStep";
    pub const NOTIFICATIONS_ENABLED: &str = "notificationsEnabled";
    pub const VOLUME_CONTROL_ENABLED: &str = "volumeControlEnabled";
    pub const PLAYBACK_CONTROL_ENABLED: &str = "playbackControlEnabled";
    /// Unset means each notification category uses its own duration.
    pub const NOTIFICATION_DURATION_MS: &str = "notificationDurationMs";
    pub const METADATA_WAIT_MS: &str = "metadataWaitMs";
    pub const RESCAN_DEBOUNCE_MS: &str = "rescanDebounceMs";
    pub const RETRIGGER_INTERVAL_MS: &str = "retriggerIntervalMs";
}

/// Default value for every known key.
pub fn defaults() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(keys::SEEK_AMOUNT.into(), Value::from(5.0));
    map.insert(keys::VOLUME_STEP.into(), Value::from(0.1));
    map.insert(keys::NOTIFICATIONS_ENABLED.into(), Value::from(true));
    map.insert(keys::VOLUME_CONTROL_ENABLED.into(), Value::from(true));
    map.insert(keys::PLAYBACK_CONTROL_ENABLED.into(), Value::from(true));
    map.insert(keys::METADATA_WAIT_MS.into(), Value::from(2000u64));
    map.insert(keys::RESCAN_DEBOUNCE_MS.into(), Value::from(500u64));
    map.insert(keys::RETRIGGER_INTERVAL_MS.into(), Value::from(150u64));
    map
}

/// Source of user preferences.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores a value; persistence happens in the background.
    fn set(&self, key: &str, value: Value);

    fn get_all(&self) -> Map<String, Value>;

    /// Resolves once the initial load has finished.
    async fn wait_until_loaded(&self) -> Result<(), SettingsError>;

    fn get_or(&self, key: &str, fallback: Value) -> Value {
        self.get(key).unwrap_or(fallback)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LoadState {
    Pending,
    Loaded,
    Failed(String),
}

/// In-memory settings with optional JSON file persistence.
#[derive(Debug)]
pub struct StoredSettings {
    values: RwLock<Map<String, Value>>,
    writer: Option<SettingsWriter>,
    state: watch::Sender<LoadState>,
}

/// Serialized snapshot tagged with the write it belongs to.
#[derive(Debug, Clone, Default)]
struct Snapshot {
    version: u64,
    bytes: Vec<u8>,
}

/// Single background task owning the settings file; the newest snapshot wins.
#[derive(Debug)]
struct SettingsWriter {
    path: PathBuf,
    pending: watch::Sender<Snapshot>,
    written: watch::Receiver<u64>,
}

impl SettingsWriter {
    fn spawn(path: PathBuf) -> Self {
        let (pending, rx) = watch::channel(Snapshot::default());
        let (written_tx, written) = watch::channel(0);
        tokio::spawn(run_writer(path.clone(), rx, written_tx));
        Self {
            path,
            pending,
            written,
        }
    }

    fn submit(&self, values: &Map<String, Value>) {
        let bytes = match serde_json::to_vec_pretty(values) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("[Settings] Failed to serialize settings: {}", e);
                return;
            }
        };
        self.pending.send_modify(|snapshot| {
            snapshot.version += 1;
            snapshot.bytes = bytes;
        });
    }

    async fn flush(&self) {
        let target = self.pending.borrow().version;
        let mut written = self.written.clone();
        if written.wait_for(|version| *version >= target).await.is_err() {
            warn!("[Settings] Writer for {} stopped before flushing", self.path.display());
        }
    }
}

async fn run_writer(
    path: PathBuf,
    mut pending: watch::Receiver<Snapshot>,
    written: watch::Sender<u64>,
) {
    while pending.changed().await.is_ok() {
        let snapshot = pending.borrow_and_update().clone();
        if let Err(e) = write_settings_file(&path, &snapshot.bytes).await {
            warn!("[Settings] {}", e);
        }
        written.send_replace(snapshot.version);
    }
    debug!("[Settings] Writer for {} finished", path.display());
}

impl StoredSettings {
    fn build(writer: Option<SettingsWriter>, state: LoadState) -> Self {
        let (state, _) = watch::channel(state);
        Self {
            values: RwLock::new(defaults()),
            writer,
            state,
        }
    }

    /// Defaults only, already loaded, never persisted.
    pub fn in_memory() -> Self {
        Self::build(None, LoadState::Loaded)
    }

    /// Defaults with a pending load; call [`finish_loading`](Self::finish_loading).
    pub fn pending() -> Self {
        Self::build(None, LoadState::Pending)
    }

    /// Reads `path` (a missing file means defaults) and persists there on `set`.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = Self::build(Some(SettingsWriter::spawn(path.clone())), LoadState::Pending);
        let result = settings.load_file(&path).await;
        settings.finish_loading(result);
        settings
    }

    /// Default location: `<config dir>/streamkeys/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("streamkeys").join("settings.json"))
    }

    async fn load_file(&self, path: &Path) -> Result<(), SettingsError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("[Settings] No settings file at {}, using defaults", path.display());
                return Ok(());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let stored: Map<String, Value> =
            serde_json::from_slice(&bytes).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        info!("[Settings] Loaded {} value(s) from {}", stored.len(), path.display());
        self.values.write().extend(stored);
        Ok(())
    }

    /// Marks the initial load as finished, successfully or not.
    pub fn finish_loading(&self, result: Result<(), SettingsError>) {
        let state = match result {
            Ok(()) => LoadState::Loaded,
            Err(e) => {
                warn!("[Settings] Load failed: {}", e);
                LoadState::Failed(e.to_string())
            }
        };
        self.state.send_replace(state);
    }

    /// Resolves once every `set` so far has reached the file.
    pub async fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }
}

/// Writes next to `path` and renames into place, so readers never see a partial file.
async fn write_settings_file(path: &Path, bytes: &[u8]) -> Result<(), SettingsError> {
    let persist_error = |e: std::io::Error| SettingsError::Persist {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(persist_error)?;
    }
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);
    tokio::fs::write(&staging, bytes).await.map_err(persist_error)?;
    tokio::fs::rename(&staging, path).await.map_err(persist_error)
}

#[async_trait]
impl SettingsProvider for StoredSettings {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        debug!("[Settings] {} = {}", key, value);
        let mut values = self.values.write();
        values.insert(key.to_string(), value);
        // Submitted under the lock so snapshots reach the writer in `set` order.
        if let Some(writer) = &self.writer {
            writer.submit(&values);
        }
    }

    fn get_all(&self) -> Map<String, Value> {
        self.values.read().clone()
    }

    async fn wait_until_loaded(&self) -> Result<(), SettingsError> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|state| *state != LoadState::Pending)
            .await
            .map_err(|_| SettingsError::Unavailable("settings store dropped".into()))?
            .clone();
        match state {
            LoadState::Failed(message) => Err(SettingsError::Unavailable(message)),
            _ => Ok(()),
        }
    }
}

/// Typed snapshot of the settings the pipeline consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub seek_amount: f64,
    pub volume_step: f64,
    pub notifications_enabled: bool,
    pub volume_control_enabled: bool,
    pub playback_control_enabled: bool,
    pub notification_duration: Option<Duration>,
    pub metadata_wait: Duration,
    pub rescan_debounce: Duration,
    pub retrigger_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            seek_amount: 5.0,
            volume_step: 0.1,
            notifications_enabled: true,
            volume_control_enabled: true,
            playback_control_enabled: true,
            notification_duration: None,
            metadata_wait: Duration::from_millis(2000),
            rescan_debounce: Duration::from_millis(500),
            retrigger_interval: Duration::from_millis(150),
        }
    }
}

impl PipelineSettings {
    /// Reads and validates every key, falling back to defaults for unset keys.
    pub fn from_provider(provider: &dyn SettingsProvider) -> Result<Self, SettingsError> {
        let base = Self::default();

        let seek_amount = read_f64(provider, keys::SEEK_AMOUNT, base.seek_amount)?;
        check(keys::SEEK_AMOUNT, validation::validate_seek_amount(seek_amount))?;

        let volume_step = read_f64(provider, keys::VOLUME_STEP, base.volume_step)?;
        check(keys::VOLUME_STEP, validation::validate_volume_step(volume_step))?;

        let notification_duration = match provider.get(keys::NOTIFICATION_DURATION_MS) {
            None | Some(Value::Null) => None,
            Some(_) => Some(read_ms(provider, keys::NOTIFICATION_DURATION_MS, 0, 30_000)?),
        };

        Ok(Self {
            seek_amount,
            volume_step,
            notifications_enabled: read_bool(
                provider,
                keys::NOTIFICATIONS_ENABLED,
                base.notifications_enabled,
            )?,
            volume_control_enabled: read_bool(
                provider,
                keys::VOLUME_CONTROL_ENABLED,
                base.volume_control_enabled,
            )?,
            playback_control_enabled: read_bool(
                provider,
                keys::PLAYBACK_CONTROL_ENABLED,
                base.playback_control_enabled,
            )?,
            notification_duration,
            metadata_wait: read_ms(provider, keys::METADATA_WAIT_MS, 2000, 30_000)?,
            rescan_debounce: read_ms(provider, keys::RESCAN_DEBOUNCE_MS, 500, 10_000)?,
            retrigger_interval: read_ms(provider, keys::RETRIGGER_INTERVAL_MS, 150, 5_000)?,
        })
    }
}

fn invalid(key: &str, message: impl Into<String>) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

fn check(key: &str, result: anyhow::Result<()>) -> Result<(), SettingsError> {
    result.map_err(|e| invalid(key, e.to_string()))
}

fn read_f64(
    provider: &dyn SettingsProvider,
    key: &str,
    fallback: f64,
) -> Result<f64, SettingsError> {
    match provider.get(key) {
        None => Ok(fallback),
        Some(value) => value
            .as_f64()
            .ok_or_else(|| invalid(key, format!("expected a number, got {value}"))),
    }
}

fn read_bool(
    provider: &dyn SettingsProvider,
    key: &str,
    fallback: bool,
) -> Result<bool, SettingsError> {
    match provider.get(key) {
        None => Ok(fallback),
        Some(value) => value
            .as_bool()
            .ok_or_else(|| invalid(key, format!("expected a boolean, got {value}"))),
    }
}

fn read_ms(
    provider: &dyn SettingsProvider,
    key: &str,
    fallback: u64,
    max: u64,
) -> Result<Duration, SettingsError> {
    let millis = match provider.get(key) {
        None => fallback,
        Some(value) => value
            .as_u64()
            .ok_or_else(|| invalid(key, format!("expected milliseconds, got {value}")))?,
    };
    check(key, validation::validate_interval_ms(key, millis, max))?;
    Ok(Duration::from_millis(millis))
}
