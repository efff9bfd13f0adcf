use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, SystemTime},
};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::formats::{Codec, Format, FormatRegistry};

use super::{
    ChangeSet, ConfigError, Event, EventId, EventPattern, EventRegistry, HashPath, ListenerError,
    ListenerFailure, Mapping, Matched, ReloadPolicy, Step, Subscription, compile,
    delete_path, detect_changes, events::isolate, incoming_from_locations, resolve_all,
    resolve_first, set_path,
};

/// Hook called with the effective configuration after every reload.
pub type ReloadHook = Arc<dyn Fn(&Mapping) -> Result<(), ListenerError> + Send + Sync>;

/// Hook called with `(incoming, diff)` whenever a change-set alters the configuration.
pub type ChangeHook = Arc<dyn Fn(&Mapping, &Mapping) -> Result<(), ListenerError> + Send + Sync>;

pub(crate) const MIN_INTERVAL: Duration = Duration::from_millis(10);
const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

struct State {
    configuration: Mapping,
    defaults: Mapping,
    overlay: Mapping,
    effective: Arc<Mapping>,
    last_refresh: Option<SystemTime>,
}

#[derive(Debug, Clone, Copy)]
struct Options {
    interval: Duration,
    persist_memory: bool,
    prefer_memory: bool,
    stringify_keys: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            persist_memory: false,
            prefer_memory: false,
            stringify_keys: true,
        }
    }
}

#[derive(Default)]
struct Hooks {
    on_reload: Option<ReloadHook>,
    on_change: Option<ChangeHook>,
}

#[derive(Clone, Copy)]
enum Layer {
    Defaults,
    Overlay,
}

pub(crate) struct Inner {
    pub(crate) path: PathBuf,
    codec: Arc<dyn Codec>,
    state: RwLock<State>,
    hooks: RwLock<Hooks>,
    events: Arc<EventRegistry>,
    pub(crate) sync_up: AtomicBool,
    sync_down: AtomicBool,
    options: RwLock<Options>,
    pub(crate) watcher: Mutex<Option<JoinHandle<()>>>,
    pub(crate) fs_events: bool,
}

impl Inner {
    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, State>, ConfigError> {
        self.state.write().map_err(|e| ConfigError::LockError {
            lock_type: "write".to_string(),
            details: e.to_string(),
        })
    }

    fn options(&self) -> Options {
        *self.options.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_options(&self, update: impl FnOnce(&mut Options)) {
        update(&mut self.options.write().unwrap_or_else(PoisonError::into_inner));
    }

    pub(crate) fn interval(&self) -> Duration {
        self.options().interval
    }

    pub(crate) fn last_refresh(&self) -> Option<SystemTime> {
        self.read_state().last_refresh
    }
}

/// A layered configuration store backed by a file.
///
/// The effective configuration is compiled from three layers, lowest
/// precedence first: `defaults`, the raw `configuration` (file contents plus
/// in-memory writes) and `overlay`. Cloning is cheap; every clone shares the
/// same state.
///
/// # Examples
/// ```no_run
/// # fn main() -> Result<(), stratum::config_store::ConfigError> {
/// use stratum::config_store::ConfigStore;
///
/// let store = ConfigStore::builder("settings.yaml")
///     .defaults(serde_json::json!({"timeout": 30}).as_object().cloned().unwrap_or_default())
///     .sync_down(true)
///     .build()?;
///
/// store.set("timeout", 60)?;
/// assert_eq!(store.get("timeout"), Some(serde_json::json!(60)));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConfigStore {
    pub(crate) inner: Arc<Inner>,
}

impl ConfigStore {
    /// Starts building a store backed by `path`.
    pub fn builder(path: impl Into<PathBuf>) -> ConfigStoreBuilder {
        ConfigStoreBuilder::new(path)
    }

    /// Opens `path` with default options, detecting the format.
    ///
    /// # Errors
    /// Returns an error if the initial reload fails.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::builder(path).build()
    }

    /// Opens `path` with both watching and auto-save enabled.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns `ConfigError::ServiceUnavailable` outside a runtime.
    pub fn sync_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::builder(path).sync(true).build()
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// The backing file's format.
    pub fn format(&self) -> Format {
        self.inner.codec.format()
    }

    /// The codec used to load and save the backing file.
    pub fn codec(&self) -> Arc<dyn Codec> {
        Arc::clone(&self.inner.codec)
    }

    /// Returns the first value matching `path` in the effective configuration.
    ///
    /// Invalid or non-matching paths return `None`.
    pub fn get(&self, path: &str) -> Option<Value> {
        resolve_first(&self.inner.read_state().effective, path)
    }

    /// Returns every value matching `path`, in document order.
    pub fn get_all(&self, path: &str) -> Vec<Value> {
        resolve_all(&self.inner.read_state().effective, path)
    }

    /// True when `path` matches at least one value.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Returns the first match of `path` deserialized as `T`.
    ///
    /// # Errors
    /// * `ConfigError::InvalidPath` - If nothing matches `path`
    /// * `ConfigError::TypeMismatch` - If the value cannot be deserialized as `T`
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConfigError> {
        let value = self
            .get(path)
            .ok_or_else(|| ConfigError::InvalidPath(path.to_string()))?;

        serde_json::from_value(value.clone()).map_err(|_| ConfigError::TypeMismatch {
            path: path.to_string(),
            expected_type: std::any::type_name::<T>(),
            actual_value: value,
        })
    }

    /// Returns the effective configuration without copying it.
    pub fn snapshot(&self) -> Arc<Mapping> {
        Arc::clone(&self.inner.read_state().effective)
    }

    /// Returns a copy of the effective configuration.
    pub fn as_map(&self) -> Mapping {
        self.snapshot().as_ref().clone()
    }

    /// Returns a copy of the raw configuration layer.
    pub fn configuration(&self) -> Mapping {
        self.inner.read_state().configuration.clone()
    }

    /// Returns a copy of the defaults layer.
    pub fn defaults(&self) -> Mapping {
        self.inner.read_state().defaults.clone()
    }

    /// Returns a copy of the overlay layer.
    pub fn overlay(&self) -> Mapping {
        self.inner.read_state().overlay.clone()
    }

    /// When the backing file was last reloaded.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.inner.last_refresh().map(DateTime::<Utc>::from)
    }

    /// Writes `value` at `path` in the raw configuration.
    ///
    /// Literal paths create missing intermediate containers; pattern paths
    /// overwrite every existing match. Invalid paths are a no-op. Listeners
    /// fire after the write is applied, then the file is saved if `sync_down`
    /// is enabled.
    ///
    /// # Errors
    /// * `ConfigError::LockError` - If the state lock is poisoned
    /// * `ConfigError::PersistenceError` / `SerializationError` - If saving fails
    /// * `ConfigError::ListenerFailures` - If any listener failed; the write still applied
    #[instrument(skip(self, value), fields(path = %path))]
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        let value = value.into();
        self.mutate(|configuration| set_path(configuration, path, value))
    }

    /// Writes several `path => value` entries as one change-set.
    ///
    /// # Errors
    /// Same as [`ConfigStore::set`].
    #[instrument(skip_all, fields(entries = entries.len()))]
    pub fn merge(&self, entries: Mapping) -> Result<(), ConfigError> {
        self.mutate(|configuration| {
            entries
                .into_iter()
                .flat_map(|(path, value)| set_path(configuration, &path, value))
                .collect()
        })
    }

    /// Removes every value matching `path` from the raw configuration.
    ///
    /// Returns the removed values. No listeners are notified.
    ///
    /// # Errors
    /// * `ConfigError::LockError` - If the state lock is poisoned
    /// * `ConfigError::PersistenceError` / `SerializationError` - If saving fails
    #[instrument(skip(self), fields(path = %path))]
    pub fn delete(&self, path: &str) -> Result<Vec<Value>, ConfigError> {
        let removed = {
            let mut state = self.inner.write_state()?;
            let mut configuration = state.configuration.clone();
            let removed = delete_path(&mut configuration, path);
            if removed.is_empty() {
                return Ok(removed);
            }

            state.effective = Arc::new(compile(&configuration, &state.defaults, &state.overlay));
            state.configuration = configuration;
            removed
        };

        debug!(removed = removed.len(), "Deleted configuration values");

        if self.sync_down() {
            self.save()?;
        }

        Ok(removed)
    }

    /// Empties the raw configuration layer. No listeners are notified.
    ///
    /// # Errors
    /// Same as [`ConfigStore::delete`].
    pub fn clear(&self) -> Result<(), ConfigError> {
        {
            let mut state = self.inner.write_state()?;
            state.configuration = Mapping::new();
            state.effective = Arc::new(compile(&state.configuration, &state.defaults, &state.overlay));
        }

        if self.sync_down() {
            self.save()?;
        }

        Ok(())
    }

    /// Replaces the defaults layer and recompiles.
    ///
    /// # Errors
    /// * `ConfigError::LockError` - If the state lock is poisoned
    /// * `ConfigError::ListenerFailures` - If any listener failed
    pub fn set_defaults(&self, defaults: Mapping) -> Result<(), ConfigError> {
        self.replace_layer(Layer::Defaults, defaults)
    }

    /// Replaces the overlay layer and recompiles.
    ///
    /// # Errors
    /// Same as [`ConfigStore::set_defaults`].
    pub fn set_overlay(&self, overlay: Mapping) -> Result<(), ConfigError> {
        self.replace_layer(Layer::Overlay, overlay)
    }

    /// Loads the backing file and merges it according to the reload policy.
    ///
    /// A missing or malformed file loads as empty. `on_reload` is called on
    /// every reload, whether or not anything changed.
    ///
    /// # Errors
    /// * `ConfigError::LockError` - If the state lock is poisoned
    /// * `ConfigError::ListenerFailures` - If any listener or hook failed
    #[instrument(skip(self), fields(path = %self.inner.path.display()))]
    pub fn reload(&self) -> Result<(), ConfigError> {
        let options = self.inner.options();
        let policy = ReloadPolicy::from_flags(options.persist_memory, options.prefer_memory);
        let started = SystemTime::now();
        let loaded = self.inner.codec.load(&self.inner.path, options.stringify_keys);
        let track = self.has_listeners();

        let (effective, change_set) = {
            let mut state = self.inner.write_state()?;
            let configuration = policy.apply(&state.configuration, loaded);
            let effective = Arc::new(compile(&configuration, &state.defaults, &state.overlay));
            let change_set =
                track.then(|| detect_changes(&state.effective, configuration.clone()));

            state.configuration = configuration;
            state.effective = Arc::clone(&effective);
            state.last_refresh = Some(started);
            (effective, change_set)
        };

        info!(?policy, keys = effective.len(), "Configuration reloaded");

        let mut failures = change_set
            .map(|change_set| self.dispatch(&change_set))
            .unwrap_or_default();

        let on_reload = self.hooks().on_reload.clone();
        if let Some(hook) = on_reload {
            failures.extend(isolate("on_reload", || hook(&effective)));
        }

        into_result(failures)
    }

    /// Writes the effective configuration to the backing file.
    ///
    /// # Errors
    /// * `ConfigError::SerializationError` - If the format cannot encode the configuration
    /// * `ConfigError::PersistenceError` - If the file cannot be written
    #[instrument(skip(self), fields(path = %self.inner.path.display()))]
    pub fn save(&self) -> Result<(), ConfigError> {
        let effective = self.snapshot();
        self.inner.codec.save(&self.inner.path, &effective)
    }

    /// Removes the backing file. Returns false if there was none.
    ///
    /// # Errors
    /// Returns `ConfigError::IoError` if the file exists but cannot be removed.
    pub fn delete_file(&self) -> Result<bool, ConfigError> {
        match fs::remove_file(&self.inner.path) {
            Ok(()) => {
                info!(path = %self.inner.path.display(), "Removed config file");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ConfigError::IoError {
                path: self.inner.path.clone(),
                details: e.to_string(),
            }),
        }
    }

    /// Registers a singular event on a hash path.
    ///
    /// # Errors
    /// Returns `ConfigError::PatternError` if the path cannot be parsed.
    pub fn on<F>(&self, path: &str, processor: F) -> Result<EventId, ConfigError>
    where
        F: Fn(&Matched, &EventPattern) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        Ok(self.add_event(Event::on(path, processor)?))
    }

    /// Registers an event.
    pub fn add_event(&self, event: Event) -> EventId {
        self.inner.events.add(event)
    }

    /// Removes an event. Returns false if it was not registered.
    pub fn remove_event(&self, id: EventId) -> bool {
        self.inner.events.remove(id)
    }

    /// Number of registered events.
    pub fn event_count(&self) -> usize {
        self.inner.events.len()
    }

    /// Subscribes to changes under `pattern`.
    ///
    /// # Errors
    /// Returns `ConfigError::PatternError` if the pattern cannot be parsed.
    pub fn subscribe(&self, pattern: &str) -> Result<Subscription, ConfigError> {
        Ok(self.inner.events.subscribe(HashPath::parse(pattern)?))
    }

    /// Sets the hook called after every reload.
    pub fn set_on_reload<F>(&self, hook: F)
    where
        F: Fn(&Mapping) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.hooks_mut().on_reload = Some(Arc::new(hook));
    }

    /// Sets the hook called with `(incoming, diff)` when a change-set alters the configuration.
    pub fn set_on_change<F>(&self, hook: F)
    where
        F: Fn(&Mapping, &Mapping) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.hooks_mut().on_change = Some(Arc::new(hook));
    }

    /// Removes both hooks.
    pub fn clear_hooks(&self) {
        *self.hooks_mut() = Hooks::default();
    }

    /// Whether external edits to the file are picked up.
    pub fn sync_up(&self) -> bool {
        self.inner.sync_up.load(Ordering::SeqCst)
    }

    /// Whether in-memory writes are saved to the file.
    pub fn sync_down(&self) -> bool {
        self.inner.sync_down.load(Ordering::SeqCst)
    }

    /// Enables or disables watching the backing file.
    ///
    /// # Errors
    /// Returns `ConfigError::ServiceUnavailable` when enabling outside a tokio runtime.
    pub fn set_sync_up(&self, enabled: bool) -> Result<(), ConfigError> {
        if enabled {
            let previous = self.inner.sync_up.swap(true, Ordering::SeqCst);
            self.start_watching().inspect_err(|_| {
                self.inner.sync_up.store(previous, Ordering::SeqCst);
            })
        } else {
            self.stop_watching();
            Ok(())
        }
    }

    /// Enables or disables saving after every write.
    pub fn set_sync_down(&self, enabled: bool) {
        self.inner.sync_down.store(enabled, Ordering::SeqCst);
    }

    /// Sets `sync_up` and `sync_down` together.
    ///
    /// # Errors
    /// Same as [`ConfigStore::set_sync_up`].
    pub fn sync(&self, enabled: bool) -> Result<(), ConfigError> {
        self.set_sync_down(enabled);
        self.set_sync_up(enabled)
    }

    /// How long the watcher waits between checks.
    pub fn interval(&self) -> Duration {
        self.inner.interval()
    }

    /// Sets the watch interval; values below 10ms are raised to 10ms.
    pub fn set_interval(&self, interval: Duration) {
        self.inner
            .update_options(|options| options.interval = interval.max(MIN_INTERVAL));
    }

    /// Whether in-memory values survive a reload.
    pub fn persist_memory(&self) -> bool {
        self.inner.options().persist_memory
    }

    /// Sets whether in-memory values survive a reload.
    pub fn set_persist_memory(&self, enabled: bool) {
        self.inner
            .update_options(|options| options.persist_memory = enabled);
    }

    /// Whether in-memory values win over the file on reload.
    pub fn prefer_memory(&self) -> bool {
        self.inner.options().prefer_memory
    }

    /// Sets whether in-memory values win over the file on reload.
    pub fn set_prefer_memory(&self, enabled: bool) {
        self.inner
            .update_options(|options| options.prefer_memory = enabled);
    }

    /// The reload policy selected by the current flags.
    pub fn reload_policy(&self) -> ReloadPolicy {
        let options = self.inner.options();
        ReloadPolicy::from_flags(options.persist_memory, options.prefer_memory)
    }

    fn hooks(&self) -> RwLockReadGuard<'_, Hooks> {
        self.inner.hooks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn hooks_mut(&self) -> RwLockWriteGuard<'_, Hooks> {
        self.inner.hooks.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn has_listeners(&self) -> bool {
        self.hooks().on_change.is_some() || self.inner.events.has_listeners()
    }

    fn mutate<F>(&self, write: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut Mapping) -> Vec<Vec<Step>>,
    {
        let track = self.has_listeners();

        let change_set = {
            let mut state = self.inner.write_state()?;
            let mut configuration = state.configuration.clone();
            let locations = write(&mut configuration);
            if locations.is_empty() {
                debug!("Path matched nothing, configuration unchanged");
                return Ok(());
            }

            let effective = compile(&configuration, &state.defaults, &state.overlay);
            let change_set = track.then(|| {
                detect_changes(
                    &state.effective,
                    incoming_from_locations(&configuration, &locations),
                )
            });

            state.configuration = configuration;
            state.effective = Arc::new(effective);
            change_set
        };

        let failures = change_set
            .map(|change_set| self.dispatch(&change_set))
            .unwrap_or_default();

        if self.sync_down() {
            self.save()?;
        }

        into_result(failures)
    }

    fn replace_layer(&self, layer: Layer, mapping: Mapping) -> Result<(), ConfigError> {
        let track = self.has_listeners();

        let change_set = {
            let mut state = self.inner.write_state()?;
            let effective = match layer {
                Layer::Defaults => compile(&state.configuration, &mapping, &state.overlay),
                Layer::Overlay => compile(&state.configuration, &state.defaults, &mapping),
            };
            let change_set = track.then(|| detect_changes(&state.effective, mapping.clone()));

            match layer {
                Layer::Defaults => state.defaults = mapping,
                Layer::Overlay => state.overlay = mapping,
            }
            state.effective = Arc::new(effective);
            change_set
        };

        into_result(
            change_set
                .map(|change_set| self.dispatch(&change_set))
                .unwrap_or_default(),
        )
    }

    fn dispatch(&self, change_set: &ChangeSet) -> Vec<ListenerFailure> {
        if change_set.is_empty() {
            return Vec::new();
        }

        debug!(changes = change_set.changes.len(), "Dispatching configuration changes");

        let mut failures = Vec::new();

        let on_change = self.hooks().on_change.clone();
        if let Some(hook) = on_change {
            failures.extend(isolate("on_change", || {
                hook(&change_set.incoming, &change_set.diff)
            }));
        }

        failures.extend(self.inner.events.dispatch(change_set));
        failures
    }
}

fn into_result(failures: Vec<ListenerFailure>) -> Result<(), ConfigError> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ListenerFailures(failures))
    }
}

/// Builder for [`ConfigStore`].
pub struct ConfigStoreBuilder {
    path: PathBuf,
    format: Option<Format>,
    codec: Option<Arc<dyn Codec>>,
    registry: FormatRegistry,
    configuration: Mapping,
    defaults: Mapping,
    overlay: Mapping,
    sync_up: bool,
    sync_down: bool,
    fs_events: bool,
    options: Options,
    hooks: Hooks,
    events: Vec<Event>,
}

impl ConfigStoreBuilder {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
            codec: None,
            registry: FormatRegistry::default(),
            configuration: Mapping::new(),
            defaults: Mapping::new(),
            overlay: Mapping::new(),
            sync_up: false,
            sync_down: false,
            fs_events: false,
            options: Options::default(),
            hooks: Hooks::default(),
            events: Vec::new(),
        }
    }

    /// Uses a specific format instead of detecting one.
    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Uses a custom codec.
    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Uses a custom registry for format lookup and detection.
    pub fn registry(mut self, registry: FormatRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Initial raw configuration. Replaced by the first reload unless
    /// `persist_memory` is set.
    pub fn configuration(mut self, configuration: Mapping) -> Self {
        self.configuration = configuration;
        self
    }

    /// Lowest-precedence layer.
    pub fn defaults(mut self, defaults: Mapping) -> Self {
        self.defaults = defaults;
        self
    }

    /// Highest-precedence layer.
    pub fn overlay(mut self, overlay: Mapping) -> Self {
        self.overlay = overlay;
        self
    }

    /// Watch the file for external edits.
    pub fn sync_up(mut self, enabled: bool) -> Self {
        self.sync_up = enabled;
        self
    }

    /// Save after every in-memory write.
    pub fn sync_down(mut self, enabled: bool) -> Self {
        self.sync_down = enabled;
        self
    }

    /// Sets `sync_up` and `sync_down` together.
    pub fn sync(self, enabled: bool) -> Self {
        self.sync_up(enabled).sync_down(enabled)
    }

    /// Wake the watcher early on filesystem events instead of only polling.
    pub fn fs_events(mut self, enabled: bool) -> Self {
        self.fs_events = enabled;
        self
    }

    /// Watch interval, raised to at least 10ms.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.options.interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Keep in-memory values across reloads.
    pub fn persist_memory(mut self, enabled: bool) -> Self {
        self.options.persist_memory = enabled;
        self
    }

    /// Let in-memory values win over the file on reload.
    pub fn prefer_memory(mut self, enabled: bool) -> Self {
        self.options.prefer_memory = enabled;
        self
    }

    /// Convert non-string keys to strings on load (default) instead of rejecting the file.
    pub fn stringify_keys(mut self, enabled: bool) -> Self {
        self.options.stringify_keys = enabled;
        self
    }

    /// Hook called after every reload.
    pub fn on_reload<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Mapping) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.hooks.on_reload = Some(Arc::new(hook));
        self
    }

    /// Hook called with `(incoming, diff)` when a change-set alters the configuration.
    pub fn on_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Mapping, &Mapping) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.hooks.on_change = Some(Arc::new(hook));
        self
    }

    /// Registers an event before the initial reload.
    pub fn event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// Creates the store, performs the initial reload and starts watching
    /// when `sync_up` is set.
    ///
    /// Listener failures during the initial reload are logged, not returned.
    ///
    /// # Errors
    /// * `ConfigError::LockError` - If the initial reload cannot lock the state
    /// * `ConfigError::ServiceUnavailable` - If `sync_up` is set outside a tokio runtime
    pub fn build(self) -> Result<ConfigStore, ConfigError> {
        let codec = match (self.codec, self.format) {
            (Some(codec), _) => codec,
            (None, Some(format)) => self
                .registry
                .get(format)
                .unwrap_or_else(|| self.registry.detect(&self.path)),
            (None, None) => self.registry.detect(&self.path),
        };

        let effective = Arc::new(compile(&self.configuration, &self.defaults, &self.overlay));

        let events = Arc::new(EventRegistry::default());
        for event in self.events {
            events.add(event);
        }

        let store = ConfigStore {
            inner: Arc::new(Inner {
                path: self.path,
                codec,
                state: RwLock::new(State {
                    configuration: self.configuration,
                    defaults: self.defaults,
                    overlay: self.overlay,
                    effective,
                    last_refresh: None,
                }),
                hooks: RwLock::new(self.hooks),
                events,
                sync_up: AtomicBool::new(self.sync_up),
                sync_down: AtomicBool::new(self.sync_down),
                options: RwLock::new(self.options),
                watcher: Mutex::new(None),
                fs_events: self.fs_events,
            }),
        };

        debug!(
            path = %store.path().display(),
            format = %store.format(),
            "Created configuration store"
        );

        match store.reload() {
            Ok(()) => {}
            Err(ConfigError::ListenerFailures(failures)) => {
                warn!(failed = failures.len(), "Listeners failed during initial load");
            }
            Err(e) => return Err(e),
        }

        if self.sync_up {
            store.start_watching()?;
        }

        Ok(store)
    }
}
