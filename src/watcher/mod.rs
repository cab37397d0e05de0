//! Dependency tracking and change detection.
//!
//! The [`Watcher`] is the shared state between the fetch loops that collect
//! catalog data and the resolver that renders templates from it.
//!
//! - A dependency present in the tracker is being collected in the background.
//!   [`Watcher::add`] starts collection, [`Watcher::register`] retires whatever
//!   no template references any more.
//! - Every dependency carries a version that grows each time its data actually
//!   changes. A template remembers the versions it consumed, so
//!   [`Watcher::changed`] is a plain version comparison.
//! - [`Watcher::wait`] parks the driver loop until new data arrives. Updates
//!   that land while nobody waits are buffered as a single wake-up.
//!
//! # Example
//!
//! ```rust,no_run
//! use catalog_sync::registry::{Dependency, NodesQuery};
//! use catalog_sync::watcher::Watcher;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), catalog_sync::watcher::WatchError> {
//! let (watcher, mut fetches) = Watcher::with_fetch_channel();
//! let dep = Dependency::CatalogNodes(NodesQuery::default());
//! watcher.add(dep.clone());
//! assert_eq!(fetches.recv().await.map(|fetch| fetch.dependency), Some(dep));
//!
//! watcher.wait(Duration::from_secs(30)).await?;
//! # Ok(())
//! # }
//! ```

mod recaller;

pub use recaller::Recaller;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{Notify, mpsc, watch};

use crate::registry::{Dependency, DependencyData};

/// Reasons [`Watcher::wait`] returns without new data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    /// No dependency reported new data in time. Callers may simply wait again.
    #[error("no new dependency data within {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("watcher stopped")]
    Stopped,
}

/// A request to start collecting a newly tracked dependency.
///
/// `generation` identifies this tracking period: once the dependency is
/// retired, re-adding it starts a new generation and loops serving the old
/// one should exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetch {
    pub dependency: Dependency,
    pub generation: u64,
}

/// State of one tracked dependency.
#[derive(Debug)]
struct TrackedDependency {
    dependency: Dependency,
    /// `None` until the first fetch completes.
    value: Option<Arc<DependencyData>>,
    version: u64,
    generation: u64,
}

#[derive(Debug)]
struct Inner {
    dependencies: DashMap<String, TrackedDependency>,
    /// Versions each registered template consumed, keyed by template id.
    templates: DashMap<String, HashMap<String, u64>>,
    /// Versions recalled during a template's current pass.
    observed: DashMap<String, HashMap<String, u64>>,
    notify: Notify,
    stop: watch::Sender<bool>,
    fetches: Option<mpsc::UnboundedSender<Fetch>>,
    generations: AtomicU64,
}

/// Tracks dependencies and the versions templates consumed.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Debug, Clone)]
pub struct Watcher {
    inner: Arc<Inner>,
}

impl Default for Watcher {
    fn default() -> Self {
        Self::build(None)
    }
}

impl Watcher {
    /// A watcher without a fetch channel. Data arrives only through
    /// [`update`](Self::update).
    pub fn new() -> Self {
        Self::default()
    }

    /// A watcher that hands every newly added dependency to the returned
    /// receiver, typically consumed by [`crate::registry::Poller`].
    pub fn with_fetch_channel() -> (Self, mpsc::UnboundedReceiver<Fetch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::build(Some(tx)), rx)
    }

    fn build(fetches: Option<mpsc::UnboundedSender<Fetch>>) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                dependencies: DashMap::new(),
                templates: DashMap::new(),
                observed: DashMap::new(),
                notify: Notify::new(),
                stop,
                fetches,
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Start tracking `dependency`. Returns `false` if it was already tracked.
    pub fn add(&self, dependency: Dependency) -> bool {
        let key = dependency.key();
        let generation = match self.inner.dependencies.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => return false,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1;
                entry.insert(TrackedDependency {
                    dependency: dependency.clone(),
                    value: None,
                    version: 0,
                    generation,
                });
                generation
            }
        };

        tracing::debug!(target: "watcher", "Tracking {} (generation {})", key, generation);
        if let Some(tx) = &self.inner.fetches {
            let fetch = Fetch {
                dependency,
                generation,
            };
            if tx.send(fetch).is_err() {
                tracing::debug!(target: "watcher", "Fetch channel closed, {} will not be collected", key);
            }
        }
        true
    }

    /// Current value of a dependency. `None` while it is still loading or
    /// when it is not tracked.
    pub fn recall(&self, key: &str) -> Option<Arc<DependencyData>> {
        self.inner.dependencies.get(key).and_then(|entry| entry.value.clone())
    }

    /// Whether anything `template_id` consumed changed since it was registered.
    ///
    /// Unregistered templates always count as changed.
    pub fn changed(&self, template_id: &str) -> bool {
        let Some(seen) = self.inner.templates.get(template_id) else {
            return true;
        };

        seen.iter().any(|(key, version)| match self.inner.dependencies.get(key) {
            Some(entry) => entry.version != *version,
            None => true,
        })
    }

    /// Start a rendering pass for `template_id`.
    ///
    /// Versions read through the returned [`Recaller`] are what
    /// [`register`](Self::register) records as consumed.
    pub fn recaller(&self, template_id: &str) -> Recaller {
        self.inner.observed.insert(template_id.to_string(), HashMap::new());
        Recaller::new(self.clone(), template_id.to_string())
    }

    /// Associate `template_id` with the dependencies its last pass used.
    ///
    /// Replaces any earlier association, then retires every dependency that
    /// neither a registered template nor an in-flight pass references.
    pub fn register(&self, template_id: &str, dependencies: &[Dependency]) {
        let observed = self
            .inner
            .observed
            .remove(template_id)
            .map(|(_, versions)| versions)
            .unwrap_or_default();

        let seen: HashMap<String, u64> = dependencies
            .iter()
            .map(|dep| {
                let key = dep.key();
                let version = observed.get(&key).copied().unwrap_or_else(|| {
                    self.inner.dependencies.get(&key).map_or(0, |entry| entry.version)
                });
                (key, version)
            })
            .collect();

        tracing::debug!(
            target: "watcher",
            "Registered {} with {} dependencies",
            template_id,
            seen.len()
        );
        self.inner.templates.insert(template_id.to_string(), seen);
        self.retire_unreferenced();
    }

    /// Forget the association of `template_id`, so its next pass renders
    /// again. Its dependencies stay tracked until another registration.
    pub fn deregister(&self, template_id: &str) {
        self.inner.templates.remove(template_id);
    }

    /// Drop what `template_id`'s current pass observed without registering
    /// it. Used when a pass fails, so the failed pass pins no dependencies.
    pub fn forget_pass(&self, template_id: &str) {
        self.inner.observed.remove(template_id);
    }

    fn retire_unreferenced(&self) {
        let mut referenced: HashSet<String> = HashSet::new();
        for entry in self.inner.templates.iter() {
            referenced.extend(entry.value().keys().cloned());
        }
        for entry in self.inner.observed.iter() {
            referenced.extend(entry.value().keys().cloned());
        }

        self.inner.dependencies.retain(|key, tracked| {
            let keep = referenced.contains(key);
            if !keep {
                tracing::debug!(target: "watcher", "Retiring {}", tracked.dependency);
            }
            keep
        });
    }

    /// Store freshly fetched data for `key`.
    ///
    /// The version only moves when the data differs from the stored value, in
    /// which case a waiting [`wait`](Self::wait) is woken. Returns `false` if
    /// the dependency is no longer tracked.
    pub fn update(&self, key: &str, data: DependencyData) -> bool {
        let changed = {
            let Some(mut entry) = self.inner.dependencies.get_mut(key) else {
                return false;
            };
            if entry.value.as_deref() == Some(&data) {
                false
            } else {
                entry.value = Some(Arc::new(data));
                entry.version += 1;
                true
            }
        };

        if changed {
            tracing::debug!(target: "watcher", "New data for {}", key);
            self.inner.notify.notify_one();
        } else {
            tracing::trace!(target: "watcher", "Unchanged data for {}", key);
        }
        true
    }

    /// Wait until a dependency reports new data.
    ///
    /// A zero `timeout` waits without a deadline.
    ///
    /// # Errors
    ///
    /// [`WatchError::Timeout`] when nothing arrived in time,
    /// [`WatchError::Stopped`] once [`stop`](Self::stop) was called.
    pub async fn wait(&self, timeout: Duration) -> Result<(), WatchError> {
        if self.is_stopped() {
            return Err(WatchError::Stopped);
        }

        let notified = self.inner.notify.notified();
        let deadline = async {
            if timeout.is_zero() {
                std::future::pending::<()>().await;
            } else {
                tokio::time::sleep(timeout).await;
            }
        };

        tokio::select! {
            () = notified => Ok(()),
            () = self.stopped() => Err(WatchError::Stopped),
            () = deadline => Err(WatchError::Timeout { timeout }),
        }
    }

    /// Stop the watcher. Pending and future waits fail with
    /// [`WatchError::Stopped`] and fetch loops exit.
    pub fn stop(&self) {
        tracing::debug!(target: "watcher", "Stopping");
        self.inner.stop.send_replace(true);
    }

    /// Resolves once [`stop`](Self::stop) was called.
    pub async fn stopped(&self) {
        let mut rx = self.inner.stop.subscribe();
        // The sender lives in `inner`, so the channel cannot close while we hold `self`.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.stop.borrow()
    }

    pub fn is_tracked(&self, key: &str) -> bool {
        self.inner.dependencies.contains_key(key)
    }

    /// Whether `key` is still tracked in the given generation.
    pub fn is_current(&self, key: &str, generation: u64) -> bool {
        self.inner.dependencies.get(key).is_some_and(|entry| entry.generation == generation)
    }

    /// Number of tracked dependencies.
    pub fn len(&self) -> usize {
        self.inner.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.dependencies.is_empty()
    }

    /// Record that `template_id` read `key` at the current version.
    fn observe(&self, template_id: &str, key: &str, version: u64) {
        self.inner
            .observed
            .entry(template_id.to_string())
            .or_default()
            .insert(key.to_string(), version);
    }

    fn snapshot(&self, key: &str) -> Option<(Option<Arc<DependencyData>>, u64)> {
        self.inner.dependencies.get(key).map(|entry| (entry.value.clone(), entry.version))
    }
}
