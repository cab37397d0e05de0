//! Background collection of dependency data.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::Registry;
use crate::utils::backoff::exponential_backoff_with_delay;
use crate::watcher::{Fetch, Watcher};

/// Spawns one fetch loop per dependency the watcher starts tracking.
///
/// Each loop fetches, hands the data to [`Watcher::update`] and sleeps for
/// the poll interval. It exits once the dependency is retired, even if it is
/// tracked again later (the new tracking gets its own loop), or once the
/// watcher stops. Failed fetches are retried with exponential backoff.
pub struct Poller;

impl Poller {
    /// Consume `fetches` until the channel closes or `watcher` stops.
    pub fn spawn<R: Registry>(
        registry: Arc<R>,
        watcher: Watcher,
        mut fetches: mpsc::UnboundedReceiver<Fetch>,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let fetch = tokio::select! {
                    received = fetches.recv() => match received {
                        Some(fetch) => fetch,
                        None => break,
                    },
                    () = watcher.stopped() => break,
                };

                tokio::spawn(fetch_loop(
                    Arc::clone(&registry),
                    watcher.clone(),
                    fetch,
                    interval,
                ));
            }
            tracing::debug!(target: "registry", "Poller exiting");
        })
    }
}

async fn fetch_loop<R: Registry>(
    registry: Arc<R>,
    watcher: Watcher,
    fetch: Fetch,
    interval: Duration,
) {
    let Fetch {
        dependency,
        generation,
    } = fetch;
    let key = dependency.key();
    let mut attempt = 0;
    tracing::debug!(
        target: "registry",
        "Starting fetch loop for {} (generation {})",
        key,
        generation
    );

    while !watcher.is_stopped() && watcher.is_current(&key, generation) {
        match registry.fetch(&dependency).await {
            Ok(data) => {
                attempt = 0;
                if !watcher.is_current(&key, generation) || !watcher.update(&key, data) {
                    break;
                }
                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    () = watcher.stopped() => break,
                }
            }
            Err(e) => {
                tracing::warn!(target: "registry", "Fetching {} failed: {:#}", key, e);
                attempt = exponential_backoff_with_delay(attempt).await;
            }
        }
    }

    tracing::debug!(target: "registry", "Fetch loop for {} finished", key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Dependency, DependencyData, Node, NodesQuery};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` fetches, then returns one node.
    struct FlakyRegistry {
        failures: usize,
        calls: AtomicUsize,
    }

    impl Registry for FlakyRegistry {
        async fn fetch(&self, _dependency: &Dependency) -> anyhow::Result<DependencyData> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                anyhow::bail!("registry unavailable");
            }
            Ok(DependencyData::Nodes(vec![Node {
                node: "a".to_string(),
                ..Default::default()
            }]))
        }
    }

    #[tokio::test]
    async fn test_poller_delivers_data_after_failures() {
        let (watcher, rx) = Watcher::with_fetch_channel();
        let registry = Arc::new(FlakyRegistry {
            failures: 2,
            calls: AtomicUsize::new(0),
        });
        let handle = Poller::spawn(Arc::clone(&registry), watcher.clone(), rx, Duration::from_millis(10));

        let dep = Dependency::CatalogNodes(NodesQuery::default());
        watcher.add(dep.clone());

        watcher.wait(Duration::from_secs(5)).await.unwrap();
        assert_eq!(watcher.recall(&dep.key()).map(|d| d.len()), Some(1));
        assert!(registry.calls.load(Ordering::SeqCst) >= 3);

        watcher.stop();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_fetch_loop_exits_when_retired() {
        let watcher = Watcher::new();
        let registry = Arc::new(FlakyRegistry {
            failures: 0,
            calls: AtomicUsize::new(0),
        });
        let dep = Dependency::CatalogNodes(NodesQuery::default());

        // Never tracked, so the loop ends before fetching.
        let fetch = Fetch {
            dependency: dep,
            generation: 1,
        };
        fetch_loop(Arc::clone(&registry), watcher, fetch, Duration::from_millis(10)).await;
        assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retire_and_readd_keeps_one_loop() {
        let (watcher, rx) = Watcher::with_fetch_channel();
        let registry = Arc::new(FlakyRegistry {
            failures: 0,
            calls: AtomicUsize::new(0),
        });
        let interval = Duration::from_millis(200);
        let handle = Poller::spawn(Arc::clone(&registry), watcher.clone(), rx, interval);
        let dep = Dependency::CatalogNodes(NodesQuery::default());

        watcher.add(dep.clone());
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            // Nothing references the dependency, so this retires it.
            watcher.register("other", &[]);
            assert!(!watcher.is_tracked(&dep.key()));
            watcher.add(dep.clone());
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
        watcher.stop();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

        // Six initial fetches plus one loop polling every 200ms for about a
        // second. Stale loops would each keep polling as well.
        let calls = registry.calls.load(Ordering::SeqCst);
        assert!(calls <= 14, "{calls} fetches");
    }
}
