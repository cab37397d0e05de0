use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use catalog_sync::config::Config;
use catalog_sync::controller::Controller;
use catalog_sync::provision::TfvarsWriter;
use catalog_sync::registry::{FileRegistry, Poller};
use catalog_sync::test_utils::{CatalogFixture, TestEnvironment, init_test_logging};
use catalog_sync::watcher::Watcher;

/// Poll `env`'s tfvars until `check` accepts it.
async fn wait_for_tfvars(env: &TestEnvironment, check: impl Fn(&str) -> bool) -> Result<String> {
    for _ in 0..100 {
        if let Ok(contents) = env.read_tfvars("web-lb") {
            if check(&contents) {
                return Ok(contents);
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    bail!("tfvars never reached the expected state")
}

#[tokio::test]
async fn test_catalog_change_rerenders() -> Result<()> {
    init_test_logging(None);
    let env = TestEnvironment::web_lb()?;
    let config = Config::load(&[env.config_path()])?;

    let (watcher, fetches) = Watcher::with_fetch_channel();
    let mut controller =
        Controller::new(&config, watcher.clone(), TfvarsWriter::new(config.working_dir()))?;
    controller.set_wait_timeout(Duration::from_millis(100));
    let registry = Arc::new(FileRegistry::new(env.catalog_path()));
    let poller = Poller::spawn(registry, watcher.clone(), fetches, Duration::from_millis(50));

    let handle = tokio::spawn(async move {
        let result = controller.run_watch().await;
        result.map(|()| controller)
    });

    let first = wait_for_tfvars(&env, |t| t.contains("\"api-2.node-b.dc1\"")).await?;
    assert!(!first.contains("9090"));

    env.write_catalog(&CatalogFixture::api_moved())?;
    let second = wait_for_tfvars(&env, |t| t.contains("= 9090")).await?;

    // Only the moved instance differs.
    let changed: Vec<(&str, &str)> =
        first.lines().zip(second.lines()).filter(|(a, b)| a != b).collect();
    assert_eq!(changed.len(), 1, "{changed:?}");
    assert_eq!(first.lines().count(), second.lines().count());

    watcher.stop();
    let controller = handle.await??;
    poller.await?;

    assert!(controller.drivers()[0].applied() >= 2);
    Ok(())
}

#[tokio::test]
async fn test_stop_ends_watch_while_waiting() -> Result<()> {
    let env = TestEnvironment::web_lb()?;
    std::fs::remove_file(env.catalog_path())?;
    let config = Config::load(&[env.config_path()])?;

    let (watcher, fetches) = Watcher::with_fetch_channel();
    let mut controller =
        Controller::new(&config, watcher.clone(), TfvarsWriter::new(config.working_dir()))?;
    controller.set_wait_timeout(Duration::ZERO);
    let registry = Arc::new(FileRegistry::new(env.catalog_path()));
    let poller = Poller::spawn(registry, watcher.clone(), fetches, Duration::from_millis(50));

    let handle = tokio::spawn(async move { controller.run_watch().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    watcher.stop();

    tokio::time::timeout(Duration::from_secs(5), handle).await???;
    poller.await?;
    assert!(!env.tfvars_path("web-lb").exists());
    Ok(())
}
