use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use catalog_sync::config::Config;
use catalog_sync::controller::{Controller, TaskState};
use catalog_sync::provision::TfvarsWriter;
use catalog_sync::registry::{FileRegistry, Poller};
use catalog_sync::test_utils::{CatalogFixture, TestEnvironment, init_test_logging};
use catalog_sync::watcher::{WatchError, Watcher};
use tokio::task::JoinHandle;

fn start(env: &TestEnvironment) -> Result<(Controller<TfvarsWriter>, JoinHandle<()>)> {
    let config = Config::load(&[env.config_path()])?;
    let (watcher, fetches) = Watcher::with_fetch_channel();
    let controller =
        Controller::new(&config, watcher.clone(), TfvarsWriter::new(config.working_dir()))?;
    let registry = Arc::new(FileRegistry::new(env.catalog_path()));
    let poller = Poller::spawn(registry, watcher, fetches, Duration::from_millis(50));
    Ok((controller, poller))
}

#[tokio::test]
async fn test_render_once_writes_tfvars() -> Result<()> {
    init_test_logging(None);
    let env = TestEnvironment::web_lb()?;
    let (mut controller, poller) = start(&env)?;

    controller.run_once().await?;
    controller.watcher().stop();
    poller.await?;

    assert_eq!(controller.drivers()[0].state(), TaskState::Ready);
    assert_eq!(controller.drivers()[0].applied(), 1);

    let tfvars = env.read_tfvars("web-lb")?;
    assert!(tfvars.starts_with("# This file is generated by catalog-sync. Do not edit.\n# Task: web-lb\n"));
    assert!(tfvars.contains("\"api-1.node-a.dc1\" = {"), "{tfvars}");
    assert!(tfvars.contains("\"api-2.node-b.dc1\" = {"), "{tfvars}");
    assert!(tfvars.contains("\"10.0.0.2\""), "service address falls back to the node address");
    assert!(!tfvars.contains("web-1"));
    assert!(tfvars.contains("      \"owner\" = \"team-a\"\n"), "{tfvars}");
    assert!(tfvars.ends_with("catalog_services = {\n  \"api\" = [\"v1\", \"v2\"]\n}\n"), "{tfvars}");
    Ok(())
}

#[tokio::test]
async fn test_render_once_is_stable() -> Result<()> {
    let env = TestEnvironment::web_lb()?;

    let (mut first, poller) = start(&env)?;
    first.run_once().await?;
    first.watcher().stop();
    poller.await?;
    let before = env.read_tfvars("web-lb")?;

    let (mut second, poller) = start(&env)?;
    second.run_once().await?;
    second.watcher().stop();
    poller.await?;

    assert_eq!(env.read_tfvars("web-lb")?, before);
    Ok(())
}

#[tokio::test]
async fn test_empty_catalog_still_renders() -> Result<()> {
    let env = TestEnvironment::web_lb()?;
    env.write_catalog(&CatalogFixture::empty())?;
    let (mut controller, poller) = start(&env)?;

    controller.run_once().await?;
    controller.watcher().stop();
    poller.await?;

    let tfvars = env.read_tfvars("web-lb")?;
    assert!(tfvars.contains("services = {\n}\n"), "{tfvars}");
    assert!(tfvars.ends_with("catalog_services = {}\n"), "{tfvars}");
    Ok(())
}

#[tokio::test]
async fn test_missing_catalog_times_out() -> Result<()> {
    let env = TestEnvironment::web_lb()?;
    std::fs::remove_file(env.catalog_path())?;
    let (mut controller, poller) = start(&env)?;
    controller.set_wait_timeout(Duration::from_millis(200));

    let err = controller.run_once().await.unwrap_err();
    controller.watcher().stop();
    poller.await?;

    assert!(format!("{err:#}").contains("Tasks not rendered: web-lb"));
    assert!(matches!(err.downcast_ref::<WatchError>(), Some(WatchError::Timeout { .. })));
    assert_eq!(controller.drivers()[0].state(), TaskState::Waiting);
    assert!(!env.tfvars_path("web-lb").exists());
    Ok(())
}
