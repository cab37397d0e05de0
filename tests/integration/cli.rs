use anyhow::Result;
use assert_cmd::Command;
use catalog_sync::test_utils::{ConfigFixture, TestEnvironment};
use predicates::prelude::*;

fn catalog_sync() -> Command {
    let mut cmd = Command::cargo_bin("catalog-sync").unwrap();
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_validate_describes_tasks() -> Result<()> {
    let env = TestEnvironment::web_lb()?;

    catalog_sync()
        .arg("validate")
        .arg("--config")
        .arg(env.config_path())
        .assert()
        .success()
        .stdout(predicate::str::contains("web-lb services=[api]"))
        .stdout(predicate::str::contains(
            "catalog-services{regexp: \"^api$\", source_includes_var: true",
        ))
        .stdout(predicate::str::contains("1 task(s) valid"));
    Ok(())
}

#[test]
fn test_validate_merges_config_files() -> Result<()> {
    let env = TestEnvironment::web_lb()?;
    let overlay = env.path().join("overlay.toml");
    std::fs::write(
        &overlay,
        "[[task]]\nname = \"web-lb\"\n\n[task.condition]\ntype = \"catalog-services\"\ndatacenter = \"dc2\"\n",
    )?;

    catalog_sync()
        .arg("validate")
        .arg("--config")
        .arg(env.config_path())
        .arg("--config")
        .arg(&overlay)
        .assert()
        .success()
        .stdout(predicate::str::contains("datacenter: \"dc2\""))
        .stdout(predicate::str::contains("source_includes_var: true"));
    Ok(())
}

#[test]
fn test_validate_reports_missing_regexp() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_config(&ConfigFixture::missing_regexp())?;

    catalog_sync()
        .arg("validate")
        .arg("--config")
        .arg(env.config_path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("task 'broken'"))
        .stderr(predicate::str::contains("cannot both be unset"))
        .stderr(predicate::str::contains("suggestion"));
    Ok(())
}

#[test]
fn test_validate_rejects_escaping_task_name() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_config(&ConfigFixture::escaping_task_name())?;

    catalog_sync()
        .arg("validate")
        .arg("--config")
        .arg(env.config_path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("task name '../escaped'"))
        .stderr(predicate::str::contains("suggestion"));
    assert!(!env.path().join("escaped").exists());
    Ok(())
}

#[test]
fn test_validate_reports_invalid_toml() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_config(&ConfigFixture::invalid_syntax())?;

    catalog_sync()
        .arg("validate")
        .arg("--config")
        .arg(env.config_path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse config file"));
    Ok(())
}

#[test]
fn test_template_prints_body_and_vars() -> Result<()> {
    let env = TestEnvironment::web_lb()?;

    catalog_sync()
        .arg("template")
        .arg("--config")
        .arg(env.config_path())
        .arg("--task")
        .arg("web-lb")
        .assert()
        .success()
        .stdout(predicate::str::contains("# template web-lb:"))
        .stdout(predicate::str::contains("hcl_service(service=svc)"))
        .stdout(predicate::str::contains("\"regexp\": \"^api$\""));
    Ok(())
}

#[test]
fn test_template_unknown_task() -> Result<()> {
    let env = TestEnvironment::web_lb()?;

    catalog_sync()
        .arg("template")
        .arg("--config")
        .arg(env.config_path())
        .arg("--task")
        .arg("nope")
        .assert()
        .failure()
        .stderr(predicate::str::contains("task 'nope' is not defined"));
    Ok(())
}

#[test]
fn test_render_writes_tfvars() -> Result<()> {
    let env = TestEnvironment::web_lb()?;

    catalog_sync()
        .arg("render")
        .arg("--config")
        .arg(env.config_path())
        .arg("--catalog")
        .arg(env.catalog_path())
        .assert()
        .success()
        .stdout(predicate::str::contains("web-lb ->"));

    let tfvars = env.read_tfvars("web-lb")?;
    assert!(tfvars.contains("\"api-1.node-a.dc1\" = {"));
    Ok(())
}

#[test]
fn test_render_times_out_without_catalog() -> Result<()> {
    let env = TestEnvironment::web_lb()?;

    catalog_sync()
        .arg("render")
        .arg("--config")
        .arg(env.config_path())
        .arg("--catalog")
        .arg(env.path().join("missing.json"))
        .arg("--timeout")
        .arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Tasks not rendered: web-lb"))
        .stderr(predicate::str::contains("--timeout"));
    Ok(())
}
