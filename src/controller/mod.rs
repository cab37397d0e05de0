//! The driver loop.
//!
//! The [`Controller`] owns one [`TaskDriver`] per configured task. Each
//! iteration resolves every task, hands changed output to the
//! [`Provisioner`], then waits on the [`Watcher`] for new data.
//!
//! A task moves through [`TaskState`]s:
//!
//! ```text
//! Idle -> Rendering -> Waiting -> Rendering -> Ready -> Rendering -> Ready ...
//!                  \__________________________/
//! ```
//!
//! `Waiting` means some data has not arrived yet; `Ready` means the task's
//! latest output was applied.
//!
//! Two modes are offered:
//!
//! - [`Controller::run_once`] returns once every task was applied, failing on
//!   the first template error or when the wait times out.
//! - [`Controller::run_watch`] runs until the watcher stops, logging errors
//!   and retrying them on the next change.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;

use crate::config::Config;
use crate::provision::Provisioner;
use crate::resolver::{RenderResult, Resolver};
use crate::templating::{Template, task_template};
use crate::watcher::{WatchError, Watcher};

/// Where a task stands in the driver loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not resolved yet.
    Idle,
    /// Resolved, but referenced data is still loading.
    Waiting,
    /// Being resolved.
    Rendering,
    /// Latest output applied.
    Ready,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Waiting => "waiting",
            Self::Rendering => "rendering",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// A task's template and loop state.
#[derive(Debug)]
pub struct TaskDriver {
    template: Template,
    state: TaskState,
    applied: usize,
}

impl TaskDriver {
    pub fn new(template: Template) -> Self {
        Self {
            template,
            state: TaskState::Idle,
            applied: 0,
        }
    }

    pub fn name(&self) -> &str {
        self.template.name()
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// How many renders were applied.
    pub fn applied(&self) -> usize {
        self.applied
    }

    fn transition(&mut self, next: TaskState) {
        if self.state != next {
            tracing::trace!(
                target: "controller",
                "{}: {} -> {}",
                self.template.name(),
                self.state,
                next
            );
            self.state = next;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Once,
    Watch,
}

/// Runs task drivers against a watcher and a provisioner.
pub struct Controller<P> {
    watcher: Watcher,
    resolver: Resolver,
    drivers: Vec<TaskDriver>,
    provisioner: P,
    wait_timeout: Duration,
}

impl<P: Provisioner> Controller<P> {
    /// Build drivers for every task in a loaded configuration.
    ///
    /// # Errors
    ///
    /// Fails if a task's custom template cannot be read.
    pub fn new(config: &Config, watcher: Watcher, provisioner: P) -> Result<Self> {
        let drivers = config
            .tasks
            .iter()
            .map(|task| task_template(task).map(TaskDriver::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::with_drivers(drivers, watcher, provisioner, config.wait_timeout()))
    }

    pub fn with_drivers(
        drivers: Vec<TaskDriver>,
        watcher: Watcher,
        provisioner: P,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            watcher,
            resolver: Resolver::new(),
            drivers,
            provisioner,
            wait_timeout,
        }
    }

    /// Override the wait timeout. Zero waits without a deadline.
    pub fn set_wait_timeout(&mut self, timeout: Duration) {
        self.wait_timeout = timeout;
    }

    pub fn drivers(&self) -> &[TaskDriver] {
        &self.drivers
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    /// Render and apply every task once.
    ///
    /// # Errors
    ///
    /// Fails on the first template or provisioning error, when no new data
    /// arrives within the wait timeout, or when the watcher stops first.
    pub async fn run_once(&mut self) -> Result<()> {
        loop {
            self.iterate(Mode::Once).await?;

            if self.drivers.iter().all(|d| d.applied > 0) {
                tracing::info!(target: "controller", "All {} task(s) rendered", self.drivers.len());
                return Ok(());
            }

            if let Err(e) = self.watcher.wait(self.wait_timeout).await {
                let waiting = self
                    .drivers
                    .iter()
                    .filter(|d| d.applied == 0)
                    .map(TaskDriver::name)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("Tasks not rendered: {waiting}"));
            }
        }
    }

    /// Keep tasks in sync until the watcher stops.
    ///
    /// # Errors
    ///
    /// Render and provisioning failures are logged, not returned; this only
    /// fails if the loop cannot continue.
    pub async fn run_watch(&mut self) -> Result<()> {
        loop {
            self.iterate(Mode::Watch).await?;

            match self.watcher.wait(self.wait_timeout).await {
                Ok(()) => {}
                Err(WatchError::Timeout { timeout }) => {
                    tracing::debug!(target: "controller", "No changes within {:?}", timeout);
                }
                Err(WatchError::Stopped) => {
                    tracing::info!(target: "controller", "Watch stopped");
                    return Ok(());
                }
            }
        }
    }

    /// Resolve every task and apply the changed ones.
    async fn iterate(&mut self, mode: Mode) -> Result<()> {
        let mut changed: Vec<(usize, Vec<u8>)> = Vec::new();

        for (index, driver) in self.drivers.iter_mut().enumerate() {
            driver.transition(TaskState::Rendering);

            match self.resolver.run(&driver.template, &self.watcher) {
                Ok(RenderResult::NotReady { missing }) => {
                    tracing::debug!(
                        target: "controller",
                        "{} waiting for {}",
                        driver.name(),
                        missing.join(", ")
                    );
                    driver.transition(TaskState::Waiting);
                }
                Ok(RenderResult::Unchanged) => driver.transition(TaskState::Ready),
                Ok(RenderResult::Changed(contents)) => changed.push((index, contents)),
                Err(e) => {
                    driver.transition(TaskState::Waiting);
                    match mode {
                        Mode::Once => {
                            return Err(anyhow::Error::new(e))
                                .with_context(|| format!("Failed to render task '{}'", driver.name()));
                        }
                        Mode::Watch => {
                            tracing::warn!(target: "controller", "{}", e.format_with_context());
                        }
                    }
                }
            }
        }

        if changed.is_empty() {
            return Ok(());
        }

        let results = join_all(
            changed
                .iter()
                .map(|(index, contents)| self.provisioner.apply(self.drivers[*index].name(), contents)),
        )
        .await;

        let mut first_error = None;
        for ((index, _), result) in changed.iter().zip(results) {
            let driver = &mut self.drivers[*index];
            match result {
                Ok(()) => {
                    driver.applied += 1;
                    driver.transition(TaskState::Ready);
                    tracing::info!(target: "controller", "Applied {}", driver.name());
                }
                Err(e) => {
                    // Render again on the next pass.
                    self.watcher.deregister(driver.template.id());
                    driver.transition(TaskState::Waiting);
                    let e = e.context(format!("Failed to apply task '{}'", driver.name()));
                    match mode {
                        Mode::Once => {
                            first_error.get_or_insert(e);
                        }
                        Mode::Watch => tracing::warn!(target: "controller", "{:#}", e),
                    }
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl<P> fmt::Debug for Controller<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("drivers", &self.drivers)
            .field("wait_timeout", &self.wait_timeout)
            .finish_non_exhaustive()
    }
}
