//! One rendering pass of a template.
//!
//! [`Resolver::run`] decides between three outcomes:
//!
//! 1. The template is registered and none of its dependencies moved:
//!    [`RenderResult::Unchanged`], nothing is executed.
//! 2. Executing the body referenced data that has not arrived yet:
//!    [`RenderResult::NotReady`]. This is a normal state while fetch loops
//!    warm up, not an error, and nothing is registered.
//! 3. Everything was present: the template is registered against the
//!    dependencies it used and [`RenderResult::Changed`] carries the output.
//!
//! A [`TemplateError`] fails the pass without touching the watcher state of
//! other templates; the failed template stays unregistered so the next pass
//! retries it, and what the failed pass read no longer keeps dependencies
//! alive.

use crate::templating::{Template, TemplateError};
use crate::watcher::Watcher;

/// Outcome of [`Resolver::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderResult {
    /// Dependencies without data, by key.
    NotReady { missing: Vec<String> },
    /// Nothing the template depends on changed since the last render.
    Unchanged,
    /// Fresh output to persist.
    Changed(Vec<u8>),
}

impl RenderResult {
    pub fn is_ready(&self) -> bool {
        !matches!(self, Self::NotReady { .. })
    }
}

/// Drives rendering passes against a [`Watcher`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver;

impl Resolver {
    pub fn new() -> Self {
        Self
    }

    /// Run one pass of `template`.
    ///
    /// # Errors
    ///
    /// Returns the [`TemplateError`] raised by execution.
    pub fn run(&self, template: &Template, watcher: &Watcher) -> Result<RenderResult, TemplateError> {
        let id = template.id();

        if !watcher.changed(id) {
            tracing::trace!(target: "resolver", "{} unchanged", template.name());
            return Ok(RenderResult::Unchanged);
        }

        let result = match template.execute(&watcher.recaller(id)) {
            Ok(result) => result,
            Err(e) => {
                watcher.forget_pass(id);
                return Err(e);
            }
        };

        if !result.is_complete() {
            tracing::debug!(
                target: "resolver",
                "{} waiting on {} of {} dependencies",
                template.name(),
                result.missing.len(),
                result.used.len()
            );
            return Ok(RenderResult::NotReady {
                missing: result.missing,
            });
        }

        watcher.register(id, &result.used);
        tracing::debug!(
            target: "resolver",
            "Rendered {} ({} bytes, {} dependencies)",
            template.name(),
            result.output.len(),
            result.used.len()
        );
        Ok(RenderResult::Changed(result.output.into_bytes()))
    }
}
