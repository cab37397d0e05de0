//! User-facing error reports.

use std::fmt;

use colored::Colorize;

use crate::config::ConfigError;
use crate::templating::TemplateError;
use crate::watcher::WatchError;

/// An error message with optional details and a suggestion for fixing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub message: String,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print to stderr: the message in red, details in yellow, the
    /// suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with an actionable suggestion.
///
/// The error chain is searched for the crate's own error types first, then
/// for I/O and TOML errors. Anything else is reported with its full chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let message = format!("{error:#}");

    for cause in error.chain() {
        if let Some(config_error) = cause.downcast_ref::<ConfigError>() {
            return config_context(message, config_error);
        }

        if let Some(template_error) = cause.downcast_ref::<TemplateError>() {
            return template_context(message, template_error);
        }

        if let Some(watch_error) = cause.downcast_ref::<WatchError>() {
            return match watch_error {
                WatchError::Timeout { .. } => ErrorContext::new(message)
                    .with_suggestion(
                        "Increase --timeout, or check that the catalog file lists the services the tasks need",
                    )
                    .with_details("Some referenced catalog data never arrived before the deadline"),
                WatchError::Stopped => ErrorContext::new(message)
                    .with_details("The watch was stopped before every task rendered"),
            };
        }

        if let Some(io_error) = cause.downcast_ref::<std::io::Error>() {
            return io_context(message, io_error);
        }

        if cause.downcast_ref::<toml::de::Error>().is_some() {
            return ErrorContext::new(message).with_suggestion(
                "Check the TOML syntax. Verify quotes, brackets and that every key is supported",
            );
        }
    }

    ErrorContext::new(message)
}

fn config_context(message: String, error: &ConfigError) -> ErrorContext {
    let context = ErrorContext::new(message);

    match error {
        ConfigError::InvalidTask { reason, .. } => match reason.as_ref() {
            ConfigError::MissingRegexp | ConfigError::InvalidRegexp { .. } => {
                regexp_suggestion(context)
            }
            _ => context,
        },
        ConfigError::MissingRegexp | ConfigError::InvalidRegexp { .. } => regexp_suggestion(context),
        ConfigError::Read { .. } => {
            context.with_suggestion("Check that the --config path exists and is readable")
        }
        ConfigError::Parse { .. } => context
            .with_suggestion("Check the TOML syntax. Verify quotes, brackets and that every key is supported"),
        ConfigError::EmptyTaskName => context.with_suggestion("Give every [[task]] a name"),
        ConfigError::InvalidTaskName { .. } => context
            .with_suggestion("Use a plain name without '/', '\\' or '..', such as \"web-lb\"")
            .with_details("Each task writes its tfvars into a directory named after it"),
        ConfigError::DuplicateTask(_) => context.with_suggestion(
            "Rename one of the tasks, or move the override into a separate config file to merge them",
        ),
        ConfigError::UnknownTask(_) => {
            context.with_suggestion("Run `catalog-sync validate` to list the configured tasks")
        }
        ConfigError::NothingToWatch(_) => context
            .with_suggestion("Add task.services or a [task.condition] block of type \"catalog-services\""),
        ConfigError::TemplateRead { .. } => context.with_suggestion(
            "Check the task's template path. Relative paths resolve against the current directory",
        ),
    }
}

fn regexp_suggestion(context: ErrorContext) -> ErrorContext {
    context
        .with_suggestion("Set task.services, or give the condition a valid regexp")
        .with_details("Without an explicit regexp one is built from the task's service names")
}

fn template_context(message: String, error: &TemplateError) -> ErrorContext {
    let context = ErrorContext::new(message).with_details(error.format_with_context());

    match error {
        TemplateError::Syntax { .. } => context.with_suggestion(
            "Check template syntax: variables use {{ var }}, control flow uses {% %}",
        ),
        TemplateError::VariableNotFound { .. } => context.with_suggestion(
            "Templates see `task` and `condition`. Check the variable name against them",
        ),
        TemplateError::FunctionNotFound { .. } => {
            context.with_suggestion("Check the function name. Arguments must be passed by name")
        }
        TemplateError::Execution { .. } => context,
    }
}

fn io_context(message: String, error: &std::io::Error) -> ErrorContext {
    let context = ErrorContext::new(message);

    match error.kind() {
        std::io::ErrorKind::PermissionDenied => context
            .with_suggestion("Check ownership and permissions of the working directory and its files"),
        std::io::ErrorKind::NotFound => {
            context.with_suggestion("Check that the file or directory exists and the path is correct")
        }
        _ => context,
    }
}
