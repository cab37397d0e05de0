//! Template rendering errors.
//!
//! A [`TemplateError`] is fatal for one rendering pass only. The watcher
//! state is left as it was, so the next pass retries the template.

use thiserror::Error;

/// Errors raised while executing a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template '{template}': syntax error: {message}")]
    Syntax {
        template: String,
        message: String,
        line: Option<usize>,
    },

    #[error("template '{template}': variable not found: '{variable}'")]
    VariableNotFound {
        template: String,
        variable: String,
        suggestions: Vec<String>,
    },

    #[error("template '{template}': function not found: '{function}'")]
    FunctionNotFound {
        template: String,
        function: String,
        suggestions: Vec<String>,
    },

    #[error("template '{template}': {message}")]
    Execution { template: String, message: String },
}

impl TemplateError {
    /// Name of the template that failed.
    pub fn template(&self) -> &str {
        match self {
            Self::Syntax { template, .. }
            | Self::VariableNotFound { template, .. }
            | Self::FunctionNotFound { template, .. }
            | Self::Execution { template, .. } => template,
        }
    }

    /// Suggested replacements for a misspelled name, if any.
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::VariableNotFound { suggestions, .. }
            | Self::FunctionNotFound { suggestions, .. } => suggestions,
            _ => &[],
        }
    }

    /// Multi-line description with location and suggestions.
    pub fn format_with_context(&self) -> String {
        let mut msg = String::new();

        match self {
            Self::Syntax {
                template,
                message,
                line,
            } => {
                msg.push_str("ERROR: Template Syntax Error\n\n");
                msg.push_str(&format!("Template: {template}\n"));
                if let Some(line) = line {
                    msg.push_str(&format!("Line: {line}\n"));
                }
                msg.push_str(&format!("Error: {message}\n"));
                msg.push_str("\nCommon issues:\n");
                msg.push_str("  - Unclosed {{ }} or {% %} delimiters\n");
                msg.push_str("  - Function arguments not passed by name, e.g. service(name=\"api\")\n");
            }
            Self::VariableNotFound {
                template,
                variable,
                suggestions,
            } => {
                msg.push_str("ERROR: Template Variable Not Found\n\n");
                msg.push_str(&format!("Template: {template}\n"));
                msg.push_str(&format!("Variable: {variable}\n"));
                push_suggestions(&mut msg, suggestions);
            }
            Self::FunctionNotFound {
                template,
                function,
                suggestions,
            } => {
                msg.push_str("ERROR: Template Function Not Found\n\n");
                msg.push_str(&format!("Template: {template}\n"));
                msg.push_str(&format!("Function: {function}\n"));
                push_suggestions(&mut msg, suggestions);
            }
            Self::Execution {
                template,
                message,
            } => {
                msg.push_str("ERROR: Template Execution Failed\n\n");
                msg.push_str(&format!("Template: {template}\n"));
                msg.push_str(&format!("Error: {message}\n"));
            }
        }

        msg
    }
}

fn push_suggestions(msg: &mut String, suggestions: &[String]) {
    if suggestions.is_empty() {
        return;
    }
    msg.push_str("\nDid you mean one of these?\n");
    for suggestion in suggestions {
        msg.push_str(&format!("  - {suggestion}\n"));
    }
}
