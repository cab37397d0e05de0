//! Tera rendering with structured errors.
//!
//! Every render builds a fresh `Tera` instance with the given
//! [`FunctionRegistry`] registered, so no function state leaks between
//! renders. Tera errors are mapped to [`TemplateError`] variants, with
//! Levenshtein-based suggestions for misspelled variables and functions.

use regex::Regex;
use strsim::levenshtein;
use tera::{Context as TeraContext, Tera};

use super::error::TemplateError;
use super::functions::FunctionRegistry;

/// Maximum allowed Levenshtein distance as a percentage of target length for suggestions.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Render `body` with `functions` against `context`.
///
/// # Errors
///
/// Returns a [`TemplateError`] naming `template` when parsing or execution fails.
pub fn render(
    template: &str,
    body: &str,
    context: &TeraContext,
    functions: &FunctionRegistry,
) -> Result<String, TemplateError> {
    let mut tera = Tera::default();
    functions.register_into(&mut tera);

    tera.render_str(body, context).map_err(|e| classify_tera_error(template, &e, context, functions))
}

/// Map a Tera error onto the matching [`TemplateError`] variant.
fn classify_tera_error(
    template: &str,
    error: &tera::Error,
    context: &TeraContext,
    functions: &FunctionRegistry,
) -> TemplateError {
    use std::error::Error;

    let mut current: Option<&(dyn Error + 'static)> = Some(error);
    while let Some(err) = current {
        if let Some(tera_err) = err.downcast_ref::<tera::Error>() {
            match &tera_err.kind {
                tera::ErrorKind::FunctionNotFound(name) | tera::ErrorKind::FilterNotFound(name) => {
                    let available: Vec<String> = functions.names().map(str::to_string).collect();
                    return TemplateError::FunctionNotFound {
                        template: template.to_string(),
                        function: name.clone(),
                        suggestions: find_similar(name, &available),
                    };
                }
                _ => {}
            }
        }
        current = err.source();
    }

    let message = format_tera_error(error);

    if let Some(variable) = extract_variable_name(&message) {
        let available = context_variables(context);
        return TemplateError::VariableNotFound {
            template: template.to_string(),
            suggestions: find_similar(&variable, &available),
            variable,
        };
    }

    if error.to_string().starts_with("Failed to parse") {
        return TemplateError::Syntax {
            template: template.to_string(),
            line: extract_line(&message),
            message,
        };
    }

    TemplateError::Execution {
        template: template.to_string(),
        message,
    }
}

/// Flatten the error chain into one message without Tera's internal
/// template name.
pub fn format_tera_error(error: &tera::Error) -> String {
    use std::error::Error;

    let mut all_messages = vec![error.to_string()];
    let mut current: Option<&(dyn Error + 'static)> = error.source();
    while let Some(err) = current {
        all_messages.push(err.to_string());
        current = err.source();
    }

    let messages: Vec<String> = all_messages
        .into_iter()
        .map(|msg| {
            msg.replace("while rendering '__tera_one_off'", "")
                .replace("Failed to render '__tera_one_off'", "Template rendering failed")
                .replace("Failed to parse '__tera_one_off'", "Template syntax error")
                .replace("Failed to parse \"__tera_one_off\"", "Template syntax error")
                .replace("'__tera_one_off'", "template")
                .trim()
                .to_string()
        })
        .filter(|msg| {
            !msg.is_empty() && msg != "Template rendering failed" && msg != "Template syntax error"
        })
        .collect();

    if messages.is_empty() {
        "Template syntax error".to_string()
    } else {
        messages.join(": ")
    }
}

/// Extract variable name from a "Variable `foo` not found" message.
fn extract_variable_name(message: &str) -> Option<String> {
    let re = Regex::new(r"Variable `([^`]+)` not found").ok()?;
    re.captures(message).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_string())
}

/// Line number from Tera's `line:column` parse positions.
fn extract_line(message: &str) -> Option<usize> {
    let re = Regex::new(r"(\d+):(\d+)").ok()?;
    re.captures(message).and_then(|caps| caps.get(1)).and_then(|m| m.as_str().parse().ok())
}

/// Dotted paths of every object key in the context.
fn context_variables(context: &TeraContext) -> Vec<String> {
    fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<String>) {
        if let serde_json::Value::Object(map) = value {
            for (key, child) in map {
                let path =
                    if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
                out.push(path.clone());
                walk(&path, child, out);
            }
        }
    }

    let mut vars = Vec::new();
    walk("", &context.clone().into_json(), &mut vars);
    vars
}

/// Find similar names using Levenshtein distance.
fn find_similar(target: &str, available: &[String]) -> Vec<String> {
    let mut scored: Vec<_> =
        available.iter().map(|name| (name.clone(), levenshtein(target, name))).collect();

    scored.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    scored
        .into_iter()
        .filter(|(_, dist)| *dist <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
        .take(3)
        .map(|(name, _)| name)
        .collect()
}
