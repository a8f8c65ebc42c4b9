//! System prompt templating.

use crate::error::{Error, Result};
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

const DELIMITERS: &[(&str, &str)] = &[("{{", "}}"), ("{%", "%}"), ("<%", "%>")];

/// Renders a system prompt template with strict undefined-variable checks.
///
/// # Errors
///
/// Returns [`Error::Template`] if the template is invalid or references an
/// undefined variable, and [`Error::UnresolvedTemplate`] if the output still
/// contains template delimiters.
pub fn render_system_prompt<S: Serialize>(template: &str, vars: S) -> Result<String> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.add_template("system_prompt", template)?;
    let output = env.get_template("system_prompt")?.render(vars)?;
    let normalized = output.replace("\r\n", "\n");
    ensure_resolved(&normalized)?;
    Ok(normalized)
}

/// Checks that a prompt carries no template delimiters.
///
/// # Errors
///
/// Returns [`Error::UnresolvedTemplate`] naming the first offending fragment.
pub fn ensure_resolved(prompt: &str) -> Result<()> {
    for (open, close) in DELIMITERS {
        if let Some(start) = prompt.find(open) {
            let rest = &prompt[start..];
            let end = rest.find(close).map_or(rest.len(), |i| i + close.len());
            return Err(Error::UnresolvedTemplate {
                fragment: rest[..end].to_string(),
            });
        }
    }
    Ok(())
}
