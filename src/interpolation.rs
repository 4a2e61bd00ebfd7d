//! `${name}` parameter substitution

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::{Result, SchemeError};
use crate::field::{Interpolator, Parameters};
use crate::fields::leaf::scalar_text;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"))
}

/// Look up a dotted parameter name such as `a.b`
fn lookup<'p>(parameters: &'p Parameters, name: &str) -> Option<&'p Value> {
    let mut segments = name.trim().split('.');
    let mut current = parameters.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(entries) => entries.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Substitute `parameters` into `template`.
///
/// In `simple` mode a template consisting of exactly one placeholder yields
/// the parameter's value unchanged, and an undefined parameter fails with
/// [`SchemeError::UndefinedParameter`]. Otherwise placeholders render as
/// text and undefined ones render empty. A custom `interpolator` replaces
/// this logic entirely.
pub fn interpolate_parameters(
    template: &str,
    parameters: &Parameters,
    simple: bool,
    interpolator: Option<&Interpolator>,
) -> Result<Value> {
    if let Some(interpolator) = interpolator {
        return interpolator(template, parameters);
    }

    let pattern = placeholder();
    if simple {
        if let Some(captures) = pattern.captures(template) {
            let whole = captures.get(0).map(|m| m.as_str().len()) == Some(template.len());
            if whole {
                let name = &captures[1];
                return lookup(parameters, name)
                    .cloned()
                    .ok_or_else(|| SchemeError::UndefinedParameter(name.trim().to_string()));
            }
        }
    }

    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;
    for captures in pattern.captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        rendered.push_str(&template[last..whole.start()]);
        match lookup(parameters, name.as_str()) {
            Some(value) => rendered.push_str(&scalar_text(value)),
            None if simple => {
                return Err(SchemeError::UndefinedParameter(name.as_str().trim().to_string()))
            }
            None => {}
        }
        last = whole.end();
    }
    rendered.push_str(&template[last..]);
    Ok(Value::String(rendered))
}
