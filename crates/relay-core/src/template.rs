//! Prompt template rendering.
//!
//! Templates reference variables as `{{identifier}}` where the identifier
//! matches `[A-Za-z_][A-Za-z0-9_]*`. There is no escaping and no nesting:
//! the scanner walks the string once, so rendering is linear in the template
//! length.

use std::collections::HashMap;

use thiserror::Error;

/// The reserved variable bound to the workflow's original user request.
pub const USER_REQUEST_VAR: &str = "user_request";

/// The reserved variable bound to the immediately preceding task's output
/// (stage-style plans).
pub const PREV_OUTPUT_VAR: &str = "prev_output";

/// Errors raised while scanning or rendering a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template references {variable:?} which has no binding")]
    Unresolved { variable: String },

    #[error("invalid identifier {found:?} between '{{{{' and '}}}}'")]
    InvalidIdentifier { found: String },

    #[error("unterminated '{{{{' at byte {at}")]
    Unterminated { at: usize },
}

/// One piece of a scanned template.
enum Segment<'a> {
    Literal(&'a str),
    Var(&'a str),
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a template into literal and variable segments.
fn scan(template: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or(TemplateError::Unterminated { at: offset + start })?;
        let ident = &after[..end];
        if !is_identifier(ident) {
            return Err(TemplateError::InvalidIdentifier {
                found: ident.to_owned(),
            });
        }
        segments.push(Segment::Var(ident));
        rest = &after[end + 2..];
        offset += start + 2 + end + 2;
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    Ok(segments)
}

/// All variables referenced by a template, in first-appearance order,
/// deduplicated.
pub fn extract_refs(template: &str) -> Result<Vec<String>, TemplateError> {
    let mut refs: Vec<String> = Vec::new();
    for segment in scan(template)? {
        if let Segment::Var(name) = segment {
            if !refs.iter().any(|r| r == name) {
                refs.push(name.to_owned());
            }
        }
    }
    Ok(refs)
}

/// Render a template against a variable map.
///
/// Every referenced variable must be present; a missing binding is a
/// [`TemplateError::Unresolved`], never silently left in place.
pub fn render(template: &str, vars: &HashMap<String, String>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    for segment in scan(template)? {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Var(name) => match vars.get(name) {
                Some(value) => out.push_str(value),
                None => {
                    return Err(TemplateError::Unresolved {
                        variable: name.to_owned(),
                    });
                }
            },
        }
    }
    Ok(out)
}
