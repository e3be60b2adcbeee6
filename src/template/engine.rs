//! Template engine for expression rendering
//!
//! Uses minijinja with its standard delimiters:
//! - Variable delimiters: `{{...}}`
//! - Block delimiters: `{%...%}`
//! - Comment delimiters: `{#...#}`
//!
//! Go-template style paths with a leading dot (`{{ .metadata.namespace }}`)
//! are accepted and rewritten to plain minijinja paths before parsing.

use minijinja::{Environment, ErrorKind, UndefinedBehavior};

use super::context::TemplateContext;
use super::error::TemplateError;
use super::filters;

/// Template engine for expression resolution
///
/// Supports:
/// - `{{...}}` expressions with Go-style leading-dot paths
/// - `{%...%}` blocks (conditionals, loops)
/// - Strict undefined variable handling
/// - Custom filters (see [`filters`](super::filters))
///
/// The engine holds no per-render state and can be shared across
/// concurrent reconciliations.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

impl TemplateEngine {
    /// Create a new template engine with strict undefined handling
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);

        env.add_filter("default", filters::default_filter);
        env.add_filter("required", filters::required);
        env.add_filter("upper", filters::upper);
        env.add_filter("lower", filters::lower);
        env.add_filter("base64_encode", filters::base64_encode);
        env.add_filter("b64enc", filters::base64_encode);
        env.add_filter("base64_decode", filters::base64_decode);
        env.add_filter("b64dec", filters::base64_decode);
        env.add_filter("trim_prefix", filters::trim_prefix);
        env.add_filter("trim_suffix", filters::trim_suffix);
        env.add_filter("trunc", filters::trunc);
        env.add_filter("quote", filters::quote);
        env.add_filter("kebabcase", filters::kebabcase);
        env.add_filter("snakecase", filters::snakecase);

        Self { env }
    }

    /// Render a template string with the given context
    ///
    /// Strings without template syntax are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::Parse` if the template syntax is invalid, and
    /// `TemplateError::Evaluation` if a referenced path is undefined or a
    /// filter fails.
    pub fn render(&self, template: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
        if !Self::has_template_syntax(template) {
            return Ok(template.to_string());
        }

        // render_str compiles before evaluating, so syntax errors always win
        let normalized = normalize_dot_paths(template);
        self.env
            .render_str(&normalized, ctx.to_value())
            .map_err(|e| match e.kind() {
                ErrorKind::SyntaxError => TemplateError::parse(e),
                _ => TemplateError::evaluation(e),
            })
    }

    /// Check if a string contains any template syntax
    pub fn has_template_syntax(s: &str) -> bool {
        s.contains("{{") || s.contains("{%") || s.contains("{#")
    }
}

/// Rewrite Go-style leading-dot paths inside `{{...}}` and `{%...%}` tags.
///
/// `{{ .metadata.name | upper }}` becomes `{{ metadata.name | upper }}`.
/// Attribute access (`a.b`, `f().b`, `x[0].b`), numbers and quoted strings
/// are left alone, and so is the body of a `{% raw %}` block. Unterminated
/// tags are copied verbatim so the parser can report them.
fn normalize_dot_paths(template: &str) -> String {
    let mut result = String::with_capacity(template.len());
    let mut remaining = template;

    while let Some((start, close)) = next_tag(remaining) {
        result.push_str(&remaining[..start + 2]);
        remaining = &remaining[start + 2..];

        let Some(end) = find_closer(remaining, close) else {
            result.push_str(remaining);
            return result;
        };

        let body = &remaining[..end];
        result.push_str(&normalize_expression(body));
        result.push_str(close);
        remaining = &remaining[end + close.len()..];

        if close == "%}" && tag_keyword(body) == "raw" {
            let raw_len = raw_body_len(remaining);
            result.push_str(&remaining[..raw_len]);
            remaining = &remaining[raw_len..];
        }
    }

    result.push_str(remaining);
    result
}

/// Find the next expression or block tag, returning its offset and closer
fn next_tag(s: &str) -> Option<(usize, &'static str)> {
    let var = s.find("{{").map(|i| (i, "}}"));
    let block = s.find("{%").map(|i| (i, "%}"));
    match (var, block) {
        (Some(v), Some(b)) => Some(if v.0 < b.0 { v } else { b }),
        (v, b) => v.or(b),
    }
}

/// Offset of the tag closer in `s`, ignoring closers inside string literals
fn find_closer(s: &str, close: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut quote = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if bytes[i..].starts_with(close.as_bytes()) => return Some(i),
            None => {}
        }
        i += 1;
    }

    None
}

/// Block tag body without whitespace control markers, e.g. `- raw +` -> `raw`
fn tag_keyword(body: &str) -> &str {
    body.trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '+')
}

/// Length of the text before the `{% endraw %}` that closes a raw block
///
/// The whole remainder when the block is never closed.
fn raw_body_len(s: &str) -> usize {
    for (start, _) in s.match_indices("{%") {
        let body = &s[start + 2..];
        if let Some(end) = body.find("%}") {
            if tag_keyword(&body[..end]) == "endraw" {
                return start;
            }
        }
    }
    s.len()
}

/// Drop dots that start a path, skipping quoted strings
fn normalize_expression(expr: &str) -> String {
    let mut result = String::with_capacity(expr.len());
    let mut chars = expr.chars().peekable();
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if in_single_quote || in_double_quote => {
                result.push(ch);
                if let Some(escaped) = chars.next() {
                    result.push(escaped);
                }
            }
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                result.push(ch);
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                result.push(ch);
            }
            '.' if !in_single_quote && !in_double_quote => {
                let is_attribute_access = result
                    .chars()
                    .last()
                    .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | ')' | ']'));
                let starts_identifier = chars
                    .peek()
                    .is_some_and(|c| c.is_alphabetic() || *c == '_');
                if is_attribute_access || !starts_identifier {
                    result.push('.');
                }
            }
            _ => result.push(ch),
        }
    }

    result
}
