//! Template expansion for response bodies, headers and callbacks
//!
//! Templates are plain text with `{{token}}` placeholders expanded against
//! the incoming request plus random, domain-word and time helpers. Domain
//! words come from a pluggable provider so the word lists live outside the
//! core crate; a small built-in fallback keeps the engine usable alone.

use crate::{Error, Result};
use chrono::Utc;
use once_cell::sync::OnceCell;
use rand::distr::Alphanumeric;
use rand::{rng, Rng};
use regex::Regex;
use std::sync::Arc;

/// Request data a template is rendered against
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// HTTP method
    pub method: String,
    /// Full request target (path plus query)
    pub uri: String,
    /// Path component only
    pub path: String,
    /// Raw query string (no leading `?`)
    pub query: String,
    /// Buffered request body
    pub body: String,
    /// Peer address
    pub remote_addr: String,
    /// All request header pairs in arrival order
    pub headers: Vec<(String, String)>,
}

impl RenderContext {
    /// First header value for `name`, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Source of domain words for template helpers. Default methods are a
/// minimal fallback; `mocknest-data` registers the real word lists.
pub trait WordProvider: Send + Sync {
    /// A given name
    fn first_name(&self) -> String {
        "Alex".to_string()
    }
    /// A family name
    fn last_name(&self) -> String {
        "Smith".to_string()
    }
    /// First plus last name
    fn full_name(&self) -> String {
        format!("{} {}", self.first_name(), self.last_name())
    }
    /// A city name
    fn city(&self) -> String {
        "Springfield".to_string()
    }
    /// A country name
    fn country(&self) -> String {
        "Norway".to_string()
    }
    /// A company name
    fn company(&self) -> String {
        "Example Inc".to_string()
    }
    /// A job title
    fn job_title(&self) -> String {
        "Engineer".to_string()
    }
    /// An email address derived from a name
    fn email(&self) -> String {
        format!(
            "{}.{}@example.com",
            self.first_name().to_lowercase(),
            self.last_name().to_lowercase()
        )
    }
    /// A username derived from a name
    fn username(&self) -> String {
        format!("{}{}", self.first_name().to_lowercase(), rng().random_range(10..=99))
    }
    /// A street address
    fn address(&self) -> String {
        format!("{} Main St", rng().random_range(1..=999))
    }
    /// A lorem word
    fn word(&self) -> String {
        "lorem".to_string()
    }
    /// A lorem sentence
    fn sentence(&self) -> String {
        "Lorem ipsum dolor sit amet.".to_string()
    }
}

struct FallbackWords;

impl WordProvider for FallbackWords {}

static WORD_PROVIDER: OnceCell<Arc<dyn WordProvider>> = OnceCell::new();
static FALLBACK: FallbackWords = FallbackWords;

/// Install the process-wide word provider; first registration wins
pub fn register_word_provider(provider: Arc<dyn WordProvider>) {
    let _ = WORD_PROVIDER.set(provider);
}

fn words() -> &'static dyn WordProvider {
    match WORD_PROVIDER.get() {
        Some(provider) => provider.as_ref(),
        None => &FALLBACK,
    }
}

static TOKEN_RE: OnceCell<Regex> = OnceCell::new();

fn token_re() -> &'static Regex {
    TOKEN_RE.get_or_init(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").unwrap())
}

/// Expand every `{{token}}` in `input` against `ctx`. Unrecognized tokens
/// are left in place; malformed helper arguments are an error.
pub fn render(input: &str, ctx: &RenderContext) -> Result<String> {
    // Fast path: nothing to expand.
    if !input.contains("{{") {
        return Ok(input.to_string());
    }

    let mut failure: Option<Error> = None;
    let out = token_re().replace_all(input, |caps: &regex::Captures| {
        let token = caps.get(1).unwrap().as_str();
        match expand_token(token, ctx) {
            Ok(Some(expansion)) => expansion,
            Ok(None) => caps.get(0).unwrap().as_str().to_string(),
            Err(e) => {
                if failure.is_none() {
                    failure = Some(e);
                }
                caps.get(0).unwrap().as_str().to_string()
            }
        }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(out.into_owned()),
    }
}

// Ok(None) means "not a known token, leave it alone".
fn expand_token(token: &str, ctx: &RenderContext) -> Result<Option<String>> {
    let mut parts = token.split_whitespace();
    let name = match parts.next() {
        Some(name) => name,
        None => return Ok(None),
    };
    let args: Vec<&str> = parts.collect();

    // Field tokens accept a trailing case helper: {{method.lower}}.
    let (base, case) = split_case_suffix(name);
    if let Some(field) = expand_field(base, ctx) {
        return Ok(Some(apply_case(field, case)));
    }

    let value = match name {
        "uuid" => uuid::Uuid::new_v4().to_string(),
        "randomString" => {
            let len: usize = parse_arg(&args, 0, "randomString")?;
            rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
        }
        "randomInt" => {
            let a: i64 = parse_arg(&args, 0, "randomInt")?;
            let b: i64 = parse_arg(&args, 1, "randomInt")?;
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            rng().random_range(lo..=hi).to_string()
        }
        "randomFloat" => {
            let a: f64 = parse_arg(&args, 0, "randomFloat")?;
            let b: f64 = parse_arg(&args, 1, "randomFloat")?;
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let v: f64 = rng().random_range(lo..=hi);
            format!("{:.6}", v)
        }
        "randomBool" => rng().random_bool(0.5).to_string(),
        "name.first" => words().first_name(),
        "name.last" => words().last_name(),
        "name.full" => words().full_name(),
        "city" => words().city(),
        "country" => words().country(),
        "company" => words().company(),
        "job.title" => words().job_title(),
        "email" => words().email(),
        "username" => words().username(),
        "address" => words().address(),
        "word" => words().word(),
        "sentence" => words().sentence(),
        "now" | "datetime" => Utc::now().to_rfc3339(),
        "timestamp" => Utc::now().timestamp().to_string(),
        "date" => Utc::now().format("%Y-%m-%d").to_string(),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn expand_field(name: &str, ctx: &RenderContext) -> Option<String> {
    if let Some(header) = name.strip_prefix("header.") {
        return Some(ctx.header(header).unwrap_or_default().to_string());
    }
    match name {
        "method" => Some(ctx.method.clone()),
        "uri" => Some(ctx.uri.clone()),
        "path" => Some(ctx.path.clone()),
        "query" => Some(ctx.query.clone()),
        "body" => Some(ctx.body.clone()),
        "remote_addr" => Some(ctx.remote_addr.clone()),
        _ => None,
    }
}

fn split_case_suffix(name: &str) -> (&str, Option<&str>) {
    for suffix in ["upper", "lower"] {
        if let Some(base) = name.strip_suffix(suffix) {
            if let Some(base) = base.strip_suffix('.') {
                return (base, Some(suffix));
            }
        }
    }
    (name, None)
}

fn apply_case(value: String, case: Option<&str>) -> String {
    match case {
        Some("upper") => value.to_uppercase(),
        Some("lower") => value.to_lowercase(),
        _ => value,
    }
}

fn parse_arg<T: std::str::FromStr>(args: &[&str], index: usize, helper: &str) -> Result<T> {
    args.get(index)
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| Error::template(format!("{} expects a numeric argument {}", helper, index + 1)))
}
