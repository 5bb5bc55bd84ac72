//! Field-level validation rules shared by every kind.
//!
//! Each `validate_*` function takes the dotted manifest path of the field it
//! checks so the resulting [`SchemaError`] names the offending field.

use std::sync::OnceLock;

use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::{SchemaError, SchemaResult};

pub const MAX_NAME_LEN: usize = 50;
pub const MAX_TAG_LEN: usize = 128;

const CLEAN_STRING: &str = r"^[a-zA-Z0-9_-]+$";
const CLEAN_STRING_WITH_SPACES: &str = r"^[a-zA-Z0-9_\-.:/ ]+$";
// semver.org reference grammar.
const SEMVER: &str = r"^(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)(?:-((?:0|[1-9][0-9]*|[0-9]*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9][0-9]*|[0-9]*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$";
const EMAIL: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";
const DNS_LABEL: &str = r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$";
const PLACEHOLDER: &str = r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}";

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static validation pattern compiles"))
}

fn clean_string_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compiled(&RE, CLEAN_STRING)
}

fn clean_string_with_spaces_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compiled(&RE, CLEAN_STRING_WITH_SPACES)
}

fn semver_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compiled(&RE, SEMVER)
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compiled(&RE, EMAIL)
}

fn dns_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compiled(&RE, DNS_LABEL)
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compiled(&RE, PLACEHOLDER)
}

/// Alphanumerics, hyphen and underscore only: safe in a URL path segment.
pub fn is_clean_string(s: &str) -> bool {
    clean_string_re().is_match(s)
}

/// Looser variant used for tags and annotations.
pub fn is_clean_string_with_spaces(s: &str) -> bool {
    clean_string_with_spaces_re().is_match(s)
}

pub fn is_semver(s: &str) -> bool {
    semver_re().is_match(s)
}

pub fn require_non_empty(field: &str, value: &str) -> SchemaResult<()> {
    if value.trim().is_empty() {
        return Err(SchemaError::field(field, "must not be empty"));
    }
    Ok(())
}

/// Resource names: non-empty, at most [`MAX_NAME_LEN`] characters, clean string.
pub fn validate_name(field: &str, value: &str) -> SchemaResult<()> {
    require_non_empty(field, value)?;
    if value.chars().count() > MAX_NAME_LEN {
        return Err(SchemaError::field(
            field,
            format!("must be at most {MAX_NAME_LEN} characters (got {})", value.chars().count()),
        ));
    }
    validate_clean_string(field, value)
}

pub fn validate_clean_string(field: &str, value: &str) -> SchemaResult<()> {
    if !is_clean_string(value) {
        return Err(SchemaError::field(
            field,
            format!("'{value}' may only contain letters, digits, '-' and '_'"),
        ));
    }
    Ok(())
}

pub fn validate_tag(field: &str, value: &str) -> SchemaResult<()> {
    if value.chars().count() > MAX_TAG_LEN {
        return Err(SchemaError::field(
            field,
            format!("must be at most {MAX_TAG_LEN} characters"),
        ));
    }
    if !is_clean_string_with_spaces(value) {
        return Err(SchemaError::field(
            field,
            format!("'{value}' contains characters that are not URL-safe"),
        ));
    }
    Ok(())
}

pub fn validate_semver(field: &str, value: &str) -> SchemaResult<()> {
    if !is_semver(value) {
        return Err(SchemaError::field(
            field,
            format!("'{value}' is not a valid semantic version"),
        ));
    }
    Ok(())
}

pub fn validate_email(field: &str, value: &str) -> SchemaResult<()> {
    if !email_re().is_match(value) {
        return Err(SchemaError::field(
            field,
            format!("'{value}' is not a valid email address"),
        ));
    }
    Ok(())
}

/// Absolute http(s) URL.
pub fn validate_url(field: &str, value: &str) -> SchemaResult<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| SchemaError::field(field, format!("'{value}' is not a valid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(SchemaError::field(
            field,
            format!("URL scheme must be http or https (got {other})"),
        )),
    }
}

pub fn validate_dns_label(field: &str, value: &str) -> SchemaResult<()> {
    if !dns_label_re().is_match(value) {
        return Err(SchemaError::field(
            field,
            format!("'{value}' is not a valid DNS label"),
        ));
    }
    Ok(())
}

/// Fully qualified domain name: dot-separated DNS labels, at least two.
pub fn validate_domain(field: &str, value: &str) -> SchemaResult<()> {
    let labels: Vec<&str> = value.trim_end_matches('.').split('.').collect();
    if labels.len() < 2 || value.len() > 253 {
        return Err(SchemaError::field(
            field,
            format!("'{value}' is not a fully qualified domain name"),
        ));
    }
    for label in labels {
        validate_dns_label(field, label)?;
    }
    Ok(())
}

pub fn validate_range<T>(field: &str, value: T, min: T, max: T) -> SchemaResult<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(SchemaError::field(
            field,
            format!("{value} is outside the allowed range {min}..={max}"),
        ));
    }
    Ok(())
}

/// `{name}` placeholders referenced by a templated string, in order of first
/// appearance, without duplicates.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for cap in placeholder_re().captures_iter(template) {
        let name = cap[1].to_string();
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

/// Check that `sql` is exactly one syntactically valid, read-only query.
///
/// `{placeholder}` tokens are substituted with a literal before parsing so
/// templated queries (`WHERE id = {user_id}`) are checked as the database
/// would see them after parameter binding. Returns the placeholder names.
pub fn validate_sql(field: &str, sql: &str) -> SchemaResult<Vec<String>> {
    require_non_empty(field, sql)?;
    let params = placeholders(sql);
    let bound = placeholder_re().replace_all(sql, "1");

    let statements = Parser::parse_sql(&GenericDialect {}, &bound)
        .map_err(|e| SchemaError::field(field, format!("invalid SQL: {e}")))?;

    match statements.as_slice() {
        [Statement::Query(_)] => Ok(params),
        [] => Err(SchemaError::field(field, "SQL query is empty")),
        [_] => Err(SchemaError::field(field, "only SELECT queries are allowed")),
        _ => Err(SchemaError::field(
            field,
            format!("expected exactly one statement (got {})", statements.len()),
        )),
    }
}
