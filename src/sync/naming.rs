//! # Naming
//!
//! Conversion between ARM tag names and Kubernetes label names, plus the value and
//! syntax checks each side imposes.
//!
//! Tag names allow characters that label names do not, and labels are limited to 63
//! characters per name segment and value. Conversions never fail: names and values are
//! truncated to fit, and callers use the `is_valid_*` checks to skip what still does not.

use crate::config::ConfigOptions;
use regex::Regex;
use std::sync::LazyLock;

/// Maximum length of a label name segment and of a label value
pub const MAX_LABEL_NAME_LEN: usize = 63;
pub const MAX_LABEL_VALUE_LEN: usize = 63;
/// Maximum length of the DNS subdomain prefix of a label name
pub const MAX_LABEL_PREFIX_LEN: usize = 253;

/// Characters ARM does not accept in tag names
pub const INVALID_TAG_CHARS: &[char] = &['<', '>', '%', '&', '\\', '?', '/'];

static LABEL_SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?)?$")
        .expect("Failed to compile label segment regex")
});

static DNS_SUBDOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("Failed to compile DNS subdomain regex")
});

/// Keep the first `max` characters of `s`
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Prepend `prefix/` to `name`. An empty prefix leaves the name unchanged.
#[must_use]
pub fn label_with_prefix(name: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Strip `prefix/` from `label` if present
#[must_use]
pub fn label_without_prefix<'a>(label: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return label;
    }
    label
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(label)
}

/// Map a tag name to the label name it is synced to.
///
/// The tag prefix is removed if the tag starts with it, the remainder is cut to 63
/// characters and the label prefix is prepended.
#[must_use]
pub fn tag_name_to_label_name(tag_name: &str, options: &ConfigOptions) -> String {
    let name = tag_name
        .strip_prefix(options.tag_prefix.as_str())
        .unwrap_or(tag_name);
    label_with_prefix(truncate_chars(name, MAX_LABEL_NAME_LEN), &options.label_prefix)
}

/// Map a label name to the tag name it is synced to
#[must_use]
pub fn label_name_to_tag_name(label_name: &str, options: &ConfigOptions) -> String {
    label_without_prefix(label_name, &options.label_prefix).to_string()
}

/// Whether the label, once its label prefix is stripped, is usable as a tag name
#[must_use]
pub fn is_valid_tag_name(label_name: &str, options: &ConfigOptions) -> bool {
    !label_without_prefix(label_name, &options.label_prefix).contains(INVALID_TAG_CHARS)
}

/// Cut a tag value down to what a label value can hold
#[must_use]
pub fn truncate_tag_value_for_label(value: &str) -> &str {
    truncate_chars(value, MAX_LABEL_VALUE_LEN)
}

/// Whether `name` is a syntactically valid Kubernetes label name
/// (`[prefix/]name`, prefix a DNS subdomain)
#[must_use]
pub fn is_valid_label_name(name: &str) -> bool {
    let (prefix, segment) = match name.rsplit_once('/') {
        Some((prefix, segment)) => (Some(prefix), segment),
        None => (None, name),
    };
    if let Some(prefix) = prefix {
        if prefix.is_empty()
            || prefix.len() > MAX_LABEL_PREFIX_LEN
            || !DNS_SUBDOMAIN_RE.is_match(prefix)
        {
            return false;
        }
    }
    !segment.is_empty()
        && segment.len() <= MAX_LABEL_NAME_LEN
        && LABEL_SEGMENT_RE.is_match(segment)
}

/// Whether `value` is a syntactically valid Kubernetes label value. Empty is valid.
#[must_use]
pub fn is_valid_label_value(value: &str) -> bool {
    value.len() <= MAX_LABEL_VALUE_LEN && LABEL_SEGMENT_RE.is_match(value)
}
