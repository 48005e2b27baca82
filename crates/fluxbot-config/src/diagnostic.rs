// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns Figment failures into miette diagnostics.
//!
//! Unknown keys are reported by their full dotted path together with the
//! layer that supplied them, so a stray `FLUXBOT_SERVER_PROT` variable is told
//! apart from a typo in `fluxbot.toml`. "Did you mean" hints use Jaro-Winkler
//! similarity and are spelled the way that layer expects: a bare key for a
//! file, the full variable name for the environment.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use std::fmt;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Below this Jaro-Winkler score no suggestion is offered.
const SUGGESTION_THRESHOLD: f64 = 0.75;

const ENV_PREFIX: &str = "FLUXBOT_";

/// Configuration layer a rejected key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOrigin {
    /// A TOML file, by path.
    File(String),
    /// A `FLUXBOT_*` environment variable.
    Env,
    /// Any other provider, by its figment name.
    Other(String),
}

impl KeyOrigin {
    fn from_metadata(metadata: Option<&figment::Metadata>) -> Self {
        match metadata {
            Some(m) => match &m.source {
                Some(figment::Source::File(path)) => Self::File(path.display().to_string()),
                _ if m.name.contains("environment variable") => Self::Env,
                _ => Self::Other(m.name.to_string()),
            },
            None => Self::Other("defaults".into()),
        }
    }

    /// How an operator would write `section.key` in this layer.
    pub fn spell(&self, path: &[String], field: &str) -> String {
        match self {
            Self::Env => {
                let mut parts: Vec<&str> = path.iter().map(String::as_str).collect();
                parts.push(field);
                format!("{ENV_PREFIX}{}", parts.join("_").to_ascii_uppercase())
            }
            Self::File(_) | Self::Other(_) => field.to_string(),
        }
    }
}

impl fmt::Display for KeyOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "in {path}"),
            Self::Env => write!(f, "from a {ENV_PREFIX}* environment variable"),
            Self::Other(name) => write!(f, "from {name}"),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}` {origin}")]
    #[diagnostic(
        code(fluxbot::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// Dotted path of the rejected key, e.g. `auth.token_secrt`.
        key: String,
        origin: KeyOrigin,
        /// Closest valid key, spelled for `origin`.
        suggestion: Option<String>,
        /// Keys accepted at the same level, comma separated.
        valid_keys: String,
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(fluxbot::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(fluxbot::config::missing_key),
        help("add `{key} = <value>` to fluxbot.toml or set the matching FLUXBOT_ variable")
    )]
    MissingKey { key: String },

    #[error("validation error: {message}")]
    #[diagnostic(code(fluxbot::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(fluxbot::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Convert every error carried by a `figment::Error` into a [`ConfigError`].
///
/// `toml_sources` pairs a file path with its contents and is only used to
/// attach source spans.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                // figment's path ends with the rejected field itself.
                let mut parent = error.path.clone();
                if parent.last() == Some(field) {
                    parent.pop();
                }
                let origin = KeyOrigin::from_metadata(error.metadata.as_ref());
                let (span, src) = locate(&error, &parent, field, toml_sources);
                let mut key = parent.clone();
                key.push(field.clone());
                ConfigError::UnknownKey {
                    key: key.join("."),
                    suggestion: suggest_key(field, expected).map(|s| origin.spell(&parent, &s)),
                    valid_keys: expected.join(", "),
                    origin,
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: field.to_string(),
            },
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: error.path.join("."),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.clone(),
            },
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

fn locate(
    error: &figment::error::Error,
    parent: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(figment::Source::File(path)) = error.metadata.as_ref().and_then(|m| m.source.as_ref())
    else {
        return (None, None);
    };
    let path = path.display().to_string();
    let Some((name, content)) = toml_sources.iter().find(|(p, _)| *p == path) else {
        return (None, None);
    };

    match find_key_offset(content, parent, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` inside the `[section]` named by `path[0]`, or
/// anywhere at line start when `path` is empty.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let start = match path.first() {
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header)? + header.len()
        }
        None => 0,
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') && offset != start {
            return None;
        }
        if let Some(after) = trimmed.strip_prefix(field)
            && after.trim_start().starts_with('=')
        {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }
    None
}

/// Closest valid key to `unknown`, if any scores above the threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render diagnostics to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}
