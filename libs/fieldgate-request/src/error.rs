//! Error channels of the request side.
//!
//! `InputError` is data: it is accumulated while sanitizing and returned next to the
//! best-effort request. `ConfigError` is a deployment mistake and is raised.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which part of the input an `InputError` refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorContext {
    #[serde(rename = "selected field")]
    SelectedField,
    #[serde(rename = "filtering field")]
    FilteringField,
    #[serde(rename = "option")]
    Option,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorContext::SelectedField => write!(f, "selected field"),
            ErrorContext::FilteringField => write!(f, "filtering field"),
            ErrorContext::Option => write!(f, "option"),
        }
    }
}

/// One rejected piece of caller input. `field_name` is the wire-level dotted path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputError {
    pub context: ErrorContext,
    pub field_name: String,
    pub reason: String,
}

impl InputError {
    pub fn new(context: ErrorContext, field_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            context,
            field_name: field_name.into(),
            reason: reason.into(),
        }
    }

    pub fn selected(field_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorContext::SelectedField, field_name, reason)
    }

    pub fn filtering(field_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorContext::FilteringField, field_name, reason)
    }

    pub fn option(field_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorContext::Option, field_name, reason)
    }
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`: {}", self.context, self.field_name, self.reason)
    }
}

/// Schema wiring mistakes, raised at construction or first use.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("domain `{domain}` declares an empty natural key")]
    EmptyNaturalKey { domain: String },

    #[error("linked domain `{domain}` used before initialization")]
    Uninitialized { domain: String },

    #[error("linked domain `{domain}` is already initialized")]
    AlreadyInitialized { domain: String },

    #[error("cannot resolve link to `{domain}`: no configuration registered for role `{role}`")]
    UnresolvedLink { domain: String, role: String },

    #[error("unknown domain `{domain}` for role `{role}`")]
    UnknownDomain { domain: String, role: String },

    #[error("domain `{domain}` registered twice for role `{role}`")]
    DuplicateDomain { domain: String, role: String },
}
