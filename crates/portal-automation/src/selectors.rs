//! Selector fallback registry.
//!
//! Every UI target is an ordered list of selector strategies. Lookups try the
//! candidates in order and the first one that matches wins. The registry is
//! plain data: a YAML file can replace any entry without touching step logic.
//!
//! ```yaml
//! login.username:
//!   - by: css
//!     value: "input[name='username']"
//!   - by: role
//!     role: textbox
//!     name: Username
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AutomationError;

/// A single element lookup strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector (structural or attribute based).
    Css { value: String },

    /// Element whose own text contains `value`.
    Text { value: String },

    /// ARIA role, optionally narrowed by accessible name.
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl Selector {
    pub fn css(value: impl Into<String>) -> Self {
        Selector::Css { value: value.into() }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Selector::Text { value: value.into() }
    }

    pub fn role(role: impl Into<String>, name: Option<&str>) -> Self {
        Selector::Role {
            role: role.into(),
            name: name.map(str::to_string),
        }
    }

    /// CSS form of the selector, if it has one.
    pub fn to_css(&self) -> Option<String> {
        match self {
            Selector::Css { value } => Some(value.clone()),
            Selector::Role { role, name: None } => Some(format!("[role=\"{}\"]", css_escape(role))),
            Selector::Role {
                role,
                name: Some(name),
            } => Some(format!(
                "[role=\"{}\"][aria-label=\"{}\"]",
                css_escape(role),
                css_escape(name)
            )),
            Selector::Text { .. } => None,
        }
    }

    /// XPath form of a text selector.
    pub fn to_xpath(&self) -> Option<String> {
        match self {
            Selector::Text { value } => Some(format!(
                "//*[text()[contains(normalize-space(.), {})]]",
                xpath_literal(value)
            )),
            _ => None,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css { value } => write!(f, "css={value}"),
            Selector::Text { value } => write!(f, "text={value}"),
            Selector::Role { role, name: None } => write!(f, "role={role}"),
            Selector::Role {
                role,
                name: Some(name),
            } => write!(f, "role={role}[name={name}]"),
        }
    }
}

fn css_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Quote a string for XPath 1.0, which has no escape sequences.
fn xpath_literal(value: &str) -> String {
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    let parts: Vec<String> = value
        .split('"')
        .map(|part| format!("\"{part}\""))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}

/// A named UI target with its ordered candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub candidates: Vec<Selector>,
}

/// Named targets, each an ordered list of candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorRegistry {
    targets: BTreeMap<String, Vec<Selector>>,
}

impl SelectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Load a registry from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, AutomationError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AutomationError::InvalidInput(format!(
                "cannot read selector file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&text).map_err(|e| {
            AutomationError::InvalidInput(format!(
                "invalid selector file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Register or replace a target.
    pub fn insert(&mut self, name: impl Into<String>, candidates: Vec<Selector>) {
        self.targets.insert(name.into(), candidates);
    }

    /// Overlay `other` on top of this registry; its entries replace ours.
    pub fn merge(mut self, other: SelectorRegistry) -> Self {
        self.targets.extend(other.targets);
        self
    }

    /// Look up a target by name.
    pub fn target(&self, name: &str) -> Result<Target, AutomationError> {
        match self.targets.get(name) {
            Some(candidates) if !candidates.is_empty() => Ok(Target {
                name: name.to_string(),
                candidates: candidates.clone(),
            }),
            _ => Err(AutomationError::MissingSelector(name.to_string())),
        }
    }

    /// Check that every name in `required` resolves.
    pub fn validate(&self, required: &[&str]) -> Result<(), AutomationError> {
        for name in required {
            self.target(name)?;
        }
        Ok(())
    }
}
