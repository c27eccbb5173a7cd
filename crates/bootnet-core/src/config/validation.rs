//! Configuration validation utilities and rules
//!
//! Every string that ends up in a rendered script is checked against a
//! character policy here. Nothing is escaped later; unsafe input is rejected.

use crate::errors::{BootstrapError, Result};
use std::fmt;

/// One validation failure, tied to a dotted field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Field path, e.g. `validators[1].name`
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl ValidationIssue {
    /// Create an issue
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Configuration types that can check themselves
pub trait Validate {
    /// Record every issue into `validator`
    fn validate_into(&self, validator: &mut ConfigValidator);

    /// Validate standalone, failing with every issue found
    fn validate(&self) -> Result<()> {
        let mut validator = ConfigValidator::new();
        self.validate_into(&mut validator);
        validator.finish()
    }
}

/// Character classes accepted for interpolated fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    /// `[A-Za-z0-9][A-Za-z0-9_-]*`: names used in file names and shell identifiers
    Identifier,
    /// `[A-Za-z0-9][A-Za-z0-9._:,@+_-]*`: monikers, key aliases, chain ids, coin amounts
    Value,
    /// Absolute path made of value characters and `/`, without `..` segments
    AbsolutePath,
}

impl FieldClass {
    fn allows(self, c: char) -> bool {
        match self {
            Self::Identifier => c.is_ascii_alphanumeric() || c == '_' || c == '-',
            Self::Value => c.is_ascii_alphanumeric() || "._:,@+_-".contains(c),
            Self::AbsolutePath => c.is_ascii_alphanumeric() || "._:,@+_-/".contains(c),
        }
    }

    /// Explain why `value` does not belong to this class, if it does not
    pub fn check(self, value: &str) -> Option<String> {
        if value.is_empty() {
            return Some("must not be empty".to_string());
        }
        if let Some(c) = value.chars().find(|c| !self.allows(*c)) {
            return Some(match c {
                '/' | '\\' => format!("contains path separator '{c}'"),
                '"' | '\'' | '`' => format!("contains quote character '{c}'"),
                c if c.is_whitespace() => "contains whitespace".to_string(),
                c => format!("contains unsafe character '{}'", c.escape_default()),
            });
        }
        match self {
            Self::Identifier | Self::Value
                if !value.starts_with(|c: char| c.is_ascii_alphanumeric()) =>
            {
                Some("must start with a letter or digit".to_string())
            }
            Self::AbsolutePath if !value.starts_with('/') => {
                Some("must be an absolute path".to_string())
            }
            Self::AbsolutePath if value.split('/').any(|part| part == "..") => {
                Some("must not contain '..' segments".to_string())
            }
            _ => None,
        }
    }
}

/// Configuration validator that accumulates issues with field paths
#[derive(Debug, Default)]
pub struct ConfigValidator {
    issues: Vec<ValidationIssue>,
    field_prefix: String,
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator for a nested field
    pub fn for_field(&self, field_name: &str) -> Self {
        Self {
            issues: Vec::new(),
            field_prefix: self.full_field_name(field_name),
        }
    }

    /// Check a string against a character class
    pub fn field(&mut self, field_name: &str, value: &str, class: FieldClass) -> &mut Self {
        if let Some(message) = class.check(value) {
            self.push(field_name, message);
        }
        self
    }

    /// Check a string that may be empty, and otherwise must match `class`
    pub fn optional_field(&mut self, field_name: &str, value: &str, class: FieldClass) -> &mut Self {
        if !value.is_empty() {
            self.field(field_name, value, class);
        }
        self
    }

    /// Check that a port is assigned
    pub fn port(&mut self, field_name: &str, port: u16) -> &mut Self {
        if port == 0 {
            self.push(field_name, "port must be between 1 and 65535");
        }
        self
    }

    /// Validate using a custom predicate
    pub fn custom<T, F>(&mut self, field_name: &str, value: &T, predicate: F, message: &str) -> &mut Self
    where
        F: FnOnce(&T) -> bool,
    {
        if !predicate(value) {
            self.push(field_name, message);
        }
        self
    }

    /// Validate each item of a collection under `field_name[index]`
    pub fn each<T, F>(&mut self, field_name: &str, items: &[T], mut check: F) -> &mut Self
    where
        F: FnMut(&mut ConfigValidator, usize, &T),
    {
        for (index, item) in items.iter().enumerate() {
            let mut item_validator = self.for_field(&format!("{field_name}[{index}]"));
            check(&mut item_validator, index, item);
            self.merge(item_validator);
        }
        self
    }

    /// Record an issue directly
    pub fn push(&mut self, field_name: &str, message: impl Into<String>) {
        self.issues
            .push(ValidationIssue::new(self.full_field_name(field_name), message));
    }

    /// Merge issues from another validator
    pub fn merge(&mut self, other: ConfigValidator) {
        self.issues.extend(other.issues);
    }

    /// Issues recorded so far
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Fail with every recorded issue, if any
    pub fn finish(self) -> Result<()> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(BootstrapError::validation_issues(self.issues))
        }
    }

    fn full_field_name(&self, field_name: &str) -> String {
        if self.field_prefix.is_empty() {
            field_name.to_string()
        } else if field_name.starts_with('[') {
            format!("{}{}", self.field_prefix, field_name)
        } else {
            format!("{}.{}", self.field_prefix, field_name)
        }
    }
}
