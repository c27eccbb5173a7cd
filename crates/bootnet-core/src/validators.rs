//! Validator identities and the ordered validator set
//!
//! The set is ordered: its first element is the bootstrap leader, the only
//! structurally asymmetric role in the protocol. A [`ValidatorSet`] can only
//! be obtained through validation, so every set in the program is non-empty,
//! uniquely named and safe to interpolate into shell text.

use crate::config::{ConfigValidator, Validate, ValidatorConfig};
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique validator name, also used as the filesystem namespace for signals
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidatorName(String);

impl ValidatorName {
    /// Wrap a name without validating it.
    ///
    /// Validation happens when the name becomes part of a [`ValidatorSet`].
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the raw name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shell identifier fragment derived from the name (`val-2` -> `VAL_2`)
    pub fn shell_ident(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for ValidatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ValidatorName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Role a validator plays during bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// First validator: assembles genesis and collects gentxs
    Leader,
    /// Every other validator
    Follower,
}

impl Role {
    /// Whether this is the leader role
    pub fn is_leader(self) -> bool {
        matches!(self, Self::Leader)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leader => f.write_str("leader"),
            Self::Follower => f.write_str("follower"),
        }
    }
}

/// Ordered, validated sequence of validators
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidatorSet {
    validators: Vec<ValidatorConfig>,
}

impl ValidatorSet {
    /// Validate and wrap a validator list
    pub fn new(validators: Vec<ValidatorConfig>) -> Result<Self> {
        let mut validator = ConfigValidator::new();
        validators.validate_into(&mut validator);
        validator.finish()?;
        Ok(Self { validators })
    }

    /// The bootstrap leader (first element)
    pub fn leader(&self) -> &ValidatorConfig {
        // Non-empty by construction.
        &self.validators[0]
    }

    /// Every validator after the leader, in set order
    pub fn followers(&self) -> impl Iterator<Item = &ValidatorConfig> {
        self.validators.iter().skip(1)
    }

    /// All validators in set order
    pub fn iter(&self) -> impl Iterator<Item = &ValidatorConfig> {
        self.validators.iter()
    }

    /// Every validator except `name`, in set order
    pub fn others<'a>(
        &'a self,
        name: &'a ValidatorName,
    ) -> impl Iterator<Item = &'a ValidatorConfig> + 'a {
        self.validators.iter().filter(move |v| &v.name != name)
    }

    /// Look up a validator by name
    pub fn get(&self, name: &str) -> Option<&ValidatorConfig> {
        self.validators.iter().find(|v| v.name.as_str() == name)
    }

    /// Role of the named validator, if present
    pub fn role_of(&self, name: &ValidatorName) -> Option<Role> {
        let index = self.validators.iter().position(|v| &v.name == name)?;
        Some(if index == 0 {
            Role::Leader
        } else {
            Role::Follower
        })
    }

    /// Whether a validator with this name is in the set
    pub fn contains(&self, name: &ValidatorName) -> bool {
        self.validators.iter().any(|v| &v.name == name)
    }

    /// Validators as a slice, in set order
    pub fn as_slice(&self) -> &[ValidatorConfig] {
        &self.validators
    }

    /// Number of validators
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl<'a> IntoIterator for &'a ValidatorSet {
    type Item = &'a ValidatorConfig;
    type IntoIter = std::slice::Iter<'a, ValidatorConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.validators.iter()
    }
}
