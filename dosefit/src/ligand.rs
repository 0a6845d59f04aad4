use crate::{Error, Result};
use std::fmt::Display;

/// Pharmacological role of a ligand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Activates the receptor.
    Agonist,
    /// Competes with the agonist without activating.
    Antagonist,
}

/// Ligand with its receptor affinity.
#[derive(Debug, Clone, PartialEq)]
pub struct Ligand {
    name: String,
    pkd: f64,
    role: Option<Role>,
}

impl Ligand {
    /// Creates a ligand of affinity `pkd`, the negative decadic logarithm of its molar Kd.
    pub fn new(name: impl Into<String>, pkd: f64) -> Self {
        Self {
            name: name.into(),
            pkd,
            role: None,
        }
    }

    /// Returns the ligand tagged with `role`.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Ligand name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Affinity as pKd.
    pub fn pkd(&self) -> f64 {
        self.pkd
    }

    /// Role tag, if any.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub(crate) fn validate(&self, field: &'static str) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput {
                field,
                reason: "ligand name is empty".to_string(),
            });
        }
        if !self.pkd.is_finite() {
            return Err(Error::InvalidInput {
                field,
                reason: format!("pKd of {} must be finite, got {}", self.name, self.pkd),
            });
        }
        Ok(())
    }
}

impl Display for Ligand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (pKd {})", self.name, self.pkd)
    }
}
