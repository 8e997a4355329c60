//! This module provides the metabolite struct representing a metabolite

use std::fmt::{Display, Formatter};
use std::hash::Hash;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Represents a metabolite
///
/// Only the id takes part in the optimization, everything else is carried along
/// for traceability.
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metabolite {
    /// Used to identify the metabolite (must be unique)
    #[builder(setter(into))]
    pub id: String,
    /// Human Readable name of the metabolite
    #[builder(setter(into, strip_option), default)]
    pub name: Option<String>,
    /// Which compartment the metabolite is in
    #[builder(setter(into, strip_option), default)]
    pub compartment: Option<String>,
    /// Electrical charge of the Metabolite
    #[builder(setter(strip_option), default)]
    pub charge: Option<i32>,
    /// Chemical Formula of the metabolite
    #[builder(setter(into, strip_option), default)]
    pub formula: Option<String>,
    /// Notes about the metabolite
    #[builder(setter(into, strip_option), default)]
    pub notes: Option<String>,
    /// Metabolite annotations
    #[builder(setter(into, strip_option), default)]
    pub annotation: Option<String>,
}

impl Metabolite {
    /// Create a metabolite with only an id
    pub fn new<S: Into<String>>(id: S) -> Self {
        Metabolite {
            id: id.into(),
            name: None,
            compartment: None,
            charge: None,
            formula: None,
            notes: None,
            annotation: None,
        }
    }

    /// Create a metabolite with an id and a compartment
    pub fn in_compartment<S: Into<String>, C: Into<String>>(id: S, compartment: C) -> Self {
        Metabolite {
            compartment: Some(compartment.into()),
            ..Metabolite::new(id)
        }
    }
}

impl Display for Metabolite {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.compartment {
            Some(compartment) => write!(f, "{}[{}]", self.id, compartment),
            None => write!(f, "{}", self.id),
        }
    }
}

impl Hash for Metabolite {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state); // Hash by id
                             // If the metabolite has an associated compartment, also hash by that
        if let Some(ref compartment) = self.compartment {
            compartment.hash(state)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        let met = MetaboliteBuilder::default()
            .id("glc__D_e")
            .name("D-Glucose")
            .compartment("e")
            .charge(0)
            .formula("C6H12O6")
            .build()
            .unwrap();
        assert_eq!(met.id, "glc__D_e");
        assert_eq!(met.name.unwrap(), "D-Glucose");
        assert_eq!(met.compartment.unwrap(), "e");
        assert_eq!(met.charge.unwrap(), 0);
        assert_eq!(met.formula.unwrap(), "C6H12O6");
        assert!(met.notes.is_none());
    }

    #[test]
    fn missing_id() {
        assert!(MetaboliteBuilder::default().compartment("c").build().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", Metabolite::in_compartment("atp_c", "c")), "atp_c[c]");
        assert_eq!(format!("{}", Metabolite::new("atp")), "atp");
    }
}
