//! Split a flux distribution into uptake, secretion and internal fluxes
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use serde::Serialize;

use crate::flux_analysis::FluxVector;

/// Decides which reactions exchange metabolites with the environment
#[derive(Clone)]
pub enum ExchangeRule {
    /// Exchange reactions have ids starting with this prefix
    Prefix(String),
    /// Exchange reactions are those for which the predicate returns true
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl ExchangeRule {
    pub fn prefix<S: Into<String>>(prefix: S) -> Self {
        ExchangeRule::Prefix(prefix.into())
    }

    pub fn custom<F: Fn(&str) -> bool + Send + Sync + 'static>(predicate: F) -> Self {
        ExchangeRule::Custom(Arc::new(predicate))
    }

    /// Whether `reaction_id` names an exchange reaction
    pub fn is_exchange(&self, reaction_id: &str) -> bool {
        match self {
            ExchangeRule::Prefix(prefix) => reaction_id.starts_with(prefix.as_str()),
            ExchangeRule::Custom(predicate) => predicate(reaction_id),
        }
    }
}

impl Default for ExchangeRule {
    fn default() -> Self {
        ExchangeRule::Prefix("EX_".to_string())
    }
}

impl Debug for ExchangeRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeRule::Prefix(prefix) => f.debug_tuple("Prefix").field(prefix).finish(),
            ExchangeRule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Fluxes grouped by role, each group keeps the order of the input
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FluxClassification {
    /// Exchange reactions with positive flux
    pub uptake: FluxVector,
    /// Exchange reactions with negative flux
    pub secretion: FluxVector,
    /// Every reaction which isn't an exchange reaction
    pub internal: FluxVector,
}

/// Classify `fluxes` by the exchange `rule`
///
/// Exchange fluxes within `tolerance` of zero are neither uptake nor secretion,
/// and are left out.
pub fn classify(fluxes: &FluxVector, rule: &ExchangeRule, tolerance: f64) -> FluxClassification {
    let mut classification = FluxClassification::default();
    for (id, flux) in fluxes {
        let group = if !rule.is_exchange(id) {
            &mut classification.internal
        } else if *flux > tolerance {
            &mut classification.uptake
        } else if *flux < -tolerance {
            &mut classification.secretion
        } else {
            continue;
        };
        group.insert(id.clone(), *flux);
    }
    classification
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fluxes() -> FluxVector {
        [
            ("EX_glc", 10.),
            ("R1", 10.),
            ("EX_ac", -3.),
            ("EX_o2", 1e-9),
            ("R2", 0.),
        ]
        .into_iter()
        .map(|(id, v)| (id.to_string(), v))
        .collect()
    }

    #[test]
    fn classify_by_prefix() {
        let classification = classify(&fluxes(), &ExchangeRule::default(), 1e-6);
        assert_eq!(classification.uptake.keys().collect::<Vec<_>>(), vec!["EX_glc"]);
        assert_eq!(classification.secretion.keys().collect::<Vec<_>>(), vec!["EX_ac"]);
        assert_eq!(classification.internal.keys().collect::<Vec<_>>(), vec!["R1", "R2"]);
    }

    #[test]
    fn classify_with_predicate() {
        let rule = ExchangeRule::custom(|id| id == "R1");
        let classification = classify(&fluxes(), &rule, 1e-6);
        assert_eq!(classification.uptake.keys().collect::<Vec<_>>(), vec!["R1"]);
        assert!(classification.secretion.is_empty());
        assert_eq!(classification.internal.len(), 4);
        assert_eq!(format!("{:?}", rule), "Custom(..)");
        assert_eq!(format!("{:?}", ExchangeRule::prefix("EX_")), "Prefix(\"EX_\")");
    }
}
