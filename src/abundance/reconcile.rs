// ⚖️ Abundance Reconciler - does the knowledge base already hold this measurement?
//
// A claim matches an incoming (value, uncertainty) pair when:
//   |amount - value| < ε
//   |(amount - lowerBound) - uncertainty| < ε
//   |(upperBound - amount) - uncertainty| < ε
//
// A matching claim is never rewritten; it only gains provenance when its
// sources don't already cite the same database, edition and URL.

use crate::kb::{Claim, DataValue, Entity, Quantity, QuantityError, Snak};
use serde::Serialize;

/// Default tolerance for floating-point comparisons
pub const EPSILON: f64 = 1e-10;

// ============================================================================
// MATCH OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClaimMatch {
    /// An existing claim carries the same value and uncertainty
    Matched(Claim),

    /// No claim matches (or the property is absent)
    NotMatched,

    /// Nothing matched and at least one claim could not be inspected
    Malformed { claim_id: Option<String>, reason: String },
}

impl ClaimMatch {
    pub fn is_matched(&self) -> bool {
        matches!(self, ClaimMatch::Matched(_))
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, ClaimMatch::Malformed { .. })
    }

    pub fn claim(&self) -> Option<&Claim> {
        match self {
            ClaimMatch::Matched(claim) => Some(claim),
            _ => None,
        }
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

pub struct AbundanceReconciler {
    /// Tolerance for floating-point comparisons (default: 1e-10)
    pub tolerance: f64,
}

impl AbundanceReconciler {
    pub fn new() -> Self {
        AbundanceReconciler { tolerance: EPSILON }
    }

    pub fn approx_eq(&self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.tolerance
    }

    /// Compare one quantity against (value, ±uncertainty)
    pub fn quantity_matches(
        &self,
        quantity: &Quantity,
        value: f64,
        uncertainty: f64,
    ) -> Result<bool, QuantityError> {
        let amount = quantity.amount()?;
        let delta_lower = amount - quantity.lower_bound()?;
        let delta_upper = quantity.upper_bound()? - amount;

        Ok(self.approx_eq(amount, value)
            && self.approx_eq(delta_lower, uncertainty)
            && self.approx_eq(delta_upper, uncertainty))
    }

    /// Find a claim for `property` on `entity` holding value ± uncertainty.
    ///
    /// Every claim is inspected on its own. The first match wins; a claim
    /// that can't be read only matters when nothing else matches.
    pub fn find_matching_claim(
        &self,
        entity: &Entity,
        property: &str,
        value: f64,
        uncertainty: f64,
    ) -> ClaimMatch {
        let mut malformed: Option<ClaimMatch> = None;

        for claim in entity.claims_for(property) {
            let checked = match &claim.value {
                Some(DataValue::Quantity(quantity)) => self
                    .quantity_matches(quantity, value, uncertainty)
                    .map_err(|e| e.to_string()),
                Some(other) => Err(format!("value is a {}, not a quantity", other.type_name())),
                None => Err("claim has no value".to_string()),
            };

            match checked {
                Ok(true) => return ClaimMatch::Matched(claim.clone()),
                Ok(false) => {}
                Err(reason) => {
                    if malformed.is_none() {
                        malformed = Some(ClaimMatch::Malformed {
                            claim_id: claim.id.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        malformed.unwrap_or(ClaimMatch::NotMatched)
    }
}

impl Default for AbundanceReconciler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// PROVENANCE
// ============================================================================

/// Does any source block on `claim` already satisfy `required`?
///
/// A block satisfies the requirement when every required property is either
/// absent from it or present with the expected value. The first such block
/// answers true. A claim without sources never satisfies it.
pub fn has_required_sources(claim: &Claim, required: &[Snak]) -> bool {
    claim.sources.iter().any(|block| {
        required.iter().all(|needed| {
            if !block.has_property(&needed.property) {
                return true;
            }
            match &needed.value {
                Some(expected) => block.values(&needed.property).any(|v| v == expected),
                None => true,
            }
        })
    })
}
