//! # Pricing
//!
//! Deciding which variable enters (primal) or which row leaves (dual) the basis. Three rules are
//! offered, a closed set selected at solve configuration time:
//!
//! * Dantzig: the largest reduced cost or infeasibility. No state, cheapest per iteration, and
//!   typically the most iterations.
//! * Devex: approximate steepest edge against a reference framework that is reset when the
//!   approximation degrades.
//! * Steepest edge: exact norm maintenance, requiring extra factorization solves per pivot but
//!   usually far fewer pivots.
//!
//! Weight invariant: every weight stays at or above a small positive floor; weights are only
//! recomputed from scratch at (re)initialization, otherwise updated incrementally per pivot.
use rayon::prelude::*;

/// Selection rule for both the primal (entering column) and dual (leaving row) side.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PricingRule {
    /// Largest violation, no weights.
    Dantzig,
    /// Reference framework steepest edge approximation.
    #[default]
    Devex,
    /// Exact steepest edge.
    SteepestEdge,
}

/// Weights never drop below this floor.
const WEIGHT_FLOOR: f64 = 1e-10;
/// A devex weight beyond this triggers a reference framework reset.
const DEVEX_RESET_LIMIT: f64 = 1e7;
/// Candidate sets at least this large are scanned on the thread pool.
const PARALLEL_THRESHOLD: usize = 16 * 1024;

/// Weighted candidate selection state, shared by the primal and dual side.
///
/// The primal engine keys this by variable, the dual engine by basis position.
#[derive(Debug)]
pub struct Pricing {
    rule: PricingRule,
    weights: Vec<f64>,
    /// Devex reference framework membership.
    reference: Vec<bool>,
}

impl Pricing {
    /// New state for `len` candidates, all weights at one.
    #[must_use]
    pub fn new(rule: PricingRule, len: usize) -> Self {
        Self {
            rule,
            weights: vec![1.0; len],
            reference: vec![true; len],
        }
    }

    /// The configured rule.
    #[must_use]
    pub fn rule(&self) -> PricingRule {
        self.rule
    }

    /// Reinitialize all weights, used at basis rebuilds and framework resets.
    ///
    /// # Arguments
    ///
    /// * `exact`: Per candidate, the exact squared norm if the rule wants one (steepest edge);
    ///   `None` resets to unit weights (Dantzig, devex).
    pub fn reset(&mut self, exact: Option<&[f64]>) {
        match exact {
            Some(norms) => {
                debug_assert_eq!(norms.len(), self.weights.len());
                for (weight, &norm) in self.weights.iter_mut().zip(norms) {
                    *weight = norm.max(WEIGHT_FLOOR);
                }
            },
            None => self.weights.fill(1.0),
        }
        self.reference.fill(true);
    }

    /// The weight of a candidate.
    #[must_use]
    pub fn weight(&self, index: usize) -> f64 {
        self.weights[index]
    }

    /// Select the most attractive candidate.
    ///
    /// # Arguments
    ///
    /// * `violation`: Per candidate, the (sign corrected) violation: a reduced cost that is
    ///   attractive, or a primal infeasibility. Zero or negative means ineligible: optimal or
    ///   flagged candidates must be passed as `0.0`.
    ///
    /// # Return value
    ///
    /// The candidate with the best merit, or `None` when no candidate has positive violation,
    /// which signals optimality (primal) or feasibility (dual) to the caller.
    #[must_use]
    pub fn select(&self, violation: &[f64]) -> Option<usize> {
        debug_assert_eq!(violation.len(), self.weights.len());

        let merit = |index: usize| -> f64 {
            let v = violation[index];
            match self.rule {
                PricingRule::Dantzig => v,
                PricingRule::Devex | PricingRule::SteepestEdge => v * v / self.weights[index],
            }
        };

        let best = if violation.len() >= PARALLEL_THRESHOLD {
            // Partitioned scan: each chunk yields a local winner, reduced to a single one.
            violation.par_iter()
                .enumerate()
                .filter(|&(_, &v)| v > 0.0)
                .map(|(index, _)| (index, merit(index)))
                .reduce_with(|a, b| if a.1 >= b.1 { a } else { b })
        } else {
            violation.iter()
                .enumerate()
                .filter(|&(_, &v)| v > 0.0)
                .map(|(index, _)| (index, merit(index)))
                .max_by(|a, b| a.1.total_cmp(&b.1))
        };

        best.map(|(index, _)| index)
    }

    /// Update weights after a pivot, primal orientation.
    ///
    /// # Arguments
    ///
    /// * `entering`: Variable entering the basis.
    /// * `leaving`: Variable leaving the basis.
    /// * `pivot_row`: Dense row of the updated tableau over all candidates: `αᵣⱼ` per nonbasic
    ///   `j`, zero for basic and ineligible candidates.
    /// * `pivot`: The pivot element `αᵣ_q`.
    /// * `tau_row`: For steepest edge only: `τ · aⱼ` per candidate, `τ = B⁻ᵀ B⁻¹ a_q`.
    pub fn update_primal(
        &mut self,
        entering: usize,
        leaving: usize,
        pivot_row: &[f64],
        pivot: f64,
        tau_row: Option<&[f64]>,
    ) {
        debug_assert!(pivot != 0.0);

        match self.rule {
            PricingRule::Dantzig => {},
            PricingRule::Devex => {
                let entering_weight = self.weights[entering];
                if entering_weight > DEVEX_RESET_LIMIT {
                    self.reset(None);
                    return;
                }
                for (j, &alpha) in pivot_row.iter().enumerate() {
                    if alpha != 0.0 && j != entering {
                        let ratio = alpha / pivot;
                        let candidate = ratio * ratio * entering_weight;
                        if candidate > self.weights[j] {
                            self.weights[j] = candidate;
                        }
                    }
                }
                self.weights[leaving] = (entering_weight / (pivot * pivot)).max(1.0);
                self.reference[entering] = false;
            },
            PricingRule::SteepestEdge => {
                let gamma_entering = self.weights[entering];
                let tau_row = tau_row.expect("steepest edge update needs the tau row");
                for (j, &alpha) in pivot_row.iter().enumerate() {
                    if alpha != 0.0 && j != entering {
                        let ratio = alpha / pivot;
                        let updated = self.weights[j] - 2.0 * ratio * tau_row[j]
                            + ratio * ratio * gamma_entering;
                        let floor = 1.0 + ratio * ratio;
                        self.weights[j] = updated.max(floor).max(WEIGHT_FLOOR);
                    }
                }
                self.weights[leaving] = (gamma_entering / (pivot * pivot)).max(WEIGHT_FLOOR);
            },
        }
    }

    /// Update weights after a pivot, dual orientation (weights keyed by basis position).
    ///
    /// # Arguments
    ///
    /// * `leaving_position`: Basis position that pivoted.
    /// * `alpha`: The solved entering column, dense over basis positions.
    /// * `pivot`: Its value at `leaving_position`.
    /// * `tau`: For steepest edge only: `B⁻¹ ρ` with `ρ = B⁻ᵀ e_p`, dense over positions.
    pub fn update_dual(
        &mut self,
        leaving_position: usize,
        alpha: &[f64],
        pivot: f64,
        tau: Option<&[f64]>,
    ) {
        debug_assert!(pivot != 0.0);

        match self.rule {
            PricingRule::Dantzig => {},
            PricingRule::Devex => {
                let leaving_weight = self.weights[leaving_position];
                if leaving_weight > DEVEX_RESET_LIMIT {
                    self.reset(None);
                    return;
                }
                for (k, &alpha_k) in alpha.iter().enumerate() {
                    if alpha_k != 0.0 && k != leaving_position {
                        let ratio = alpha_k / pivot;
                        let candidate = ratio * ratio * leaving_weight;
                        if candidate > self.weights[k] {
                            self.weights[k] = candidate;
                        }
                    }
                }
                self.weights[leaving_position] = (leaving_weight / (pivot * pivot)).max(1.0);
            },
            PricingRule::SteepestEdge => {
                let leaving_weight = self.weights[leaving_position];
                let tau = tau.expect("dual steepest edge update needs tau");
                for (k, &alpha_k) in alpha.iter().enumerate() {
                    if alpha_k != 0.0 && k != leaving_position {
                        let ratio = alpha_k / pivot;
                        let updated = self.weights[k] - 2.0 * ratio * tau[k]
                            + ratio * ratio * leaving_weight;
                        self.weights[k] = updated.max(WEIGHT_FLOOR);
                    }
                }
                self.weights[leaving_position] =
                    (leaving_weight / (pivot * pivot)).max(WEIGHT_FLOOR);
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dantzig_picks_largest_violation() {
        let pricing = Pricing::new(PricingRule::Dantzig, 4);
        assert_eq!(pricing.select(&[0.0, 2.0, 5.0, 1.0]), Some(2));
    }

    #[test]
    fn no_violation_means_none() {
        let pricing = Pricing::new(PricingRule::Devex, 3);
        assert_eq!(pricing.select(&[0.0, 0.0, 0.0]), None);
    }

    #[test]
    fn devex_weights_discount_candidates() {
        let mut pricing = Pricing::new(PricingRule::Devex, 2);
        // Same violation, but candidate 0 carries a large weight.
        pricing.weights[0] = 100.0;
        assert_eq!(pricing.select(&[3.0, 3.0]), Some(1));
    }

    #[test]
    fn devex_update_grows_weights_monotonically() {
        let mut pricing = Pricing::new(PricingRule::Devex, 3);
        let before = pricing.weights.clone();
        pricing.update_primal(0, 2, &[0.0, 0.5, 0.0], 2.0, None);
        for (after, before) in pricing.weights.iter().zip(&before) {
            assert!(after >= before || *after >= 1.0);
        }
    }

    #[test]
    fn steepest_edge_weight_floor_holds() {
        let mut pricing = Pricing::new(PricingRule::SteepestEdge, 2);
        // An update that would drive the weight negative without the floor.
        pricing.update_primal(0, 0, &[0.0, 1.0], 1.0, Some(&[0.0, 100.0]));
        assert!(pricing.weights[1] >= 1.0 + 1.0);
    }
}
