//! # Progress monitoring
//!
//! Degenerate problems can make the simplex method revisit the same basis without ever improving
//! the objective. The monitor keeps a short history of iteration summaries and recent pivot pairs
//! and renders a verdict every iteration; the iteration loops consult it unconditionally, which is
//! what guarantees termination on cycling inputs.
use enum_map::{Enum, EnumMap};

/// What the monitor concludes after an iteration.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
pub enum Verdict {
    /// Progress looks normal.
    Continue,
    /// A repeated state was detected; the caller should perturb or flag before continuing.
    Intervene,
    /// Repeated intervention did not help; the caller should stop with a failure status.
    GiveUp,
}

/// A one-iteration summary.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Snapshot {
    objective: f64,
    infeasibility_sum: f64,
    nr_infeasibilities: usize,
}

impl Snapshot {
    /// Whether two snapshots describe the same state up to noise.
    fn matches(&self, other: &Self, tolerance: f64) -> bool {
        self.nr_infeasibilities == other.nr_infeasibilities
            && (self.objective - other.objective).abs() <= tolerance * (1.0 + self.objective.abs())
            && (self.infeasibility_sum - other.infeasibility_sum).abs()
                <= tolerance * (1.0 + self.infeasibility_sum.abs())
    }
}

/// Detects looping by watching objective stagnation and repeating pivot pairs.
#[derive(Debug)]
pub struct Progress {
    history: Vec<Snapshot>,
    /// Recent `(entering, leaving)` pairs, a ring buffer.
    pivots: Vec<(usize, usize)>,
    tolerance: f64,
    /// How often the same state may recur before the first intervention.
    stagnation_limit: usize,
    /// Interventions so far; tallied by verdict for reporting.
    verdicts: EnumMap<Verdict, usize>,
}

impl Progress {
    const HISTORY: usize = 8;
    const PIVOT_HISTORY: usize = 12;
    /// Give up after this many interventions without real progress.
    const MAX_INTERVENTIONS: usize = 5;

    /// A fresh monitor.
    #[must_use]
    pub fn new(tolerance: f64) -> Self {
        Self {
            history: Vec::with_capacity(Self::HISTORY),
            pivots: Vec::with_capacity(Self::PIVOT_HISTORY),
            tolerance,
            stagnation_limit: Self::HISTORY - 1,
            verdicts: EnumMap::default(),
        }
    }

    /// Record one iteration and judge whether the solve is looping.
    ///
    /// # Arguments
    ///
    /// * `objective`: Current (phase) objective value.
    /// * `infeasibility_sum` / `nr_infeasibilities`: Primal infeasibility measures.
    /// * `pivot`: The `(entering, leaving)` variable pair, equal when a bound flip happened.
    pub fn looping(
        &mut self,
        objective: f64,
        infeasibility_sum: f64,
        nr_infeasibilities: usize,
        pivot: (usize, usize),
    ) -> Verdict {
        let snapshot = Snapshot { objective, infeasibility_sum, nr_infeasibilities };

        let repeats = self.history.iter()
            .filter(|past| past.matches(&snapshot, self.tolerance))
            .count();
        let pivot_repeats = self.pivots.iter().filter(|&&past| past == pivot).count();

        if self.history.len() == Self::HISTORY {
            self.history.remove(0);
        }
        self.history.push(snapshot);
        if self.pivots.len() == Self::PIVOT_HISTORY {
            self.pivots.remove(0);
        }
        self.pivots.push(pivot);

        let verdict = if repeats >= self.stagnation_limit || pivot_repeats >= 2 {
            if self.verdicts[Verdict::Intervene] >= Self::MAX_INTERVENTIONS {
                Verdict::GiveUp
            } else {
                Verdict::Intervene
            }
        } else {
            Verdict::Continue
        };
        self.verdicts[verdict] += 1;

        if verdict == Verdict::Intervene {
            // Start over: the caller perturbs, after which old snapshots are meaningless.
            self.history.clear();
            self.pivots.clear();
        }

        verdict
    }

    /// Tell the monitor that genuine progress happened, resetting the intervention budget.
    pub fn reset_interventions(&mut self) {
        self.verdicts[Verdict::Intervene] = 0;
    }

    /// How many times the monitor asked for an intervention.
    #[must_use]
    pub fn nr_interventions(&self) -> usize {
        self.verdicts[Verdict::Intervene]
    }
}
