//! Solver backend dispatch: try the preferred MIP-capable backend first,
//! fall back to a continuous-relaxation backend if it is unavailable or
//! errors out.
//!
//! Grounded on the teacher's `SolverType` enum (`Cbc`/`HiGHS` choice) in
//! `optimizer::strategies::milp::MilpOptimizer`, generalized from "pick one
//! at construction time" to "prefer one, fall back to the other at solve
//! time": `highs` is the only backend here with real binary-variable
//! support, so `minilp` needs its water-heater binaries relaxed to `[0, 1]`
//! and rounded back afterward to stand in for it.

use chrono_tz::Tz;
use good_lp::{ResolutionError, Solution, SolverModel};

use crate::domain::{SolverInput, SolverSlotResult};

use super::problem::{self, Built};

pub enum SolveError {
    Infeasible,
    Other(String),
}

pub struct Outcome {
    pub slots: Vec<SolverSlotResult>,
    pub total_cost: f64,
}

/// Solve with `highs` (true MIP); on any backend error, rebuild the problem
/// with water-heater binaries relaxed to continuous and retry with
/// `minilp`, rounding the relaxed on/off indicators back to booleans.
pub fn solve_with_fallback(input: &SolverInput, tz: Tz) -> Result<Outcome, SolveError> {
    let built = problem::build(input, tz, true);
    match solve_built(input, built, good_lp::solvers::highs::highs) {
        Ok(outcome) => return Ok(outcome),
        Err(SolveError::Infeasible) => return Err(SolveError::Infeasible),
        Err(SolveError::Other(msg)) => {
            tracing::warn!(error = %msg, "highs backend unavailable, falling back to minilp");
        }
    }

    let built = problem::build(input, tz, false);
    solve_built(input, built, good_lp::solvers::minilp::minilp)
}

fn solve_built<S>(
    input: &SolverInput,
    built: Built,
    backend: impl FnOnce(good_lp::UnsolvedProblem) -> S,
) -> Result<Outcome, SolveError>
where
    S: SolverModel,
    S::Solution: Solution,
{
    let Built {
        vars,
        objective,
        constraints,
        charge,
        discharge,
        soc,
        grid_import,
        grid_export,
        water_on,
    } = built;

    let mut model = vars.minimise(objective).using(backend);
    for constraint in constraints {
        model = model.with(constraint);
    }

    let solution = model.solve().map_err(|err| match err {
        ResolutionError::Infeasible | ResolutionError::Unbounded => SolveError::Infeasible,
        other => SolveError::Other(other.to_string()),
    })?;

    let n = charge.len();
    let mut slots = Vec::with_capacity(n);
    let mut total_cost = 0.0;
    for t in 0..n {
        let charge_kwh = solution.value(charge[t]).max(0.0);
        let discharge_kwh = solution.value(discharge[t]).max(0.0);
        let grid_import_kwh = solution.value(grid_import[t]).max(0.0);
        let grid_export_kwh = solution.value(grid_export[t]).max(0.0);
        // Relaxed on [0, 1] in the minilp fallback path; round to a crisp
        // decision the same way the orchestrator will round any other
        // near-integral solver output.
        let water_heat_on = solution.value(water_on[t]) > 0.5;
        let soc_end_kwh = solution.value(soc[t + 1]).max(0.0);

        total_cost += input.horizon.slots()[t].import_price * grid_import_kwh
            - input.horizon.slots()[t].export_price * grid_export_kwh;

        slots.push(SolverSlotResult {
            charge_kwh,
            discharge_kwh,
            grid_import_kwh,
            grid_export_kwh,
            soc_end_kwh,
            water_heat_on,
        });
    }

    Ok(Outcome { slots, total_cost })
}
