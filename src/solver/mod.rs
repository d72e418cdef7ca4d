#![allow(dead_code)]
//! MILP solver (C6): the core optimization problem of spec.md §4.6.
//!
//! Grounded on the teacher's `optimizer::strategies::milp::MilpOptimizer`
//! (good_lp `ProblemVariables`/`constraint!` usage, SoC recursion, slack
//! pattern for a soft cap), generalized to the full variable/constraint set
//! spec.md §4.6 describes: binary water-heater decisions, ramping,
//! gap/spacing comfort slacks, terminal target slacks, a soft import-cap
//! slack, and the objective's penalty ordering.

mod backend;
mod problem;

use std::time::Instant;

use chrono_tz::Tz;

use crate::domain::{SolverInput, SolverResult, SolverStatus};

/// Solve one planning tick's MILP. Synchronous and CPU-bound (spec.md §5:
/// "the MILP is CPU-bound but not parallelized internally by this design");
/// callers that need cancellation-by-deadline should run this inside
/// `tokio::task::spawn_blocking` wrapped in `tokio::time::timeout`, which is
/// exactly what `orchestrator::tick` does.
#[cfg(feature = "solver")]
pub fn solve(input: &SolverInput, tz: Tz) -> SolverResult {
    let started = Instant::now();
    match backend::solve_with_fallback(input, tz) {
        Ok(outcome) => SolverResult {
            slots: outcome.slots,
            total_cost: outcome.total_cost,
            status: SolverStatus::Optimal,
            solve_time_ms: started.elapsed().as_millis() as u64,
        },
        Err(backend::SolveError::Infeasible) => SolverResult {
            slots: Vec::new(),
            total_cost: 0.0,
            status: SolverStatus::Infeasible,
            solve_time_ms: started.elapsed().as_millis() as u64,
        },
        Err(backend::SolveError::Other(msg)) => {
            tracing::error!(error = %msg, "MILP solver error");
            SolverResult {
                slots: Vec::new(),
                total_cost: 0.0,
                status: SolverStatus::Error,
                solve_time_ms: started.elapsed().as_millis() as u64,
            }
        }
    }
}

#[cfg(not(feature = "solver"))]
pub fn solve(_input: &SolverInput, _tz: Tz) -> SolverResult {
    SolverResult {
        slots: Vec::new(),
        total_cost: 0.0,
        status: SolverStatus::Error,
        solve_time_ms: 0,
    }
}
