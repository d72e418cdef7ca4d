//! Builds the MILP variable/constraint set for one planning tick.
//!
//! Grounded on `optimizer::strategies::milp::MilpOptimizer::solve_lp`: the
//! `ProblemVariables`/`add_vector`/`constraint!` idiom and the SoC-recursion
//! shape carry over directly; this module generalizes that single-battery
//! energy-cost LP into the full problem described by `domain::solver_io`
//! (binary water-heater scheduling, ramping, comfort/spacing slacks,
//! terminal SoC slacks, a soft import cap).

use chrono::Duration;
use chrono_tz::Tz;
use good_lp::{constraint, variable, Constraint, Expression, ProblemVariables, Variable};

use crate::domain::{SolverInput, WaterHeaterConfig, EPSILON_KWH};

/// All decision variables and constraints for one solve, plus enough
/// bookkeeping to pull a `SolverResult` back out of a `Solution`.
pub struct Built {
    pub vars: ProblemVariables,
    pub objective: Expression,
    pub constraints: Vec<Constraint>,

    pub charge: Vec<Variable>,
    pub discharge: Vec<Variable>,
    pub soc: Vec<Variable>,
    pub grid_import: Vec<Variable>,
    pub grid_export: Vec<Variable>,
    pub water_on: Vec<Variable>,
}

/// `integral` selects whether water-heater on/start indicators are true
/// binaries (the `highs` path) or relaxed to continuous `[0, 1]` (the
/// `minilp` fallback path, which has no MIP support and must round
/// post-solve; see `backend::solve_with_fallback`).
pub fn build(input: &SolverInput, tz: Tz, integral: bool) -> Built {
    let slots = input.horizon.slots();
    let n = slots.len();
    let durations: Vec<f64> = slots.iter().map(|s| s.duration_h()).collect();

    let mut vars = ProblemVariables::new();
    let charge = vars.add_vector(variable().min(0.0), n);
    let discharge = vars.add_vector(variable().min(0.0), n);
    // soc[0] is pinned to the live reading below; soc[1..=n] are decided.
    let soc = vars.add_vector(variable().min(0.0), n + 1);
    let grid_import = vars.add_vector(variable().min(0.0), n);
    let grid_export = vars.add_vector(variable().min(0.0), n);
    let target_under = vars.add(variable().min(0.0));
    let target_over = vars.add(variable().min(0.0));

    let water_indicator = || {
        if integral {
            variable().binary()
        } else {
            variable().min(0.0).max(1.0)
        }
    };
    let water_on = vars.add_vector(water_indicator(), n);
    let water_start = vars.add_vector(water_indicator(), n);

    let import_breach = vars.add_vector(variable().min(0.0), n);
    let gap_viol_1x = vars.add_vector(variable().min(0.0).max(1.0), n);
    let gap_viol_2x = vars.add_vector(variable().min(0.0).max(1.0), n);
    // One soft-spacing slack per (t, j) pair in the window preceding `t`
    // (spec.md §4.6 pairwise linearization), flattened as `spacing_viol[t *
    // spacing_window + k]` for the `k`-th slot in that window; sized for the
    // worst case (every slot has a full window behind it).
    let spacing_window = input
        .water_heater
        .as_ref()
        .map(|w| spacing_window_slots(&durations, w))
        .unwrap_or(0);
    let spacing_viol = vars.add_vector(variable().min(0.0).max(1.0), n * spacing_window);
    // I1's `shed`/`curtailment` slacks: keep the balance constraint feasible
    // under any forecast (e.g. load with no PV/battery headroom) instead of
    // the solve failing outright; heavily penalized so they are a last
    // resort (spec.md §4.6 penalty ordering).
    let curtailment = vars.add_vector(variable().min(0.0), n);
    let load_shedding = vars.add_vector(variable().min(0.0), n);
    // Soft min-SoC slack (spec.md §4.6 "Soft min-SoC"); the max-SoC bound
    // stays a hard variable upper bound per spec.md.
    let soc_violation = vars.add_vector(variable().min(0.0), n);
    // Ramp-up/down slacks, only meaningful for n >= 2; one-sided and
    // non-negative so their sum linearizes |power[t] - power[t-1]|.
    let ramp_up = vars.add_vector(variable().min(0.0), n.saturating_sub(1));
    let ramp_down = vars.add_vector(variable().min(0.0), n.saturating_sub(1));

    let mut constraints = Vec::new();
    let charge_eff = input.battery.charge_eff();
    let discharge_eff = input.battery.discharge_eff();
    let min_soc = input.battery.min_soc_kwh();
    let max_soc = input.battery.max_soc_kwh();

    constraints.push(constraint!(soc[0] == input.initial_soc_kwh));

    for t in 0..n {
        let slot = &slots[t];
        let water_power = input
            .water_heater
            .as_ref()
            .map(|w| w.power_kw * durations[t])
            .unwrap_or(0.0);
        let water_energy: Expression = water_on[t] * water_power;

        // Energy balance (I1): supply + shed == demand + curtailment, in kWh.
        constraints.push(constraint!(
            slot.pv_forecast_kwh + discharge[t] + grid_import[t] + load_shedding[t]
                == slot.load_forecast_kwh + charge[t] + grid_export[t] + water_energy
                    + curtailment[t]
        ));

        // SoC recursion (kWh), charge/discharge already on the grid side.
        constraints.push(constraint!(
            soc[t + 1] == soc[t] + charge[t] * charge_eff - discharge[t] / discharge_eff
        ));

        constraints.push(constraint!(charge[t] <= input.battery.max_charge_kw * durations[t]));
        constraints.push(constraint!(
            discharge[t] <= input.battery.max_discharge_kw * durations[t]
        ));

        if input.battery.charging_forbidden_by_overshoot {
            constraints.push(constraint!(charge[t] <= 0.0));
        } else {
            // Hard upper SoC bound from slot 1 onward; slot 0 is the live
            // reading and may already sit above this (overshoot case).
            constraints.push(constraint!(soc[t + 1] <= max_soc));
        }
        // Soft min-SoC (spec.md §4.6): `soc[t] >= min_soc - soc_violation[t]`.
        constraints.push(constraint!(soc[t + 1] + soc_violation[t] >= min_soc));

        if !input.export_enabled {
            constraints.push(constraint!(grid_export[t] <= 0.0));
        } else if let Some(max_export_kw) = input.max_export_kw {
            constraints.push(constraint!(grid_export[t] <= max_export_kw * durations[t]));
        }

        match input.grid_import_limit_kw {
            Some(limit) if input.cost.grid_import_limit_soft => {
                constraints.push(constraint!(
                    grid_import[t] <= limit * durations[t] + import_breach[t]
                ));
            }
            Some(limit) => {
                constraints.push(constraint!(grid_import[t] <= limit * durations[t]));
            }
            None => {}
        }

        // Start indicator: water_start[t] >= water_on[t] - water_on[t-1].
        if t == 0 {
            constraints.push(constraint!(water_start[0] >= water_on[0]));
        } else {
            constraints.push(constraint!(water_start[t] >= water_on[t] - water_on[t - 1]));
        }

        if let Some(water) = &input.water_heater {
            if water.locked_on_slots.iter().any(|locked| *locked == slot.start) {
                constraints.push(constraint!(water_on[t] == 1.0));
            }
        }
    }

    if let Some(water) = &input.water_heater {
        push_daily_bucket_constraints(&mut constraints, slots, &durations, water, tz, &water_on);
        push_gap_constraints(
            &mut constraints,
            &durations,
            water,
            &water_on,
            &gap_viol_1x,
            &gap_viol_2x,
        );
        push_spacing_constraints(
            &mut constraints,
            &durations,
            water,
            input.cost.hard_spacing,
            &water_on,
            &water_start,
            &spacing_viol,
            spacing_window,
        );
    }

    if let Some(target) = input.target_soc_kwh {
        constraints.push(constraint!(soc[n] + target_over - target_under == target));
    }

    let energy_cost: Expression = (0..n)
        .map(|t| slots[t].import_price * grid_import[t] - slots[t].export_price * grid_export[t])
        .sum();

    let wear_cost: Expression = (0..n)
        .map(|t| input.battery.wear_cost_per_kwh * (charge[t] + discharge[t]))
        .sum();

    push_ramping_constraints(&mut constraints, &charge, &discharge, &durations, &ramp_up, &ramp_down);
    let ramping_cost: Expression = ramp_up
        .iter()
        .chain(ramp_down.iter())
        .map(|v| *v * input.cost.ramping_cost_per_kw)
        .sum();

    let comfort_cost: Expression = gap_viol_1x
        .iter()
        .chain(gap_viol_2x.iter())
        .map(|v| *v * input.cost.comfort_penalty)
        .sum();
    let curtailment_cost: Expression = curtailment.iter().map(|v| *v * 0.1).sum();
    let shedding_cost: Expression = load_shedding.iter().map(|v| *v * 10_000.0).sum();
    let soc_violation_cost: Expression = soc_violation.iter().map(|v| *v * 1_000.0).sum();
    let spacing_cost: Expression = spacing_viol
        .iter()
        .map(|v| *v * input.cost.spacing_penalty)
        .sum();
    let start_cost: Expression = water_start
        .iter()
        .map(|v| *v * input.cost.block_start_penalty)
        .sum();
    let breach_cost: Expression = import_breach
        .iter()
        .map(|v| *v * input.cost.import_breach_penalty)
        .sum();

    let terminal_penalty = input.risk.target_soc_penalty();
    let terminal_cost: Expression =
        target_under * terminal_penalty + target_over * terminal_penalty;
    let terminal_value: Expression = soc[n] * (-input.terminal_value_per_kwh);

    let objective = energy_cost
        + wear_cost
        + ramping_cost
        + comfort_cost
        + spacing_cost
        + start_cost
        + breach_cost
        + terminal_cost
        + terminal_value
        + curtailment_cost
        + shedding_cost
        + soc_violation_cost;

    Built {
        vars,
        objective,
        constraints,
        charge,
        discharge,
        soc,
        grid_import,
        grid_export,
        water_on,
    }
}

/// Net battery power at `t` (kW), ramp-linearized at every interior
/// boundary: `power[t] - power[t-1] == ramp_up[t] - ramp_down[t]`. Slot 0 has
/// no predecessor so it is left out (the teacher's scheduler re-solves every
/// tick from the live state, so a ramp cost against an unknown past slot
/// would only add noise).
fn push_ramping_constraints(
    constraints: &mut Vec<Constraint>,
    charge: &[Variable],
    discharge: &[Variable],
    durations: &[f64],
    ramp_up: &[Variable],
    ramp_down: &[Variable],
) {
    let n = charge.len();
    for t in 1..n {
        let power_now: Expression = (charge[t] - discharge[t]) * (1.0 / durations[t]);
        let power_prev: Expression = (charge[t - 1] - discharge[t - 1]) * (1.0 / durations[t - 1]);
        let idx = t - 1;
        constraints.push(constraint!(
            power_now - power_prev == ramp_up[idx] - ramp_down[idx]
        ));
    }
}

/// "Bucket date" (GLOSSARY): a slot earlier than `defer_up_to_hours` past
/// local midnight belongs to the previous day's bucket. Applied uniformly at
/// every day boundary -- not just the horizon's first one -- by shifting the
/// slot back by the defer amount before taking its local calendar date.
fn bucket_index(
    slot_start: chrono::DateTime<chrono::Utc>,
    first_local_date: chrono::NaiveDate,
    defer_up_to_hours: f64,
    tz: Tz,
) -> u32 {
    let defer = Duration::minutes((defer_up_to_hours * 60.0) as i64);
    let shifted_local_date = (slot_start - defer).with_timezone(&tz).date_naive();
    (shifted_local_date - first_local_date).num_days().max(0) as u32
}

fn push_daily_bucket_constraints(
    constraints: &mut Vec<Constraint>,
    slots: &[crate::domain::Slot],
    durations: &[f64],
    water: &WaterHeaterConfig,
    tz: Tz,
    water_on: &[Variable],
) {
    if slots.is_empty() {
        return;
    }
    let first_local_date = slots[0].start.with_timezone(&tz).date_naive();
    let bucket_of: Vec<u32> = slots
        .iter()
        .map(|slot| bucket_index(slot.start, first_local_date, water.defer_up_to_hours, tz))
        .collect();

    let mut bucket_ids: Vec<u32> = bucket_of.clone();
    bucket_ids.sort_unstable();
    bucket_ids.dedup();

    for bucket in bucket_ids {
        let requirement = if bucket == 0 {
            water.day_zero_requirement_kwh()
        } else {
            water.min_kwh_per_day
        };
        if requirement <= EPSILON_KWH {
            continue;
        }
        let energy: Expression = (0..slots.len())
            .filter(|&t| bucket_of[t] == bucket)
            .map(|t| water_on[t] * (water.power_kw * durations[t]))
            .sum();
        constraints.push(constraint!(energy >= requirement));
    }
}

fn push_gap_constraints(
    constraints: &mut Vec<Constraint>,
    durations: &[f64],
    water: &WaterHeaterConfig,
    water_on: &[Variable],
    gap_viol_1x: &[Variable],
    gap_viol_2x: &[Variable],
) {
    let n = water_on.len();
    if n == 0 {
        return;
    }
    let avg_dt = durations.iter().sum::<f64>() / n as f64;
    let window_1x = ((water.max_gap_hours / avg_dt).ceil() as usize).max(1);
    let window_15x = ((1.5 * water.max_gap_hours / avg_dt).ceil() as usize).max(1);

    for start in 0..n {
        if start + window_1x <= n {
            let coverage: Expression = (start..start + window_1x).map(|t| water_on[t]).sum();
            constraints.push(constraint!(coverage + gap_viol_1x[start] >= 1.0));
        }
        if start + window_15x <= n {
            let coverage: Expression = (start..start + window_15x).map(|t| water_on[t]).sum();
            constraints.push(constraint!(coverage + gap_viol_2x[start] >= 1.0));
        }
    }
}

/// Number of slots spanned by `min_spacing_hours`, 0 if spacing is disabled.
fn spacing_window_slots(durations: &[f64], water: &WaterHeaterConfig) -> usize {
    let n = durations.len();
    if n == 0 || water.min_spacing_hours <= EPSILON_KWH {
        return 0;
    }
    let avg_dt = durations.iter().sum::<f64>() / n as f64;
    ((water.min_spacing_hours / avg_dt).ceil() as usize).max(1)
}

/// Blocks a new block start within `min_spacing_hours` of the heater having
/// been on (spec.md §4.6). Hard form: for each `t`,
/// `Σ_{j∈[t−spacing_slots,t)} water_on[j] + M*water_start[t] ≤ M` with
/// `M = spacing_slots`, i.e. a start at `t` is infeasible if the heater was
/// on anywhere in the preceding window. Soft form: one slack per `(t, j)`
/// pair, `spacing_viol[t] ≥ water_start[t] + water_on[j] − 1`.
fn push_spacing_constraints(
    constraints: &mut Vec<Constraint>,
    durations: &[f64],
    water: &WaterHeaterConfig,
    hard_spacing: bool,
    water_on: &[Variable],
    water_start: &[Variable],
    spacing_viol: &[Variable],
    window: usize,
) {
    let n = water_start.len();
    if n == 0 || window == 0 || water.min_spacing_hours <= EPSILON_KWH {
        return;
    }

    if hard_spacing {
        let m = window as f64;
        for t in 0..n {
            let lo = t.saturating_sub(window);
            let prior_on: Expression = (lo..t).map(|j| water_on[j]).sum();
            constraints.push(constraint!(prior_on + water_start[t] * m <= m));
        }
    } else {
        for t in 0..n {
            let lo = t.saturating_sub(window);
            for (k, j) in (lo..t).enumerate() {
                let idx = t * window + k;
                constraints.push(constraint!(
                    spacing_viol[idx] >= water_start[t] + water_on[j] - 1.0
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// A slot inside `defer_up_to_hours` of local midnight belongs to the
    /// previous day's bucket, at every day boundary in the horizon -- not
    /// only the first.
    #[test]
    fn bucket_index_defers_every_day_boundary_uniformly() {
        let tz = chrono_tz::UTC;
        let first_local_date = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap().date_naive();
        let defer_hours = 4.0;

        // Day 0, well after the defer window: bucket 0.
        let day0_evening = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap();
        assert_eq!(bucket_index(day0_evening, first_local_date, defer_hours, tz), 0);

        // Day 1 at 02:00, inside the defer window: still bucket 0, matching
        // the original day-0/day-1 cutoff behavior.
        let day1_early = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 2, 0, 0).unwrap();
        assert_eq!(bucket_index(day1_early, first_local_date, defer_hours, tz), 0);

        // Day 1 after the defer window: bucket 1.
        let day1_later = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 6, 0, 0).unwrap();
        assert_eq!(bucket_index(day1_later, first_local_date, defer_hours, tz), 1);

        // Day 2 at 02:00, inside the defer window: bucket 1, not bucket 2 --
        // the bug this regression-tests only deferred the first boundary.
        let day2_early = chrono::Utc.with_ymd_and_hms(2024, 1, 3, 2, 0, 0).unwrap();
        assert_eq!(bucket_index(day2_early, first_local_date, defer_hours, tz), 1);

        // Day 2 after the defer window: bucket 2.
        let day2_later = chrono::Utc.with_ymd_and_hms(2024, 1, 3, 6, 0, 0).unwrap();
        assert_eq!(bucket_index(day2_later, first_local_date, defer_hours, tz), 2);
    }
}
