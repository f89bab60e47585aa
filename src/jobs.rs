//! Job durations and splitting of over-long runs

use serde::Serialize;
use tracing::debug;

use crate::models::{ProductionStep, round2};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// How a run count is divided into jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitPlan {
    pub job_count: u64,
    pub runs_per_job: u64,
    pub last_job_runs: u64,
}

impl SplitPlan {
    pub fn is_split(&self) -> bool {
        self.job_count > 1
    }

    /// Runs of every job in order; the last one may be shorter.
    pub fn job_runs(&self) -> Vec<u64> {
        if self.job_count <= 1 {
            return vec![self.last_job_runs];
        }
        let mut runs = vec![self.runs_per_job; (self.job_count - 1) as usize];
        runs.push(self.last_job_runs);
        runs
    }
}

/// Split `total_runs` so no job lasts longer than `max_duration_days`.
///
/// A single run is never divided: when one run alone exceeds the limit
/// every job gets exactly one run.
pub fn split_if_needed(
    time_per_run_seconds: u64,
    total_runs: u64,
    max_duration_days: f64,
) -> SplitPlan {
    let max_seconds = max_duration_days * SECONDS_PER_DAY;
    let total_seconds = time_per_run_seconds as f64 * total_runs as f64;

    if total_runs == 0 || time_per_run_seconds == 0 || total_seconds <= max_seconds {
        return SplitPlan {
            job_count: 1,
            runs_per_job: total_runs,
            last_job_runs: total_runs,
        };
    }

    let fitting_runs = (max_seconds / time_per_run_seconds as f64).floor().max(0.0) as u64;
    let max_runs_per_job = fitting_runs.max(1);
    let job_count = total_runs.div_ceil(max_runs_per_job);
    let last_job_runs = total_runs - max_runs_per_job * (job_count - 1);

    SplitPlan {
        job_count,
        runs_per_job: max_runs_per_job,
        last_job_runs,
    }
}

/// Fraction of time left after independent skill reductions.
///
/// Each entry is `(percent per level, trained level)`; skills multiply.
pub fn skill_multiplier(skills: &[(f64, u8)]) -> f64 {
    skills
        .iter()
        .map(|(percent, level)| 1.0 - percent * *level as f64 / 100.0)
        .product()
}

/// Duration of one run after TE, structure and skill reductions, in whole seconds.
pub fn adjusted_time_per_run(
    base_time_seconds: u64,
    te_level: u8,
    structure_time_bonus_percent: f64,
    skill_multiplier: f64,
) -> u64 {
    let seconds = base_time_seconds as f64
        * (1.0 - te_level as f64 / 100.0)
        * (1.0 - structure_time_bonus_percent / 100.0)
        * skill_multiplier;
    round2(seconds).ceil().max(0.0) as u64
}

/// Spread `new_total` over existing splits in proportion to their old runs.
///
/// The last split takes whatever rounding leaves, so the result always sums
/// to `new_total`. With an old total of zero every split weighs the same.
pub fn redistribute_runs(old_runs: &[u64], new_total: u64) -> Vec<u64> {
    if old_runs.is_empty() {
        return Vec::new();
    }

    let weights: Vec<u64> = if old_runs.iter().sum::<u64>() == 0 {
        vec![1; old_runs.len()]
    } else {
        old_runs.to_vec()
    };
    let weight_total: u64 = weights.iter().sum();

    let mut remaining = new_total;
    let mut result = Vec::with_capacity(weights.len());
    for weight in &weights[..weights.len() - 1] {
        let share = *weight as f64 / weight_total as f64;
        let runs = ((new_total as f64 * share).round() as u64).min(remaining);
        remaining -= runs;
        result.push(runs);
    }
    result.push(remaining);
    result
}

/// Break every over-long step into bounded jobs.
///
/// Split pieces share a `split_group_id` (numbered from 1 per call) and
/// carry their position in `split_index`.
pub fn split_steps(steps: &[ProductionStep], max_duration_days: f64) -> Vec<ProductionStep> {
    let mut next_group = 1u32;
    let mut out = Vec::with_capacity(steps.len());

    for step in steps {
        let plan = split_if_needed(step.time_per_run_seconds, step.runs, max_duration_days);
        if !plan.is_split() {
            out.push(step.clone());
            continue;
        }

        debug!(
            product = step.product_id,
            runs = step.runs,
            jobs = plan.job_count,
            "splitting step"
        );
        let group = next_group;
        next_group += 1;

        let mut remaining_quantity = step.quantity;
        for (index, runs) in plan.job_runs().into_iter().enumerate() {
            let quantity = (runs * step.output_per_run).min(remaining_quantity);
            remaining_quantity -= quantity;
            out.push(ProductionStep {
                runs,
                quantity,
                split_group_id: Some(group),
                split_index: Some(index as u32),
                ..step.clone()
            });
        }
    }

    out
}

/// Re-spread a split group after its parent's requirement changed.
pub fn rebalance_split_group(
    steps: &[ProductionStep],
    group_id: u32,
    new_total_runs: u64,
) -> Vec<ProductionStep> {
    let mut members: Vec<usize> = steps
        .iter()
        .enumerate()
        .filter(|(_, s)| s.split_group_id == Some(group_id))
        .map(|(i, _)| i)
        .collect();
    members.sort_by_key(|i| steps[*i].split_index);

    let old_runs: Vec<u64> = members.iter().map(|i| steps[*i].runs).collect();
    let new_runs = redistribute_runs(&old_runs, new_total_runs);

    let mut out = steps.to_vec();
    for (i, runs) in members.into_iter().zip(new_runs) {
        out[i].runs = runs;
        out[i].quantity = runs * out[i].output_per_run;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityKind;
    use proptest::prelude::*;

    fn step(runs: u64, time_per_run_seconds: u64) -> ProductionStep {
        ProductionStep {
            activity: ActivityKind::Manufacturing,
            blueprint_id: 1,
            product_id: 2,
            product_name: "Widget".to_string(),
            runs,
            quantity: runs * 10,
            output_per_run: 10,
            depth: 1,
            me_level: 10,
            te_level: 20,
            time_per_run_seconds,
            split_group_id: None,
            split_index: None,
        }
    }

    #[test]
    fn short_job_is_not_split() {
        let plan = split_if_needed(3600, 10, 1.0);
        assert_eq!(plan, SplitPlan { job_count: 1, runs_per_job: 10, last_job_runs: 10 });
        assert_eq!(plan.job_runs(), vec![10]);
    }

    #[test]
    fn long_job_splits_with_short_tail() {
        // 172800 / 6600 = 26 runs per job
        let plan = split_if_needed(6600, 148, 2.0);
        assert_eq!(plan.job_count, 6);
        assert_eq!(plan.runs_per_job, 26);
        assert_eq!(plan.last_job_runs, 18);
        assert_eq!(plan.job_runs(), vec![26, 26, 26, 26, 26, 18]);
    }

    #[test]
    fn single_run_longer_than_limit_stays_whole() {
        let plan = split_if_needed(200_000, 3, 1.0);
        assert_eq!(plan.runs_per_job, 1);
        assert_eq!(plan.job_count, 3);
        assert_eq!(plan.last_job_runs, 1);
    }

    #[test]
    fn zero_duration_never_splits() {
        assert_eq!(split_if_needed(0, 1000, 1.0).job_count, 1);
        assert_eq!(split_if_needed(100, 0, 1.0).job_runs(), vec![0]);
    }

    #[test]
    fn adjusted_time_applies_all_reductions() {
        // 10800 × 0.8 × 0.8 × 0.68 = 4700.16
        assert_eq!(adjusted_time_per_run(10_800, 20, 20.0, 0.68), 4701);
        assert_eq!(adjusted_time_per_run(10_800, 20, 0.0, 1.0), 8640);
    }

    #[test]
    fn redistribution_follows_old_shares() {
        assert_eq!(redistribute_runs(&[26, 26, 18], 35), vec![13, 13, 9]);
        assert_eq!(redistribute_runs(&[0, 0, 0], 10), vec![3, 3, 4]);
        assert_eq!(redistribute_runs(&[1, 1, 0], 1), vec![1, 0, 0]);
        assert!(redistribute_runs(&[], 5).is_empty());
    }

    #[test]
    fn split_steps_numbers_groups_and_keeps_quantity() {
        let steps = vec![step(148, 6600), step(5, 6600), step(40, 6600)];
        let split = split_steps(&steps, 2.0);
        assert_eq!(split.len(), 6 + 1 + 2);
        assert!(split[..6].iter().all(|s| s.split_group_id == Some(1)));
        assert_eq!(split[5].split_index, Some(5));
        assert_eq!(split[6].split_group_id, None);
        assert!(split[7..].iter().all(|s| s.split_group_id == Some(2)));
        let first_group_qty: u64 = split[..6].iter().map(|s| s.quantity).sum();
        assert_eq!(first_group_qty, 1480);
    }

    #[test]
    fn rebalance_updates_only_the_group() {
        let steps = split_steps(&[step(148, 6600), step(5, 6600)], 2.0);
        let rebalanced = rebalance_split_group(&steps, 1, 100);
        let group_runs: u64 = rebalanced
            .iter()
            .filter(|s| s.split_group_id == Some(1))
            .map(|s| s.runs)
            .sum();
        assert_eq!(group_runs, 100);
        assert_eq!(rebalanced.last().unwrap().runs, 5);
    }

    proptest! {
        #[test]
        fn split_conserves_runs(time in 0u64..500_000, runs in 0u64..10_000, days in 0.5f64..60.0) {
            let plan = split_if_needed(time, runs, days);
            prop_assert_eq!(plan.job_runs().iter().sum::<u64>(), runs);
            prop_assert!(plan.last_job_runs <= plan.runs_per_job || !plan.is_split());
        }

        #[test]
        fn redistribution_conserves_total(
            old in prop::collection::vec(0u64..500, 1..12),
            new_total in 0u64..5_000,
        ) {
            let new_runs = redistribute_runs(&old, new_total);
            prop_assert_eq!(new_runs.len(), old.len());
            prop_assert_eq!(new_runs.iter().sum::<u64>(), new_total);
        }
    }
}
