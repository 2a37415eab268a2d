//! Goal-progress projection: how much change per day/week is needed to reach
//! each still-open goal from the most recent measurement.

use chrono::NaiveDate;
use serde::Serialize;

use crate::composition;
use crate::models::{Entry, Goal, Profile};

/// Current/target pair for one tracked metric, with the rate of change
/// required to close the gap. Change fields are absent whenever either side
/// is missing.
#[derive(Debug, Clone, Serialize)]
pub struct MetricProjection {
    pub current: Option<f64>,
    pub target: Option<f64>,
    pub daily_change_needed: Option<f64>,
    pub weekly_change_needed: Option<f64>,
}

/// The fat-percentage metric additionally carries the belly circumference
/// implied by the current and target percentages, holding neck/hip/height
/// fixed at their latest known values. `target_belly_plausible` is false
/// when the implied circumference falls outside a believable range.
#[derive(Debug, Clone, Serialize)]
pub struct FatProjection {
    pub current: Option<f64>,
    pub target: Option<f64>,
    pub daily_change_needed: Option<f64>,
    pub weekly_change_needed: Option<f64>,
    pub current_belly_cm: Option<f64>,
    pub target_belly_cm: Option<f64>,
    pub target_belly_plausible: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalProjection {
    pub goal_id: i64,
    pub target_date: NaiveDate,
    pub days_remaining: i64,
    pub total_days: i64,
    pub days_elapsed: i64,
    pub progress_percentage: f64,
    pub description: Option<String>,
    pub weight_kg: MetricProjection,
    pub fat_percentage: FatProjection,
    pub muscle_mass_kg: MetricProjection,
}

#[allow(clippy::cast_precision_loss)]
fn metric(current: Option<f64>, target: Option<f64>, days_remaining: i64) -> MetricProjection {
    let delta = match (current, target) {
        (Some(c), Some(t)) => Some(t - c),
        _ => None,
    };
    let days = days_remaining as f64;
    MetricProjection {
        current,
        target,
        daily_change_needed: delta.map(|d| d / days),
        weekly_change_needed: delta.map(|d| d / (days / 7.0)),
    }
}

fn goal_start_date(goal: &Goal) -> NaiveDate {
    if let Some(start) = goal.start_date {
        return start;
    }
    chrono::DateTime::parse_from_rfc3339(&goal.created_at)
        .map(|dt| dt.date_naive())
        .unwrap_or_else(|_| NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date"))
}

/// Project progress toward each goal from the latest entry.
///
/// Goals whose target date is on or before the entry date are silently
/// excluded. Output keeps the input's ascending target-date order. Pure
/// function: no side effects, safe to call concurrently.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn project(
    latest_entry: &Entry,
    goals: &[Goal],
    profile: Option<&Profile>,
) -> Vec<GoalProjection> {
    let height_cm = profile.and_then(|p| p.height_cm);
    let sex = profile.and_then(|p| p.sex.as_deref());

    let current_fat = composition::estimate_fat_percentage(
        latest_entry.weight_kg,
        latest_entry.neck_cm,
        latest_entry.belly_cm,
        height_cm,
        sex,
        latest_entry.hip_cm,
    );
    let current_muscle = composition::estimate_muscle_mass(latest_entry.weight_kg, current_fat);
    let current_belly = composition::infer_belly_circumference(
        current_fat,
        latest_entry.neck_cm,
        height_cm,
        sex,
        latest_entry.hip_cm,
    )
    .map(|e| e.belly_cm);

    let mut results = Vec::new();

    for goal in goals {
        let days_remaining = goal
            .target_date
            .signed_duration_since(latest_entry.date)
            .num_days();
        if days_remaining <= 0 {
            // Target date has already passed relative to the latest
            // measurement; not an error.
            continue;
        }

        let start_date = goal_start_date(goal);
        let total_days = goal
            .target_date
            .signed_duration_since(start_date)
            .num_days();
        let days_elapsed = latest_entry
            .date
            .signed_duration_since(start_date)
            .num_days();
        let progress_percentage = if total_days > 0 {
            days_elapsed as f64 / total_days as f64 * 100.0
        } else {
            0.0
        };

        let target_belly = composition::infer_belly_circumference(
            goal.target_fat_percentage,
            latest_entry.neck_cm,
            height_cm,
            sex,
            latest_entry.hip_cm,
        );

        let fat = metric(current_fat, goal.target_fat_percentage, days_remaining);

        results.push(GoalProjection {
            goal_id: goal.id,
            target_date: goal.target_date,
            days_remaining,
            total_days,
            days_elapsed,
            progress_percentage,
            description: goal.description.clone(),
            weight_kg: metric(
                Some(latest_entry.weight_kg),
                goal.target_weight_kg,
                days_remaining,
            ),
            fat_percentage: FatProjection {
                current: fat.current,
                target: fat.target,
                daily_change_needed: fat.daily_change_needed,
                weekly_change_needed: fat.weekly_change_needed,
                current_belly_cm: current_belly,
                target_belly_cm: target_belly.map(|e| e.belly_cm),
                target_belly_plausible: target_belly.map(|e| e.plausible),
            },
            muscle_mass_kg: metric(current_muscle, goal.target_muscle_mass_kg, days_remaining),
        });
    }

    results
}
