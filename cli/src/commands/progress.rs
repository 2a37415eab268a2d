use anyhow::Result;
use std::process;

use caliper_core::progress::{FatProjection, GoalProjection, MetricProjection};
use caliper_core::service::CaliperService;

use super::helpers::{no_neg_zero, resolve_profile};

pub(crate) fn cmd_progress(
    svc: &CaliperService,
    account_id: i64,
    profile: Option<&str>,
    json: bool,
) -> Result<()> {
    let projections = match profile {
        Some(sel) => {
            let p = resolve_profile(svc, account_id, Some(sel))?;
            svc.profile_progress(account_id, p.id)?
        }
        None => svc.latest_progress(account_id)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&projections)?);
        return Ok(());
    }

    if projections.is_empty() {
        eprintln!("No goals with a future target date.");
        process::exit(2);
    }

    for p in &projections {
        print_projection(p);
    }

    Ok(())
}

fn print_projection(p: &GoalProjection) {
    println!(
        "=== Goal {} — target {} ({} days left) ===",
        p.goal_id,
        p.target_date.format("%Y-%m-%d"),
        p.days_remaining
    );
    if let Some(ref d) = p.description {
        println!("  {d}");
    }
    let pct = no_neg_zero(p.progress_percentage);
    println!("  Timeline: {pct:.0}% elapsed");

    print_metric("Weight", &p.weight_kg, "kg");
    print_fat(&p.fat_percentage);
    print_metric("Muscle", &p.muscle_mass_kg, "kg");
    println!();
}

fn print_metric(label: &str, m: &MetricProjection, unit: &str) {
    let Some(target) = m.target else { return };
    match (m.current, m.weekly_change_needed) {
        (Some(current), Some(weekly)) => {
            let weekly = no_neg_zero(weekly);
            println!("  {label}: {current:.1} → {target:.1} {unit} ({weekly:+.2} {unit}/week)");
        }
        _ => println!("  {label}: ? → {target:.1} {unit}"),
    }
}

fn print_fat(f: &FatProjection) {
    let Some(target) = f.target else { return };
    match (f.current, f.weekly_change_needed) {
        (Some(current), Some(weekly)) => {
            let weekly = no_neg_zero(weekly);
            println!("  Body fat: {current:.1}% → {target:.1}% ({weekly:+.2} %/week)");
        }
        _ => println!("  Body fat: ? → {target:.1}%"),
    }
    if let (Some(now), Some(then)) = (f.current_belly_cm, f.target_belly_cm) {
        println!("    Waist now ~{now:.1} cm, at target ~{then:.1} cm");
    } else if let Some(then) = f.target_belly_cm {
        println!("    Waist at target ~{then:.1} cm");
    }
    if f.target_belly_plausible == Some(false) {
        eprintln!("Warning: the target body fat implies an unrealistic waist measurement");
    }
}
