use anyhow::{Result, bail};
use chrono::Local;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use caliper_core::models::{NewGoal, UpdateGoal};
use caliper_core::service::CaliperService;

use super::helpers::{fmt_opt, parse_date, resolve_profile, truncate};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_goal_add(
    svc: &CaliperService,
    account_id: i64,
    profile: Option<&str>,
    weight: Option<f64>,
    fat: Option<f64>,
    muscle: Option<f64>,
    date: Option<String>,
    start: Option<String>,
    describe: Option<String>,
    json: bool,
) -> Result<()> {
    let profile = resolve_profile(svc, account_id, profile)?;

    // A goal without a date defaults to a month out
    let target_date = match date {
        Some(s) => parse_date(Some(s))?,
        None => Local::now().date_naive() + chrono::Duration::days(30),
    };
    let start_date = start.map(|s| parse_date(Some(s))).transpose()?;

    let goal = svc.create_goal(
        account_id,
        &NewGoal {
            profile_id: profile.id,
            target_date,
            start_date,
            target_weight_kg: weight,
            target_fat_percentage: fat,
            target_muscle_mass_kg: muscle,
            description: describe,
        },
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&goal)?);
    } else {
        println!(
            "Created goal {} for '{}' (target {})",
            goal.id,
            profile.name,
            goal.target_date.format("%Y-%m-%d")
        );
        if let Some(w) = goal.target_weight_kg {
            println!("  Target weight: {w:.1} kg");
        }
        if let Some(f) = goal.target_fat_percentage {
            println!("  Target body fat: {f:.1}%");
        }
        if let Some(m) = goal.target_muscle_mass_kg {
            println!("  Target muscle: {m:.1} kg");
        }
        if let Some(ref d) = goal.description {
            println!("  {d}");
        }
    }

    Ok(())
}

pub(crate) fn cmd_goal_list(
    svc: &CaliperService,
    account_id: i64,
    profile: Option<&str>,
    json: bool,
) -> Result<()> {
    let profile = resolve_profile(svc, account_id, profile)?;
    let goals = svc.list_goals(account_id, profile.id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&goals)?);
    } else if goals.is_empty() {
        eprintln!(
            "No goals for '{}'. Use `caliper goal add` to set one.",
            profile.name
        );
    } else {
        #[derive(Tabled)]
        struct GoalRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Target date")]
            target_date: String,
            #[tabled(rename = "Weight (kg)")]
            weight: String,
            #[tabled(rename = "Fat %")]
            fat: String,
            #[tabled(rename = "Muscle (kg)")]
            muscle: String,
            #[tabled(rename = "Description")]
            description: String,
        }

        let rows: Vec<GoalRow> = goals
            .iter()
            .map(|g| GoalRow {
                id: g.id,
                target_date: g.target_date.format("%Y-%m-%d").to_string(),
                weight: fmt_opt(g.target_weight_kg),
                fat: fmt_opt(g.target_fat_percentage),
                muscle: fmt_opt(g.target_muscle_mass_kg),
                description: g
                    .description
                    .as_deref()
                    .map(|d| truncate(d, 30))
                    .unwrap_or_default(),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..5)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_goal_edit(
    svc: &CaliperService,
    account_id: i64,
    goal_id: i64,
    weight: Option<f64>,
    fat: Option<f64>,
    muscle: Option<f64>,
    date: Option<String>,
    start: Option<String>,
    describe: Option<String>,
    json: bool,
) -> Result<()> {
    if weight.is_none()
        && fat.is_none()
        && muscle.is_none()
        && date.is_none()
        && start.is_none()
        && describe.is_none()
    {
        bail!(
            "Nothing to update. Pass at least one of --weight, --fat, --muscle, --date, --start, --describe"
        );
    }

    let target_date = date.map(|d| parse_date(Some(d))).transpose()?;
    let start_date = start.map(|s| parse_date(Some(s))).transpose()?;
    let update = UpdateGoal {
        target_date,
        start_date: start_date.map(Some),
        target_weight_kg: weight.map(Some),
        target_fat_percentage: fat.map(Some),
        target_muscle_mass_kg: muscle.map(Some),
        description: describe.map(Some),
    };
    let goal = svc.update_goal(account_id, goal_id, &update)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&goal)?);
    } else {
        println!(
            "Updated goal {} (target {})",
            goal.id,
            goal.target_date.format("%Y-%m-%d")
        );
    }

    Ok(())
}

pub(crate) fn cmd_goal_remove(
    svc: &CaliperService,
    account_id: i64,
    goal_id: i64,
    json: bool,
) -> Result<()> {
    svc.delete_goal(account_id, goal_id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": goal_id }));
    } else {
        println!("Deleted goal {goal_id}");
    }

    Ok(())
}
