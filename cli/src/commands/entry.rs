use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use caliper_core::models::{NewEntry, UpdateEntry};
use caliper_core::service::CaliperService;

use super::helpers::{fmt_opt, parse_date, resolve_profile};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_entry_log(
    svc: &CaliperService,
    account_id: i64,
    profile: Option<&str>,
    weight: f64,
    neck: Option<f64>,
    belly: Option<f64>,
    hip: Option<f64>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let profile = resolve_profile(svc, account_id, profile)?;
    let date = parse_date(date)?;

    let entry = svc.log_entry(
        account_id,
        &NewEntry {
            profile_id: profile.id,
            date,
            weight_kg: weight,
            neck_cm: neck,
            belly_cm: belly,
            hip_cm: hip,
        },
    )?;
    let view = svc.entry_view(account_id, &entry)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!(
            "Logged {:.1} kg for {} ({})",
            entry.weight_kg,
            entry.date.format("%Y-%m-%d"),
            profile.name
        );
        if let Some(fat) = view.fat_percentage {
            let muscle = view.muscle_mass_kg.unwrap_or(0.0);
            println!("  Body fat: {fat:.1}%  Muscle: {muscle:.1} kg");
        }
    }

    Ok(())
}

pub(crate) fn cmd_entry_list(
    svc: &CaliperService,
    account_id: i64,
    profile: Option<&str>,
    limit: Option<u32>,
    json: bool,
) -> Result<()> {
    let profile = resolve_profile(svc, account_id, profile)?;
    let entries = svc.list_entries(account_id, profile.id, limit.map(i64::from))?;
    let views = svc.entry_views(account_id, &entries)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else if views.is_empty() {
        eprintln!(
            "No entries for '{}'. Use `caliper entry log` to record a measurement.",
            profile.name
        );
    } else {
        #[derive(Tabled)]
        struct EntryRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Date")]
            date: String,
            #[tabled(rename = "Weight (kg)")]
            weight: String,
            #[tabled(rename = "Neck (cm)")]
            neck: String,
            #[tabled(rename = "Belly (cm)")]
            belly: String,
            #[tabled(rename = "Hip (cm)")]
            hip: String,
            #[tabled(rename = "Fat %")]
            fat: String,
            #[tabled(rename = "Muscle (kg)")]
            muscle: String,
        }

        let rows: Vec<EntryRow> = views
            .iter()
            .map(|v| EntryRow {
                id: v.entry.id,
                date: v.entry.date.format("%Y-%m-%d").to_string(),
                weight: format!("{:.1}", v.entry.weight_kg),
                neck: fmt_opt(v.entry.neck_cm),
                belly: fmt_opt(v.entry.belly_cm),
                hip: fmt_opt(v.entry.hip_cm),
                fat: fmt_opt(v.fat_percentage),
                muscle: fmt_opt(v.muscle_mass_kg),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_entry_edit(
    svc: &CaliperService,
    account_id: i64,
    entry_id: i64,
    weight: Option<f64>,
    neck: Option<f64>,
    belly: Option<f64>,
    hip: Option<f64>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    if weight.is_none() && neck.is_none() && belly.is_none() && hip.is_none() && date.is_none() {
        bail!("Nothing to update. Pass at least one of --weight, --neck, --belly, --hip, --date");
    }

    let date = date.map(|d| parse_date(Some(d))).transpose()?;
    let update = UpdateEntry {
        date,
        weight_kg: weight,
        neck_cm: neck.map(Some),
        belly_cm: belly.map(Some),
        hip_cm: hip.map(Some),
    };
    let entry = svc.update_entry(account_id, entry_id, &update)?;
    let view = svc.entry_view(account_id, &entry)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!(
            "Updated entry {}: {:.1} kg on {}",
            entry.id,
            entry.weight_kg,
            entry.date.format("%Y-%m-%d")
        );
        if let Some(fat) = view.fat_percentage {
            let muscle = view.muscle_mass_kg.unwrap_or(0.0);
            println!("  Body fat: {fat:.1}%  Muscle: {muscle:.1} kg");
        }
    }

    Ok(())
}

pub(crate) fn cmd_entry_remove(
    svc: &CaliperService,
    account_id: i64,
    entry_id: i64,
    json: bool,
) -> Result<()> {
    svc.delete_entry(account_id, entry_id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": entry_id }));
    } else {
        println!("Deleted entry {entry_id}");
    }

    Ok(())
}
