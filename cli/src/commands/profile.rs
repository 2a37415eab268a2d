use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use caliper_core::models::{NewProfile, UpdateProfile};
use caliper_core::service::CaliperService;

use super::helpers::resolve_profile;

pub(crate) fn cmd_profile_add(
    svc: &CaliperService,
    account_id: i64,
    name: &str,
    age: Option<i64>,
    sex: Option<String>,
    height: Option<f64>,
    json: bool,
) -> Result<()> {
    let profile = svc.create_profile(
        account_id,
        &NewProfile {
            name: name.to_string(),
            age,
            sex,
            height_cm: height,
        },
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("Created profile '{}' (ID {})", profile.name, profile.id);
        if let Some(age) = profile.age {
            println!("  Age: {age}");
        }
        if let Some(ref sex) = profile.sex {
            println!("  Sex: {sex}");
        }
        if let Some(h) = profile.height_cm {
            println!("  Height: {h:.0} cm");
        }
    }

    Ok(())
}

pub(crate) fn cmd_profile_list(svc: &CaliperService, account_id: i64, json: bool) -> Result<()> {
    let profiles = svc.list_profiles(account_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profiles)?);
    } else if profiles.is_empty() {
        eprintln!("No profiles yet. Use `caliper profile add <name>` to create one.");
    } else {
        #[derive(Tabled)]
        struct ProfileRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Name")]
            name: String,
            #[tabled(rename = "Age")]
            age: String,
            #[tabled(rename = "Sex")]
            sex: String,
            #[tabled(rename = "Height (cm)")]
            height: String,
        }

        let rows: Vec<ProfileRow> = profiles
            .iter()
            .map(|p| ProfileRow {
                id: p.id,
                name: p.name.clone(),
                age: p.age.map_or("-".into(), |a| a.to_string()),
                sex: p.sex.clone().unwrap_or_else(|| "-".into()),
                height: p.height_cm.map_or("-".into(), |h| format!("{h:.0}")),
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

pub(crate) fn cmd_profile_show(
    svc: &CaliperService,
    account_id: i64,
    selector: &str,
    json: bool,
) -> Result<()> {
    let profile = resolve_profile(svc, account_id, Some(selector))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("{} (ID {})", profile.name, profile.id);
        if let Some(age) = profile.age {
            println!("  Age: {age}");
        }
        if let Some(ref sex) = profile.sex {
            println!("  Sex: {sex}");
        }
        if let Some(h) = profile.height_cm {
            println!("  Height: {h:.0} cm");
        }
        if let Some(entry) = svc.latest_entry(account_id, profile.id)? {
            println!(
                "  Latest entry: {:.1} kg on {}",
                entry.weight_kg,
                entry.date.format("%Y-%m-%d")
            );
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_profile_update(
    svc: &CaliperService,
    account_id: i64,
    selector: &str,
    name: Option<String>,
    age: Option<i64>,
    sex: Option<String>,
    height: Option<f64>,
    json: bool,
) -> Result<()> {
    if name.is_none() && age.is_none() && sex.is_none() && height.is_none() {
        bail!("Nothing to update. Pass at least one of --name, --age, --sex, --height");
    }

    let target = resolve_profile(svc, account_id, Some(selector))?;
    let update = UpdateProfile {
        name,
        age: age.map(Some),
        sex: sex.map(Some),
        height_cm: height.map(Some),
    };
    let profile = svc.update_profile(account_id, target.id, &update)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("Updated profile '{}' (ID {})", profile.name, profile.id);
    }

    Ok(())
}

pub(crate) fn cmd_profile_remove(
    svc: &CaliperService,
    account_id: i64,
    selector: &str,
    json: bool,
) -> Result<()> {
    let profile = resolve_profile(svc, account_id, Some(selector))?;
    let summary = svc.delete_profile(account_id, profile.id)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "deleted": profile.id,
                "entries_deleted": summary.entries_deleted,
                "goals_deleted": summary.goals_deleted,
            })
        );
    } else {
        println!(
            "Removed profile '{}' ({} entries, {} goals deleted)",
            profile.name, summary.entries_deleted, summary.goals_deleted
        );
    }

    Ok(())
}
