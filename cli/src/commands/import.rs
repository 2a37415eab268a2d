use std::path::Path;

use anyhow::{Context, Result};

use caliper_core::service::CaliperService;

use super::helpers::resolve_profile;

pub(crate) fn cmd_import(
    svc: &CaliperService,
    account_id: i64,
    profile: Option<&str>,
    path: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let profile = resolve_profile(svc, account_id, profile)?;
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let summary = svc.import_measurements_csv(account_id, profile.id, &data, dry_run)?;

    if summary.rows_parsed == 0 {
        if json {
            println!(
                "{}",
                serde_json::json!({ "error": "No measurement rows found in CSV file" })
            );
        } else {
            eprintln!("No measurement rows found in CSV file.");
        }
        return Ok(());
    }

    if json {
        println!(
            "{}",
            serde_json::json!({
                "dry_run": dry_run,
                "profile_id": profile.id,
                "rows_parsed": summary.rows_parsed,
                "entries_created": summary.entries_created,
                "rows_skipped": summary.rows_skipped,
                "dates_spanned": summary.dates_spanned,
            })
        );
    } else if dry_run {
        println!("Dry run — no changes made.\n");
        println!("  Rows parsed:       {}", summary.rows_parsed);
        println!("  Entries to create: {}", summary.entries_created);
        println!("  Rows skipped:      {}", summary.rows_skipped);
        println!("  Dates spanned:     {}", summary.dates_spanned);
    } else {
        println!("Import complete for '{}'.\n", profile.name);
        println!("  Rows parsed:     {}", summary.rows_parsed);
        println!("  Entries created: {}", summary.entries_created);
        println!("  Rows skipped:    {}", summary.rows_skipped);
        println!("  Dates spanned:   {}", summary.dates_spanned);
    }

    Ok(())
}
