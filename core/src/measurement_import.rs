use std::collections::HashSet;
use std::io::Read;

use anyhow::{Context, Result, bail};

use crate::db::Database;
use crate::models::NewEntry;

/// A single row parsed from a measurement CSV export.
#[derive(Debug, Clone)]
pub struct MeasurementRow {
    pub date: String,
    pub weight_kg: f64,
    pub neck_cm: Option<f64>,
    pub belly_cm: Option<f64>,
    pub hip_cm: Option<f64>,
}

/// Summary of what a measurement import would do / did.
#[derive(Debug, Clone)]
pub struct MeasurementImportSummary {
    pub rows_parsed: usize,
    pub entries_created: usize,
    pub rows_skipped: usize,
    pub dates_spanned: usize,
}

/// Parse a measurement CSV export from any reader.
///
///// Expected header: `Date,Weight` with optional `Neck`, `Waist` (or `Belly`)
/// and `Hip` columns, case-insensitive and in any order.
pub fn parse_measurement_csv<R: Read>(reader: R) -> Result<Vec<MeasurementRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

    // Validate required columns
    let required = ["Date", "Weight"];
    for name in &required {
        if !headers.iter().any(|h| h.eq_ignore_ascii_case(name)) {
            bail!("Missing required column: {name}");
        }
    }

    // Build column index map (case-insensitive)
    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };

    let idx_date = col("Date").context("Missing 'Date' column")?;
    let idx_weight = col("Weight").context("Missing 'Weight' column")?;
    let idx_neck = col("Neck");
    let idx_belly = col("Waist").or_else(|| col("Belly"));
    let idx_hip = col("Hip");

    let mut rows = Vec::new();

    for (line_num, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV row {}", line_num + 2))?;

        let date = record.get(idx_date).unwrap_or("").trim().to_string();

        let parse_opt_f64 = |idx: Option<usize>| -> Option<f64> {
            idx.and_then(|i| record.get(i))
                .and_then(|v| v.trim().parse::<f64>().ok())
        };

        let weight_kg = parse_opt_f64(Some(idx_weight)).unwrap_or(0.0);

        // Rows without a date or a positive weight cannot become entries
        if date.is_empty() || weight_kg <= 0.0 {
            continue;
        }

        // A zero circumference in an export means "not measured"
        rows.push(MeasurementRow {
            date,
            weight_kg,
            neck_cm: parse_opt_f64(idx_neck).filter(|v| *v > 0.0),
            belly_cm: parse_opt_f64(idx_belly).filter(|v| *v > 0.0),
            hip_cm: parse_opt_f64(idx_hip).filter(|v| *v > 0.0),
        });
    }

    Ok(rows)
}

/// Normalize an exported date to YYYY-MM-DD format.
fn normalize_date(raw: &str) -> Result<String> {
    // Try YYYY-MM-DD first
    if chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok() {
        return Ok(raw.to_string());
    }
    // Try M/D/YYYY
    if let Ok(d) = chrono::NaiveDate::parse_from_str(raw, "%m/%d/%Y") {
        return Ok(d.format("%Y-%m-%d").to_string());
    }
    // Try D/M/YYYY
    if let Ok(d) = chrono::NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
        return Ok(d.format("%Y-%m-%d").to_string());
    }
    bail!("Cannot parse date: '{raw}'")
}

/// Import parsed measurement rows as entries for one profile.
///
/// Rows whose date already has an entry are skipped, so re-running an import
/// is safe. Returns a `MeasurementImportSummary`. When `dry_run` is true, no
/// data is written.
pub fn import_measurements(
    db: &Database,
    account_id: i64,
    profile_id: i64,
    rows: &[MeasurementRow],
    dry_run: bool,
) -> Result<MeasurementImportSummary> {
    // Ownership check up front; unowned profiles read as missing
    db.get_profile(account_id, profile_id)?;

    let mut entries_created: usize = 0;
    let mut rows_skipped: usize = 0;
    let mut dates: HashSet<String> = HashSet::new();
    let mut imported: HashSet<String> = HashSet::new();

    for row in rows {
        let date = normalize_date(&row.date)?;
        dates.insert(date.clone());

        let parsed_date = chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d")?;
        let already_imported = imported.contains(&date)
            || db.entry_for_date(account_id, profile_id, parsed_date)?.is_some();
        if already_imported {
            rows_skipped += 1;
            continue;
        }

        if !dry_run {
            db.insert_entry(
                account_id,
                &NewEntry {
                    profile_id,
                    date: parsed_date,
                    weight_kg: row.weight_kg,
                    neck_cm: row.neck_cm,
                    belly_cm: row.belly_cm,
                    hip_cm: row.hip_cm,
                },
            )?;
        }
        imported.insert(date);
        entries_created += 1;
    }

    Ok(MeasurementImportSummary {
        rows_parsed: rows.len(),
        entries_created,
        rows_skipped,
        dates_spanned: dates.len(),
    })
}
