use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};

use caliper_core::models::Profile;
use caliper_core::service::CaliperService;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Resolve `--profile` to an owned profile. Accepts a numeric ID or a name.
/// With no selector, an account holding exactly one profile defaults to it.
pub(crate) fn resolve_profile(
    svc: &CaliperService,
    account_id: i64,
    selector: Option<&str>,
) -> Result<Profile> {
    match selector {
        Some(s) => {
            if let Ok(id) = s.parse::<i64>() {
                svc.get_profile(account_id, id)
            } else {
                svc.find_profile_by_name(account_id, s)?
                    .with_context(|| format!("No profile named '{s}'"))
            }
        }
        None => {
            let mut profiles = svc.list_profiles(account_id)?;
            match profiles.len() {
                0 => bail!("No profiles yet. Create one with `caliper profile add <name>`"),
                1 => Ok(profiles.remove(0)),
                _ => bail!("Multiple profiles exist. Select one with --profile <name or ID>"),
            }
        }
    }
}

/// "-" for measurements that were never taken.
pub(crate) fn fmt_opt(v: Option<f64>) -> String {
    v.map_or("-".into(), |x| format!("{x:.1}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
