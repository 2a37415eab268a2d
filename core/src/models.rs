use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    // Never serialized into API responses. None for the local CLI account,
    // which cannot authenticate over HTTP.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    pub age: Option<i64>,
    pub sex: Option<String>,
    pub height_cm: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub id: i64,
    pub profile_id: i64,
    pub account_id: i64,
    pub date: NaiveDate,
    pub weight_kg: f64,
    pub neck_cm: Option<f64>,
    pub belly_cm: Option<f64>,
    pub hip_cm: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Goal {
    pub id: i64,
    pub profile_id: i64,
    pub account_id: i64,
    pub target_date: NaiveDate,
    pub start_date: Option<NaiveDate>,
    pub target_weight_kg: Option<f64>,
    pub target_fat_percentage: Option<f64>,
    pub target_muscle_mass_kg: Option<f64>,
    pub description: Option<String>,
    pub created_at: String,
}

/// An entry plus metrics recomputed from the owning profile's height and sex.
/// Derived values are never stored; they are rebuilt from the raw fields on
/// every read.
#[derive(Debug, Clone, Serialize)]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: Entry,
    pub fat_percentage: Option<f64>,
    pub muscle_mass_kg: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub name: String,
    pub age: Option<i64>,
    pub sex: Option<String>,
    pub height_cm: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub age: Option<Option<i64>>,
    pub sex: Option<Option<String>>,
    pub height_cm: Option<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct NewEntry {
    pub profile_id: i64,
    pub date: NaiveDate,
    pub weight_kg: f64,
    pub neck_cm: Option<f64>,
    pub belly_cm: Option<f64>,
    pub hip_cm: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct UpdateEntry {
    pub date: Option<NaiveDate>,
    pub weight_kg: Option<f64>,
    pub neck_cm: Option<Option<f64>>,
    pub belly_cm: Option<Option<f64>>,
    pub hip_cm: Option<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct NewGoal {
    pub profile_id: i64,
    pub target_date: NaiveDate,
    pub start_date: Option<NaiveDate>,
    pub target_weight_kg: Option<f64>,
    pub target_fat_percentage: Option<f64>,
    pub target_muscle_mass_kg: Option<f64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateGoal {
    pub target_date: Option<NaiveDate>,
    pub start_date: Option<Option<NaiveDate>>,
    pub target_weight_kg: Option<Option<f64>>,
    pub target_fat_percentage: Option<Option<f64>>,
    pub target_muscle_mass_kg: Option<Option<f64>>,
    pub description: Option<Option<String>>,
}

/// Rows removed by a cascade delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeSummary {
    pub profiles_deleted: usize,
    pub entries_deleted: usize,
    pub goals_deleted: usize,
}

pub const SEXES: &[&str] = &["male", "female", "other"];

pub fn validate_sex(sex: &str) -> Result<String> {
    let lower = sex.to_lowercase();
    if SEXES.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        bail!("Invalid sex '{sex}'. Must be one of: {}", SEXES.join(", "))
    }
}

pub fn validate_new_profile(profile: &NewProfile) -> Result<()> {
    if profile.name.trim().is_empty() {
        bail!("Profile name must not be empty");
    }
    if profile.age.is_some_and(|a| !(0..=150).contains(&a)) {
        bail!("Age must be between 0 and 150");
    }
    if let Some(sex) = &profile.sex {
        validate_sex(sex)?;
    }
    if profile.height_cm.is_some_and(|h| h <= 0.0) {
        bail!("height_cm must be greater than 0");
    }
    Ok(())
}

///// Validate raw measurements: weight is required and every circumference, if
/// given, must be positive.
pub fn validate_measurements(
    weight_kg: f64,
    neck_cm: Option<f64>,
    belly_cm: Option<f64>,
    hip_cm: Option<f64>,
) -> Result<()> {
    if weight_kg <= 0.0 {
        bail!("weight_kg must be greater than 0");
    }
    if neck_cm.is_some_and(|v| v <= 0.0) {
        bail!("neck_cm must be greater than 0");
    }
    if belly_cm.is_some_and(|v| v <= 0.0) {
        bail!("belly_cm must be greater than 0");
    }
    if hip_cm.is_some_and(|v| v <= 0.0) {
        bail!("hip_cm must be greater than 0");
    }
    Ok(())
}

/// A goal must name at least one target, and each given target must be in a
/// sane range.
pub fn validate_goal_targets(
    target_weight_kg: Option<f64>,
    target_fat_percentage: Option<f64>,
    target_muscle_mass_kg: Option<f64>,
) -> Result<()> {
    if target_weight_kg.is_none() && target_fat_percentage.is_none() && target_muscle_mass_kg.is_none()
    {
        bail!("At least one target (weight, fat percentage, or muscle mass) is required");
    }
    if target_weight_kg.is_some_and(|v| v <= 0.0) {
        bail!("target_weight_kg must be greater than 0");
    }
    if target_fat_percentage.is_some_and(|v| !(0.0..=100.0).contains(&v)) {
        bail!("target_fat_percentage must be between 0 and 100");
    }
    if target_muscle_mass_kg.is_some_and(|v| v <= 0.0) {
        bail!("target_muscle_mass_kg must be greater than 0");
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<()> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        bail!("Username must not be empty");
    }
    if trimmed.len() > 64 {
        bail!("Username must be 64 characters or fewer");
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        bail!("Username may only contain letters, digits, '_', '-' and '.'");
    }
    Ok(())
}

pub fn validate_update_profile(update: &UpdateProfile) -> Result<()> {
    if update.name.as_ref().is_some_and(|n| n.trim().is_empty()) {
        bail!("Profile name must not be empty");
    }
    if update.age.flatten().is_some_and(|a| !(0..=150).contains(&a)) {
        bail!("Age must be between 0 and 150");
    }
    if let Some(Some(ref sex)) = update.sex {
        validate_sex(sex)?;
    }
    if update.height_cm.flatten().is_some_and(|h| h <= 0.0) {
        bail!("height_cm must be greater than 0");
    }
    Ok(())
}

pub fn validate_update_entry(update: &UpdateEntry) -> Result<()> {
    if update.weight_kg.is_some_and(|v| v <= 0.0) {
        bail!("weight_kg must be greater than 0");
    }
    if update.neck_cm.flatten().is_some_and(|v| v <= 0.0) {
        bail!("neck_cm must be greater than 0");
    }
    if update.belly_cm.flatten().is_some_and(|v| v <= 0.0) {
        bail!("belly_cm must be greater than 0");
    }
    if update.hip_cm.flatten().is_some_and(|v| v <= 0.0) {
        bail!("hip_cm must be greater than 0");
    }
    Ok(())
}

pub fn validate_update_goal(update: &UpdateGoal) -> Result<()> {
    if update.target_weight_kg.flatten().is_some_and(|v| v <= 0.0) {
        bail!("target_weight_kg must be greater than 0");
    }
    if update
        .target_fat_percentage
        .flatten()
        .is_some_and(|v| !(0.0..=100.0).contains(&v))
    {
        bail!("target_fat_percentage must be between 0 and 100");
    }
    if update
        .target_muscle_mass_kg
        .flatten()
        .is_some_and(|v| v <= 0.0)
    {
        bail!("target_muscle_mass_kg must be greater than 0");
    }
    Ok(())
}
