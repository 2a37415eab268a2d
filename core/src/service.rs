use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Result;

use crate::composition;
use crate::db::Database;
use crate::measurement_import::{self, MeasurementImportSummary};
use crate::models::{
    self, Account, CascadeSummary, Entry, EntryView, Goal, NewEntry, NewGoal, NewProfile, Profile,
    UpdateEntry, UpdateGoal, UpdateProfile,
};
use crate::progress::GoalProjection;

/// Account-scoped facade over the repository. Every operation takes the
/// calling account's id; nothing below this layer is reachable without one,
/// so a forgotten ownership filter cannot widen visibility.
pub struct CaliperService {
    db: Database,
}

impl CaliperService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    // --- Accounts ---

    pub fn ensure_account(&self, username: &str) -> Result<Account> {
        self.db.ensure_account(username)
    }

    pub fn register_account(&self, username: &str, password_hash: &str) -> Result<Account> {
        models::validate_username(username)?;
        if self.db.get_account_by_username(username)?.is_some() {
            anyhow::bail!("Username taken");
        }
        self.db.create_account(username, Some(password_hash))
    }

    pub fn account_by_username(&self, username: &str) -> Result<Option<Account>> {
        self.db.get_account_by_username(username)
    }

    pub fn get_account(&self, id: i64) -> Result<Account> {
        self.db.get_account(id)
    }

    pub fn delete_account(&self, account_id: i64) -> Result<CascadeSummary> {
        self.db.delete_account_cascade(account_id)
    }

    // --- Profiles ---

    pub fn create_profile(&self, account_id: i64, profile: &NewProfile) -> Result<Profile> {
        models::validate_new_profile(profile)?;
        let mut profile = profile.clone();
        if let Some(ref sex) = profile.sex {
            profile.sex = Some(models::validate_sex(sex)?);
        }
        self.db.insert_profile(account_id, &profile)
    }

    pub fn get_profile(&self, account_id: i64, id: i64) -> Result<Profile> {
        self.db.get_profile(account_id, id)
    }

    pub fn find_profile_by_name(&self, account_id: i64, name: &str) -> Result<Option<Profile>> {
        self.db.find_profile_by_name(account_id, name)
    }

    pub fn list_profiles(&self, account_id: i64) -> Result<Vec<Profile>> {
        self.db.list_profiles(account_id)
    }

    pub fn update_profile(
        &self,
        account_id: i64,
        id: i64,
        update: &UpdateProfile,
    ) -> Result<Profile> {
        models::validate_update_profile(update)?;
        let mut update = update.clone();
        if let Some(Some(ref sex)) = update.sex {
            update.sex = Some(Some(models::validate_sex(sex)?));
        }
        self.db.update_profile(account_id, id, &update)
    }

    pub fn delete_profile(&self, account_id: i64, id: i64) -> Result<CascadeSummary> {
        self.db.delete_profile_cascade(account_id, id)
    }

    pub fn owned_profile_ids(&self, account_id: i64) -> Result<HashSet<i64>> {
        self.db.owned_profile_ids(account_id)
    }

    pub fn authorize_profile(&self, account_id: i64, profile_id: i64) -> Result<bool> {
        Ok(self.db.owned_profile_ids(account_id)?.contains(&profile_id))
    }

    // --- Entries ---

    pub fn log_entry(&self, account_id: i64, entry: &NewEntry) -> Result<Entry> {
        models::validate_measurements(entry.weight_kg, entry.neck_cm, entry.belly_cm, entry.hip_cm)?;
        self.db.insert_entry(account_id, entry)
    }

    pub fn get_entry(&self, account_id: i64, id: i64) -> Result<Entry> {
        self.db.get_entry(account_id, id)
    }

    pub fn list_entries(
        &self,
        account_id: i64,
        profile_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Entry>> {
        self.db.list_entries(account_id, profile_id, limit)
    }

    pub fn list_account_entries(&self, account_id: i64, limit: Option<i64>) -> Result<Vec<Entry>> {
        self.db.list_account_entries(account_id, limit)
    }

    pub fn latest_entry(&self, account_id: i64, profile_id: i64) -> Result<Option<Entry>> {
        self.db.latest_entry(account_id, profile_id)
    }

    pub fn update_entry(&self, account_id: i64, id: i64, update: &UpdateEntry) -> Result<Entry> {
        models::validate_update_entry(update)?;
        self.db.update_entry(account_id, id, update)
    }

    pub fn delete_entry(&self, account_id: i64, id: i64) -> Result<()> {
        self.db.delete_entry(account_id, id)
    }

    /// An entry with fat percentage and muscle mass derived from the owning
    /// profile's height and sex.
    pub fn entry_view(&self, account_id: i64, entry: &Entry) -> Result<EntryView> {
        let profile = self.db.get_profile(account_id, entry.profile_id)?;
        Ok(Self::view_with_profile(entry, &profile))
    }

    pub fn entry_views(&self, account_id: i64, entries: &[Entry]) -> Result<Vec<EntryView>> {
        let mut profiles: HashMap<i64, Profile> = HashMap::new();
        let mut views = Vec::with_capacity(entries.len());
        for entry in entries {
            if !profiles.contains_key(&entry.profile_id) {
                let profile = self.db.get_profile(account_id, entry.profile_id)?;
                profiles.insert(entry.profile_id, profile);
            }
            views.push(Self::view_with_profile(entry, &profiles[&entry.profile_id]));
        }
        Ok(views)
    }

    fn view_with_profile(entry: &Entry, profile: &Profile) -> EntryView {
        let fat_percentage = composition::estimate_fat_percentage(
            entry.weight_kg,
            entry.neck_cm,
            entry.belly_cm,
            profile.height_cm,
            profile.sex.as_deref(),
            entry.hip_cm,
        );
        let muscle_mass_kg = composition::estimate_muscle_mass(entry.weight_kg, fat_percentage);
        EntryView {
            entry: entry.clone(),
            fat_percentage,
            muscle_mass_kg,
        }
    }

    // --- Goals ---

    pub fn create_goal(&self, account_id: i64, goal: &NewGoal) -> Result<Goal> {
        models::validate_goal_targets(
            goal.target_weight_kg,
            goal.target_fat_percentage,
            goal.target_muscle_mass_kg,
        )?;
        self.db.insert_goal(account_id, goal)
    }

    pub fn get_goal(&self, account_id: i64, id: i64) -> Result<Goal> {
        self.db.get_goal(account_id, id)
    }

    pub fn list_goals(&self, account_id: i64, profile_id: i64) -> Result<Vec<Goal>> {
        self.db.list_goals(account_id, profile_id)
    }

    pub fn list_account_goals(&self, account_id: i64) -> Result<Vec<Goal>> {
        self.db.list_account_goals(account_id)
    }

    pub fn update_goal(&self, account_id: i64, id: i64, update: &UpdateGoal) -> Result<Goal> {
        models::validate_update_goal(update)?;
        self.db.update_goal(account_id, id, update)
    }

    pub fn delete_goal(&self, account_id: i64, id: i64) -> Result<()> {
        self.db.delete_goal(account_id, id)
    }

    // --- Progress ---

    pub fn profile_progress(
        &self,
        account_id: i64,
        profile_id: i64,
    ) -> Result<Vec<GoalProjection>> {
        self.db.profile_progress(account_id, profile_id)
    }

    pub fn latest_progress(&self, account_id: i64) -> Result<Vec<GoalProjection>> {
        self.db.latest_progress(account_id)
    }

    // --- Measurement import ---

    pub fn import_measurements_csv(
        &self,
        account_id: i64,
        profile_id: i64,
        csv_data: &str,
        dry_run: bool,
    ) -> Result<MeasurementImportSummary> {
        let rows = measurement_import::parse_measurement_csv(csv_data.as_bytes())?;
        measurement_import::import_measurements(&self.db, account_id, profile_id, &rows, dry_run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn setup() -> (CaliperService, i64, i64) {
        let svc = CaliperService::new_in_memory().unwrap();
        let account = svc.ensure_account("local").unwrap();
        let profile = svc
            .create_profile(
                account.id,
                &NewProfile {
                    name: "Alex".to_string(),
                    age: Some(34),
                    sex: Some("male".to_string()),
                    height_cm: Some(180.0),
                },
            )
            .unwrap();
        (svc, account.id, profile.id)
    }

    #[test]
    fn test_register_account_rejects_duplicate() {
        let svc = CaliperService::new_in_memory().unwrap();
        svc.register_account("alice", "hash-a").unwrap();

        let err = svc.register_account("alice", "hash-b").unwrap_err();
        assert_eq!(err.to_string(), "Username taken");
    }

    #[test]
    fn test_register_account_rejects_bad_username() {
        let svc = CaliperService::new_in_memory().unwrap();
        assert!(svc.register_account("", "hash").is_err());
        assert!(svc.register_account("has spaces", "hash").is_err());
    }

    #[test]
    fn test_create_profile_normalizes_sex() {
        let svc = CaliperService::new_in_memory().unwrap();
        let account = svc.ensure_account("local").unwrap();
        let profile = svc
            .create_profile(
                account.id,
                &NewProfile {
                    name: "Alex".to_string(),
                    age: None,
                    sex: Some("Male".to_string()),
                    height_cm: None,
                },
            )
            .unwrap();

        assert_eq!(profile.sex.as_deref(), Some("male"));
    }

    #[test]
    fn test_create_profile_rejects_empty_name() {
        let svc = CaliperService::new_in_memory().unwrap();
        let account = svc.ensure_account("local").unwrap();
        let err = svc
            .create_profile(
                account.id,
                &NewProfile {
                    name: "  ".to_string(),
                    age: None,
                    sex: None,
                    height_cm: None,
                },
            )
            .unwrap_err();

        assert_eq!(err.to_string(), "Profile name must not be empty");
    }

    #[test]
    fn test_log_entry_rejects_non_positive_weight() {
        let (svc, account_id, profile_id) = setup();
        let err = svc
            .log_entry(
                account_id,
                &NewEntry {
                    profile_id,
                    date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
                    weight_kg: 0.0,
                    neck_cm: None,
                    belly_cm: None,
                    hip_cm: None,
                },
            )
            .unwrap_err();

        assert_eq!(err.to_string(), "weight_kg must be greater than 0");
    }

    #[test]
    fn test_entry_view_derives_metrics_from_profile() {
        let (svc, account_id, profile_id) = setup();
        let entry = svc
            .log_entry(
                account_id,
                &NewEntry {
                    profile_id,
                    date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
                    weight_kg: 85.0,
                    neck_cm: Some(38.0),
                    belly_cm: Some(90.0),
                    hip_cm: None,
                },
            )
            .unwrap();

        let view = svc.entry_view(account_id, &entry).unwrap();
        let fat = view.fat_percentage.unwrap();
        assert!((fat - 19.9271).abs() < 0.01);
        let muscle = view.muscle_mass_kg.unwrap();
        assert!((muscle - 51.0620).abs() < 0.01);
    }

    #[test]
    fn test_entry_view_without_measurements_has_no_metrics() {
        let (svc, account_id, profile_id) = setup();
        let entry = svc
            .log_entry(
                account_id,
                &NewEntry {
                    profile_id,
                    date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
                    weight_kg: 85.0,
                    neck_cm: None,
                    belly_cm: None,
                    hip_cm: None,
                },
            )
            .unwrap();

        let view = svc.entry_view(account_id, &entry).unwrap();
        assert!(view.fat_percentage.is_none());
        assert!(view.muscle_mass_kg.is_none());
    }

    #[test]
    fn test_cross_account_isolation() {
        let svc = CaliperService::new_in_memory().unwrap();
        let alice = svc.ensure_account("alice").unwrap();
        let bob = svc.ensure_account("bob").unwrap();
        let profile = svc
            .create_profile(
                alice.id,
                &NewProfile {
                    name: "Alex".to_string(),
                    age: None,
                    sex: None,
                    height_cm: None,
                },
            )
            .unwrap();
        let entry = svc
            .log_entry(
                alice.id,
                &NewEntry {
                    profile_id: profile.id,
                    date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
                    weight_kg: 85.0,
                    neck_cm: None,
                    belly_cm: None,
                    hip_cm: None,
                },
            )
            .unwrap();
        let goal = svc
            .create_goal(
                alice.id,
                &NewGoal {
                    profile_id: profile.id,
                    target_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
                    start_date: None,
                    target_weight_kg: Some(80.0),
                    target_fat_percentage: None,
                    target_muscle_mass_kg: None,
                    description: None,
                },
            )
            .unwrap();

        // Bob sees the same errors as for rows that do not exist at all
        assert_eq!(
            svc.get_profile(bob.id, profile.id).unwrap_err().to_string(),
            "Profile not found"
        );
        assert_eq!(
            svc.get_entry(bob.id, entry.id).unwrap_err().to_string(),
            "Entry not found"
        );
        assert_eq!(
            svc.get_goal(bob.id, goal.id).unwrap_err().to_string(),
            "Goal not found"
        );
        assert!(!svc.authorize_profile(bob.id, profile.id).unwrap());
        assert!(svc.authorize_profile(alice.id, profile.id).unwrap());
    }

    #[test]
    fn test_goal_requires_at_least_one_target() {
        let (svc, account_id, profile_id) = setup();
        let err = svc
            .create_goal(
                account_id,
                &NewGoal {
                    profile_id,
                    target_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
                    start_date: None,
                    target_weight_kg: None,
                    target_fat_percentage: None,
                    target_muscle_mass_kg: None,
                    description: None,
                },
            )
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "At least one target (weight, fat percentage, or muscle mass) is required"
        );
    }

    #[test]
    fn test_delete_profile_cascades() {
        let (svc, account_id, profile_id) = setup();
        for day in [10, 11, 12] {
            svc.log_entry(
                account_id,
                &NewEntry {
                    profile_id,
                    date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
                    weight_kg: 85.0,
                    neck_cm: None,
                    belly_cm: None,
                    hip_cm: None,
                },
            )
            .unwrap();
        }
        for target in [80.0, 78.0] {
            svc.create_goal(
                account_id,
                &NewGoal {
                    profile_id,
                    target_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
                    start_date: None,
                    target_weight_kg: Some(target),
                    target_fat_percentage: None,
                    target_muscle_mass_kg: None,
                    description: None,
                },
            )
            .unwrap();
        }

        let summary = svc.delete_profile(account_id, profile_id).unwrap();
        assert_eq!(summary.profiles_deleted, 1);
        assert_eq!(summary.entries_deleted, 3);
        assert_eq!(summary.goals_deleted, 2);
        assert!(svc.get_profile(account_id, profile_id).is_err());
    }

    #[test]
    fn test_account_wide_progress_uses_latest_entry() {
        let (svc, account_id, profile_id) = setup();
        let today = chrono::Local::now().date_naive();
        svc.log_entry(
            account_id,
            &NewEntry {
                profile_id,
                date: today,
                weight_kg: 85.0,
                neck_cm: None,
                belly_cm: None,
                hip_cm: None,
            },
        )
        .unwrap();
        svc.create_goal(
            account_id,
            &NewGoal {
                profile_id,
                target_date: today + chrono::Duration::days(20),
                start_date: Some(today),
                target_weight_kg: Some(81.0),
                target_fat_percentage: None,
                target_muscle_mass_kg: None,
                description: None,
            },
        )
        .unwrap();

        let projections = svc.latest_progress(account_id).unwrap();
        assert_eq!(projections.len(), 1);
        assert_eq!(projections[0].days_remaining, 20);
        let daily = projections[0].weight_kg.daily_change_needed.unwrap();
        assert!((daily - (-0.2)).abs() < 1e-9);
    }

    #[test]
    fn test_import_measurements_csv_dedups_and_dry_runs() {
        let (svc, account_id, profile_id) = setup();
        let csv = "Date,Weight,Neck,Waist\n2024-06-15,85.0,38.0,90.0\n2024-06-16,84.8,38.0,89.5\n";

        let dry = svc
            .import_measurements_csv(account_id, profile_id, csv, true)
            .unwrap();
        assert_eq!(dry.entries_created, 2);
        assert!(svc
            .list_entries(account_id, profile_id, None)
            .unwrap()
            .is_empty());

        let summary = svc
            .import_measurements_csv(account_id, profile_id, csv, false)
            .unwrap();
        assert_eq!(summary.entries_created, 2);
        assert_eq!(summary.rows_skipped, 0);

        // Importing the same file again skips every row
        let again = svc
            .import_measurements_csv(account_id, profile_id, csv, false)
            .unwrap();
        assert_eq!(again.entries_created, 0);
        assert_eq!(again.rows_skipped, 2);

        let entries = svc.list_entries(account_id, profile_id, None).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].weight_kg, 84.8);
        assert_eq!(entries[0].neck_cm, Some(38.0));
    }
}
