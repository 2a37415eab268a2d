use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rusqlite::{Connection, params};

use crate::models::{
    Account, CascadeSummary, Entry, Goal, NewEntry, NewGoal, NewProfile, Profile, UpdateEntry,
    UpdateGoal, UpdateProfile,
};
use crate::progress::{self, GoalProjection};

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS accounts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    password_hash TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS profiles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    account_id INTEGER NOT NULL REFERENCES accounts(id),
                    name TEXT NOT NULL,
                    age INTEGER,
                    sex TEXT,
                    height_cm REAL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    profile_id INTEGER NOT NULL REFERENCES profiles(id),
                    account_id INTEGER NOT NULL REFERENCES accounts(id),
                    date TEXT NOT NULL,
                    weight_kg REAL NOT NULL,
                    neck_cm REAL,
                    belly_cm REAL,
                    hip_cm REAL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS goals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    profile_id INTEGER NOT NULL REFERENCES profiles(id),
                    account_id INTEGER NOT NULL REFERENCES accounts(id),
                    target_date TEXT NOT NULL,
                    target_weight_kg REAL,
                    target_fat_percentage REAL,
                    target_muscle_mass_kg REAL,
                    description TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_profiles_account ON profiles(account_id);
                CREATE INDEX IF NOT EXISTS idx_entries_profile_date ON entries(profile_id, date);
                CREATE INDEX IF NOT EXISTS idx_entries_account ON entries(account_id);
                CREATE INDEX IF NOT EXISTS idx_goals_profile_target ON goals(profile_id, target_date);
                CREATE INDEX IF NOT EXISTS idx_goals_account ON goals(account_id);

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            // Goals grew an optional explicit start date after initial release;
            // older rows fall back to created_at when projecting.
            self.conn.execute_batch(
                "ALTER TABLE goals ADD COLUMN start_date TEXT;

                 PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    // --- Accounts ---

    pub fn create_account(&self, username: &str, password_hash: Option<&str>) -> Result<Account> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO accounts (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![username, password_hash, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_account(id)
    }

    pub fn get_account(&self, id: i64) -> Result<Account> {
        self.conn
            .query_row(
                "SELECT id, username, password_hash, created_at FROM accounts WHERE id = ?1",
                params![id],
                Self::account_from_row,
            )
            .context("Account not found")
    }

    pub fn get_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, username, password_hash, created_at FROM accounts WHERE username = ?1",
        )?;
        let mut rows = stmt.query(params![username])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::account_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// Get-or-create, used for the implicit local CLI account. The created
    /// account has no password hash and cannot log in over HTTP.
    pub fn ensure_account(&self, username: &str) -> Result<Account> {
        if let Some(account) = self.get_account_by_username(username)? {
            return Ok(account);
        }
        self.create_account(username, None)
    }

    pub fn delete_account_cascade(&self, account_id: i64) -> Result<CascadeSummary> {
        self.get_account(account_id)?;

        let tx = self.conn.unchecked_transaction()?;
        let goals_deleted = tx.execute(
            "DELETE FROM goals WHERE account_id = ?1",
            params![account_id],
        )?;
        let entries_deleted = tx.execute(
            "DELETE FROM entries WHERE account_id = ?1",
            params![account_id],
        )?;
        let profiles_deleted = tx.execute(
            "DELETE FROM profiles WHERE account_id = ?1",
            params![account_id],
        )?;
        tx.execute("DELETE FROM accounts WHERE id = ?1", params![account_id])?;
        tx.commit()?;

        Ok(CascadeSummary {
            profiles_deleted,
            entries_deleted,
            goals_deleted,
        })
    }

    fn account_from_row(row: &rusqlite::Row) -> rusqlite::Result<Account> {
        Ok(Account {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    // --- Profiles ---

    pub fn insert_profile(&self, account_id: i64, profile: &NewProfile) -> Result<Profile> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO profiles (account_id, name, age, sex, height_cm, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                account_id,
                profile.name,
                profile.age,
                profile.sex,
                profile.height_cm,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_profile(account_id, id)
    }

    pub fn get_profile(&self, account_id: i64, id: i64) -> Result<Profile> {
        self.conn
            .query_row(
                "SELECT id, account_id, name, age, sex, height_cm, created_at
                 FROM profiles WHERE id = ?1 AND account_id = ?2",
                params![id, account_id],
                Self::profile_from_row,
            )
            .context("Profile not found")
    }

    pub fn find_profile_by_name(&self, account_id: i64, name: &str) -> Result<Option<Profile>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, name, age, sex, height_cm, created_at
             FROM profiles WHERE account_id = ?1 AND name = ?2",
        )?;
        let mut rows = stmt.query(params![account_id, name])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::profile_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn list_profiles(&self, account_id: i64) -> Result<Vec<Profile>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, name, age, sex, height_cm, created_at
             FROM profiles WHERE account_id = ?1 ORDER BY id",
        )?;
        let profiles = stmt
            .query_map(params![account_id], Self::profile_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    pub fn owned_profile_ids(&self, account_id: i64) -> Result<HashSet<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM profiles WHERE account_id = ?1")?;
        let ids = stmt
            .query_map(params![account_id], |row| row.get(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    pub fn update_profile(
        &self,
        account_id: i64,
        id: i64,
        update: &UpdateProfile,
    ) -> Result<Profile> {
        // Verify existence and ownership
        self.get_profile(account_id, id)?;

        if let Some(ref name) = update.name {
            self.conn.execute(
                "UPDATE profiles SET name = ?1 WHERE id = ?2 AND account_id = ?3",
                params![name, id, account_id],
            )?;
        }
        if let Some(age) = update.age {
            self.conn.execute(
                "UPDATE profiles SET age = ?1 WHERE id = ?2 AND account_id = ?3",
                params![age, id, account_id],
            )?;
        }
        if let Some(ref sex) = update.sex {
            self.conn.execute(
                "UPDATE profiles SET sex = ?1 WHERE id = ?2 AND account_id = ?3",
                params![sex, id, account_id],
            )?;
        }
        if let Some(height_cm) = update.height_cm {
            self.conn.execute(
                "UPDATE profiles SET height_cm = ?1 WHERE id = ?2 AND account_id = ?3",
                params![height_cm, id, account_id],
            )?;
        }

        self.get_profile(account_id, id)
    }

    pub fn delete_profile_cascade(&self, account_id: i64, id: i64) -> Result<CascadeSummary> {
        self.get_profile(account_id, id)?;

        let tx = self.conn.unchecked_transaction()?;
        let goals_deleted = tx.execute(
            "DELETE FROM goals WHERE profile_id = ?1 AND account_id = ?2",
            params![id, account_id],
        )?;
        let entries_deleted = tx.execute(
            "DELETE FROM entries WHERE profile_id = ?1 AND account_id = ?2",
            params![id, account_id],
        )?;
        tx.execute(
            "DELETE FROM profiles WHERE id = ?1 AND account_id = ?2",
            params![id, account_id],
        )?;
        tx.commit()?;

        Ok(CascadeSummary {
            profiles_deleted: 1,
            entries_deleted,
            goals_deleted,
        })
    }

    fn profile_from_row(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
        Ok(Profile {
            id: row.get(0)?,
            account_id: row.get(1)?,
            name: row.get(2)?,
            age: row.get(3)?,
            sex: row.get(4)?,
            height_cm: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    // --- Entries ---

    pub fn insert_entry(&self, account_id: i64, entry: &NewEntry) -> Result<Entry> {
        // Ownership check doubles as the existence check
        self.get_profile(account_id, entry.profile_id)?;

        let now = Local::now().to_rfc3339();
        let date_str = entry.date.format("%Y-%m-%d").to_string();
        self.conn.execute(
            "INSERT INTO entries (profile_id, account_id, date, weight_kg, neck_cm, belly_cm, hip_cm, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.profile_id,
                account_id,
                date_str,
                entry.weight_kg,
                entry.neck_cm,
                entry.belly_cm,
                entry.hip_cm,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_entry(account_id, id)
    }

    pub fn get_entry(&self, account_id: i64, id: i64) -> Result<Entry> {
        self.conn
            .query_row(
                "SELECT id, profile_id, account_id, date, weight_kg, neck_cm, belly_cm, hip_cm, created_at
                 FROM entries WHERE id = ?1 AND account_id = ?2",
                params![id, account_id],
                Self::entry_from_row,
            )
            .context("Entry not found")
    }

    pub fn list_entries(
        &self,
        account_id: i64,
        profile_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Entry>> {
        self.get_profile(account_id, profile_id)?;

        let query = match limit {
            Some(n) => format!(
                "SELECT id, profile_id, account_id, date, weight_kg, neck_cm, belly_cm, hip_cm, created_at
                 FROM entries WHERE profile_id = ?1 AND account_id = ?2
                 ORDER BY date DESC, id DESC LIMIT {n}"
            ),
            None => "SELECT id, profile_id, account_id, date, weight_kg, neck_cm, belly_cm, hip_cm, created_at
                     FROM entries WHERE profile_id = ?1 AND account_id = ?2
                     ORDER BY date DESC, id DESC"
                .to_string(),
        };
        let mut stmt = self.conn.prepare(&query)?;
        let entries = stmt
            .query_map(params![profile_id, account_id], Self::entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Entries across every profile the account owns, newest first.
    pub fn list_account_entries(&self, account_id: i64, limit: Option<i64>) -> Result<Vec<Entry>> {
        let query = match limit {
            Some(n) => format!(
                "SELECT id, profile_id, account_id, date, weight_kg, neck_cm, belly_cm, hip_cm, created_at
                 FROM entries WHERE account_id = ?1
                 ORDER BY date DESC, id DESC LIMIT {n}"
            ),
            None => "SELECT id, profile_id, account_id, date, weight_kg, neck_cm, belly_cm, hip_cm, created_at
                     FROM entries WHERE account_id = ?1
                     ORDER BY date DESC, id DESC"
                .to_string(),
        };
        let mut stmt = self.conn.prepare(&query)?;
        let entries = stmt
            .query_map(params![account_id], Self::entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn latest_entry(&self, account_id: i64, profile_id: i64) -> Result<Option<Entry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, profile_id, account_id, date, weight_kg, neck_cm, belly_cm, hip_cm, created_at
             FROM entries WHERE profile_id = ?1 AND account_id = ?2
             ORDER BY date DESC, id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![profile_id, account_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::entry_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn latest_entry_for_account(&self, account_id: i64) -> Result<Option<Entry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, profile_id, account_id, date, weight_kg, neck_cm, belly_cm, hip_cm, created_at
             FROM entries WHERE account_id = ?1
             ORDER BY date DESC, id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![account_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::entry_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn entry_for_date(
        &self,
        account_id: i64,
        profile_id: i64,
        date: NaiveDate,
    ) -> Result<Option<Entry>> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, profile_id, account_id, date, weight_kg, neck_cm, belly_cm, hip_cm, created_at
             FROM entries WHERE profile_id = ?1 AND account_id = ?2 AND date = ?3
             ORDER BY id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![profile_id, account_id, date_str])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::entry_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn update_entry(&self, account_id: i64, id: i64, update: &UpdateEntry) -> Result<Entry> {
        // Verify existence and ownership
        self.get_entry(account_id, id)?;

        if let Some(date) = update.date {
            let date_str = date.format("%Y-%m-%d").to_string();
            self.conn.execute(
                "UPDATE entries SET date = ?1 WHERE id = ?2 AND account_id = ?3",
                params![date_str, id, account_id],
            )?;
        }
        if let Some(weight_kg) = update.weight_kg {
            self.conn.execute(
                "UPDATE entries SET weight_kg = ?1 WHERE id = ?2 AND account_id = ?3",
                params![weight_kg, id, account_id],
            )?;
        }
        if let Some(neck_cm) = update.neck_cm {
            self.conn.execute(
                "UPDATE entries SET neck_cm = ?1 WHERE id = ?2 AND account_id = ?3",
                params![neck_cm, id, account_id],
            )?;
        }
        if let Some(belly_cm) = update.belly_cm {
            self.conn.execute(
                "UPDATE entries SET belly_cm = ?1 WHERE id = ?2 AND account_id = ?3",
                params![belly_cm, id, account_id],
            )?;
        }
        if let Some(hip_cm) = update.hip_cm {
            self.conn.execute(
                "UPDATE entries SET hip_cm = ?1 WHERE id = ?2 AND account_id = ?3",
                params![hip_cm, id, account_id],
            )?;
        }

        self.get_entry(account_id, id)
    }

    pub fn delete_entry(&self, account_id: i64, id: i64) -> Result<()> {
        let rows = self.conn.execute(
            "DELETE FROM entries WHERE id = ?1 AND account_id = ?2",
            params![id, account_id],
        )?;
        if rows == 0 {
            anyhow::bail!("Entry not found");
        }
        Ok(())
    }

    fn entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<Entry> {
        let date_str: String = row.get(3)?;
        let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date"));
        Ok(Entry {
            id: row.get(0)?,
            profile_id: row.get(1)?,
            account_id: row.get(2)?,
            date,
            weight_kg: row.get(4)?,
            neck_cm: row.get(5)?,
            belly_cm: row.get(6)?,
            hip_cm: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    // --- Goals ---

    pub fn insert_goal(&self, account_id: i64, goal: &NewGoal) -> Result<Goal> {
        self.get_profile(account_id, goal.profile_id)?;

        let now = Local::now().to_rfc3339();
        let target_str = goal.target_date.format("%Y-%m-%d").to_string();
        let start_str = goal.start_date.map(|d| d.format("%Y-%m-%d").to_string());
        self.conn.execute(
            "INSERT INTO goals (profile_id, account_id, target_date, start_date, target_weight_kg, target_fat_percentage, target_muscle_mass_kg, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                goal.profile_id,
                account_id,
                target_str,
                start_str,
                goal.target_weight_kg,
                goal.target_fat_percentage,
                goal.target_muscle_mass_kg,
                goal.description,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_goal(account_id, id)
    }

    pub fn get_goal(&self, account_id: i64, id: i64) -> Result<Goal> {
        self.conn
            .query_row(
                "SELECT id, profile_id, account_id, target_date, start_date, target_weight_kg,
                        target_fat_percentage, target_muscle_mass_kg, description, created_at
                 FROM goals WHERE id = ?1 AND account_id = ?2",
                params![id, account_id],
                Self::goal_from_row,
            )
            .context("Goal not found")
    }

    /// Goals in ascending target-date order, the order the projector expects.
    pub fn list_goals(&self, account_id: i64, profile_id: i64) -> Result<Vec<Goal>> {
        self.get_profile(account_id, profile_id)?;

        let mut stmt = self.conn.prepare(
            "SELECT id, profile_id, account_id, target_date, start_date, target_weight_kg,
                    target_fat_percentage, target_muscle_mass_kg, description, created_at
             FROM goals WHERE profile_id = ?1 AND account_id = ?2
             ORDER BY target_date, id",
        )?;
        let goals = stmt
            .query_map(params![profile_id, account_id], Self::goal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(goals)
    }

    /// Goals across every profile the account owns, in target-date order.
    pub fn list_account_goals(&self, account_id: i64) -> Result<Vec<Goal>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, profile_id, account_id, target_date, start_date, target_weight_kg,
                    target_fat_percentage, target_muscle_mass_kg, description, created_at
             FROM goals WHERE account_id = ?1
             ORDER BY target_date, id",
        )?;
        let goals = stmt
            .query_map(params![account_id], Self::goal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(goals)
    }

    pub fn update_goal(&self, account_id: i64, id: i64, update: &UpdateGoal) -> Result<Goal> {
        // Verify existence and ownership
        self.get_goal(account_id, id)?;

        if let Some(target_date) = update.target_date {
            let date_str = target_date.format("%Y-%m-%d").to_string();
            self.conn.execute(
                "UPDATE goals SET target_date = ?1 WHERE id = ?2 AND account_id = ?3",
                params![date_str, id, account_id],
            )?;
        }
        if let Some(start_date) = update.start_date {
            let start_str = start_date.map(|d| d.format("%Y-%m-%d").to_string());
            self.conn.execute(
                "UPDATE goals SET start_date = ?1 WHERE id = ?2 AND account_id = ?3",
                params![start_str, id, account_id],
            )?;
        }
        if let Some(target_weight_kg) = update.target_weight_kg {
            self.conn.execute(
                "UPDATE goals SET target_weight_kg = ?1 WHERE id = ?2 AND account_id = ?3",
                params![target_weight_kg, id, account_id],
            )?;
        }
        if let Some(target_fat_percentage) = update.target_fat_percentage {
            self.conn.execute(
                "UPDATE goals SET target_fat_percentage = ?1 WHERE id = ?2 AND account_id = ?3",
                params![target_fat_percentage, id, account_id],
            )?;
        }
        if let Some(target_muscle_mass_kg) = update.target_muscle_mass_kg {
            self.conn.execute(
                "UPDATE goals SET target_muscle_mass_kg = ?1 WHERE id = ?2 AND account_id = ?3",
                params![target_muscle_mass_kg, id, account_id],
            )?;
        }
        if let Some(ref description) = update.description {
            self.conn.execute(
                "UPDATE goals SET description = ?1 WHERE id = ?2 AND account_id = ?3",
                params![description, id, account_id],
            )?;
        }

        self.get_goal(account_id, id)
    }

    pub fn delete_goal(&self, account_id: i64, id: i64) -> Result<()> {
        let rows = self.conn.execute(
            "DELETE FROM goals WHERE id = ?1 AND account_id = ?2",
            params![id, account_id],
        )?;
        if rows == 0 {
            anyhow::bail!("Goal not found");
        }
        Ok(())
    }

    fn goal_from_row(row: &rusqlite::Row) -> rusqlite::Result<Goal> {
        let target_str: String = row.get(3)?;
        let target_date = NaiveDate::parse_from_str(&target_str, "%Y-%m-%d")
            .unwrap_or_else(|_| NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date"));
        let start_str: Option<String> = row.get(4)?;
        let start_date = start_str.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());
        Ok(Goal {
            id: row.get(0)?,
            profile_id: row.get(1)?,
            account_id: row.get(2)?,
            target_date,
            start_date,
            target_weight_kg: row.get(5)?,
            target_fat_percentage: row.get(6)?,
            target_muscle_mass_kg: row.get(7)?,
            description: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    // --- Progress ---

    /// Projections for one profile's goals against its latest entry. Missing
    /// entry or goals produce an empty result, not an error.
    pub fn profile_progress(&self, account_id: i64, profile_id: i64) -> Result<Vec<GoalProjection>> {
        let profile = self.get_profile(account_id, profile_id)?;

        let Some(entry) = self.latest_entry(account_id, profile_id)? else {
            return Ok(Vec::new());
        };
        let goals = self.list_goals(account_id, profile_id)?;
        Ok(progress::project(&entry, &goals, Some(&profile)))
    }

    /// Account-wide projection: the most recent entry across all owned
    /// profiles, measured against that profile's goals.
    pub fn latest_progress(&self, account_id: i64) -> Result<Vec<GoalProjection>> {
        let Some(entry) = self.latest_entry_for_account(account_id)? else {
            anyhow::bail!("Need at least one entry and one goal to calculate progress");
        };
        let goals = self.list_goals(account_id, entry.profile_id)?;
        if goals.is_empty() {
            anyhow::bail!("Need at least one entry and one goal to calculate progress");
        }
        let profile = self.get_profile(account_id, entry.profile_id)?;
        Ok(progress::project(&entry, &goals, Some(&profile)))
    }
}
