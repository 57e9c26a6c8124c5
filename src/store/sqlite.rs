use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params, params_from_iter};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

// Fixed width, so text comparison in SQL orders chronologically.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn now() -> String {
    format_datetime(&Utc::now())
}

fn opt_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row.get::<_, Option<String>>(idx)?.map(|s| parse_datetime(&s)))
}

/// Maps UNIQUE and PRIMARY KEY violations to `AlreadyExists`.
fn map_unique(e: rusqlite::Error) -> Error {
    match e {
        rusqlite::Error::SqliteFailure(err, msg)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
                && (err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) =>
        {
            Error::AlreadyExists(msg.unwrap_or_else(|| "record".to_string()))
        }
        e => Error::from(e),
    }
}

macro_rules! text_enum_sql {
    ($ty:ty, $what:literal) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(self.as_str().into())
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                <$ty>::parse(s)
                    .ok_or_else(|| FromSqlError::Other(format!("unknown {}: {}", $what, s).into()))
            }
        }
    };
}

text_enum_sql!(Category, "category");
text_enum_sql!(Role, "role");
text_enum_sql!(ChallengeType, "challenge type");

/// SET clause builder for partial updates.
#[derive(Default)]
struct Assignments {
    columns: Vec<&'static str>,
    values: Vec<Box<dyn ToSql>>,
}

impl Assignments {
    fn set<T: ToSql + 'static>(&mut self, column: &'static str, value: Option<T>) {
        if let Some(value) = value {
            self.columns.push(column);
            self.values.push(Box::new(value));
        }
    }

    fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Executes `UPDATE table SET ... WHERE id = ?` and returns affected rows.
    fn execute(mut self, conn: &Connection, table: &str, id: i64) -> rusqlite::Result<usize> {
        let sets = self
            .columns
            .iter()
            .map(|c| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", ");
        self.values.push(Box::new(id));
        let sql = format!("UPDATE {} SET {} WHERE id = ?", table, sets);
        conn.execute(&sql, params_from_iter(self.values.iter()))
    }
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, is_active, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        is_active: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

const PROFILE_COLUMNS: &str = "p.id, p.user_id, p.country, p.household_size, p.profile_picture,
     p.baseline_calculated, p.baseline_co2e, p.updated_at";

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        user_id: row.get(1)?,
        country: row.get(2)?,
        household_size: row.get(3)?,
        profile_picture: row.get(4)?,
        baseline_calculated: row.get(5)?,
        baseline_co2e: row.get(6)?,
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

const SESSION_COLUMNS: &str =
    "id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        user_id: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        expires_at: opt_datetime(row, 5)?,
        last_used_at: opt_datetime(row, 6)?,
    })
}

const SCENARIO_COLUMNS: &str =
    "s.id, s.user_id, s.name, s.description, s.total_co2e, s.is_active, s.created_at, s.updated_at";

fn scenario_from_row(row: &Row<'_>) -> rusqlite::Result<Scenario> {
    Ok(Scenario {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        total_co2e: row.get(4)?,
        is_active: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

const ACTIVITY_COLUMNS: &str =
    "id, scenario_id, category, activity_type, value, unit, co2e_amount, api_source, created_at";

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    Ok(Activity {
        id: row.get(0)?,
        scenario_id: row.get(1)?,
        category: row.get(2)?,
        activity_type: row.get(3)?,
        value: row.get(4)?,
        unit: row.get(5)?,
        co2e_amount: row.get(6)?,
        api_source: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

const FACTOR_COLUMNS: &str =
    "id, category, activity_type, region, co2e_per_unit, unit, source, last_updated";

fn factor_from_row(row: &Row<'_>) -> rusqlite::Result<EmissionFactor> {
    Ok(EmissionFactor {
        id: row.get(0)?,
        category: row.get(1)?,
        activity_type: row.get(2)?,
        region: row.get(3)?,
        co2e_per_unit: row.get(4)?,
        unit: row.get(5)?,
        source: row.get(6)?,
        last_updated: parse_datetime(&row.get::<_, String>(7)?),
    })
}

const TIP_COLUMNS: &str = "t.id, t.user_id, t.content, t.tip_type, t.likes_count, t.created_at";

fn tip_from_row(row: &Row<'_>) -> rusqlite::Result<Tip> {
    Ok(Tip {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        tip_type: row.get(3)?,
        likes_count: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

const CHALLENGE_COLUMNS: &str = "id, name, description, challenge_type, target_value, target_unit,
     duration_days, badge_name, is_active, created_at";

fn challenge_from_row(row: &Row<'_>) -> rusqlite::Result<Challenge> {
    Ok(Challenge {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        challenge_type: row.get(3)?,
        target_value: row.get(4)?,
        target_unit: row.get(5)?,
        duration_days: row.get(6)?,
        badge_name: row.get(7)?,
        is_active: row.get(8)?,
        created_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

fn user_challenge_from_row(row: &Row<'_>) -> rusqlite::Result<UserChallenge> {
    Ok(UserChallenge {
        user_id: row.get(0)?,
        challenge_id: row.get(1)?,
        joined_at: parse_datetime(&row.get::<_, String>(2)?),
        completed: row.get(3)?,
        completed_at: opt_datetime(row, 4)?,
    })
}

/// Per-user totals over active scenarios. Wrapped by the leaderboard and feed queries.
const AGGREGATE_SELECT: &str = "
    SELECT u.id AS user_id, u.username, p.profile_picture,
        (SELECT COUNT(*) FROM scenarios s
          WHERE s.user_id = u.id AND s.is_active = 1) AS scenario_count,
        (SELECT COUNT(*) FROM scenario_activities sa JOIN scenarios s ON s.id = sa.scenario_id
          WHERE s.user_id = u.id AND s.is_active = 1) AS activity_count,
        (SELECT COALESCE(SUM(s.total_co2e), 0.0) FROM scenarios s
          WHERE s.user_id = u.id AND s.is_active = 1) AS total_emissions,
        (SELECT COALESCE(AVG(s.total_co2e), 0.0) FROM scenarios s
          WHERE s.user_id = u.id AND s.is_active = 1) AS avg_emissions,
        (SELECT MAX(COALESCE(sa.created_at, s.updated_at, s.created_at))
           FROM scenarios s LEFT JOIN scenario_activities sa ON sa.scenario_id = s.id
          WHERE s.user_id = u.id AND s.is_active = 1) AS last_update
    FROM users u
    LEFT JOIN user_profiles p ON p.user_id = u.id
    WHERE u.is_active = 1";

fn aggregate_from_row(row: &Row<'_>) -> rusqlite::Result<UserAggregate> {
    Ok(UserAggregate {
        user_id: row.get(0)?,
        username: row.get(1)?,
        profile_picture: row.get(2)?,
        scenario_count: row.get(3)?,
        activity_count: row.get(4)?,
        total_emissions: row.get(5)?,
        avg_emissions: row.get(6)?,
        last_update: opt_datetime(row, 7)?,
    })
}

/// Recomputes `scenarios.total_co2e` from its activities and returns the new total.
fn recompute_total(conn: &Connection, scenario_id: i64) -> rusqlite::Result<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(co2e_amount), 0.0) FROM scenario_activities WHERE scenario_id = ?1",
        params![scenario_id],
        |row| row.get(0),
    )?;
    conn.execute(
        "UPDATE scenarios SET total_co2e = ?1, updated_at = ?2 WHERE id = ?3",
        params![total, now(), scenario_id],
    )?;
    Ok(total)
}

fn query_activity(conn: &Connection, id: i64) -> rusqlite::Result<Option<Activity>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM scenario_activities WHERE id = ?1",
            ACTIVITY_COLUMNS
        ),
        params![id],
        activity_from_row,
    )
    .optional()
}

fn collect<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> Result<Vec<T>> {
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &NewUser) -> Result<User> {
        let id = {
            let conn = self.conn();
            let ts = now();
            conn.execute(
                "INSERT INTO users (username, email, password_hash, role, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    user.username,
                    user.email,
                    user.password_hash,
                    user.role,
                    user.is_active,
                    ts,
                ],
            )
            .map_err(map_unique)?;
            conn.last_insert_rowid()
        };
        self.get_user(id)?.ok_or(Error::NotFound)
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                params![email],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                params![username],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_users(&self, limit: i64) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC, id DESC LIMIT ?1",
            USER_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit], user_from_row)?;
        collect(rows)
    }

    fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User> {
        let mut sets = Assignments::default();
        sets.set("username", update.username.clone());
        sets.set("email", update.email.clone());
        sets.set("password_hash", update.password_hash.clone());
        sets.set("role", update.role);
        sets.set("is_active", update.is_active);
        if sets.is_empty() {
            return Err(Error::Validation("No fields to update".to_string()));
        }
        sets.set("updated_at", Some(now()));

        let rows = sets
            .execute(&self.conn(), "users", id)
            .map_err(map_unique)?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        self.get_user(id)?.ok_or(Error::NotFound)
    }

    fn has_admin_user(&self) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM users WHERE role = 'admin'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Profile operations

    fn create_profile(&self, profile: &NewProfile) -> Result<Profile> {
        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO user_profiles (user_id, country, household_size, baseline_calculated, baseline_co2e, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    profile.user_id,
                    profile.country,
                    profile.household_size,
                    profile.baseline_calculated,
                    profile.baseline_co2e,
                    now(),
                ],
            )
            .map_err(map_unique)?;
            conn.last_insert_rowid()
        };
        self.get_profile(id)?.ok_or(Error::NotFound)
    }

    fn get_profile(&self, id: i64) -> Result<Option<Profile>> {
        self.conn()
            .query_row(
                &format!("SELECT {} FROM user_profiles p WHERE p.id = ?1", PROFILE_COLUMNS),
                params![id],
                profile_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_profile_by_user(&self, user_id: i64) -> Result<Option<Profile>> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {} FROM user_profiles p WHERE p.user_id = ?1",
                    PROFILE_COLUMNS
                ),
                params![user_id],
                profile_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_profiles(&self, limit: i64) -> Result<Vec<ProfileWithUsername>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, u.username FROM user_profiles p
             JOIN users u ON u.id = p.user_id
             ORDER BY p.updated_at DESC, p.id DESC LIMIT ?1",
            PROFILE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(ProfileWithUsername {
                profile: profile_from_row(row)?,
                username: row.get(8)?,
            })
        })?;
        collect(rows)
    }

    fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<Profile> {
        let mut sets = Assignments::default();
        sets.set("country", update.country.clone());
        sets.set("household_size", update.household_size);
        sets.set("baseline_calculated", update.baseline_calculated);
        sets.set("baseline_co2e", update.baseline_co2e);
        if sets.is_empty() {
            return Err(Error::Validation("No fields to update".to_string()));
        }
        sets.set("updated_at", Some(now()));

        let rows = sets.execute(&self.conn(), "user_profiles", id)?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        self.get_profile(id)?.ok_or(Error::NotFound)
    }

    // Session operations

    fn create_session(&self, session: &Session) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO sessions (id, token_hash, token_lookup, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.id,
                session.token_hash,
                session.token_lookup,
                session.user_id,
                format_datetime(&session.created_at),
                session.expires_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::TokenLookupCollision)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {} FROM sessions WHERE token_lookup = ?1",
                    SESSION_COLUMNS
                ),
                params![lookup],
                session_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn delete_expired_sessions(&self) -> Result<usize> {
        let rows = self.conn().execute(
            "DELETE FROM sessions WHERE expires_at IS NOT NULL AND expires_at < ?1",
            params![now()],
        )?;
        Ok(rows)
    }

    fn update_session_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE sessions SET last_used_at = ?1 WHERE id = ?2",
            params![now(), id],
        )?;
        Ok(())
    }

    // Scenario operations

    fn create_scenario(&self, user_id: i64, name: &str, description: &str) -> Result<Scenario> {
        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO scenarios (user_id, name, description, total_co2e, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0.0, 1, ?4, ?4)",
                params![user_id, name, description, now()],
            )?;
            conn.last_insert_rowid()
        };
        self.get_scenario(id)?.ok_or(Error::NotFound)
    }

    fn get_scenario(&self, id: i64) -> Result<Option<Scenario>> {
        self.conn()
            .query_row(
                &format!("SELECT {} FROM scenarios s WHERE s.id = ?1", SCENARIO_COLUMNS),
                params![id],
                scenario_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_scenarios(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Scenario>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM scenarios s
             WHERE s.user_id = ?1 AND s.is_active = 1
             ORDER BY s.updated_at DESC, s.id DESC LIMIT ?2 OFFSET ?3",
            SCENARIO_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id, limit, offset], scenario_from_row)?;
        collect(rows)
    }

    fn count_active_scenarios(&self, user_id: i64) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM scenarios WHERE user_id = ?1 AND is_active = 1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn deactivate_scenario(&self, id: i64) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE scenarios SET is_active = 0, updated_at = ?1 WHERE id = ?2 AND is_active = 1",
            params![now(), id],
        )?;
        Ok(rows > 0)
    }

    fn list_active_scenarios_with_owner(&self, limit: i64) -> Result<Vec<ScenarioWithOwner>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, u.username FROM scenarios s
             JOIN users u ON u.id = s.user_id
             WHERE s.is_active = 1
             ORDER BY s.created_at DESC, s.id DESC LIMIT ?1",
            SCENARIO_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(ScenarioWithOwner {
                scenario: scenario_from_row(row)?,
                username: row.get(8)?,
            })
        })?;
        collect(rows)
    }

    // Activity operations

    fn get_activity(&self, id: i64) -> Result<Option<Activity>> {
        query_activity(&self.conn(), id).map_err(Error::from)
    }

    fn list_activities(&self, scenario_id: i64) -> Result<Vec<Activity>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM scenario_activities WHERE scenario_id = ?1 ORDER BY created_at, id",
            ACTIVITY_COLUMNS
        ))?;
        let rows = stmt.query_map(params![scenario_id], activity_from_row)?;
        collect(rows)
    }

    fn insert_activity(&self, activity: &NewActivity) -> Result<(Activity, f64)> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO scenario_activities
                (scenario_id, category, activity_type, value, unit, co2e_amount, api_source, created_at)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
             WHERE EXISTS (SELECT 1 FROM scenarios WHERE id = ?1 AND is_active = 1)",
            params![
                activity.scenario_id,
                activity.category,
                activity.activity_type,
                activity.value,
                activity.unit,
                activity.co2e_amount,
                activity.api_source,
                now(),
            ],
        )?;
        if inserted == 0 {
            return Err(Error::NotFound);
        }
        let id = tx.last_insert_rowid();
        let total = recompute_total(&tx, activity.scenario_id)?;
        let saved = query_activity(&tx, id)?.ok_or(Error::NotFound)?;

        tx.commit()?;
        Ok((saved, total))
    }

    fn update_activity(
        &self,
        id: i64,
        value: f64,
        unit: &str,
        co2e_amount: f64,
        api_source: &str,
    ) -> Result<(Activity, f64)> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let existing = query_activity(&tx, id)?.ok_or(Error::NotFound)?;
        tx.execute(
            "UPDATE scenario_activities SET value = ?1, unit = ?2, co2e_amount = ?3, api_source = ?4
             WHERE id = ?5",
            params![value, unit, co2e_amount, api_source, id],
        )?;
        let total = recompute_total(&tx, existing.scenario_id)?;
        let saved = query_activity(&tx, id)?.ok_or(Error::NotFound)?;

        tx.commit()?;
        Ok((saved, total))
    }

    fn delete_activity(&self, id: i64) -> Result<f64> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let existing = query_activity(&tx, id)?.ok_or(Error::NotFound)?;
        tx.execute(
            "DELETE FROM scenario_activities WHERE id = ?1",
            params![id],
        )?;
        let total = recompute_total(&tx, existing.scenario_id)?;

        tx.commit()?;
        Ok(total)
    }

    fn count_user_activities(&self, user_id: i64) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM scenario_activities sa
             JOIN scenarios s ON s.id = sa.scenario_id
             WHERE s.user_id = ?1 AND s.is_active = 1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn list_activity_points(
        &self,
        user_id: Option<i64>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ActivityPoint>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT s.user_id, sa.scenario_id, sa.category, sa.activity_type, sa.co2e_amount, sa.created_at
             FROM scenario_activities sa
             JOIN scenarios s ON s.id = sa.scenario_id
             WHERE s.is_active = 1
               AND (?1 IS NULL OR s.user_id = ?1)
               AND (?2 IS NULL OR sa.created_at >= ?2)
             ORDER BY sa.created_at, sa.id",
        )?;
        let rows = stmt.query_map(
            params![user_id, since.as_ref().map(format_datetime)],
            |row| {
                Ok(ActivityPoint {
                    user_id: row.get(0)?,
                    scenario_id: row.get(1)?,
                    category: row.get(2)?,
                    activity_type: row.get(3)?,
                    co2e_amount: row.get(4)?,
                    created_at: parse_datetime(&row.get::<_, String>(5)?),
                })
            },
        )?;
        collect(rows)
    }

    fn community_average_since(&self, since: DateTime<Utc>) -> Result<f64> {
        let avg = self.conn().query_row(
            "SELECT COALESCE(AVG(user_total), 0) FROM (
                SELECT s.user_id, COALESCE(SUM(sa.co2e_amount), 0) AS user_total
                FROM scenarios s
                LEFT JOIN scenario_activities sa
                  ON sa.scenario_id = s.id AND sa.created_at >= ?1
                WHERE s.is_active = 1
                GROUP BY s.user_id
             )",
            params![format_datetime(&since)],
            |row| row.get(0),
        )?;
        Ok(avg)
    }

    // Emission factor operations

    fn find_emission_factors(
        &self,
        category: Category,
        activity_type: &str,
        region: &str,
    ) -> Result<Vec<EmissionFactor>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM emission_factors
             WHERE category = ?1 AND activity_type = ?2 AND region IN (?3, 'global')
             ORDER BY CASE WHEN region = ?3 THEN 0 ELSE 1 END, id",
            FACTOR_COLUMNS
        ))?;
        let rows = stmt.query_map(params![category, activity_type, region], factor_from_row)?;
        collect(rows)
    }

    fn has_emission_factor(&self, category: Category, activity_type: &str) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM emission_factors WHERE category = ?1 AND activity_type = ?2",
            params![category, activity_type],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn get_emission_factor(&self, id: i64) -> Result<Option<EmissionFactor>> {
        self.conn()
            .query_row(
                &format!("SELECT {} FROM emission_factors WHERE id = ?1", FACTOR_COLUMNS),
                params![id],
                factor_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_emission_factors(&self, limit: i64) -> Result<Vec<EmissionFactor>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM emission_factors
             ORDER BY category, activity_type, region LIMIT ?1",
            FACTOR_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit], factor_from_row)?;
        collect(rows)
    }

    fn search_emission_factors(
        &self,
        query: &str,
        category: Option<Category>,
        limit: i64,
    ) -> Result<Vec<EmissionFactor>> {
        let pattern = format!("%{}%", query);
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM emission_factors
             WHERE (activity_type LIKE ?1 OR unit LIKE ?1 OR COALESCE(source, '') LIKE ?1)
               AND (?2 IS NULL OR category = ?2)
             ORDER BY category, activity_type, region LIMIT ?3",
            FACTOR_COLUMNS
        ))?;
        let rows = stmt.query_map(params![pattern, category, limit], factor_from_row)?;
        collect(rows)
    }

    fn create_emission_factor(&self, factor: &NewEmissionFactor) -> Result<EmissionFactor> {
        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO emission_factors (category, activity_type, region, co2e_per_unit, unit, source, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    factor.category,
                    factor.activity_type,
                    factor.region,
                    factor.co2e_per_unit,
                    factor.unit,
                    factor.source,
                    now(),
                ],
            )
            .map_err(map_unique)?;
            conn.last_insert_rowid()
        };
        self.get_emission_factor(id)?.ok_or(Error::NotFound)
    }

    fn update_emission_factor(
        &self,
        id: i64,
        update: &EmissionFactorUpdate,
    ) -> Result<EmissionFactor> {
        let mut sets = Assignments::default();
        sets.set("category", update.category);
        sets.set("activity_type", update.activity_type.clone());
        sets.set("region", update.region.clone());
        sets.set("co2e_per_unit", update.co2e_per_unit);
        sets.set("unit", update.unit.clone());
        sets.set("source", update.source.clone());
        if sets.is_empty() {
            return Err(Error::Validation("No fields to update".to_string()));
        }
        sets.set("last_updated", Some(now()));

        let rows = sets
            .execute(&self.conn(), "emission_factors", id)
            .map_err(map_unique)?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        self.get_emission_factor(id)?.ok_or(Error::NotFound)
    }

    // XP operations

    fn add_xp(&self, user_id: i64, amount: i64) -> Result<XpRecord> {
        self.conn().execute(
            "INSERT INTO user_xp (user_id, xp_total, last_updated) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE
             SET xp_total = xp_total + excluded.xp_total, last_updated = excluded.last_updated",
            params![user_id, amount, now()],
        )?;
        self.get_xp(user_id)
    }

    fn get_xp(&self, user_id: i64) -> Result<XpRecord> {
        let record = self
            .conn()
            .query_row(
                "SELECT user_id, xp_total, last_updated FROM user_xp WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(XpRecord {
                        user_id: row.get(0)?,
                        xp_total: row.get(1)?,
                        last_updated: opt_datetime(row, 2)?,
                    })
                },
            )
            .optional()?;
        Ok(record.unwrap_or(XpRecord {
            user_id,
            xp_total: 0,
            last_updated: None,
        }))
    }

    // Aggregates

    fn leaderboard(&self, kind: LeaderboardKind, limit: i64) -> Result<Vec<UserAggregate>> {
        let filter = match kind {
            LeaderboardKind::Scenarios => {
                "WHERE scenario_count > 0 ORDER BY scenario_count DESC, total_emissions ASC"
            }
            LeaderboardKind::Reduction => {
                "WHERE scenario_count > 0 ORDER BY avg_emissions ASC, scenario_count DESC"
            }
            LeaderboardKind::Activities => {
                "WHERE activity_count > 0 ORDER BY activity_count DESC, scenario_count DESC"
            }
        };
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM ({}) {}, user_id LIMIT ?1",
            AGGREGATE_SELECT, filter
        ))?;
        let rows = stmt.query_map(params![limit], aggregate_from_row)?;
        collect(rows)
    }

    fn milestone_aggregates(&self, limit: i64) -> Result<Vec<UserAggregate>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM ({}) ORDER BY last_update DESC, user_id LIMIT ?1",
            AGGREGATE_SELECT
        ))?;
        let rows = stmt.query_map(params![limit], aggregate_from_row)?;
        collect(rows)
    }

    // Milestone likes

    fn toggle_milestone_like(&self, user_id: i64, milestone_user_id: i64) -> Result<(bool, i64)> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let removed = tx.execute(
            "DELETE FROM social_likes WHERE user_id = ?1 AND milestone_user_id = ?2",
            params![user_id, milestone_user_id],
        )?;
        if removed == 0 {
            tx.execute(
                "INSERT INTO social_likes (user_id, milestone_user_id, created_at) VALUES (?1, ?2, ?3)",
                params![user_id, milestone_user_id, now()],
            )?;
        }
        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM social_likes WHERE milestone_user_id = ?1",
            params![milestone_user_id],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok((removed == 0, count))
    }

    fn list_liked_milestones(&self, user_id: i64) -> Result<Vec<i64>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT milestone_user_id FROM social_likes WHERE user_id = ?1 ORDER BY milestone_user_id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
        collect(rows)
    }

    fn milestone_like_counts(&self) -> Result<Vec<(i64, i64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT milestone_user_id, COUNT(*) FROM social_likes
             GROUP BY milestone_user_id ORDER BY milestone_user_id",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        collect(rows)
    }

    // Tip operations

    fn create_tip(&self, user_id: i64, content: &str, tip_type: &str) -> Result<Tip> {
        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO social_tips (user_id, content, tip_type, likes_count, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![user_id, content, tip_type, now()],
            )?;
            conn.last_insert_rowid()
        };
        self.get_tip(id)?.ok_or(Error::NotFound)
    }

    fn get_tip(&self, id: i64) -> Result<Option<Tip>> {
        self.conn()
            .query_row(
                &format!("SELECT {} FROM social_tips t WHERE t.id = ?1", TIP_COLUMNS),
                params![id],
                tip_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_tips(&self, limit: i64) -> Result<Vec<TipWithAuthor>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, u.username, p.profile_picture FROM social_tips t
             JOIN users u ON u.id = t.user_id
             LEFT JOIN user_profiles p ON p.user_id = t.user_id
             ORDER BY t.created_at DESC, t.id DESC LIMIT ?1",
            TIP_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(TipWithAuthor {
                tip: tip_from_row(row)?,
                username: row.get(6)?,
                profile_picture: row.get(7)?,
            })
        })?;
        collect(rows)
    }

    fn list_liked_tips(&self, user_id: i64) -> Result<Vec<i64>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT tip_id FROM social_tip_likes WHERE user_id = ?1 ORDER BY tip_id")?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
        collect(rows)
    }

    fn toggle_tip_like(&self, user_id: i64, tip_id: i64) -> Result<(bool, i64)> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let removed = tx.execute(
            "DELETE FROM social_tip_likes WHERE user_id = ?1 AND tip_id = ?2",
            params![user_id, tip_id],
        )?;
        if removed > 0 {
            tx.execute(
                "UPDATE social_tips SET likes_count = MAX(likes_count - 1, 0) WHERE id = ?1",
                params![tip_id],
            )?;
        } else {
            tx.execute(
                "INSERT INTO social_tip_likes (user_id, tip_id, created_at) VALUES (?1, ?2, ?3)",
                params![user_id, tip_id, now()],
            )?;
            tx.execute(
                "UPDATE social_tips SET likes_count = likes_count + 1 WHERE id = ?1",
                params![tip_id],
            )?;
        }
        let count: i64 = tx.query_row(
            "SELECT likes_count FROM social_tips WHERE id = ?1",
            params![tip_id],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok((removed == 0, count))
    }

    // Challenge operations

    fn create_challenge(&self, challenge: &NewChallenge) -> Result<Challenge> {
        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO challenges
                    (name, description, challenge_type, target_value, target_unit, duration_days, badge_name, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    challenge.name,
                    challenge.description,
                    challenge.challenge_type,
                    challenge.target_value,
                    challenge.target_unit,
                    challenge.duration_days,
                    challenge.badge_name,
                    challenge.is_active,
                    now(),
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_challenge(id)?.ok_or(Error::NotFound)
    }

    fn get_challenge(&self, id: i64) -> Result<Option<Challenge>> {
        self.conn()
            .query_row(
                &format!("SELECT {} FROM challenges WHERE id = ?1", CHALLENGE_COLUMNS),
                params![id],
                challenge_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_challenges(&self, active_only: bool) -> Result<Vec<Challenge>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM challenges WHERE (?1 = 0 OR is_active = 1)
             ORDER BY created_at DESC, id DESC",
            CHALLENGE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![active_only], challenge_from_row)?;
        collect(rows)
    }

    fn update_challenge(&self, id: i64, update: &ChallengeUpdate) -> Result<Challenge> {
        let mut sets = Assignments::default();
        sets.set("name", update.name.clone());
        sets.set("description", update.description.clone());
        sets.set("challenge_type", update.challenge_type);
        sets.set("target_value", update.target_value);
        sets.set("target_unit", update.target_unit.clone());
        sets.set("duration_days", update.duration_days);
        sets.set("badge_name", update.badge_name.clone());
        sets.set("is_active", update.is_active);
        if sets.is_empty() {
            return Err(Error::Validation("No fields to update".to_string()));
        }

        let rows = sets.execute(&self.conn(), "challenges", id)?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        self.get_challenge(id)?.ok_or(Error::NotFound)
    }

    fn delete_challenge(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM challenges WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn count_challenge_participants(&self, challenge_id: i64) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM user_challenges WHERE challenge_id = ?1",
            params![challenge_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn join_challenge(&self, user_id: i64, challenge_id: i64) -> Result<UserChallenge> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO user_challenges (user_id, challenge_id, joined_at, completed)
             VALUES (?1, ?2, ?3, 0)",
            params![user_id, challenge_id, now()],
        )
        .map_err(map_unique)?;
        conn.query_row(
            "SELECT user_id, challenge_id, joined_at, completed, completed_at
             FROM user_challenges WHERE user_id = ?1 AND challenge_id = ?2",
            params![user_id, challenge_id],
            user_challenge_from_row,
        )
        .map_err(Error::from)
    }

    fn list_user_challenges(&self, user_id: i64) -> Result<Vec<UserChallenge>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT user_id, challenge_id, joined_at, completed, completed_at
             FROM user_challenges WHERE user_id = ?1 ORDER BY joined_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], user_challenge_from_row)?;
        collect(rows)
    }

    fn complete_challenge(
        &self,
        user_id: i64,
        challenge_id: i64,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE user_challenges SET completed = 1, completed_at = ?1
             WHERE user_id = ?2 AND challenge_id = ?3 AND completed = 0",
            params![format_datetime(&at), user_id, challenge_id],
        )?;
        Ok(rows > 0)
    }

    fn count_completed_challenges(&self, user_id: i64) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM user_challenges WHERE user_id = ?1 AND completed = 1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    fn new_user(store: &SqliteStore, username: &str) -> User {
        store
            .create_user(&NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: "hash".to_string(),
                role: Role::User,
                is_active: true,
            })
            .unwrap()
    }

    fn activity(scenario_id: i64, co2e: f64) -> NewActivity {
        NewActivity {
            scenario_id,
            category: Category::Transport,
            activity_type: "car_gasoline".to_string(),
            value: co2e / 0.404,
            unit: "miles".to_string(),
            co2e_amount: co2e,
            api_source: "default".to_string(),
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let (_temp, store) = open_store();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "users",
            "user_profiles",
            "sessions",
            "scenarios",
            "scenario_activities",
            "emission_factors",
            "user_xp",
            "social_likes",
            "social_tips",
            "social_tip_likes",
            "challenges",
            "user_challenges",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_user_crud_and_duplicates() {
        let (_temp, store) = open_store();
        let user = new_user(&store, "alice");
        assert_eq!(user.role, Role::User);
        assert!(user.is_active);

        let by_email = store.get_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);

        let dup = store.create_user(&NewUser {
            username: "alice".to_string(),
            email: "other@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
            is_active: true,
        });
        assert!(matches!(dup, Err(Error::AlreadyExists(_))));

        let updated = store
            .update_user(
                user.id,
                &UserUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(!updated.is_active);

        let empty = store.update_user(user.id, &UserUpdate::default());
        assert!(matches!(empty, Err(Error::Validation(_))));
        let promote = UserUpdate {
            role: Some(Role::Admin),
            ..Default::default()
        };
        assert!(matches!(store.update_user(9999, &promote), Err(Error::NotFound)));
    }

    #[test]
    fn test_scenario_total_tracks_activities() {
        let (_temp, store) = open_store();
        let user = new_user(&store, "bob");
        let scenario = store.create_scenario(user.id, "Commute", "").unwrap();
        assert_eq!(scenario.total_co2e, 0.0);

        let (first, total) = store.insert_activity(&activity(scenario.id, 4.04)).unwrap();
        assert!((total - 4.04).abs() < 1e-9);
        let (_, total) = store.insert_activity(&activity(scenario.id, 2.0)).unwrap();
        assert!((total - 6.04).abs() < 1e-9);

        let (updated, total) = store
            .update_activity(first.id, 20.0, "miles", 8.08, "default")
            .unwrap();
        assert_eq!(updated.value, 20.0);
        assert!((total - 10.08).abs() < 1e-9);

        let stored = store.get_scenario(scenario.id).unwrap().unwrap();
        assert!((stored.total_co2e - 10.08).abs() < 1e-9);
    }

    #[test]
    fn test_deleting_last_activity_zeroes_total() {
        let (_temp, store) = open_store();
        let user = new_user(&store, "carol");
        let scenario = store.create_scenario(user.id, "Diet", "").unwrap();
        let (only, _) = store.insert_activity(&activity(scenario.id, 3.5)).unwrap();

        let total = store.delete_activity(only.id).unwrap();
        assert_eq!(total, 0.0);
        let stored = store.get_scenario(scenario.id).unwrap().unwrap();
        assert_eq!(stored.total_co2e, 0.0);

        assert!(matches!(store.delete_activity(only.id), Err(Error::NotFound)));
    }

    #[test]
    fn test_insert_activity_requires_active_scenario() {
        let (_temp, store) = open_store();
        let user = new_user(&store, "erin");
        let scenario = store.create_scenario(user.id, "Gone", "").unwrap();
        assert!(store.deactivate_scenario(scenario.id).unwrap());

        let result = store.insert_activity(&activity(scenario.id, 1.0));
        assert!(matches!(result, Err(Error::NotFound)));
        assert!(store.list_activities(scenario.id).unwrap().is_empty());
    }

    #[test]
    fn test_soft_deleted_scenarios_leave_counts() {
        let (_temp, store) = open_store();
        let user = new_user(&store, "dave");
        let a = store.create_scenario(user.id, "A", "").unwrap();
        store.create_scenario(user.id, "B", "").unwrap();
        store.insert_activity(&activity(a.id, 1.0)).unwrap();

        assert_eq!(store.count_active_scenarios(user.id).unwrap(), 2);
        assert_eq!(store.count_user_activities(user.id).unwrap(), 1);

        assert!(store.deactivate_scenario(a.id).unwrap());
        assert!(!store.deactivate_scenario(a.id).unwrap());
        assert_eq!(store.count_active_scenarios(user.id).unwrap(), 1);
        assert_eq!(store.count_user_activities(user.id).unwrap(), 0);
        assert_eq!(store.list_scenarios(user.id, 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn test_community_average_counts_idle_users() {
        let (_temp, store) = open_store();
        let busy = new_user(&store, "erin");
        let idle = new_user(&store, "frank");
        new_user(&store, "nobody");

        let s = store.create_scenario(busy.id, "Week", "").unwrap();
        store.insert_activity(&activity(s.id, 6.0)).unwrap();
        store.insert_activity(&activity(s.id, 4.0)).unwrap();
        store.create_scenario(idle.id, "Empty", "").unwrap();

        let since = Utc::now() - chrono::Duration::days(7);
        let avg = store.community_average_since(since).unwrap();
        assert!((avg - 5.0).abs() < 1e-9);

        let future = Utc::now() + chrono::Duration::days(1);
        assert_eq!(store.community_average_since(future).unwrap(), 0.0);
    }

    #[test]
    fn test_factor_lookup_prefers_exact_region() {
        let (_temp, store) = open_store();
        for (region, value) in [("global", 0.5), ("US", 0.4)] {
            store
                .create_emission_factor(&NewEmissionFactor {
                    category: Category::Energy,
                    activity_type: "electricity".to_string(),
                    region: region.to_string(),
                    co2e_per_unit: value,
                    unit: "kwh".to_string(),
                    source: None,
                })
                .unwrap();
        }

        let rows = store
            .find_emission_factors(Category::Energy, "electricity", "US")
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].region, "US");

        let rows = store
            .find_emission_factors(Category::Energy, "electricity", "FR")
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].region, "global");

        let dup = store.create_emission_factor(&NewEmissionFactor {
            category: Category::Energy,
            activity_type: "electricity".to_string(),
            region: "US".to_string(),
            co2e_per_unit: 0.1,
            unit: "kwh".to_string(),
            source: None,
        });
        assert!(matches!(dup, Err(Error::AlreadyExists(_))));
    }

    #[test]
    fn test_tip_like_toggle() {
        let (_temp, store) = open_store();
        let author = new_user(&store, "erin");
        let reader = new_user(&store, "frank");
        let tip = store.create_tip(author.id, "Cycle to work", "general").unwrap();

        assert_eq!(store.toggle_tip_like(reader.id, tip.id).unwrap(), (true, 1));
        assert_eq!(store.toggle_tip_like(author.id, tip.id).unwrap(), (true, 2));
        assert_eq!(store.toggle_tip_like(reader.id, tip.id).unwrap(), (false, 1));
        assert_eq!(store.list_liked_tips(author.id).unwrap(), vec![tip.id]);

        let tips = store.list_tips(50).unwrap();
        assert_eq!(tips[0].username, "erin");
        assert_eq!(tips[0].tip.likes_count, 1);
    }

    #[test]
    fn test_milestone_like_toggle() {
        let (_temp, store) = open_store();
        let a = new_user(&store, "gina");
        let b = new_user(&store, "hank");

        assert_eq!(store.toggle_milestone_like(a.id, b.id).unwrap(), (true, 1));
        assert_eq!(store.milestone_like_counts().unwrap(), vec![(b.id, 1)]);
        assert_eq!(store.toggle_milestone_like(a.id, b.id).unwrap(), (false, 0));
        assert!(store.list_liked_milestones(a.id).unwrap().is_empty());
    }

    #[test]
    fn test_leaderboard_orderings() {
        let (_temp, store) = open_store();
        let busy = new_user(&store, "busy");
        let lean = new_user(&store, "lean");
        new_user(&store, "idle");

        let s1 = store.create_scenario(busy.id, "One", "").unwrap();
        let s2 = store.create_scenario(busy.id, "Two", "").unwrap();
        store.insert_activity(&activity(s1.id, 10.0)).unwrap();
        store.insert_activity(&activity(s2.id, 20.0)).unwrap();
        let s3 = store.create_scenario(lean.id, "Three", "").unwrap();
        store.insert_activity(&activity(s3.id, 1.0)).unwrap();

        let by_scenarios = store.leaderboard(LeaderboardKind::Scenarios, 10).unwrap();
        assert_eq!(by_scenarios.len(), 2);
        assert_eq!(by_scenarios[0].username, "busy");
        assert_eq!(by_scenarios[0].scenario_count, 2);

        let by_reduction = store.leaderboard(LeaderboardKind::Reduction, 10).unwrap();
        assert_eq!(by_reduction[0].username, "lean");

        let by_activities = store.leaderboard(LeaderboardKind::Activities, 1).unwrap();
        assert_eq!(by_activities.len(), 1);
        assert_eq!(by_activities[0].activity_count, 2);

        let feed = store.milestone_aggregates(50).unwrap();
        assert_eq!(feed.len(), 3);
        assert!(feed.last().unwrap().last_update.is_none());
    }

    #[test]
    fn test_challenge_join_and_complete() {
        let (_temp, store) = open_store();
        let user = new_user(&store, "ivy");
        let challenge = store
            .create_challenge(&NewChallenge {
                name: "Low week".to_string(),
                description: None,
                challenge_type: ChallengeType::TotalLimit,
                target_value: 50.0,
                target_unit: "kg_co2e".to_string(),
                duration_days: 7,
                badge_name: None,
                is_active: true,
            })
            .unwrap();

        store.join_challenge(user.id, challenge.id).unwrap();
        assert!(matches!(
            store.join_challenge(user.id, challenge.id),
            Err(Error::AlreadyExists(_))
        ));
        assert_eq!(store.count_challenge_participants(challenge.id).unwrap(), 1);

        assert!(store.complete_challenge(user.id, challenge.id, Utc::now()).unwrap());
        assert!(!store.complete_challenge(user.id, challenge.id, Utc::now()).unwrap());
        assert_eq!(store.count_completed_challenges(user.id).unwrap(), 1);
    }

    #[test]
    fn test_xp_accumulates() {
        let (_temp, store) = open_store();
        let user = new_user(&store, "jack");
        assert_eq!(store.get_xp(user.id).unwrap().xp_total, 0);
        store.add_xp(user.id, 25).unwrap();
        let record = store.add_xp(user.id, 10).unwrap();
        assert_eq!(record.xp_total, 35);
    }

    #[test]
    fn test_session_lookup_collision() {
        let (_temp, store) = open_store();
        let user = new_user(&store, "kate");
        let session = |id: &str| Session {
            id: id.to_string(),
            token_hash: "hash".to_string(),
            token_lookup: "lookup123".to_string(),
            user_id: user.id,
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
        };

        store.create_session(&session("s-1")).unwrap();
        let result = store.create_session(&session("s-2"));
        assert!(matches!(result, Err(Error::TokenLookupCollision)));
    }
}
