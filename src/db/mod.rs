mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::lifecycle::{self, LifecycleError};
use crate::models::*;

/// SQLite-backed entity store.
///
/// All access goes through one connection behind a mutex. Mutating operations
/// hold the lock across their whole read-validate-write cycle and run in a
/// single transaction, so two requests touching the same cat or mission are
/// applied one after the other.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "spy-cat-agency")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("spy_cats.db"))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Cat operations
    // ============================================================

    pub fn get_all_cats(&self) -> Result<Vec<Cat>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, name, years_of_experience, breed, salary
             FROM cats ORDER BY name, id",
        )?;

        let cats = stmt
            .query_map([], cat_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(cats)
    }

    pub fn get_cat(&self, id: Uuid) -> Result<Option<Cat>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        Ok(select_cat(&conn, id)?)
    }

    /// Insert a cat. The breed must already have been checked by the caller,
    /// since classification is a network call and must not run under the lock.
    pub fn create_cat(&self, input: CreateCatInput) -> Result<Cat> {
        lifecycle::validate_salary(input.salary)?;

        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();

        conn.execute(
            "INSERT INTO cats (id, name, years_of_experience, breed, salary)
             VALUES (?, ?, ?, ?, ?)",
            (
                id.to_string(),
                &input.name,
                input.years_of_experience,
                &input.breed,
                input.salary,
            ),
        )?;

        Ok(Cat {
            id,
            name: input.name,
            years_of_experience: input.years_of_experience,
            breed: input.breed,
            salary: input.salary,
        })
    }

    pub fn update_cat(&self, id: Uuid, input: UpdateCatInput) -> Result<Option<Cat>> {
        lifecycle::validate_salary(input.salary)?;

        let conn = self.conn.lock().expect("database lock poisoned");
        let Some(existing) = select_cat(&conn, id)? else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE cats SET salary = ? WHERE id = ?",
            (input.salary, id.to_string()),
        )?;

        Ok(Some(Cat {
            salary: input.salary,
            ..existing
        }))
    }

    /// Delete a cat that has no active mission.
    ///
    /// Completed missions survive the cat and lose their cat link.
    pub fn delete_cat(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        let cat = select_cat(&tx, id)?.ok_or(LifecycleError::CatNotFound)?;
        let missions = select_missions(
            &tx,
            &MissionFilter {
                cat_id: Some(id),
                complete: None,
            },
        )?;
        lifecycle::validate_cat_deletion(&cat, &missions)?;

        tx.execute(
            "UPDATE missions SET cat_id = NULL WHERE cat_id = ?",
            [id.to_string()],
        )?;
        tx.execute("DELETE FROM cats WHERE id = ?", [id.to_string()])?;
        tx.commit()?;

        Ok(())
    }

    // ============================================================
    // Mission operations
    // ============================================================

    pub fn get_all_missions(&self, filter: &MissionFilter) -> Result<Vec<MissionWithTargets>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let missions = select_missions(&conn, filter)?;

        let mut result = Vec::with_capacity(missions.len());
        for mission in missions {
            result.push(with_targets(&conn, mission)?);
        }
        Ok(result)
    }

    pub fn get_missions_by_cat(&self, cat_id: Uuid) -> Result<Vec<MissionWithTargets>> {
        self.get_all_missions(&MissionFilter {
            cat_id: Some(cat_id),
            complete: None,
        })
    }

    pub fn get_mission(&self, id: Uuid) -> Result<Option<MissionWithTargets>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        match select_mission(&conn, id)? {
            Some(mission) => Ok(Some(with_targets(&conn, mission)?)),
            None => Ok(None),
        }
    }

    /// Create a mission and all of its targets in one transaction.
    pub fn create_mission(&self, input: CreateMissionInput) -> Result<MissionWithTargets> {
        lifecycle::validate_mission_creation(&input.targets)?;

        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        let mission = Mission {
            id: Uuid::new_v4(),
            cat_id: None,
            complete: false,
            created_at: Utc::now(),
        };

        tx.execute(
            "INSERT INTO missions (id, cat_id, complete, created_at) VALUES (?, NULL, 0, ?)",
            (mission.id.to_string(), mission.created_at.to_rfc3339()),
        )?;

        let mut targets = Vec::with_capacity(input.targets.len());
        for target_input in input.targets {
            let target = Target {
                id: Uuid::new_v4(),
                mission_id: mission.id,
                name: target_input.name,
                country: target_input.country,
                notes: target_input.notes,
                complete: false,
            };

            tx.execute(
                "INSERT INTO targets (id, mission_id, name, country, notes, complete)
                 VALUES (?, ?, ?, ?, ?, 0)",
                (
                    target.id.to_string(),
                    mission.id.to_string(),
                    &target.name,
                    &target.country,
                    &target.notes,
                ),
            )?;

            targets.push(target);
        }

        tx.commit()?;

        Ok(MissionWithTargets {
            mission,
            targets,
            cat: None,
        })
    }

    pub fn assign_cat(&self, mission_id: Uuid, cat_id: Uuid) -> Result<MissionWithTargets> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        let mission = select_mission(&tx, mission_id)?;
        let cat = select_cat(&tx, cat_id)?;
        let cat_missions = select_missions(
            &tx,
            &MissionFilter {
                cat_id: Some(cat_id),
                complete: None,
            },
        )?;
        lifecycle::validate_mission_assignment(mission.as_ref(), cat.as_ref(), &cat_missions)?;

        tx.execute(
            "UPDATE missions SET cat_id = ? WHERE id = ?",
            (cat_id.to_string(), mission_id.to_string()),
        )?;

        let mut mission = mission.ok_or(LifecycleError::MissionNotFound)?;
        mission.cat_id = Some(cat_id);
        let assigned = MissionWithTargets {
            targets: select_targets(&tx, mission_id)?,
            cat,
            mission,
        };
        tx.commit()?;

        tracing::info!("Assigned cat {} to mission {}", cat_id, mission_id);
        Ok(assigned)
    }

    pub fn unassign_cat(&self, mission_id: Uuid) -> Result<MissionWithTargets> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        let mut mission = select_mission(&tx, mission_id)?.ok_or(LifecycleError::MissionNotFound)?;
        lifecycle::validate_mission_unassignment(&mission)?;

        tx.execute(
            "UPDATE missions SET cat_id = NULL WHERE id = ?",
            [mission_id.to_string()],
        )?;
        mission.cat_id = None;
        let unassigned = with_targets(&tx, mission)?;
        tx.commit()?;

        Ok(unassigned)
    }

    /// Delete an unassigned mission together with its targets.
    pub fn delete_mission(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        let mission = select_mission(&tx, id)?.ok_or(LifecycleError::MissionNotFound)?;
        lifecycle::validate_mission_deletion(&mission)?;

        tx.execute("DELETE FROM targets WHERE mission_id = ?", [id.to_string()])?;
        tx.execute("DELETE FROM missions WHERE id = ?", [id.to_string()])?;
        tx.commit()?;

        Ok(())
    }

    // ============================================================
    // Target operations
    // ============================================================

    pub fn get_targets_by_mission(&self, mission_id: Uuid) -> Result<Vec<Target>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        Ok(select_targets(&conn, mission_id)?)
    }

    pub fn get_target(&self, id: Uuid) -> Result<Option<Target>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        Ok(select_target(&conn, id)?)
    }

    /// Apply a partial update to a target, completing its mission when this
    /// was the last open target.
    pub fn update_target(&self, id: Uuid, input: UpdateTargetInput) -> Result<Target> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        let target = select_target(&tx, id)?.ok_or(LifecycleError::TargetNotFound)?;
        let mission =
            select_mission(&tx, target.mission_id)?.ok_or(LifecycleError::MissionNotFound)?;
        let mission_targets = select_targets(&tx, mission.id)?;

        let update = lifecycle::apply_target_update(&target, &mission, &mission_targets, &input)?;

        tx.execute(
            "UPDATE targets SET notes = ?, complete = ? WHERE id = ?",
            (&update.target.notes, update.target.complete, id.to_string()),
        )?;

        if update.completes_mission(&mission) {
            tx.execute(
                "UPDATE missions SET complete = 1 WHERE id = ?",
                [mission.id.to_string()],
            )?;
            tracing::info!("Mission {} complete", mission.id);
        }

        tx.commit()?;
        Ok(update.target)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

// ============================================================
// Row access
// ============================================================

fn select_cat(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Cat>> {
    conn.query_row(
        "SELECT id, name, years_of_experience, breed, salary FROM cats WHERE id = ?",
        [id.to_string()],
        cat_from_row,
    )
    .optional()
}

fn select_mission(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Mission>> {
    conn.query_row(
        "SELECT id, cat_id, complete, created_at FROM missions WHERE id = ?",
        [id.to_string()],
        mission_from_row,
    )
    .optional()
}

fn select_missions(conn: &Connection, filter: &MissionFilter) -> rusqlite::Result<Vec<Mission>> {
    let mut clauses = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(cat_id) = filter.cat_id {
        clauses.push("cat_id = ?");
        params.push(Box::new(cat_id.to_string()));
    }
    if let Some(complete) = filter.complete {
        clauses.push("complete = ?");
        params.push(Box::new(complete));
    }

    let mut sql = String::from("SELECT id, cat_id, complete, created_at FROM missions");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at, id");

    let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let missions = stmt
        .query_map(params_ref.as_slice(), mission_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(missions)
}

fn select_targets(conn: &Connection, mission_id: Uuid) -> rusqlite::Result<Vec<Target>> {
    let mut stmt = conn.prepare(
        "SELECT id, mission_id, name, country, notes, complete
         FROM targets WHERE mission_id = ? ORDER BY rowid",
    )?;
    let targets = stmt
        .query_map([mission_id.to_string()], target_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(targets)
}

fn select_target(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Target>> {
    conn.query_row(
        "SELECT id, mission_id, name, country, notes, complete FROM targets WHERE id = ?",
        [id.to_string()],
        target_from_row,
    )
    .optional()
}

fn with_targets(conn: &Connection, mission: Mission) -> rusqlite::Result<MissionWithTargets> {
    let targets = select_targets(conn, mission.id)?;
    let cat = match mission.cat_id {
        Some(cat_id) => select_cat(conn, cat_id)?,
        None => None,
    };
    Ok(MissionWithTargets {
        mission,
        targets,
        cat,
    })
}

fn cat_from_row(row: &Row) -> rusqlite::Result<Cat> {
    Ok(Cat {
        id: parse_uuid(row.get::<_, String>(0)?),
        name: row.get(1)?,
        years_of_experience: row.get(2)?,
        breed: row.get(3)?,
        salary: row.get(4)?,
    })
}

fn mission_from_row(row: &Row) -> rusqlite::Result<Mission> {
    Ok(Mission {
        id: parse_uuid(row.get::<_, String>(0)?),
        cat_id: row.get::<_, Option<String>>(1)?.map(parse_uuid),
        complete: row.get::<_, i32>(2)? != 0,
        created_at: parse_datetime(row.get::<_, String>(3)?),
    })
}

fn target_from_row(row: &Row) -> rusqlite::Result<Target> {
    Ok(Target {
        id: parse_uuid(row.get::<_, String>(0)?),
        mission_id: parse_uuid(row.get::<_, String>(1)?),
        name: row.get(2)?,
        country: row.get(3)?,
        notes: row.get(4)?,
        complete: row.get::<_, i32>(5)? != 0,
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|e| {
        tracing::warn!("Stored id {:?} is not a UUID: {}", s, e);
        Uuid::nil()
    })
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            tracing::warn!("Stored timestamp {:?} is not RFC 3339: {}", s, e);
            Utc::now()
        })
}
