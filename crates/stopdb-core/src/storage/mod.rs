pub mod rows;

pub use rows::{DistrictRow, IncidentRow, Region, SchoolRow, User};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::fields::slugify;

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Handle to the SQLite database.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (creating if absent) the database at `path`.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite db at {}", path.display()))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        let _ = conn.pragma_update(None, "journal_mode", "wal");
        let _ = conn.pragma_update(None, "busy_timeout", 5000);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database for tests.
    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    /// Names of the user tables, sorted. Used to compare schemas.
    pub fn table_names(&self) -> anyhow::Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Row count of a table. The name must be a plain identifier.
    pub fn count(&self, table: &str) -> anyhow::Result<i64> {
        anyhow::ensure!(
            !table.is_empty()
                && table
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_'),
            "invalid table name {:?}",
            table
        );
        let conn = self.conn();
        let n = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(n)
    }

    // --- users ---

    pub fn user_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, username, email, password, is_superuser FROM auth_user WHERE id = ?1",
            params![id],
            map_user,
        )
        .optional()
        .context("query user by id")
    }

    pub fn user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, username, email, password, is_superuser FROM auth_user WHERE username = ?1",
            params![username],
            map_user,
        )
        .optional()
        .context("query user by username")
    }

    pub fn superuser_count(&self) -> anyhow::Result<i64> {
        let conn = self.conn();
        let n = conn.query_row(
            "SELECT COUNT(*) FROM auth_user WHERE is_superuser = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    pub fn insert_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        is_superuser: bool,
    ) -> anyhow::Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO auth_user (username, email, password, is_superuser, date_joined)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![username, email, password_hash, is_superuser, now_rfc3339()],
        )
        .with_context(|| format!("insert user {:?}", username))?;
        Ok(conn.last_insert_rowid())
    }

    // --- regions & groups ---

    pub fn get_or_create_group(&self, name: &str) -> anyhow::Result<i64> {
        let conn = self.conn();
        if let Some(id) = conn
            .query_row(
                "SELECT id FROM auth_group WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?
        {
            return Ok(id);
        }
        conn.execute("INSERT INTO auth_group (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    /// Get or create a region, together with its admin group.
    pub fn get_or_create_region(&self, name: &str) -> anyhow::Result<Region> {
        let slug = slugify(name);
        let group_id = self.get_or_create_group(&Region::default_group_name(name))?;
        let conn = self.conn();
        if let Some(region) = conn
            .query_row(
                "SELECT id, name, slug, group_id FROM regions WHERE slug = ?1",
                params![slug],
                map_region,
            )
            .optional()?
        {
            return Ok(region);
        }
        conn.execute(
            "INSERT INTO regions (name, slug, group_id) VALUES (?1, ?2, ?3)",
            params![name, slug, group_id],
        )?;
        Ok(Region {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            slug,
            group_id,
        })
    }

    // --- districts ---

    pub fn district_id_by_name(&self, name: &str) -> anyhow::Result<Option<i64>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id FROM school_districts WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()
        .context("query district by name")
    }

    pub fn insert_district(&self, district: &DistrictRow) -> anyhow::Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO school_districts (
                 name, url, twitter, facebook, phone,
                 superintendent_name, superintendent_email,
                 civil_rights_url, civil_rights_contact_name, civil_rights_contact_email,
                 hib_url, hib_form_url, hib_contact_name, hib_contact_email, board_url
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                district.name,
                district.url,
                district.twitter,
                district.facebook,
                district.phone,
                district.superintendent_name,
                district.superintendent_email,
                district.civil_rights_url,
                district.civil_rights_contact_name,
                district.civil_rights_contact_email,
                district.hib_url,
                district.hib_form_url,
                district.hib_contact_name,
                district.hib_contact_email,
                district.board_url,
            ],
        )
        .with_context(|| format!("insert district {:?}", district.name))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn fetch_district(&self, id: i64) -> anyhow::Result<DistrictRow> {
        let conn = self.conn();
        conn.query_row(
            "SELECT name, url, twitter, facebook, phone,
                    superintendent_name, superintendent_email,
                    civil_rights_url, civil_rights_contact_name, civil_rights_contact_email,
                    hib_url, hib_form_url, hib_contact_name, hib_contact_email, board_url
             FROM school_districts WHERE id = ?1",
            params![id],
            |row| {
                Ok(DistrictRow {
                    name: row.get(0)?,
                    url: row.get(1)?,
                    twitter: row.get(2)?,
                    facebook: row.get(3)?,
                    phone: row.get(4)?,
                    superintendent_name: row.get(5)?,
                    superintendent_email: row.get(6)?,
                    civil_rights_url: row.get(7)?,
                    civil_rights_contact_name: row.get(8)?,
                    civil_rights_contact_email: row.get(9)?,
                    hib_url: row.get(10)?,
                    hib_form_url: row.get(11)?,
                    hib_contact_name: row.get(12)?,
                    hib_contact_email: row.get(13)?,
                    board_url: row.get(14)?,
                })
            },
        )
        .with_context(|| format!("fetch district {}", id))
    }

    pub fn insert_district_logo(
        &self,
        name: &str,
        data: &[u8],
        district_id: i64,
    ) -> anyhow::Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO district_logos (name, data, district_id) VALUES (?1, ?2, ?3)",
            params![name, data, district_id],
        )
        .with_context(|| format!("insert district logo {:?}", name))?;
        Ok(conn.last_insert_rowid())
    }

    // --- schools ---

    pub fn school_id_by_name(&self, name: &str) -> anyhow::Result<Option<i64>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id FROM schools WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()
        .context("query school by name")
    }

    pub fn insert_school(&self, school: &SchoolRow) -> anyhow::Result<i64> {
        school.validate()?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO schools (
                 name, url, district_id, street, city, state, zip_code,
                 latitude, longitude, is_public, is_elementary, is_middle, is_high
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                school.name,
                school.url,
                school.district_id,
                school.street,
                school.city,
                school.state,
                school.zip_code,
                school.latitude,
                school.longitude,
                school.is_public,
                school.is_elementary,
                school.is_middle,
                school.is_high,
            ],
        )
        .with_context(|| format!("insert school {:?}", school.name))?;
        Ok(conn.last_insert_rowid())
    }

    // --- lookup tables ---

    pub fn get_or_create_incident_type(&self, name: &str) -> anyhow::Result<i64> {
        self.get_or_create_lookup("incident_types", name)
    }

    pub fn get_or_create_source_type(&self, name: &str) -> anyhow::Result<i64> {
        self.get_or_create_lookup("source_types", name)
    }

    fn get_or_create_lookup(&self, table: &str, name: &str) -> anyhow::Result<i64> {
        let conn = self.conn();
        if let Some(id) = conn
            .query_row(
                &format!("SELECT id FROM {} WHERE name = ?1", table),
                params![name],
                |row| row.get(0),
            )
            .optional()?
        {
            return Ok(id);
        }
        conn.execute(
            &format!("INSERT INTO {} (name) VALUES (?1)", table),
            params![name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // --- incidents ---

    pub fn insert_incident(&self, incident: &IncidentRow) -> anyhow::Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO incidents (
                 region_id, school_id, description, occurred_at,
                 submitted_at, updated_at, published_at, published_by,
                 reported_to_school, school_response
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                incident.region_id,
                incident.school_id,
                incident.description,
                incident.occurred_at.to_string(),
                incident.submitted_at,
                now_rfc3339(),
                incident.published_at,
                incident.published_by,
                incident.reported_to_school,
                incident.school_response,
            ],
        )
        .context("insert incident")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn link_incident_type(&self, incident_id: i64, incident_type_id: i64) -> anyhow::Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO incident_incident_types (incident_id, incident_type_id)
             VALUES (?1, ?2)",
            params![incident_id, incident_type_id],
        )?;
        Ok(())
    }

    pub fn link_source_type(&self, incident_id: i64, source_type_id: i64) -> anyhow::Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO incident_source_types (incident_id, source_type_id)
             VALUES (?1, ?2)",
            params![incident_id, source_type_id],
        )?;
        Ok(())
    }

    pub fn insert_incident_extra(
        &self,
        incident_id: i64,
        name: &str,
        value: &str,
    ) -> anyhow::Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO incident_extras (name, value, incident_id) VALUES (?1, ?2, ?3)",
            params![name, value, incident_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_supporting_material(
        &self,
        name: &str,
        data: &[u8],
        incident_id: i64,
    ) -> anyhow::Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO supporting_materials (name, data, incident_id) VALUES (?1, ?2, ?3)",
            params![name, data, incident_id],
        )
        .with_context(|| format!("insert supporting material {:?}", name))?;
        Ok(conn.last_insert_rowid())
    }
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        is_superuser: row.get(4)?,
    })
}

fn map_region(row: &rusqlite::Row<'_>) -> rusqlite::Result<Region> {
    Ok(Region {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        group_id: row.get(3)?,
    })
}
