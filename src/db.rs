use rusqlite::{params, Connection, ErrorCode};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::PersistenceError;
use crate::models::{Company, CompanyField, JobOffer};

pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Persistence gateway. The connection sits behind a mutex so concurrent
/// workers serialize their writes.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.init()?;
        Ok(db)
    }

    pub fn default_path() -> PathBuf {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobscout") {
            proj_dirs.data_dir().join("jobscout.db")
        } else {
            PathBuf::from("jobscout.db")
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| PersistenceError::Poisoned)
    }

    pub fn init(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS companies (
                name TEXT PRIMARY KEY NOT NULL,
                is_top_500 INTEGER NOT NULL DEFAULT 0,
                website_url TEXT NOT NULL DEFAULT '',
                linkedin_url TEXT NOT NULL DEFAULT '',
                wttj_url TEXT NOT NULL DEFAULT '',
                job_page_url TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS offers (
                offer_url TEXT PRIMARY KEY NOT NULL,
                company_name TEXT NOT NULL,
                discovered_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_offers_company ON offers(company_name);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> anyhow::Result<()> {
        let tables: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='companies'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            anyhow::bail!("Database not initialized. Run 'jobscout init' first.");
        }
        Ok(())
    }

    // --- Company operations ---

    pub fn get_company(&self, name: &str) -> Result<Option<Company>> {
        let result = self.conn()?.query_row(
            "SELECT name, is_top_500, website_url, linkedin_url, wttj_url, job_page_url
             FROM companies WHERE name = ?1",
            [name],
            Self::row_to_company,
        );
        match result {
            Ok(company) => Ok(Some(company)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn insert_company(&self, company: &Company) -> Result<()> {
        let result = self.conn()?.execute(
            "INSERT INTO companies (name, is_top_500, website_url, linkedin_url, wttj_url, job_page_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                company.name,
                company.is_top_500,
                company.website_url,
                company.linkedin_url,
                company.wttj_url,
                company.job_page_url,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(PersistenceError::DuplicateCompany(company.name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Set `field` only while it is still empty. Returns false when it was
    /// already populated.
    pub fn update_company_field(&self, name: &str, field: CompanyField, value: &str) -> Result<bool> {
        let conn = self.conn()?;
        // column names come from a closed enum, never from input
        let sql = format!(
            "UPDATE companies SET {col} = ?1 WHERE name = ?2 AND {col} = ''",
            col = field.column()
        );
        if conn.execute(&sql, params![value, name])? > 0 {
            return Ok(true);
        }

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM companies WHERE name = ?1)",
            [name],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(PersistenceError::UnknownCompany(name.to_string()));
        }
        Ok(false)
    }

    pub fn list_companies(&self) -> Result<Vec<Company>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, is_top_500, website_url, linkedin_url, wttj_url, job_page_url
             FROM companies ORDER BY name",
        )?;
        let rows = stmt.query_map([], Self::row_to_company)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn delete_company(&self, name: &str) -> Result<bool> {
        let changed = self
            .conn()?
            .execute("DELETE FROM companies WHERE name = ?1", [name])?;
        Ok(changed > 0)
    }

    fn row_to_company(row: &rusqlite::Row) -> rusqlite::Result<Company> {
        Ok(Company {
            name: row.get(0)?,
            is_top_500: row.get(1)?,
            website_url: row.get(2)?,
            linkedin_url: row.get(3)?,
            wttj_url: row.get(4)?,
            job_page_url: row.get(5)?,
        })
    }

    // --- Offer operations ---

    /// Returns false when the offer URL is already stored.
    pub fn insert_offer(&self, offer: &JobOffer) -> Result<bool> {
        let changed = self.conn()?.execute(
            "INSERT OR IGNORE INTO offers (offer_url, company_name) VALUES (?1, ?2)",
            params![offer.offer_url, offer.company_name],
        )?;
        Ok(changed > 0)
    }

    pub fn list_offers(&self) -> Result<Vec<JobOffer>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT offer_url, company_name, discovered_at FROM offers ORDER BY company_name, offer_url",
        )?;
        let rows = stmt.query_map([], Self::row_to_offer)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn list_company_offers(&self, company_name: &str) -> Result<Vec<JobOffer>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT offer_url, company_name, discovered_at FROM offers
             WHERE company_name = ?1 ORDER BY offer_url",
        )?;
        let rows = stmt.query_map([company_name], Self::row_to_offer)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn delete_offer(&self, offer_url: &str) -> Result<bool> {
        let changed = self
            .conn()?
            .execute("DELETE FROM offers WHERE offer_url = ?1", [offer_url])?;
        Ok(changed > 0)
    }

    fn row_to_offer(row: &rusqlite::Row) -> rusqlite::Result<JobOffer> {
        Ok(JobOffer {
            offer_url: row.get(0)?,
            company_name: row.get(1)?,
            discovered_at: row.get(2)?,
        })
    }
}
