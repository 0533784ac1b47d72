//! Job repository: row-level operations on the `jobs` table.
//!
//! JSON columns (`languages`, `stats`, `logs`) are stored as text; callers
//! convert to the typed model.

use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub user_id: Option<String>,
    pub github_username: Option<String>,
    pub repo_url: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub languages: String,
    pub status: String,
    pub current_step: Option<String>,
    pub pr_url: Option<String>,
    pub stats: String,
    pub logs: String,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            github_username: row.get("github_username")?,
            repo_url: row.get("repo_url")?,
            repo_owner: row.get("repo_owner")?,
            repo_name: row.get("repo_name")?,
            languages: row.get("languages")?,
            status: row.get("status")?,
            current_step: row.get("current_step")?,
            pr_url: row.get("pr_url")?,
            stats: row.get("stats")?,
            logs: row.get("logs")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Column changes for a partial update. `None` leaves a column untouched;
/// `Some(None)` writes NULL.
#[derive(Debug, Default, Clone)]
pub struct JobChanges {
    pub status: Option<String>,
    pub current_step: Option<Option<String>>,
    pub error: Option<Option<String>>,
    pub pr_url: Option<Option<String>>,
    pub stats: Option<String>,
}

impl JobChanges {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.current_step.is_none()
            && self.error.is_none()
            && self.pr_url.is_none()
            && self.stats.is_none()
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<String>,
    pub user_id: Option<String>,
    pub repo_owner: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, user_id, github_username, repo_url, repo_owner, repo_name,
             languages, status, current_step, pr_url, stats, logs, error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                job.id,
                job.user_id,
                job.github_username,
                job.repo_url,
                job.repo_owner,
                job.repo_name,
                job.languages,
                job.status,
                job.current_step,
                job.pr_url,
                job.stats,
                job.logs,
                job.error,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Applies `changes` to a job. Returns the number of rows touched (0 or 1).
pub fn update_fields(
    db: &Database,
    id: &str,
    changes: &JobChanges,
    updated_at: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| apply_changes(conn, id, changes, updated_at, None))
}

/// Applies `changes` only when the current status is one of `expected`.
///
/// The check and the write are a single statement, so two callers racing
/// for the same transition cannot both succeed.
pub fn transition(
    db: &Database,
    id: &str,
    expected: &[&str],
    changes: &JobChanges,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| Ok(apply_changes(conn, id, changes, updated_at, Some(expected))? == 1))
}

fn apply_changes(
    conn: &Connection,
    id: &str,
    changes: &JobChanges,
    updated_at: &str,
    expected: Option<&[&str]>,
) -> Result<usize, DatabaseError> {
    let mut assignments = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    param_values.push(Box::new(id.to_string()));
    param_values.push(Box::new(updated_at.to_string()));
    assignments.push("updated_at = ?2".to_string());

    if let Some(ref status) = changes.status {
        param_values.push(Box::new(status.clone()));
        assignments.push(format!("status = ?{}", param_values.len()));
    }
    if let Some(ref current_step) = changes.current_step {
        param_values.push(Box::new(current_step.clone()));
        assignments.push(format!("current_step = ?{}", param_values.len()));
    }
    if let Some(ref error) = changes.error {
        param_values.push(Box::new(error.clone()));
        assignments.push(format!("error = ?{}", param_values.len()));
    }
    if let Some(ref pr_url) = changes.pr_url {
        param_values.push(Box::new(pr_url.clone()));
        assignments.push(format!("pr_url = ?{}", param_values.len()));
    }
    if let Some(ref stats) = changes.stats {
        param_values.push(Box::new(stats.clone()));
        assignments.push(format!("stats = ?{}", param_values.len()));
    }

    let mut sql = format!("UPDATE jobs SET {} WHERE id = ?1", assignments.join(", "));
    if let Some(expected) = expected {
        let mut placeholders = Vec::with_capacity(expected.len());
        for status in expected {
            param_values.push(Box::new(status.to_string()));
            placeholders.push(format!("?{}", param_values.len()));
        }
        sql.push_str(&format!(" AND status IN ({})", placeholders.join(", ")));
    }

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    Ok(conn.execute(&sql, params_ref.as_slice())?)
}

/// Appends one serialized log entry to the job's log array.
pub fn append_log(
    db: &Database,
    id: &str,
    entry_json: &str,
    updated_at: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let touched = conn.execute(
            "UPDATE jobs SET logs = json_insert(logs, '$[#]', json(?2)), updated_at = ?3
             WHERE id = ?1",
            params![id, entry_json, updated_at],
        )?;
        Ok(touched)
    })
}

/// Queries jobs with filters, returning (rows, total_count).
pub fn query(db: &Database, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.clone()));
        }
        if let Some(ref user_id) = filter.user_id {
            conditions.push(format!("user_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(user_id.clone()));
        }
        if let Some(ref repo_owner) = filter.repo_owner {
            conditions.push(format!("repo_owner = ?{}", param_values.len() + 1));
            param_values.push(Box::new(repo_owner.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM jobs {} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRow> = stmt
            .query_map(params_ref.as_slice(), JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_job(id: &str) -> JobRow {
        JobRow {
            id: id.to_string(),
            user_id: Some("user-1".to_string()),
            github_username: None,
            repo_url: "https://github.com/acme/web".to_string(),
            repo_owner: "acme".to_string(),
            repo_name: "web".to_string(),
            languages: r#"["es"]"#.to_string(),
            status: "pending".to_string(),
            current_step: None,
            pr_url: None,
            stats: r#"{"filesModified":0,"stringsFound":0,"languagesAdded":0}"#.to_string(),
            logs: "[]".to_string(),
            error: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    // ── Insert / find ──

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &sample_job("j1")).unwrap();

        let found = find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(found.repo_owner, "acme");
        assert_eq!(found.status, "pending");
        assert_eq!(found.languages, r#"["es"]"#);
    }

    #[test]
    fn test_find_missing() {
        let db = test_db();
        assert!(find_by_id(&db, "nope").unwrap().is_none());
    }

    // ── Partial updates ──

    #[test]
    fn test_update_fields_touches_only_given_columns() {
        let db = test_db();
        insert(&db, &sample_job("j1")).unwrap();

        let changes = JobChanges {
            current_step: Some(Some("scan".to_string())),
            ..Default::default()
        };
        let touched = update_fields(&db, "j1", &changes, "2026-01-02T00:00:00Z").unwrap();
        assert_eq!(touched, 1);

        let row = find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(row.current_step.as_deref(), Some("scan"));
        assert_eq!(row.status, "pending");
        assert_eq!(row.updated_at, "2026-01-02T00:00:00Z");
    }

    #[test]
    fn test_update_fields_can_write_null() {
        let db = test_db();
        let mut job = sample_job("j1");
        job.current_step = Some("clone".to_string());
        insert(&db, &job).unwrap();

        let changes = JobChanges {
            current_step: Some(None),
            ..Default::default()
        };
        update_fields(&db, "j1", &changes, "2026-01-02T00:00:00Z").unwrap();
        assert!(find_by_id(&db, "j1").unwrap().unwrap().current_step.is_none());
    }

    #[test]
    fn test_update_unknown_job_touches_nothing() {
        let db = test_db();
        let touched =
            update_fields(&db, "missing", &JobChanges::default(), "2026-01-02").unwrap();
        assert_eq!(touched, 0);
    }

    // ── Conditional transitions ──

    #[test]
    fn test_transition_only_from_expected_status() {
        let db = test_db();
        insert(&db, &sample_job("j1")).unwrap();

        let to_running = JobChanges {
            status: Some("running".to_string()),
            ..Default::default()
        };
        assert!(transition(&db, "j1", &["pending"], &to_running, "t1").unwrap());
        // Second claim must lose.
        assert!(!transition(&db, "j1", &["pending"], &to_running, "t2").unwrap());

        let row = find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(row.status, "running");
        assert_eq!(row.updated_at, "t1");
    }

    #[test]
    fn test_transition_accepts_any_of_expected() {
        let db = test_db();
        let mut job = sample_job("j1");
        job.status = "cancelled".to_string();
        insert(&db, &job).unwrap();

        let reset = JobChanges {
            status: Some("pending".to_string()),
            error: Some(None),
            ..Default::default()
        };
        assert!(transition(&db, "j1", &["failed", "cancelled"], &reset, "t").unwrap());
        assert_eq!(find_by_id(&db, "j1").unwrap().unwrap().status, "pending");
    }

    // ── Logs ──

    #[test]
    fn test_append_log_preserves_order() {
        let db = test_db();
        insert(&db, &sample_job("j1")).unwrap();

        append_log(&db, "j1", r#"{"step":"clone","message":"a"}"#, "t1").unwrap();
        append_log(&db, "j1", r#"{"step":"scan","message":"b"}"#, "t2").unwrap();

        let row = find_by_id(&db, "j1").unwrap().unwrap();
        let logs: serde_json::Value = serde_json::from_str(&row.logs).unwrap();
        assert_eq!(logs.as_array().unwrap().len(), 2);
        assert_eq!(logs[0]["message"], "a");
        assert_eq!(logs[1]["step"], "scan");
        assert_eq!(row.updated_at, "t2");
    }

    // ── Query ──

    #[test]
    fn test_query_with_filters() {
        let db = test_db();
        insert(&db, &sample_job("j1")).unwrap();
        let mut other = sample_job("j2");
        other.status = "completed".to_string();
        other.created_at = "2026-01-03T00:00:00Z".to_string();
        insert(&db, &other).unwrap();

        let (rows, total) = query(&db, &JobFilter::default()).unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows[0].id, "j2");

        let filter = JobFilter {
            status: Some("pending".to_string()),
            ..Default::default()
        };
        let (rows, total) = query(&db, &filter).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, "j1");
    }
}
