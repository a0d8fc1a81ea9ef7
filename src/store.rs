//! User and file metadata storage.
//!
//! `Repository` abstracts the backing store; the in-memory implementation
//! backs tests and ephemeral deployments, SQLite backs persistent ones.
//! Policies are stored as JSON text so schema migrations never chase the
//! policy shape.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::policy::FilePolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub department: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: String,
    pub owner: String,
    pub name: String,
    pub policy: FilePolicy,
    pub created_at: String,
}

pub trait Repository: Send + Sync {
    fn put_user(&self, user: &UserRecord) -> Result<()>;
    fn get_user(&self, username: &str) -> Result<Option<UserRecord>>;
    fn list_users(&self) -> Result<Vec<UserRecord>>;

    fn put_file(&self, file: &FileRecord) -> Result<()>;
    fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>>;
    fn list_files(&self, owner: Option<&str>) -> Result<Vec<FileRecord>>;

    /// Replace the policy on an existing file.
    fn set_policy(&self, file_id: &str, policy: &FilePolicy) -> Result<()>;
}

// ============================================================================
// IN-MEMORY
// ============================================================================

#[derive(Default)]
pub struct MemoryRepository {
    users: RwLock<HashMap<String, UserRecord>>,
    files: RwLock<HashMap<String, FileRecord>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryRepository {
    fn put_user(&self, user: &UserRecord) -> Result<()> {
        self.users
            .write()
            .insert(user.username.clone(), user.clone());
        Ok(())
    }

    fn get_user(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.read().get(username).cloned())
    }

    fn list_users(&self) -> Result<Vec<UserRecord>> {
        let mut users: Vec<_> = self.users.read().values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    fn put_file(&self, file: &FileRecord) -> Result<()> {
        self.files.write().insert(file.file_id.clone(), file.clone());
        Ok(())
    }

    fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>> {
        Ok(self.files.read().get(file_id).cloned())
    }

    fn list_files(&self, owner: Option<&str>) -> Result<Vec<FileRecord>> {
        let mut files: Vec<_> = self
            .files
            .read()
            .values()
            .filter(|f| owner.map_or(true, |o| f.owner == o))
            .cloned()
            .collect();
        files.sort_by(|a, b| a.file_id.cmp(&b.file_id));
        Ok(files)
    }

    fn set_policy(&self, file_id: &str, policy: &FilePolicy) -> Result<()> {
        let mut files = self.files.write();
        let file = files
            .get_mut(file_id)
            .ok_or_else(|| Error::Storage(format!("no such file: {file_id}")))?;
        file.policy = policy.clone();
        Ok(())
    }
}

// ============================================================================
// SQLITE
// ============================================================================

pub struct SqliteRepository {
    conn: parking_lot::Mutex<Connection>,
}

impl SqliteRepository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(Self {
            conn: parking_lot::Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: parking_lot::Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                 username   TEXT PRIMARY KEY,
                 department TEXT NOT NULL,
                 created_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS files (
                 file_id    TEXT PRIMARY KEY,
                 owner      TEXT NOT NULL,
                 name       TEXT NOT NULL,
                 policy     TEXT NOT NULL,
                 created_at TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_files_owner ON files(owner);",
        )?;
        Ok(())
    }

    fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<(FileRecord, String)> {
        let policy_json: String = row.get(3)?;
        Ok((
            FileRecord {
                file_id: row.get(0)?,
                owner: row.get(1)?,
                name: row.get(2)?,
                policy: FilePolicy::default(),
                created_at: row.get(4)?,
            },
            policy_json,
        ))
    }

    fn decode_file(pair: (FileRecord, String)) -> Result<FileRecord> {
        let (mut file, policy_json) = pair;
        file.policy = serde_json::from_str(&policy_json)?;
        Ok(file)
    }
}

impl Repository for SqliteRepository {
    fn put_user(&self, user: &UserRecord) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO users (username, department, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(username) DO UPDATE SET department = ?2",
            params![user.username, user.department, user.created_at],
        )?;
        Ok(())
    }

    fn get_user(&self, username: &str) -> Result<Option<UserRecord>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT username, department, created_at FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(UserRecord {
                        username: row.get(0)?,
                        department: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn list_users(&self) -> Result<Vec<UserRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT username, department, created_at FROM users ORDER BY username",
        )?;
        let users = stmt
            .query_map([], |row| {
                Ok(UserRecord {
                    username: row.get(0)?,
                    department: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    fn put_file(&self, file: &FileRecord) -> Result<()> {
        let policy_json = serde_json::to_string(&file.policy)?;
        self.conn.lock().execute(
            "INSERT INTO files (file_id, owner, name, policy, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(file_id) DO UPDATE SET name = ?3, policy = ?4",
            params![file.file_id, file.owner, file.name, policy_json, file.created_at],
        )?;
        Ok(())
    }

    fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>> {
        let conn = self.conn.lock();
        let pair = conn
            .query_row(
                "SELECT file_id, owner, name, policy, created_at
                 FROM files WHERE file_id = ?1",
                params![file_id],
                Self::row_to_file,
            )
            .optional()?;
        pair.map(Self::decode_file).transpose()
    }

    fn list_files(&self, owner: Option<&str>) -> Result<Vec<FileRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT file_id, owner, name, policy, created_at FROM files
             WHERE (?1 IS NULL OR owner = ?1) ORDER BY file_id",
        )?;
        let pairs = stmt
            .query_map(params![owner], Self::row_to_file)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        pairs.into_iter().map(Self::decode_file).collect()
    }

    fn set_policy(&self, file_id: &str, policy: &FilePolicy) -> Result<()> {
        let policy_json = serde_json::to_string(policy)?;
        let changed = self.conn.lock().execute(
            "UPDATE files SET policy = ?2 WHERE file_id = ?1",
            params![file_id, policy_json],
        )?;
        if changed == 0 {
            return Err(Error::Storage(format!("no such file: {file_id}")));
        }
        Ok(())
    }
}
