// src/db/models/principal.rs

//! Principal model - users and groups

use super::parse_column;
use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Group,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &str {
        match self {
            PrincipalKind::User => "user",
            PrincipalKind::Group => "group",
        }
    }

    /// Prefix used when the principal appears in an access control entry
    pub fn acl_prefix(&self) -> &str {
        match self {
            PrincipalKind::User => "USER:",
            PrincipalKind::Group => "GROUP:",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PrincipalKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(PrincipalKind::User),
            "group" => Ok(PrincipalKind::Group),
            _ => Err(format!("Invalid principal kind: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub kind: PrincipalKind,
    pub password_digest: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
}

impl Principal {
    pub fn new(name: String, kind: PrincipalKind) -> Self {
        Self {
            name,
            kind,
            password_digest: None,
            description: None,
            created_at: None,
        }
    }

    /// Insert this principal
    pub fn insert(&mut self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO principals (name, kind, password_digest, description) VALUES (?1, ?2, ?3, ?4)",
            params![
                &self.name,
                self.kind.as_str(),
                &self.password_digest,
                &self.description,
            ],
        )?;
        self.created_at = conn
            .query_row(
                "SELECT created_at FROM principals WHERE name = ?1",
                [&self.name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(())
    }

    pub fn find(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT name, kind, password_digest, description, created_at FROM principals WHERE name = ?1",
        )?;
        let principal = stmt.query_row([name], Self::from_row).optional()?;
        Ok(principal)
    }

    pub fn exists(conn: &Connection, name: &str) -> Result<bool> {
        Ok(Self::find(conn, name)?.is_some())
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT name, kind, password_digest, description, created_at FROM principals ORDER BY kind, name",
        )?;
        let rows = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Add `user` to `group`; adding an existing member is a no-op
    pub fn add_member(conn: &Connection, group: &str, user: &str) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO group_members (group_name, user_name) VALUES (?1, ?2)",
            params![group, user],
        )?;
        Ok(())
    }

    /// Groups a principal belongs to, by name
    pub fn groups_of(conn: &Connection, user: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT group_name FROM group_members WHERE user_name = ?1 ORDER BY group_name",
        )?;
        let rows = stmt
            .query_map([user], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(rows)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            kind: parse_column(row, 1)?,
            password_digest: row.get(2)?,
            description: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}
