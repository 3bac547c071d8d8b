//! SQLite implementation of the Database trait
//!
//! Uses rusqlite through tokio-rusqlite so queries run on a dedicated
//! connection thread. Table names come from [`table_for`] and are never
//! user-supplied. Writes to the customer and staff tables keep
//! `shared_contacts` in step inside the same transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use tokio_rusqlite::Connection;

use super::schema::{shares_contacts, table_for, CREATE_SCHEMA, PUBLIC_COLUMNS};
use super::Database;
use crate::error::DbError;
use crate::models::{CredentialRecord, NewPrincipalRecord, Principal, PrincipalChanges, Role};

/// SQLite database implementation
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Open (or create) a database and apply the schema
    ///
    /// Use `:memory:` for an in-memory database.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path).await?;

        conn.call(|conn| {
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }
}

fn select_by_id(role: Role) -> String {
    format!(
        "SELECT {} FROM {} WHERE id = ?1",
        PUBLIC_COLUMNS,
        table_for(role)
    )
}

const CLAIM_CONTACT: &str = "INSERT INTO shared_contacts (contact, role) VALUES (?1, ?2)";
const MOVE_CLAIM: &str = "UPDATE shared_contacts SET contact = ?1 WHERE contact = ?2";

fn principal_from_row(role: Role, row: &Row<'_>) -> rusqlite::Result<Principal> {
    Ok(Principal {
        id: row.get(0)?,
        role,
        name: row.get(1)?,
        contact: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        position: row.get(5)?,
        active: row.get::<_, i64>(6)? != 0,
        created_at: parse_datetime(row.get::<_, Option<String>>(7)?),
    })
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn insert_principal(
        &self,
        role: Role,
        record: &NewPrincipalRecord,
    ) -> Result<Principal, DbError> {
        let record = record.clone();
        let insert = format!(
            r#"
            INSERT INTO {}
            (name, contact, credential_digest, phone, address, position, active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            table_for(role)
        );
        let select = select_by_id(role);

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    &insert,
                    rusqlite::params![
                        record.name,
                        record.contact,
                        record.credential_digest,
                        record.phone,
                        record.address,
                        record.position,
                        record.active as i64
                    ],
                )?;
                let id = tx.last_insert_rowid();
                if shares_contacts(role) {
                    tx.execute(CLAIM_CONTACT, rusqlite::params![record.contact, role.as_str()])?;
                }
                let principal =
                    tx.query_row(&select, [id], |row| principal_from_row(role, row))?;
                tx.commit()?;
                Ok(principal)
            })
            .await
            .map_err(Into::into)
    }

    async fn get_principal(&self, role: Role, id: i64) -> Result<Option<Principal>, DbError> {
        let select = select_by_id(role);

        self.conn
            .call(move |conn| {
                let principal = conn
                    .query_row(&select, [id], |row| principal_from_row(role, row))
                    .optional()?;
                Ok(principal)
            })
            .await
            .map_err(Into::into)
    }

    async fn find_principal_by_contact(
        &self,
        role: Role,
        contact: &str,
    ) -> Result<Option<Principal>, DbError> {
        let contact = contact.to_string();
        let select = format!(
            "SELECT {} FROM {} WHERE contact = ?1",
            PUBLIC_COLUMNS,
            table_for(role)
        );

        self.conn
            .call(move |conn| {
                let principal = conn
                    .query_row(&select, [&contact], |row| principal_from_row(role, row))
                    .optional()?;
                Ok(principal)
            })
            .await
            .map_err(Into::into)
    }

    async fn find_credential_by_contact(
        &self,
        role: Role,
        contact: &str,
    ) -> Result<Option<CredentialRecord>, DbError> {
        let contact = contact.to_string();
        let select = format!(
            "SELECT {}, credential_digest FROM {} WHERE contact = ?1",
            PUBLIC_COLUMNS,
            table_for(role)
        );

        self.conn
            .call(move |conn| {
                let record = conn
                    .query_row(&select, [&contact], |row| {
                        Ok(CredentialRecord {
                            principal: principal_from_row(role, row)?,
                            digest: row.get(8)?,
                        })
                    })
                    .optional()?;
                Ok(record)
            })
            .await
            .map_err(Into::into)
    }

    async fn list_principals(&self, role: Role) -> Result<Vec<Principal>, DbError> {
        let select = format!(
            "SELECT {} FROM {} ORDER BY id",
            PUBLIC_COLUMNS,
            table_for(role)
        );

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&select)?;
                let principals = stmt
                    .query_map([], |row| principal_from_row(role, row))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(principals)
            })
            .await
            .map_err(Into::into)
    }

    async fn update_principal(
        &self,
        role: Role,
        id: i64,
        changes: &PrincipalChanges,
    ) -> Result<Principal, DbError> {
        let changes = changes.clone();
        let update = format!(
            r#"
            UPDATE {}
            SET name = COALESCE(?1, name),
                contact = COALESCE(?2, contact),
                credential_digest = COALESCE(?3, credential_digest),
                phone = COALESCE(?4, phone),
                address = COALESCE(?5, address),
                position = COALESCE(?6, position),
                active = COALESCE(?7, active)
            WHERE id = ?8
            "#,
            table_for(role)
        );
        let select = select_by_id(role);
        let select_contact = format!("SELECT contact FROM {} WHERE id = ?1", table_for(role));

        let updated = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                if let (true, Some(contact)) = (shares_contacts(role), changes.contact.as_ref()) {
                    let current: Option<String> = tx
                        .query_row(&select_contact, [id], |row| row.get(0))
                        .optional()?;
                    match current {
                        None => return Ok(None),
                        Some(current) if &current != contact => {
                            tx.execute(MOVE_CLAIM, rusqlite::params![contact, current])?;
                        }
                        Some(_) => {}
                    }
                }
                let affected = tx.execute(
                    &update,
                    rusqlite::params![
                        changes.name,
                        changes.contact,
                        changes.credential_digest,
                        changes.phone,
                        changes.address,
                        changes.position,
                        changes.active.map(|a| a as i64),
                        id
                    ],
                )?;
                if affected == 0 {
                    return Ok(None);
                }
                let principal =
                    tx.query_row(&select, [id], |row| principal_from_row(role, row))?;
                tx.commit()?;
                Ok(Some(principal))
            })
            .await?;

        updated.ok_or(DbError::NotFound)
    }

    async fn delete_principal(&self, role: Role, id: i64) -> Result<(), DbError> {
        let delete = format!("DELETE FROM {} WHERE id = ?1", table_for(role));
        let release = format!(
            "DELETE FROM shared_contacts WHERE role = ?2 AND contact = (SELECT contact FROM {} WHERE id = ?1)",
            table_for(role)
        );

        let affected = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                if shares_contacts(role) {
                    tx.execute(&release, rusqlite::params![id, role.as_str()])?;
                }
                let affected = tx.execute(&delete, [id])?;
                tx.commit()?;
                Ok(affected)
            })
            .await?;

        if affected == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn count_principals(&self, role: Role) -> Result<u64, DbError> {
        let select = format!("SELECT COUNT(*) FROM {}", table_for(role));

        self.conn
            .call(move |conn| {
                let count: i64 = conn.query_row(&select, [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Into::into)
    }
}

/// Parse a datetime string from SQLite
fn parse_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                // CURRENT_TIMESTAMP format
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            })
    })
}
