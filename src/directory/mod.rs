//! Principal directories
//!
//! The [`Database`] trait is the storage seam: one store keyed by [`Role`]
//! serves the three independent tables. [`PrincipalDirectory`] is the
//! service layer on top of it, one instance per principal kind, and is
//! where credential handling lives (hash on create, re-hash on update only
//! when a new secret is supplied).

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteDatabase;

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::CredentialHasher;
use crate::error::{DbError, DirectoryError};
use crate::models::{
    CredentialRecord, NewPrincipal, NewPrincipalRecord, Principal, PrincipalChanges,
    PrincipalPatch, Role,
};

/// Database trait for principal persistence
///
/// Only `find_credential_by_contact` ever reads the credential column.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    /// Insert a principal and return it as stored
    async fn insert_principal(
        &self,
        role: Role,
        record: &NewPrincipalRecord,
    ) -> Result<Principal, DbError>;

    /// Get a principal by id
    async fn get_principal(&self, role: Role, id: i64) -> Result<Option<Principal>, DbError>;

    /// Get a principal by its contact identifier
    async fn find_principal_by_contact(
        &self,
        role: Role,
        contact: &str,
    ) -> Result<Option<Principal>, DbError>;

    /// Get a principal together with its credential digest
    async fn find_credential_by_contact(
        &self,
        role: Role,
        contact: &str,
    ) -> Result<Option<CredentialRecord>, DbError>;

    /// List every principal of a kind, ordered by id
    async fn list_principals(&self, role: Role) -> Result<Vec<Principal>, DbError>;

    /// Apply changes; `DbError::NotFound` when the id does not exist
    async fn update_principal(
        &self,
        role: Role,
        id: i64,
        changes: &PrincipalChanges,
    ) -> Result<Principal, DbError>;

    /// Delete a principal; `DbError::NotFound` when the id does not exist
    async fn delete_principal(&self, role: Role, id: i64) -> Result<(), DbError>;

    /// Number of principals of a kind
    async fn count_principals(&self, role: Role) -> Result<u64, DbError>;
}

/// Lookup and CRUD service for one principal kind
pub struct PrincipalDirectory<D: Database> {
    db: Arc<D>,
    role: Role,
    hasher: Arc<dyn CredentialHasher>,
}

impl<D: Database> Clone for PrincipalDirectory<D> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            role: self.role,
            hasher: self.hasher.clone(),
        }
    }
}

impl<D: Database> PrincipalDirectory<D> {
    pub fn new(db: Arc<D>, role: Role, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { db, role, hasher }
    }

    /// The kind of principal this directory holds
    pub fn role(&self) -> Role {
        self.role
    }

    pub async fn find_by_contact(&self, contact: &str) -> Result<Option<Principal>, DirectoryError> {
        Ok(self.db.find_principal_by_contact(self.role, contact).await?)
    }

    /// Credential-inclusive lookup, reserved for login
    pub async fn find_by_contact_with_credential(
        &self,
        contact: &str,
    ) -> Result<Option<CredentialRecord>, DirectoryError> {
        Ok(self.db.find_credential_by_contact(self.role, contact).await?)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Principal, DirectoryError> {
        self.db
            .get_principal(self.role, id)
            .await?
            .ok_or(DirectoryError::NotFound {
                role: self.role,
                id,
            })
    }

    pub async fn list(&self) -> Result<Vec<Principal>, DirectoryError> {
        Ok(self.db.list_principals(self.role).await?)
    }

    pub async fn count(&self) -> Result<u64, DirectoryError> {
        Ok(self.db.count_principals(self.role).await?)
    }

    /// Create a principal
    ///
    /// A secret that already carries the digest signature is stored as is.
    pub async fn create(&self, new: NewPrincipal) -> Result<Principal, DirectoryError> {
        if new.secret.is_empty() {
            return Err(DirectoryError::MissingSecret);
        }

        let record = NewPrincipalRecord {
            credential_digest: self.hasher.ensure_digest(&new.secret)?,
            name: new.name,
            contact: new.contact,
            phone: new.phone,
            address: new.address,
            position: new.position,
            active: new.active,
        };

        let principal = self.db.insert_principal(self.role, &record).await?;
        tracing::info!(role = %self.role, id = principal.id, "Principal created");
        Ok(principal)
    }

    /// Apply a partial update
    ///
    /// A present, non-empty secret is hashed; an absent or empty one is
    /// dropped so the stored digest stays byte-for-byte the same.
    pub async fn update(&self, id: i64, patch: PrincipalPatch) -> Result<Principal, DirectoryError> {
        let credential_digest = match patch.secret.as_deref() {
            Some(secret) if !secret.is_empty() => Some(self.hasher.ensure_digest(secret)?),
            _ => None,
        };

        let changes = PrincipalChanges {
            name: patch.name,
            contact: patch.contact,
            credential_digest,
            phone: patch.phone,
            address: patch.address,
            position: patch.position,
            active: patch.active,
        };

        let principal = self
            .db
            .update_principal(self.role, id, &changes)
            .await
            .map_err(|e| self.not_found_or(e, id))?;
        tracing::info!(
            role = %self.role,
            id,
            credential_changed = changes.credential_digest.is_some(),
            "Principal updated"
        );
        Ok(principal)
    }

    pub async fn remove(&self, id: i64) -> Result<(), DirectoryError> {
        self.db
            .delete_principal(self.role, id)
            .await
            .map_err(|e| self.not_found_or(e, id))?;
        tracing::info!(role = %self.role, id, "Principal removed");
        Ok(())
    }

    fn not_found_or(&self, err: DbError, id: i64) -> DirectoryError {
        match err {
            DbError::NotFound => DirectoryError::NotFound {
                role: self.role,
                id,
            },
            other => other.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hasher::test_hasher;
    use mockall::predicate::*;

    fn sample(role: Role, id: i64) -> Principal {
        Principal {
            id,
            role,
            name: "Sample".to_string(),
            contact: "sample@example.com".to_string(),
            phone: None,
            address: None,
            position: None,
            active: true,
            created_at: None,
        }
    }

    fn directory(mock: MockDatabase, role: Role) -> PrincipalDirectory<MockDatabase> {
        PrincipalDirectory::new(Arc::new(mock), role, Arc::new(test_hasher()))
    }

    async fn sqlite_directory(role: Role) -> (Arc<SqliteDatabase>, PrincipalDirectory<SqliteDatabase>) {
        let db = Arc::new(SqliteDatabase::in_memory().await.unwrap());
        let dir = PrincipalDirectory::new(db.clone(), role, Arc::new(test_hasher()));
        (db, dir)
    }

    // Test 1: find_by_id maps a missing row to NotFound
    #[tokio::test]
    async fn test_find_by_id_not_found() {
        let mut mock = MockDatabase::new();
        mock.expect_get_principal()
            .with(eq(Role::Staff), eq(7))
            .returning(|_, _| Ok(None));

        let err = directory(mock, Role::Staff).find_by_id(7).await.unwrap_err();
        assert!(matches!(
            err,
            DirectoryError::NotFound { role: Role::Staff, id: 7 }
        ));
    }

    // Test 2: Lookups are scoped to the directory's role
    #[tokio::test]
    async fn test_lookup_uses_directory_role() {
        let mut mock = MockDatabase::new();
        mock.expect_find_principal_by_contact()
            .withf(|role, contact| *role == Role::Admin && contact == "root@x.com")
            .returning(|role, _| Ok(Some(sample(role, 1))));

        let found = directory(mock, Role::Admin)
            .find_by_contact("root@x.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.role, Role::Admin);
    }

    // Test 3: create hashes the plaintext secret before storage
    #[tokio::test]
    async fn test_create_hashes_secret() {
        let mut mock = MockDatabase::new();
        mock.expect_insert_principal()
            .withf(|role, record| {
                *role == Role::Customer
                    && record.credential_digest.starts_with("$argon2id$")
                    && !record.credential_digest.contains("s1")
            })
            .times(1)
            .returning(|role, record| {
                let mut p = sample(role, 1);
                p.contact = record.contact.clone();
                Ok(p)
            });

        let created = directory(mock, Role::Customer)
            .create(NewPrincipal::new("A", "a@x.com", "s1"))
            .await
            .unwrap();
        assert_eq!(created.contact, "a@x.com");
    }

    // Test 4: create keeps an existing digest as is
    #[tokio::test]
    async fn test_create_does_not_double_hash() {
        let digest = test_hasher().hash("s1").unwrap();
        let expected = digest.clone();

        let mut mock = MockDatabase::new();
        mock.expect_insert_principal()
            .withf(move |_, record| record.credential_digest == expected)
            .times(1)
            .returning(|role, _| Ok(sample(role, 1)));

        directory(mock, Role::Admin)
            .create(NewPrincipal::new("Root", "root@x.com", digest))
            .await
            .unwrap();
    }

    // Test 5: create rejects an empty secret without touching storage
    #[tokio::test]
    async fn test_create_rejects_empty_secret() {
        let mock = MockDatabase::new();
        let err = directory(mock, Role::Staff)
            .create(NewPrincipal::new("A", "a@x.com", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::MissingSecret));
    }

    // Test 6: unique violation becomes DuplicateContact
    #[tokio::test]
    async fn test_create_duplicate_contact() {
        let mut mock = MockDatabase::new();
        mock.expect_insert_principal().returning(|_, _| {
            Err(DbError::ConstraintViolation(
                "UNIQUE constraint failed: customers.contact".to_string(),
            ))
        });

        let err = directory(mock, Role::Customer)
            .create(NewPrincipal::new("A", "a@x.com", "s1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::DuplicateContact));
    }

    // Test 7: update without a secret never sends a digest
    #[tokio::test]
    async fn test_update_without_secret_drops_credential() {
        let mut mock = MockDatabase::new();
        mock.expect_update_principal()
            .withf(|_, id, changes| {
                *id == 3 && changes.credential_digest.is_none() && changes.name.as_deref() == Some("New")
            })
            .times(1)
            .returning(|role, id, _| Ok(sample(role, id)));

        directory(mock, Role::Customer)
            .update(3, PrincipalPatch::default().with_name("New"))
            .await
            .unwrap();
    }

    // Test 8: update with an empty secret is treated as omitted
    #[tokio::test]
    async fn test_update_with_empty_secret_drops_credential() {
        let mut mock = MockDatabase::new();
        mock.expect_update_principal()
            .withf(|_, _, changes| changes.credential_digest.is_none())
            .times(1)
            .returning(|role, id, _| Ok(sample(role, id)));

        directory(mock, Role::Staff)
            .update(3, PrincipalPatch::default().with_secret(""))
            .await
            .unwrap();
    }

    // Test 9: update with a new secret hashes it
    #[tokio::test]
    async fn test_update_with_secret_hashes() {
        let mut mock = MockDatabase::new();
        mock.expect_update_principal()
            .withf(|_, _, changes| {
                changes
                    .credential_digest
                    .as_deref()
                    .is_some_and(|d| d.starts_with("$argon2id$") && d != "s2")
            })
            .times(1)
            .returning(|role, id, _| Ok(sample(role, id)));

        directory(mock, Role::Staff)
            .update(3, PrincipalPatch::default().with_secret("s2"))
            .await
            .unwrap();
    }

    // Test 10: update and remove report NotFound with the role and id
    #[tokio::test]
    async fn test_update_and_remove_not_found() {
        let mut mock = MockDatabase::new();
        mock.expect_update_principal()
            .returning(|_, _, _| Err(DbError::NotFound));
        mock.expect_delete_principal()
            .returning(|_, _| Err(DbError::NotFound));
        let dir = directory(mock, Role::Admin);

        assert!(matches!(
            dir.update(5, PrincipalPatch::default()).await,
            Err(DirectoryError::NotFound { role: Role::Admin, id: 5 })
        ));
        assert!(matches!(
            dir.remove(5).await,
            Err(DirectoryError::NotFound { role: Role::Admin, id: 5 })
        ));
    }

    // Test 11: storage failures stay Storage errors
    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let mut mock = MockDatabase::new();
        mock.expect_list_principals()
            .returning(|_| Err(DbError::Connection("closed".to_string())));

        let err = directory(mock, Role::Customer).list().await.unwrap_err();
        assert!(matches!(err, DirectoryError::Storage(_)));
    }

    // Test 12: same new secret twice gives two different digests
    #[tokio::test]
    async fn test_update_same_secret_twice_is_salted() {
        let (db, dir) = sqlite_directory(Role::Customer).await;
        let created = dir.create(NewPrincipal::new("A", "a@x.com", "s1")).await.unwrap();

        dir.update(created.id, PrincipalPatch::default().with_secret("s2"))
            .await
            .unwrap();
        let first = db
            .find_credential_by_contact(Role::Customer, "a@x.com")
            .await
            .unwrap()
            .unwrap()
            .digest;

        dir.update(created.id, PrincipalPatch::default().with_secret("s2"))
            .await
            .unwrap();
        let second = db
            .find_credential_by_contact(Role::Customer, "a@x.com")
            .await
            .unwrap()
            .unwrap()
            .digest;

        assert_ne!(first, second);
        assert!(test_hasher().verify(&second, "s2"));
    }

    // Test 13: re-saving without a secret leaves the digest byte-for-byte unchanged
    #[tokio::test]
    async fn test_resave_without_secret_keeps_digest() {
        let (db, dir) = sqlite_directory(Role::Staff).await;
        let created = dir
            .create(NewPrincipal::new("A", "a@x.com", "s1").with_position("Cashier"))
            .await
            .unwrap();
        let before = db
            .find_credential_by_contact(Role::Staff, "a@x.com")
            .await
            .unwrap()
            .unwrap()
            .digest;

        let updated = dir
            .update(
                created.id,
                PrincipalPatch {
                    position: Some("Manager".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let after = db
            .find_credential_by_contact(Role::Staff, "a@x.com")
            .await
            .unwrap()
            .unwrap()
            .digest;

        assert_eq!(updated.position.as_deref(), Some("Manager"));
        assert_eq!(before, after);
    }

    // Test 14: count and list reflect creates and removes
    #[tokio::test]
    async fn test_count_list_remove() {
        let (_db, dir) = sqlite_directory(Role::Admin).await;
        let a = dir.create(NewPrincipal::new("A", "a@x.com", "s1")).await.unwrap();
        dir.create(NewPrincipal::new("B", "b@x.com", "s1")).await.unwrap();
        assert_eq!(dir.count().await.unwrap(), 2);

        dir.remove(a.id).await.unwrap();
        let remaining = dir.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].contact, "b@x.com");
    }
}
