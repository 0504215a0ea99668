//! Record store for members, the admin credential, and sync state.
//!
//! Every mutation reads the whole collection, changes it in memory, and writes
//! it back with a single upsert while holding the writer lock, so readers never
//! observe a partial write.

use chrono::{SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use crate::errors::AppError;
use crate::models::{
    AdminCredential, CreateMemberRequest, Member, RepoCoordinates, SyncState,
    UpdateMemberRequest, DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME,
};
use crate::password;
use crate::sync::merge_members;

/// Storage keys.
pub mod keys {
    pub const MEMBERS: &str = "emsRosterMembers";
    pub const ADMIN: &str = "emsAdminCredentials";
    pub const LAST_SYNC: &str = "emsLastSync";
    pub const CLOUD_ENABLED: &str = "emsCloudEnabled";
    pub const REPO_CONFIG: &str = "emsRepoConfig";
}

/// Timestamp format used for `createdAt`, `updatedAt` and the last sync time.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Local record store.
pub struct RecordStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl RecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    /// Seed an empty member list and the default admin credential on first run.
    pub async fn init_defaults(&self) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;

        if self.read::<Vec<Member>>(keys::MEMBERS).await?.is_none() {
            self.write(keys::MEMBERS, &Vec::<Member>::new()).await?;
        }

        if self.read::<AdminCredential>(keys::ADMIN).await?.is_none() {
            tracing::info!("Creating default admin credentials");
            let admin = AdminCredential {
                username: DEFAULT_ADMIN_USERNAME.to_string(),
                password: password::hash_password(DEFAULT_ADMIN_PASSWORD)?,
            };
            self.write(keys::ADMIN, &admin).await?;
        }

        Ok(())
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.get("value");
                Ok(Some(serde_json::from_str(&raw).map_err(|e| {
                    AppError::Internal(format!("Corrupt value stored under {}: {}", key, e))
                })?))
            }
            None => Ok(None),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("Failed to encode {}: {}", key, e)))?;

        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(raw)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== MEMBER OPERATIONS ====================

    /// List all members in insertion order.
    pub async fn list_members(&self) -> Result<Vec<Member>, AppError> {
        Ok(self.read(keys::MEMBERS).await?.unwrap_or_default())
    }

    /// Get a member by ID.
    pub async fn get_member(&self, id: &str) -> Result<Option<Member>, AppError> {
        Ok(self.list_members().await?.into_iter().find(|m| m.id == id))
    }

    /// Append a new member with a fresh id.
    ///
    /// `check` sees the new record and the current collection under the writer
    /// lock; an error from it leaves the store untouched.
    pub async fn add_member<F>(
        &self,
        request: &CreateMemberRequest,
        check: F,
    ) -> Result<Member, AppError>
    where
        F: FnOnce(&Member, &[Member]) -> Result<(), AppError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut members = self.list_members().await?;

        let member = Member {
            id: uuid::Uuid::new_v4().to_string(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            title: request.title.trim().to_string(),
            department: request.department.trim().to_string(),
            callsign: request.callsign.trim().to_string(),
            hire_date: request.hire_date.trim().to_string(),
            last_promotion: request.last_promotion.trim().to_string(),
            discord: request.discord.trim().to_string(),
            notes: request.notes.trim().to_string(),
            mi: request.mi,
            air: request.air,
            fp: request.fp,
            photo: request.photo.clone().filter(|p| !p.is_empty()),
            created_at: Some(timestamp()),
            updated_at: None,
        };
        check(&member, &members)?;

        members.push(member.clone());
        self.write(keys::MEMBERS, &members).await?;

        tracing::info!(member_id = %member.id, name = %member.display_name(), "Member added");
        Ok(member)
    }

    /// Merge fields into an existing member. Returns `None` if the id is unknown.
    ///
    /// `check` runs on the merged record under the writer lock, as in
    /// [`RecordStore::add_member`].
    pub async fn update_member<F>(
        &self,
        id: &str,
        request: &UpdateMemberRequest,
        check: F,
    ) -> Result<Option<Member>, AppError>
    where
        F: FnOnce(&Member, &[Member]) -> Result<(), AppError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut members = self.list_members().await?;

        let Some(index) = members.iter().position(|m| m.id == id) else {
            return Ok(None);
        };

        let mut updated = members[index].clone();
        request.apply_to(&mut updated);
        check(&updated, &members)?;
        updated.updated_at = Some(timestamp());
        members[index] = updated.clone();

        self.write(keys::MEMBERS, &members).await?;

        tracing::info!(member_id = %id, "Member updated");
        Ok(Some(updated))
    }

    /// Remove a member. Succeeds whether or not the id existed.
    pub async fn delete_member(&self, id: &str) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut members = self.list_members().await?;

        let before = members.len();
        members.retain(|m| m.id != id);
        if members.len() != before {
            tracing::info!(member_id = %id, "Member deleted");
        }

        self.write(keys::MEMBERS, &members).await?;
        Ok(true)
    }

    /// Merge a remote member collection into the local one and return the
    /// resulting count. Read, merge and write happen under one lock hold.
    pub async fn merge_remote_members(&self, remote: Vec<Member>) -> Result<usize, AppError> {
        let _guard = self.write_lock.lock().await;
        let local = self.list_members().await?;
        let merged = merge_members(remote, local);
        self.write(keys::MEMBERS, &merged).await?;
        Ok(merged.len())
    }

    /// Replace the whole member collection.
    #[cfg(test)]
    pub async fn replace_members(&self, members: &[Member]) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        self.write(keys::MEMBERS, &members).await
    }

    // ==================== ADMIN CREDENTIAL ====================

    /// The stored admin credential record.
    pub async fn admin_record(&self) -> Result<Option<AdminCredential>, AppError> {
        self.read(keys::ADMIN).await
    }

    /// Overwrite the admin credential record as-is (hash included).
    pub async fn replace_admin_record(&self, admin: &AdminCredential) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        self.write(keys::ADMIN, admin).await
    }

    /// Check a username and password against the stored credential.
    ///
    /// A legacy hash that verifies is rewritten as Argon2id.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> Result<bool, AppError> {
        let Some(admin) = self.admin_record().await? else {
            return Ok(false);
        };

        if admin.username != username {
            return Ok(false);
        }

        if !password::verify_password(password, &admin.password)? {
            return Ok(false);
        }

        if password::is_legacy_hash(&admin.password) {
            self.upgrade_legacy_hash(&admin, password).await?;
        }

        Ok(true)
    }

    /// Rewrite `verified` with an Argon2id hash of `password`, unless the
    /// stored record changed since it was verified. Returns whether it wrote.
    async fn upgrade_legacy_hash(
        &self,
        verified: &AdminCredential,
        password: &str,
    ) -> Result<bool, AppError> {
        let upgraded = AdminCredential {
            username: verified.username.clone(),
            password: password::hash_password(password)?,
        };

        let _guard = self.write_lock.lock().await;
        if self.admin_record().await?.as_ref() != Some(verified) {
            tracing::debug!("Admin credential changed during login; hash not upgraded");
            return Ok(false);
        }

        tracing::info!("Upgrading legacy admin password hash");
        self.write(keys::ADMIN, &upgraded).await?;
        Ok(true)
    }

    /// Overwrite the admin credential with a freshly hashed password.
    pub async fn set_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AdminCredential, AppError> {
        let admin = AdminCredential {
            username: username.to_string(),
            password: password::hash_password(password)?,
        };
        self.replace_admin_record(&admin).await?;

        tracing::info!("Admin credentials updated");
        Ok(admin)
    }

    // ==================== SYNC STATE ====================

    pub async fn sync_state(&self) -> Result<SyncState, AppError> {
        Ok(SyncState {
            cloud_enabled: self.read(keys::CLOUD_ENABLED).await?.unwrap_or(false),
            last_sync: self.read(keys::LAST_SYNC).await?,
            repo: self.read(keys::REPO_CONFIG).await?,
        })
    }

    pub async fn set_cloud_enabled(&self, enabled: bool) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        self.write(keys::CLOUD_ENABLED, &enabled).await
    }

    pub async fn set_repo_config(&self, repo: Option<&RepoCoordinates>) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        match repo {
            Some(repo) => self.write(keys::REPO_CONFIG, repo).await,
            None => self.remove(keys::REPO_CONFIG).await,
        }
    }

    /// Record a completed sync and return its timestamp.
    pub async fn record_sync(&self) -> Result<String, AppError> {
        let _guard = self.write_lock.lock().await;
        let now = timestamp();
        self.write(keys::LAST_SYNC, &now).await?;
        Ok(now)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::DateTime;
    use tempfile::TempDir;

    use super::*;
    use crate::db::init_database;

    async fn open_store() -> (RecordStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&temp_dir.path().join("store.sqlite"))
            .await
            .expect("Failed to init DB");
        let store = RecordStore::new(pool);
        store.init_defaults().await.expect("Failed to seed defaults");
        (store, temp_dir)
    }

    fn accept(_: &Member, _: &[Member]) -> Result<(), AppError> {
        Ok(())
    }

    fn create_request(first: &str, last: &str) -> CreateMemberRequest {
        CreateMemberRequest {
            first_name: first.to_string(),
            last_name: last.to_string(),
            title: "EMT".to_string(),
            department: "SENIOR_EMT".to_string(),
            callsign: "E-40".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_add_member_assigns_distinct_ids() {
        let (store, _dir) = open_store().await;

        let mut ids = HashSet::new();
        for i in 0..20 {
            let member = store
                .add_member(&create_request(&format!("First{}", i), "Last"), accept)
                .await
                .unwrap();
            assert!(!member.id.is_empty());
            assert!(member.created_at.is_some());
            assert!(ids.insert(member.id));
        }

        assert_eq!(store.list_members().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let (store, _dir) = open_store().await;

        let a = store.add_member(&create_request("A", "One"), accept).await.unwrap();
        let b = store.add_member(&create_request("B", "Two"), accept).await.unwrap();
        let c = store.add_member(&create_request("C", "Three"), accept).await.unwrap();

        let ids: Vec<String> = store
            .list_members()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn test_update_then_get_reflects_merge() {
        let (store, _dir) = open_store().await;
        let created = store.add_member(&create_request("Ada", "L"), accept).await.unwrap();

        let first = store
            .update_member(
                &created.id,
                &UpdateMemberRequest {
                    notes: Some("night shift".to_string()),
                    ..Default::default()
                },
                accept,
            )
            .await
            .unwrap()
            .unwrap();

        let second = store
            .update_member(
                &created.id,
                &UpdateMemberRequest {
                    last_name: Some("Lovelace".to_string()),
                    mi: Some(true),
                    ..Default::default()
                },
                accept,
            )
            .await
            .unwrap()
            .unwrap();

        let fetched = store.get_member(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, second);
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.first_name, "Ada");
        assert_eq!(fetched.last_name, "Lovelace");
        assert_eq!(fetched.notes, "night shift");
        assert!(fetched.mi);
        assert_eq!(fetched.created_at, created.created_at);

        let t1 = DateTime::parse_from_rfc3339(first.updated_at.as_deref().unwrap()).unwrap();
        let t2 = DateTime::parse_from_rfc3339(fetched.updated_at.as_deref().unwrap()).unwrap();
        assert!(t2 >= t1);
    }

    #[tokio::test]
    async fn test_update_unknown_member() {
        let (store, _dir) = open_store().await;
        let result = store
            .update_member("missing", &UpdateMemberRequest::default(), accept)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _dir) = open_store().await;
        let keep = store.add_member(&create_request("Keep", "Me"), accept).await.unwrap();
        let gone = store.add_member(&create_request("Drop", "Me"), accept).await.unwrap();

        assert!(store.delete_member(&gone.id).await.unwrap());
        let ids: Vec<String> = store
            .list_members()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![keep.id.clone()]);

        assert!(store.delete_member(&gone.id).await.unwrap());
        assert!(store.delete_member("never-existed").await.unwrap());
        assert_eq!(store.list_members().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_default_credentials() {
        let (store, _dir) = open_store().await;
        assert!(store.verify_credentials("EMS", "7408574").await.unwrap());
        assert!(!store.verify_credentials("EMS", "wrong").await.unwrap());
        assert!(!store.verify_credentials("ems", "7408574").await.unwrap());
    }

    #[tokio::test]
    async fn test_init_defaults_keeps_changed_credentials() {
        let (store, _dir) = open_store().await;
        store.set_credentials("Chief", "n3w-pass").await.unwrap();
        store.init_defaults().await.unwrap();

        assert!(store.verify_credentials("Chief", "n3w-pass").await.unwrap());
        assert!(!store.verify_credentials("EMS", "7408574").await.unwrap());
    }

    #[tokio::test]
    async fn test_legacy_hash_is_upgraded_on_login() {
        let (store, _dir) = open_store().await;
        store
            .replace_admin_record(&AdminCredential {
                username: "EMS".to_string(),
                password: "-jproj7".to_string(),
            })
            .await
            .unwrap();

        assert!(!store.verify_credentials("EMS", "wrong").await.unwrap());
        let stored = store.admin_record().await.unwrap().unwrap();
        assert_eq!(stored.password, "-jproj7");

        assert!(store.verify_credentials("EMS", "7408574").await.unwrap());
        let stored = store.admin_record().await.unwrap().unwrap();
        assert!(stored.password.starts_with("$argon2id$"));
        assert!(store.verify_credentials("EMS", "7408574").await.unwrap());
    }

    #[tokio::test]
    async fn test_sync_state_round_trip() {
        let (store, _dir) = open_store().await;
        assert_eq!(store.sync_state().await.unwrap(), SyncState::default());

        let repo = RepoCoordinates::new("ems", "roster-data");
        store.set_repo_config(Some(&repo)).await.unwrap();
        store.set_cloud_enabled(true).await.unwrap();
        let synced_at = store.record_sync().await.unwrap();

        let state = store.sync_state().await.unwrap();
        assert!(state.cloud_enabled);
        assert_eq!(state.repo, Some(repo));
        assert_eq!(state.last_sync, Some(synced_at));

        store.set_repo_config(None).await.unwrap();
        assert!(store.sync_state().await.unwrap().repo.is_none());
    }

    #[tokio::test]
    async fn test_rejected_check_writes_nothing() {
        let (store, _dir) = open_store().await;
        let kept = store.add_member(&create_request("Keep", "Me"), accept).await.unwrap();

        let reject = |_: &Member, _: &[Member]| -> Result<(), AppError> {
            Err(AppError::Validation("taken".to_string()))
        };
        assert!(store.add_member(&create_request("New", "One"), reject).await.is_err());

        let update = UpdateMemberRequest {
            notes: Some("changed".to_string()),
            ..Default::default()
        };
        assert!(store.update_member(&kept.id, &update, reject).await.is_err());

        let members = store.list_members().await.unwrap();
        assert_eq!(members, vec![kept]);
    }

    #[tokio::test]
    async fn test_check_sees_members_written_before_it() {
        let (store, _dir) = open_store().await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .add_member(&create_request(&format!("F{}", i), "L"), |candidate, members| {
                        if members.iter().any(|m| m.callsign == candidate.callsign) {
                            Err(AppError::Validation("taken".to_string()))
                        } else {
                            Ok(())
                        }
                    })
                    .await
                    .is_ok()
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(store.list_members().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_merge_keeps_members_written_while_waiting() {
        let (store, _dir) = open_store().await;
        let store = Arc::new(store);
        let a: Member = serde_json::from_value(serde_json::json!({ "id": "A" })).unwrap();
        let b: Member = serde_json::from_value(serde_json::json!({ "id": "B" })).unwrap();
        let c: Member = serde_json::from_value(serde_json::json!({ "id": "C" })).unwrap();
        store.replace_members(&[a.clone()]).await.unwrap();

        // Hold the lock so the merge queues behind a local write.
        let guard = store.write_lock.lock().await;
        let merge = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.merge_remote_members(vec![b]).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        store.write(keys::MEMBERS, &vec![a, c]).await.unwrap();
        drop(guard);

        assert_eq!(merge.await.unwrap().unwrap(), 3);
        let ids: Vec<String> = store
            .list_members()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["B", "A", "C"]);
    }

    #[tokio::test]
    async fn test_legacy_upgrade_does_not_revert_new_credentials() {
        let (store, _dir) = open_store().await;
        let legacy = AdminCredential {
            username: "EMS".to_string(),
            password: "-jproj7".to_string(),
        };
        store.replace_admin_record(&legacy).await.unwrap();

        // Credentials change after the legacy record was verified.
        store.set_credentials("Chief", "n3w-pass").await.unwrap();
        assert!(!store.upgrade_legacy_hash(&legacy, "7408574").await.unwrap());

        assert!(store.verify_credentials("Chief", "n3w-pass").await.unwrap());
        assert!(!store.verify_credentials("EMS", "7408574").await.unwrap());
    }
}
