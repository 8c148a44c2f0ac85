mod error;
mod models;

pub use error::{DbError, Result};
pub use models::{PlayerIdentity, PlayerName, mode_label};

use std::path::Path;
use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::{OptionalExtension, params};
use tracing::{debug, info};
use uuid::Uuid;

/// Raw identity row as stored: (uuid, username, online).
type IdentityRow = (String, String, bool);

/// Identity store: the uuid <-> (username, online-mode) table.
#[derive(Clone)]
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create a database at the given path.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = Connection::open(path).await.map_err(DbError::Sqlite)?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Create an in-memory database (useful for testing).
  pub async fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .await
      .map_err(DbError::Sqlite)?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Initialize the database schema.
  async fn initialize(&self) -> Result<()> {
    self.conn
            .call(|conn| {
                conn.pragma_update(None, "journal_mode", "WAL")?;

                conn.execute_batch(
                    r#"
                    -- One row per uuid; a username owns at most one uuid per mode
                    CREATE TABLE IF NOT EXISTS identities (
                        uuid TEXT PRIMARY KEY,
                        username TEXT NOT NULL,
                        online INTEGER NOT NULL,
                        UNIQUE(username, online)
                    );

                    CREATE INDEX IF NOT EXISTS idx_identities_username ON identities(username);
                    "#,
                )?;
                Ok(())
            })
            .await?;

    info!("identity database initialized");
    Ok(())
  }

  // ========================================================================
  // Writes
  // ========================================================================

  /// Store a single identity.
  /// Returns an error if the uuid or the (username, mode) pair is already taken.
  pub async fn insert_identity(&self, identity: PlayerIdentity) -> Result<PlayerIdentity> {
    let result = self.import_identities(vec![identity]).await?;
    debug!(uuid = %identity.uuid, username = %identity.username, online = identity.online, "inserted identity");
    Ok(result[0])
  }

  /// Store a batch of identities in one transaction.
  /// Either every identity is stored or none is.
  pub async fn import_identities(
    &self,
    identities: Vec<PlayerIdentity>,
  ) -> Result<Vec<PlayerIdentity>> {
    let count = identities.len();

    let result = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                {
                    let mut exists_stmt = tx.prepare_cached(
                        "SELECT EXISTS(SELECT 1 FROM identities WHERE uuid = ?1 OR (username = ?2 AND online = ?3))",
                    )?;
                    let mut insert_stmt = tx.prepare_cached(
                        "INSERT INTO identities (uuid, username, online) VALUES (?1, ?2, ?3)",
                    )?;

                    for identity in &identities {
                        let uuid = identity.uuid.to_string();
                        let exists: bool = exists_stmt.query_row(
                            params![&uuid, identity.username.as_str(), identity.online],
                            |row| row.get(0),
                        )?;

                        if exists {
                            return Ok(Err(DbError::IdentityConflict {
                                uuid,
                                username: identity.username.to_string(),
                                mode: identity.mode_label(),
                            }));
                        }

                        insert_stmt.execute(params![&uuid, identity.username.as_str(), identity.online])?;
                    }
                }

                tx.commit()?;
                Ok(Ok(identities))
            })
            .await??;

    debug!(count, "imported identities");
    Ok(result)
  }

  /// Delete the identity of a uuid.
  pub async fn delete_identity(&self, uuid: Uuid) -> Result<()> {
    let key = uuid.to_string();

    self
      .conn
      .call(move |conn| {
        let deleted = conn
          .prepare_cached("DELETE FROM identities WHERE uuid = ?1")?
          .execute(params![&key])?;

        if deleted == 0 {
          return Ok(Err(DbError::IdentityNotFound));
        }

        Ok(Ok(()))
      })
      .await??;

    debug!(%uuid, "deleted identity");
    Ok(())
  }

  // ========================================================================
  // Reads
  // ========================================================================

  /// Get the identity of a uuid.
  /// Returns None if not found.
  pub async fn get_identity(&self, uuid: Uuid) -> Result<Option<PlayerIdentity>> {
    let key = uuid.to_string();

    let row: Option<IdentityRow> = self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached("SELECT uuid, username, online FROM identities WHERE uuid = ?1")?
          .query_row(params![&key], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
          .optional()
      })
      .await?;

    row.map(parse_row).transpose()
  }

  /// Find the uuid a username uses under the given mode.
  pub async fn find_uuid(&self, username: String, online: bool) -> Result<Option<Uuid>> {
    let uuid: Option<String> = self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached("SELECT uuid FROM identities WHERE username = ?1 AND online = ?2")?
          .query_row(params![&username, online], |row| row.get(0))
          .optional()
      })
      .await?;

    uuid
      .map(|uuid| Uuid::parse_str(&uuid).map_err(|err| DbError::InvalidRow(format!("{uuid}: {err}"))))
      .transpose()
  }

  /// Every stored identity, ordered by username then mode.
  pub async fn all_identities(&self) -> Result<Vec<PlayerIdentity>> {
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT uuid, username, online FROM identities ORDER BY username, online",
        )?;

        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
          .collect::<std::result::Result<Vec<IdentityRow>, _>>()?;

        Ok(rows)
      })
      .await?;

    rows.into_iter().map(parse_row).collect()
  }
}

fn parse_row((uuid, username, online): IdentityRow) -> Result<PlayerIdentity> {
  let parsed = Uuid::parse_str(&uuid).map_err(|err| DbError::InvalidRow(format!("{uuid}: {err}")))?;
  let username = PlayerName::try_from(username.as_str())
    .map_err(|_| DbError::InvalidRow(format!("{uuid}: username {username:?} exceeds 16 characters")))?;
  Ok(PlayerIdentity::new(parsed, username, online))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn identity(uuid: &str, name: &str, online: bool) -> PlayerIdentity {
    PlayerIdentity::new(
      Uuid::parse_str(uuid).unwrap(),
      PlayerName::try_from(name).unwrap(),
      online,
    )
  }

  fn steve_online() -> PlayerIdentity {
    identity("4530d13c-c8f3-4350-9c2d-392aa53f15e1", "Steve", true)
  }

  fn steve_offline() -> PlayerIdentity {
    identity("0c93a669-87cf-3a6d-99ce-32755c10587e", "Steve", false)
  }

  #[tokio::test]
  async fn test_identity_lifecycle() {
    let db = Database::open_in_memory().await.unwrap();

    // Insert both modes for the same username
    db.insert_identity(steve_online()).await.unwrap();
    db.insert_identity(steve_offline()).await.unwrap();

    // Get by uuid
    let found = db.get_identity(steve_online().uuid).await.unwrap().unwrap();
    assert_eq!(found, steve_online());

    // Find by username and mode
    let uuid = db.find_uuid("Steve".to_string(), false).await.unwrap();
    assert_eq!(uuid, Some(steve_offline().uuid));

    // Delete it
    db.delete_identity(steve_offline().uuid).await.unwrap();
    assert!(db.get_identity(steve_offline().uuid).await.unwrap().is_none());
    assert!(
      db.find_uuid("Steve".to_string(), false)
        .await
        .unwrap()
        .is_none()
    );
  }

  #[tokio::test]
  async fn test_same_mode_conflict() {
    let db = Database::open_in_memory().await.unwrap();

    db.insert_identity(steve_online()).await.unwrap();

    // Another online uuid for Steve is rejected
    let result = db
      .insert_identity(identity("a19c2840-cfae-48c1-99dc-34924446b0f4", "Steve", true))
      .await;
    assert!(matches!(result, Err(DbError::IdentityConflict { mode: "online", .. })));

    // So is reusing the uuid
    let result = db
      .insert_identity(identity("4530d13c-c8f3-4350-9c2d-392aa53f15e1", "Alex", false))
      .await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_import_is_all_or_nothing() {
    let db = Database::open_in_memory().await.unwrap();

    let batch = vec![
      steve_online(),
      identity("128a09b6-f8ee-42e2-a7dc-1d129f14f0d9", "Alex", true),
      // Duplicate of the first row
      identity("be17640b-8471-321e-a355-d2a2859ebda1", "Steve", true),
    ];
    assert!(db.import_identities(batch).await.is_err());
    assert!(db.all_identities().await.unwrap().is_empty());

    let batch = vec![
      steve_online(),
      steve_offline(),
      identity("128a09b6-f8ee-42e2-a7dc-1d129f14f0d9", "Alex", true),
    ];
    db.import_identities(batch).await.unwrap();

    let all = db.all_identities().await.unwrap();
    let names: Vec<(&str, bool)> = all.iter().map(|i| (i.username.as_str(), i.online)).collect();
    assert_eq!(names, vec![("Alex", true), ("Steve", false), ("Steve", true)]);
  }

  #[tokio::test]
  async fn test_delete_missing_identity() {
    let db = Database::open_in_memory().await.unwrap();

    let result = db.delete_identity(steve_online().uuid).await;
    assert!(matches!(result, Err(DbError::IdentityNotFound)));
  }
}
