//! Challenge store: repository trait and backends.
//!
//! The Projector talks to persistence exclusively through the
//! [`ChallengeStore`] trait, so the projection logic has no dependency on
//! a specific storage engine. Two backends ship with the crate:
//!
//! - `SqliteChallengeStore` — the production backend. Two tables,
//!   `challenges` (keyed by creation tx hash, indexed by `active`) and
//!   `challenge_participants` (keyed by challenge + address, indexed by
//!   challenge). Schema creation is idempotent and runs at startup.
//! - `MemoryChallengeStore` — an in-memory backend used by the test
//!   suites.
//!
//! All create-or-update decisions are made by the Projector's handlers as
//! explicit read-then-write; `save_*` simply writes the row it is given.

use super::error::StoreError;
use super::types::{Challenge, Participant};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Repository interface for projected challenge state.
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    /// Look up a challenge by its creation transaction hash.
    async fn find_challenge(&self, id: &str) -> Result<Option<Challenge>, StoreError>;

    /// The challenge with `active = true`, if any. The projection
    /// invariant guarantees at most one exists.
    async fn find_active_challenge(&self) -> Result<Option<Challenge>, StoreError>;

    async fn find_participant(
        &self,
        challenge_id: &str,
        address: &str,
    ) -> Result<Option<Participant>, StoreError>;

    /// Insert or replace the row keyed by `challenge.id`.
    async fn save_challenge(&self, challenge: &Challenge) -> Result<(), StoreError>;

    /// Insert or replace the row keyed by (`challenge_id`, `address`).
    async fn save_participant(&self, participant: &Participant) -> Result<(), StoreError>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS challenges (
    id                   TEXT PRIMARY KEY,
    creator              TEXT,
    start_timestamp      INTEGER NOT NULL,
    end_timestamp        INTEGER NOT NULL,
    reward_budget        TEXT NOT NULL,
    reward_per_point     TEXT NOT NULL,
    active               INTEGER NOT NULL,
    created_tx_hash      TEXT NOT NULL,
    closed_tx_hash       TEXT,
    last_updated_tx_hash TEXT NOT NULL,
    opened_at            INTEGER,
    closed_at            INTEGER
);

CREATE INDEX IF NOT EXISTS idx_challenges_active
    ON challenges(active);

CREATE TABLE IF NOT EXISTS challenge_participants (
    challenge_id         TEXT NOT NULL,
    address              TEXT NOT NULL,
    score                TEXT NOT NULL,
    join_tx_hash         TEXT NOT NULL,
    joined_at            INTEGER,
    last_update_tx_hash  TEXT,
    last_score_change_at INTEGER,
    PRIMARY KEY (challenge_id, address)
);

CREATE INDEX IF NOT EXISTS idx_participants_challenge
    ON challenge_participants(challenge_id);
"#;

/// Run the idempotent schema migration. All statements use IF NOT EXISTS,
/// so calling this on every startup is safe.
pub fn run_schema_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(SCHEMA)?;
    log::info!("Challenge store schema ready");
    Ok(())
}

/// SQLite-backed store. The connection lives behind a mutex; every call
/// is a single statement, so there is no cross-call transaction.
pub struct SqliteChallengeStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteChallengeStore {
    /// Open (or create) the database at `db_path` and ensure the schema.
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let mut conn = Connection::open(db_path)?;
        run_schema_migrations(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn challenge_from_row(row: &Row<'_>) -> rusqlite::Result<Challenge> {
        Ok(Challenge {
            id: row.get(0)?,
            creator: row.get(1)?,
            start_timestamp: row.get(2)?,
            end_timestamp: row.get(3)?,
            reward_budget: row.get(4)?,
            reward_per_point: row.get(5)?,
            active: row.get(6)?,
            created_tx_hash: row.get(7)?,
            closed_tx_hash: row.get(8)?,
            last_updated_tx_hash: row.get(9)?,
            opened_at: row.get(10)?,
            closed_at: row.get(11)?,
        })
    }

    fn participant_from_row(row: &Row<'_>) -> rusqlite::Result<Participant> {
        Ok(Participant {
            challenge_id: row.get(0)?,
            address: row.get(1)?,
            score: row.get(2)?,
            join_tx_hash: row.get(3)?,
            joined_at: row.get(4)?,
            last_update_tx_hash: row.get(5)?,
            last_score_change_at: row.get(6)?,
        })
    }
}

const CHALLENGE_COLUMNS: &str = "id, creator, start_timestamp, end_timestamp, reward_budget, \
     reward_per_point, active, created_tx_hash, closed_tx_hash, last_updated_tx_hash, \
     opened_at, closed_at";

const PARTICIPANT_COLUMNS: &str = "challenge_id, address, score, join_tx_hash, joined_at, \
     last_update_tx_hash, last_score_change_at";

#[async_trait]
impl ChallengeStore for SqliteChallengeStore {
    async fn find_challenge(&self, id: &str) -> Result<Option<Challenge>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let challenge = conn
            .query_row(
                &format!("SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE id = ?1"),
                params![id],
                Self::challenge_from_row,
            )
            .optional()?;
        Ok(challenge)
    }

    async fn find_active_challenge(&self) -> Result<Option<Challenge>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let challenge = conn
            .query_row(
                &format!("SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE active = 1 LIMIT 1"),
                [],
                Self::challenge_from_row,
            )
            .optional()?;
        Ok(challenge)
    }

    async fn find_participant(
        &self,
        challenge_id: &str,
        address: &str,
    ) -> Result<Option<Participant>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let participant = conn
            .query_row(
                &format!(
                    "SELECT {PARTICIPANT_COLUMNS} FROM challenge_participants \
                     WHERE challenge_id = ?1 AND address = ?2"
                ),
                params![challenge_id, address],
                Self::participant_from_row,
            )
            .optional()?;
        Ok(participant)
    }

    async fn save_challenge(&self, challenge: &Challenge) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO challenges (id, creator, start_timestamp, end_timestamp, \
             reward_budget, reward_per_point, active, created_tx_hash, closed_tx_hash, \
             last_updated_tx_hash, opened_at, closed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
             ON CONFLICT(id) DO UPDATE SET \
                 creator = excluded.creator, \
                 start_timestamp = excluded.start_timestamp, \
                 end_timestamp = excluded.end_timestamp, \
                 reward_budget = excluded.reward_budget, \
                 reward_per_point = excluded.reward_per_point, \
                 active = excluded.active, \
                 closed_tx_hash = excluded.closed_tx_hash, \
                 last_updated_tx_hash = excluded.last_updated_tx_hash, \
                 opened_at = excluded.opened_at, \
                 closed_at = excluded.closed_at",
            params![
                challenge.id,
                challenge.creator,
                challenge.start_timestamp,
                challenge.end_timestamp,
                challenge.reward_budget,
                challenge.reward_per_point,
                challenge.active,
                challenge.created_tx_hash,
                challenge.closed_tx_hash,
                challenge.last_updated_tx_hash,
                challenge.opened_at,
                challenge.closed_at,
            ],
        )?;
        Ok(())
    }

    async fn save_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO challenge_participants (challenge_id, address, score, \
             join_tx_hash, joined_at, last_update_tx_hash, last_score_change_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(challenge_id, address) DO UPDATE SET \
                 score = excluded.score, \
                 join_tx_hash = excluded.join_tx_hash, \
                 joined_at = excluded.joined_at, \
                 last_update_tx_hash = excluded.last_update_tx_hash, \
                 last_score_change_at = excluded.last_score_change_at",
            params![
                participant.challenge_id,
                participant.address,
                participant.score,
                participant.join_tx_hash,
                participant.joined_at,
                participant.last_update_tx_hash,
                participant.last_score_change_at,
            ],
        )?;
        Ok(())
    }
}

/// In-memory store backend. Used by unit and integration tests; behaves
/// like the SQLite backend minus durability.
#[derive(Default)]
pub struct MemoryChallengeStore {
    challenges: Mutex<HashMap<String, Challenge>>,
    participants: Mutex<HashMap<(String, String), Participant>>,
}

impl MemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChallengeStore for MemoryChallengeStore {
    async fn find_challenge(&self, id: &str) -> Result<Option<Challenge>, StoreError> {
        Ok(self.challenges.lock().unwrap().get(id).cloned())
    }

    async fn find_active_challenge(&self) -> Result<Option<Challenge>, StoreError> {
        Ok(self
            .challenges
            .lock()
            .unwrap()
            .values()
            .find(|c| c.active)
            .cloned())
    }

    async fn find_participant(
        &self,
        challenge_id: &str,
        address: &str,
    ) -> Result<Option<Participant>, StoreError> {
        Ok(self
            .participants
            .lock()
            .unwrap()
            .get(&(challenge_id.to_owned(), address.to_owned()))
            .cloned())
    }

    async fn save_challenge(&self, challenge: &Challenge) -> Result<(), StoreError> {
        self.challenges
            .lock()
            .unwrap()
            .insert(challenge.id.clone(), challenge.clone());
        Ok(())
    }

    async fn save_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        self.participants.lock().unwrap().insert(
            (
                participant.challenge_id.clone(),
                participant.address.clone(),
            ),
            participant.clone(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_challenge(id: &str, active: bool) -> Challenge {
        Challenge {
            id: id.to_owned(),
            creator: Some("erd1alice".to_owned()),
            start_timestamp: 100,
            end_timestamp: 200,
            reward_budget: "1000".to_owned(),
            reward_per_point: "10".to_owned(),
            active,
            created_tx_hash: id.to_owned(),
            closed_tx_hash: None,
            last_updated_tx_hash: id.to_owned(),
            opened_at: Some(100),
            closed_at: None,
        }
    }

    fn open_temp_store() -> (NamedTempFile, SqliteChallengeStore) {
        let temp = NamedTempFile::new().unwrap();
        let store = SqliteChallengeStore::open(temp.path().to_str().unwrap()).unwrap();
        (temp, store)
    }

    #[tokio::test]
    async fn test_sqlite_challenge_roundtrip() {
        let (_temp, store) = open_temp_store();

        let challenge = sample_challenge("0xA", true);
        store.save_challenge(&challenge).await.unwrap();

        let found = store.find_challenge("0xA").await.unwrap().unwrap();
        assert_eq!(found, challenge);
        assert!(store.find_challenge("0xMISSING").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_active_lookup_follows_updates() {
        let (_temp, store) = open_temp_store();

        let mut challenge = sample_challenge("0xA", true);
        store.save_challenge(&challenge).await.unwrap();
        assert_eq!(
            store.find_active_challenge().await.unwrap().unwrap().id,
            "0xA"
        );

        // Deactivate via save; the active lookup must follow
        challenge.active = false;
        challenge.closed_tx_hash = Some("0xD".to_owned());
        store.save_challenge(&challenge).await.unwrap();
        assert!(store.find_active_challenge().await.unwrap().is_none());

        let found = store.find_challenge("0xA").await.unwrap().unwrap();
        assert_eq!(found.closed_tx_hash.as_deref(), Some("0xD"));
    }

    #[tokio::test]
    async fn test_sqlite_participant_roundtrip() {
        let (_temp, store) = open_temp_store();

        let participant = Participant {
            challenge_id: "0xA".to_owned(),
            address: "erd1bob".to_owned(),
            score: "5".to_owned(),
            join_tx_hash: "0xB".to_owned(),
            joined_at: Some(150),
            last_update_tx_hash: None,
            last_score_change_at: None,
        };
        store.save_participant(&participant).await.unwrap();

        let found = store
            .find_participant("0xA", "erd1bob")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, participant);
        assert!(store
            .find_participant("0xA", "erd1carol")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_sqlite_save_is_an_upsert() {
        let (_temp, store) = open_temp_store();

        let mut participant = Participant {
            challenge_id: "0xA".to_owned(),
            address: "erd1bob".to_owned(),
            score: "0".to_owned(),
            join_tx_hash: "0xB".to_owned(),
            joined_at: Some(150),
            last_update_tx_hash: None,
            last_score_change_at: None,
        };
        store.save_participant(&participant).await.unwrap();

        participant.score = "7".to_owned();
        participant.last_update_tx_hash = Some("0xC".to_owned());
        store.save_participant(&participant).await.unwrap();

        let found = store
            .find_participant("0xA", "erd1bob")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.score, "7");
        assert_eq!(found.last_update_tx_hash.as_deref(), Some("0xC"));
    }

    #[tokio::test]
    async fn test_memory_store_matches_contract() {
        let store = MemoryChallengeStore::new();
        let challenge = sample_challenge("0xA", true);
        store.save_challenge(&challenge).await.unwrap();

        assert_eq!(
            store.find_active_challenge().await.unwrap().unwrap().id,
            "0xA"
        );
        assert_eq!(store.find_challenge("0xA").await.unwrap(), Some(challenge));
    }
}
