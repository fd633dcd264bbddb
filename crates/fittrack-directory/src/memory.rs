//! In-process directory actor.
//!
//! The records live in a single Tokio task that owns them outright; the
//! rest of the application talks to it through an mpsc channel and gets
//! answers back on oneshot channels. That is the same request/response
//! shape a remote table has, so code written against [`DirectoryHandle`]
//! behaves the way it will against the hosted store.
//!
//! # Fault injection
//!
//! The handle simulates the network before a command is sent:
//! - [`set_offline`](DirectoryHandle::set_offline) → every call fails with
//!   [`DirectoryError::Network`]
//! - [`fail_writes`](DirectoryHandle::fail_writes) → inserts, updates and
//!   deletes fail with [`DirectoryError::Rejected`]; reads still work
//! - [`set_latency`](DirectoryHandle::set_latency) → every call is delayed

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use fittrack_model::{NewUserRecord, Role, UserId, UserPatch, UserRecord};
use tokio::sync::{mpsc, oneshot};

use crate::{DirectoryError, UserDirectory};

/// Default command channel size for the directory actor.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Commands sent to the directory actor through its channel.
///
/// The `oneshot::Sender` in each variant is the reply channel: the caller
/// sends a command and waits for the answer on it.
enum DirectoryCommand {
    Select {
        id: UserId,
        reply: oneshot::Sender<Result<UserRecord, DirectoryError>>,
    },
    Insert {
        record: NewUserRecord,
        reply: oneshot::Sender<Result<UserRecord, DirectoryError>>,
    },
    Update {
        id: UserId,
        patch: UserPatch,
        reply: oneshot::Sender<Result<(), DirectoryError>>,
    },
    Delete {
        id: UserId,
        reply: oneshot::Sender<Result<(), DirectoryError>>,
    },
    List {
        reply: oneshot::Sender<Vec<UserRecord>>,
    },
    ExistsWithRole {
        role: Role,
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Entry point for spawning an in-process directory.
pub struct MemoryDirectory;

impl MemoryDirectory {
    /// Spawns an empty directory actor and returns a handle to it.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn spawn() -> DirectoryHandle {
        Self::spawn_with_capacity(DEFAULT_CHANNEL_SIZE)
    }

    /// Like [`spawn`](Self::spawn), with an explicit command channel size.
    /// When the channel is full, callers wait (bounded channel).
    pub fn spawn_with_capacity(channel_size: usize) -> DirectoryHandle {
        let (tx, rx) = mpsc::channel(channel_size);

        let actor = DirectoryActor {
            records: HashMap::new(),
            next_seq: 0,
            receiver: rx,
        };
        tokio::spawn(actor.run());

        DirectoryHandle {
            sender: tx,
            faults: Arc::new(Faults::default()),
        }
    }
}

#[derive(Default)]
struct Faults {
    offline: AtomicBool,
    fail_writes: AtomicBool,
    latency_ms: AtomicU64,
}

/// Handle to a running directory actor. Cheap to clone; all clones share
/// the same records and the same fault settings.
#[derive(Clone)]
pub struct DirectoryHandle {
    sender: mpsc::Sender<DirectoryCommand>,
    faults: Arc<Faults>,
}

impl DirectoryHandle {
    /// While `true`, every call fails with [`DirectoryError::Network`].
    pub fn set_offline(&self, offline: bool) {
        self.faults.offline.store(offline, Ordering::SeqCst);
    }

    /// While `true`, writes fail with [`DirectoryError::Rejected`].
    pub fn fail_writes(&self, fail: bool) {
        self.faults.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.faults.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Tells the actor to stop. Later calls fail with
    /// [`DirectoryError::Unavailable`].
    pub async fn shutdown(&self) -> Result<(), DirectoryError> {
        self.sender
            .send(DirectoryCommand::Shutdown)
            .await
            .map_err(|_| DirectoryError::Unavailable)
    }

    async fn round_trip(&self, write: bool) -> Result<(), DirectoryError> {
        let ms = self.faults.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if self.faults.offline.load(Ordering::SeqCst) {
            return Err(DirectoryError::Network("user directory is offline".into()));
        }
        if write && self.faults.fail_writes.load(Ordering::SeqCst) {
            return Err(DirectoryError::Rejected("writes are disabled".into()));
        }
        Ok(())
    }

    /// Sends a command built around a fresh reply channel and waits for
    /// the answer.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> DirectoryCommand,
    ) -> Result<T, DirectoryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| DirectoryError::Unavailable)?;
        reply_rx.await.map_err(|_| DirectoryError::Unavailable)
    }
}

impl UserDirectory for DirectoryHandle {
    async fn ensure_schema(&self) -> Result<(), DirectoryError> {
        self.round_trip(false).await?;
        // The actor's map is the table; there is nothing to create.
        tracing::debug!("in-memory user directory schema ready");
        Ok(())
    }

    async fn select_by_id(&self, id: UserId) -> Result<UserRecord, DirectoryError> {
        self.round_trip(false).await?;
        self.request(|reply| DirectoryCommand::Select { id, reply })
            .await?
    }

    async fn insert(&self, record: NewUserRecord) -> Result<UserRecord, DirectoryError> {
        self.round_trip(true).await?;
        self.request(|reply| DirectoryCommand::Insert { record, reply })
            .await?
    }

    async fn update_by_id(&self, id: UserId, patch: UserPatch) -> Result<(), DirectoryError> {
        self.round_trip(true).await?;
        self.request(|reply| DirectoryCommand::Update { id, patch, reply })
            .await?
    }

    async fn delete_by_id(&self, id: UserId) -> Result<(), DirectoryError> {
        self.round_trip(true).await?;
        self.request(|reply| DirectoryCommand::Delete { id, reply })
            .await?
    }

    async fn list_all(&self) -> Result<Vec<UserRecord>, DirectoryError> {
        self.round_trip(false).await?;
        self.request(|reply| DirectoryCommand::List { reply }).await
    }

    async fn exists_with_role(&self, role: Role) -> Result<bool, DirectoryError> {
        self.round_trip(false).await?;
        self.request(|reply| DirectoryCommand::ExistsWithRole { role, reply })
            .await
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The internal actor state. Runs inside a Tokio task.
struct DirectoryActor {
    /// Records with their insertion sequence number, used to break
    /// `created_at` ties when listing.
    records: HashMap<UserId, (u64, UserRecord)>,
    next_seq: u64,
    receiver: mpsc::Receiver<DirectoryCommand>,
}

impl DirectoryActor {
    /// Runs the actor loop, processing commands until shutdown or until
    /// every handle is dropped.
    async fn run(mut self) {
        tracing::debug!("user directory actor started");

        while let Some(cmd) = self.receiver.recv().await {
            // A dropped reply receiver means the caller stopped waiting
            // (its future was cancelled). The write still happened.
            match cmd {
                DirectoryCommand::Select { id, reply } => {
                    let _ = reply.send(self.select(id));
                }
                DirectoryCommand::Insert { record, reply } => {
                    let _ = reply.send(self.insert(record));
                }
                DirectoryCommand::Update { id, patch, reply } => {
                    let _ = reply.send(self.update(id, &patch));
                }
                DirectoryCommand::Delete { id, reply } => {
                    let _ = reply.send(self.delete(id));
                }
                DirectoryCommand::List { reply } => {
                    let _ = reply.send(self.list());
                }
                DirectoryCommand::ExistsWithRole { role, reply } => {
                    let exists = self.records.values().any(|(_, r)| r.role == role);
                    let _ = reply.send(exists);
                }
                DirectoryCommand::Shutdown => {
                    tracing::debug!("user directory shutting down");
                    break;
                }
            }
        }

        tracing::debug!("user directory actor stopped");
    }

    fn select(&self, id: UserId) -> Result<UserRecord, DirectoryError> {
        self.records
            .get(&id)
            .map(|(_, r)| r.clone())
            .ok_or(DirectoryError::NotFound(id))
    }

    fn insert(&mut self, record: NewUserRecord) -> Result<UserRecord, DirectoryError> {
        if self.records.contains_key(&record.id) {
            return Err(DirectoryError::DuplicateId(record.id));
        }
        if self.email_taken(&record.email) {
            return Err(DirectoryError::DuplicateEmail(record.email));
        }

        let stored = record.into_record(Utc::now());
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.insert(stored.id, (seq, stored.clone()));

        tracing::info!(id = %stored.id, role = %stored.role, "user record inserted");
        Ok(stored)
    }

    fn update(&mut self, id: UserId, patch: &UserPatch) -> Result<(), DirectoryError> {
        let (_, record) = self
            .records
            .get_mut(&id)
            .ok_or(DirectoryError::NotFound(id))?;
        patch.apply_to(record);
        tracing::debug!(%id, "user record updated");
        Ok(())
    }

    fn delete(&mut self, id: UserId) -> Result<(), DirectoryError> {
        self.records
            .remove(&id)
            .map(|_| tracing::info!(%id, "user record deleted"))
            .ok_or(DirectoryError::NotFound(id))
    }

    fn list(&self) -> Vec<UserRecord> {
        let mut rows: Vec<&(u64, UserRecord)> = self.records.values().collect();
        // Newest first; later inserts win ties.
        rows.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });
        rows.into_iter().map(|(_, r)| r.clone()).collect()
    }

    fn email_taken(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.records
            .values()
            .any(|(_, r)| r.email.to_lowercase() == email)
    }
}
