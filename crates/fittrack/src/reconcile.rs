//! Reconciliation: turning "the backend says this session is current" into
//! "this directory record is the current user".
//!
//! Triggers (initialization, session-change notifications, `refresh`) are
//! submitted as [`Pass`]es to a single-slot queue. One worker task runs
//! them. A newer pass overwrites a pending one and cancels a running one,
//! so only the latest trigger's outcome is ever published.

use std::sync::Arc;

use chrono::Utc;
use fittrack_auth::AuthBackend;
use fittrack_directory::{DirectoryError, UserDirectory};
use fittrack_model::{NewUserRecord, Session, SessionChange, UserRecord};
use tokio::sync::{broadcast, watch};

use crate::state::StateCell;
use crate::{SyncConfig, SyncError};

/// Where a pass gets its session from.
#[derive(Debug, Clone)]
pub(crate) enum PassSource {
    /// Ask the backend with `get_session`.
    Query,
    /// Use the session carried by a change notification.
    Change(Option<Session>),
}

#[derive(Debug, Clone)]
pub(crate) struct Pass {
    pub generation: u64,
    pub source: PassSource,
}

/// Everything the synchronizer's tasks and commands share.
pub(crate) struct SyncCore<A, D> {
    pub(crate) auth: A,
    pub(crate) directory: D,
    pub(crate) config: SyncConfig,
    pub(crate) state: StateCell,
    queue: watch::Sender<Option<Pass>>,
}

impl<A: AuthBackend, D: UserDirectory> SyncCore<A, D> {
    /// Returns the core and the receiving end of its pass queue.
    pub(crate) fn new(auth: A, directory: D, config: SyncConfig) -> (Self, watch::Receiver<Option<Pass>>) {
        let (queue, slot) = watch::channel(None);
        let core = Self {
            auth,
            directory,
            config,
            state: StateCell::new(),
            queue,
        };
        (core, slot)
    }

    /// Queues a pass, replacing any pending one. Returns its generation.
    pub(crate) fn submit(&self, source: PassSource) -> u64 {
        let generation = self.state.next_generation();
        self.queue.send_replace(Some(Pass { generation, source }));
        generation
    }

    /// Fetches the record for `session`'s subject, provisioning a customer
    /// record if there is none.
    pub(crate) async fn resolve_user(&self, session: &Session) -> Result<UserRecord, SyncError> {
        let subject = session.subject;
        match self.directory.select_by_id(subject).await {
            Ok(record) => return Ok(record),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(SyncError::read(e)),
        }

        tracing::info!(%subject, "no user record for session; provisioning customer");
        match self
            .directory
            .insert(NewUserRecord::customer(subject, &session.email))
            .await
        {
            Ok(_) => {}
            Err(DirectoryError::DuplicateId(_)) => {
                tracing::debug!(%subject, "record was provisioned concurrently");
            }
            Err(e) => return Err(SyncError::DirectoryWrite(e)),
        }

        self.directory
            .select_by_id(subject)
            .await
            .map_err(SyncError::read)
    }

    /// Runs one pass to completion and publishes its outcome.
    async fn reconcile(&self, pass: Pass) {
        let session = match pass.source {
            PassSource::Change(session) => session,
            PassSource::Query => match self.auth.get_session().await {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(error = %e, "could not read session; continuing signed out");
                    None
                }
            },
        };

        let user = match session {
            None => None,
            Some(session) if session.is_expired(Utc::now()) => {
                tracing::info!(subject = %session.subject, "session expired");
                None
            }
            Some(session) => match self.resolve_user(&session).await {
                Ok(record) if record.is_suspended => {
                    tracing::warn!(subject = %record.id, "session belongs to a suspended account");
                    None
                }
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::error!(subject = %session.subject, error = %e, "reconciliation failed");
                    None
                }
            },
        };

        self.state.publish(pass.generation, user);
    }
}

/// Runs queued passes until the queue closes.
pub(crate) async fn run_worker<A: AuthBackend, D: UserDirectory>(
    core: Arc<SyncCore<A, D>>,
    mut slot: watch::Receiver<Option<Pass>>,
) {
    tracing::debug!("reconciliation worker started");
    while slot.changed().await.is_ok() {
        loop {
            let Some(pass) = slot.borrow_and_update().clone() else {
                break;
            };
            tokio::select! {
                biased;
                changed = slot.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    tracing::debug!(generation = pass.generation, "reconciliation pass superseded");
                }
                () = core.reconcile(pass.clone()) => break,
            }
        }
    }
    tracing::debug!("reconciliation worker stopped");
}

/// Forwards session-change notifications into the pass queue.
pub(crate) async fn run_listener<A: AuthBackend, D: UserDirectory>(
    core: Arc<SyncCore<A, D>>,
    mut changes: broadcast::Receiver<SessionChange>,
) {
    loop {
        match changes.recv().await {
            Ok(change) => {
                tracing::debug!(kind = ?change.kind, "session changed");
                core.submit(PassSource::Change(change.session));
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "missed session changes; re-querying session");
                core.submit(PassSource::Query);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    tracing::debug!("session change listener stopped");
}

#[cfg(test)]
mod tests {
    use fittrack_auth::MemoryAuthBackend;
    use fittrack_directory::MemoryDirectory;
    use fittrack_model::{Role, UserPatch};

    use super::*;

    async fn signed_in_core() -> (SyncCore<MemoryAuthBackend, fittrack_directory::DirectoryHandle>, Session) {
        let auth = MemoryAuthBackend::new();
        auth.sign_up("a@x.com", "pw123456").await.unwrap();
        let session = auth.sign_in_with_password("a@x.com", "pw123456").await.unwrap();
        let (core, _slot) = SyncCore::new(auth, MemoryDirectory::spawn(), SyncConfig::default());
        (core, session)
    }

    #[tokio::test]
    async fn test_resolve_user_provisions_missing_record_as_customer() {
        let (core, session) = signed_in_core().await;

        let record = core.resolve_user(&session).await.unwrap();

        assert_eq!(record.id, session.subject);
        assert_eq!(record.email, "a@x.com");
        assert_eq!(record.role, Role::Customer);
        assert!(!record.is_suspended);
    }

    #[tokio::test]
    async fn test_resolve_user_returns_existing_record() {
        let (core, session) = signed_in_core().await;
        core.directory
            .insert(NewUserRecord::new(session.subject, "a@x.com", Role::Admin))
            .await
            .unwrap();

        let record = core.resolve_user(&session).await.unwrap();
        assert_eq!(record.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_resolve_user_read_outage_is_network_error() {
        let (core, session) = signed_in_core().await;
        core.directory.set_offline(true);

        let err = core.resolve_user(&session).await.unwrap_err();
        assert!(err.is_network(), "{err:?}");
    }

    #[tokio::test]
    async fn test_resolve_user_failed_provision_is_directory_write() {
        let (core, session) = signed_in_core().await;
        core.directory.fail_writes(true);

        let err = core.resolve_user(&session).await.unwrap_err();
        assert!(matches!(err, SyncError::DirectoryWrite(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_reconcile_suspended_record_publishes_no_user() {
        let (core, session) = signed_in_core().await;
        core.resolve_user(&session).await.unwrap();
        core.directory
            .update_by_id(session.subject, UserPatch::default().with_suspended(true))
            .await
            .unwrap();

        let generation = core.state.next_generation();
        core.reconcile(Pass {
            generation,
            source: PassSource::Change(Some(session)),
        })
        .await;

        let state = core.state.snapshot();
        assert!(state.is_ready);
        assert!(state.current_user.is_none());
    }

    #[tokio::test]
    async fn test_reconcile_query_reads_backend_session() {
        let (core, session) = signed_in_core().await;

        let generation = core.state.next_generation();
        core.reconcile(Pass {
            generation,
            source: PassSource::Query,
        })
        .await;

        let user = core.state.snapshot().current_user.unwrap();
        assert_eq!(user.id, session.subject);
    }

    #[tokio::test]
    async fn test_reconcile_expired_session_publishes_no_user() {
        let (core, mut session) = signed_in_core().await;
        session.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));

        let generation = core.state.next_generation();
        core.reconcile(Pass {
            generation,
            source: PassSource::Change(Some(session)),
        })
        .await;

        assert!(core.state.snapshot().current_user.is_none());
    }
}
