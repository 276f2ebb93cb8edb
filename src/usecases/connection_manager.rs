//! Connection Manager - Single-Session Lifecycle
//!
//! Owns the one database session and walks it through
//! `Unconnected -> Connecting -> Verified`:
//! - No session held: open, probe, keep on success, close on failure
//! - Session held: re-probe; on failure close it and reconnect once
//! - A second consecutive failure is returned to the caller as-is

use tracing::{info, instrument, warn};

use crate::domain::ServerVersion;
use crate::error::ConnectionError;
use crate::ports::{Connector, DatabaseSession};
use crate::usecases::version_probe::VersionProbe;

/// Observable lifecycle state of the managed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session held.
    Unconnected,
    /// A session is being opened and probed.
    Connecting,
    /// A probed session is held; collectors may run.
    Verified,
}

/// A session paired with the version it was probed at.
struct VerifiedSession<S> {
    session: S,
    version: ServerVersion,
}

/// Owns at most one verified database session.
pub struct ConnectionManager<K: Connector> {
    /// Opens new sessions against the configured endpoint.
    connector: K,
    /// The held session, if any.
    current: Option<VerifiedSession<K::Session>>,
    /// Lifecycle state, kept in step with `current`.
    state: ConnectionState,
}

impl<K: Connector> ConnectionManager<K> {
    /// Create a manager that has not connected yet.
    pub fn new(connector: K) -> Self {
        Self {
            connector,
            current: None,
            state: ConnectionState::Unconnected,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Return a verified session, connecting or reconnecting if needed.
    ///
    /// At most one reconnect is attempted per call.
    #[instrument(skip(self), fields(state = ?self.state))]
    pub async fn ensure_connection(
        &mut self,
    ) -> Result<(&K::Session, ServerVersion), ConnectionError> {
        let verified = match self.current.take() {
            Some(held) => match VersionProbe::probe(&held.session).await {
                Ok(_) => held,
                Err(e) => {
                    warn!(error = %e, "Held connection failed verification, reconnecting");
                    held.session.close().await;
                    self.state = ConnectionState::Unconnected;
                    self.connect().await?
                }
            },
            None => self.connect().await?,
        };

        let verified = self.current.insert(verified);
        Ok((&verified.session, verified.version))
    }

    /// Close and drop the held session, if any.
    pub async fn close(&mut self) {
        if let Some(held) = self.current.take() {
            held.session.close().await;
        }
        self.state = ConnectionState::Unconnected;
    }

    /// Open and probe a fresh session.
    async fn connect(&mut self) -> Result<VerifiedSession<K::Session>, ConnectionError> {
        debug_assert!(self.current.is_none(), "previous session still held");
        self.state = ConnectionState::Connecting;

        let session = match self.connector.open().await {
            Ok(session) => session,
            Err(e) => {
                self.state = ConnectionState::Unconnected;
                return Err(ConnectionError::Open(e));
            }
        };

        match VersionProbe::probe(&session).await {
            Ok(version) => {
                self.state = ConnectionState::Verified;
                info!(version = %version, "Database connection verified");
                Ok(VerifiedSession { session, version })
            }
            Err(e) => {
                session.close().await;
                self.state = ConnectionState::Unconnected;
                Err(ConnectionError::Probe(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::error::{DatabaseError, ProbeError};

    const GP6: &str = "PostgreSQL 9.4.24 (Greenplum Database 6.20.0 build commit:x)";

    /// Session answering probes from a script; an empty script answers GP6.
    #[derive(Debug)]
    struct ScriptedSession {
        banners: Mutex<VecDeque<Result<String, String>>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl DatabaseSession for ScriptedSession {
        async fn version_banner(&self) -> Result<String, DatabaseError> {
            let next = self.banners.lock().unwrap().pop_front();
            match next {
                Some(Ok(banner)) => Ok(banner),
                Some(Err(message)) => Err(DatabaseError::other(message)),
                None => Ok(GP6.to_string()),
            }
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Connector handing out scripted sessions; `None` means the open fails.
    #[derive(Default)]
    struct ScriptedConnector {
        sessions: Mutex<VecDeque<Option<Vec<Result<String, String>>>>>,
        opened: AtomicUsize,
        closed_flags: Mutex<Vec<Arc<AtomicBool>>>,
    }

    impl ScriptedConnector {
        fn with(sessions: Vec<Option<Vec<Result<String, String>>>>) -> Self {
            Self {
                sessions: Mutex::new(sessions.into()),
                ..Default::default()
            }
        }

        fn closed(&self, index: usize) -> bool {
            self.closed_flags.lock().unwrap()[index].load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        type Session = ScriptedSession;

        async fn open(&self) -> Result<ScriptedSession, DatabaseError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let next = self.sessions.lock().unwrap().pop_front().flatten();
            let banners = next.ok_or_else(|| DatabaseError::other("connection refused"))?;
            let closed = Arc::new(AtomicBool::new(false));
            self.closed_flags.lock().unwrap().push(Arc::clone(&closed));
            Ok(ScriptedSession {
                banners: Mutex::new(banners.into()),
                closed,
            })
        }
    }

    #[tokio::test]
    async fn test_first_call_opens_and_verifies() {
        let mut manager = ConnectionManager::new(ScriptedConnector::with(vec![Some(vec![])]));

        let (_, version) = manager.ensure_connection().await.unwrap();
        assert_eq!(version, ServerVersion::new(6));
        assert_eq!(manager.state(), ConnectionState::Verified);
        assert_eq!(manager.connector.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_healthy_session_is_reused() {
        let mut manager = ConnectionManager::new(ScriptedConnector::with(vec![Some(vec![])]));

        manager.ensure_connection().await.unwrap();
        manager.ensure_connection().await.unwrap();

        assert_eq!(manager.connector.opened.load(Ordering::SeqCst), 1);
        assert!(!manager.connector.closed(0));
    }

    #[tokio::test]
    async fn test_open_failure_leaves_unconnected() {
        let mut manager = ConnectionManager::new(ScriptedConnector::with(vec![None]));

        let err = manager.ensure_connection().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Open(_)));
        assert_eq!(manager.state(), ConnectionState::Unconnected);
        assert!(manager.current.is_none());
    }

    #[tokio::test]
    async fn test_probe_failure_closes_new_session() {
        let mut manager = ConnectionManager::new(ScriptedConnector::with(vec![Some(vec![Ok(
            "PostgreSQL 15.4".to_string(),
        )])]));

        let err = manager.ensure_connection().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Probe(ProbeError::NoVersionMatch(_))));
        assert!(manager.connector.closed(0), "half-verified session must be closed");
        assert_eq!(manager.state(), ConnectionState::Unconnected);
    }

    #[tokio::test]
    async fn test_failed_liveness_reconnects_once() {
        // First session: initial probe ok, liveness probe fails.
        let mut manager = ConnectionManager::new(ScriptedConnector::with(vec![
            Some(vec![Ok(GP6.to_string()), Err("server closed the connection".to_string())]),
            Some(vec![]),
        ]));

        manager.ensure_connection().await.unwrap();
        manager.ensure_connection().await.unwrap();

        assert_eq!(manager.connector.opened.load(Ordering::SeqCst), 2);
        assert!(manager.connector.closed(0));
        assert!(!manager.connector.closed(1));
        assert_eq!(manager.state(), ConnectionState::Verified);
    }

    #[tokio::test]
    async fn test_failed_reconnect_is_not_retried() {
        let mut manager = ConnectionManager::new(ScriptedConnector::with(vec![
            Some(vec![Ok(GP6.to_string()), Err("timeout".to_string())]),
            None,
            Some(vec![]),
        ]));

        manager.ensure_connection().await.unwrap();
        let err = manager.ensure_connection().await.unwrap_err();

        assert!(matches!(err, ConnectionError::Open(_)));
        assert_eq!(manager.connector.opened.load(Ordering::SeqCst), 2);
        assert_eq!(manager.state(), ConnectionState::Unconnected);
    }

    #[tokio::test]
    async fn test_close_drops_held_session() {
        let mut manager = ConnectionManager::new(ScriptedConnector::with(vec![Some(vec![])]));

        manager.ensure_connection().await.unwrap();
        manager.close().await;

        assert!(manager.connector.closed(0));
        assert!(manager.current.is_none());
        assert_eq!(manager.state(), ConnectionState::Unconnected);
    }
}
