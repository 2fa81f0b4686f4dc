//! # Transport Abstraction
//!
//! The remote-session transport a wrapper dispatches through.
//!
//! ## Philosophy
//!
//! - **Session-Oriented**: The transport opens and closes sessions and runs a
//!   body inside one. It knows nothing about parameter sets, forwarding or
//!   ownership; those stay in the wrapper.
//! - **Object-Safe**: Runtimes hold it as `Arc<dyn Transport>`.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use dashmap::DashSet;

use crate::callable::Callable;
use crate::callable::SessionContext;
use crate::session::SessionHandle;
use crate::session::SessionId;
use crate::value::Credential;
use crate::value::Value;

/// Errors that occur at the connection layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The remote endpoint could not be reached or refused the connection.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    /// The endpoint rejected the supplied credential.
    #[error("authentication failed for {0}")]
    AuthenticationFailed(String),
    /// The operation did not complete in time.
    #[error("operation timed out")]
    Timeout,
    /// The session is not open (never opened, or already closed).
    #[error("{0} is not open")]
    SessionClosed(SessionId),
    /// Generic I/O error or internal transport failure.
    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A failed invocation of a body inside one session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteInvocationError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    /// The body ran and returned an error.
    #[error("remote body failed: {0}")]
    Failed(String),
    #[error("remote invocation timed out after {0} ms")]
    Timeout(u64),
    /// The body panicked; the payload message is kept when it is a string.
    #[error("remote body panicked: {0}")]
    Panicked(String),
}

/// A mechanism to open remote sessions and run callables inside them.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens a session to `address`, presenting `credential` if given.
    async fn open(&self, address: &str, credential: Option<&Credential>) -> Result<SessionHandle>;

    /// Closes a session. Closing a session that is already closed succeeds.
    async fn close(&self, session: &SessionHandle) -> Result<()>;

    /// Runs `body` inside `session` with positional `args`.
    async fn invoke(
        &self,
        session: &SessionHandle,
        body: &Arc<dyn Callable>,
        args: &[Value],
    ) -> std::result::Result<Value, RemoteInvocationError>;
}

/// In-process transport: sessions are simulated and bodies run locally.
///
/// Addresses can be marked unreachable and a credential can be demanded, so
/// callers can exercise connection and authentication failures.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    sessions: DashMap<SessionId, SessionHandle>,
    refused: DashSet<String>,
    required_credential: Option<Credential>,
    next_id: AtomicU64,
    opened_total: AtomicU64,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `open` to `address` fail with `ConnectionRefused`.
    pub fn refuse(self, address: impl Into<String>) -> Self {
        self.refused.insert(address.into());
        self
    }

    /// Makes `open` fail with `AuthenticationFailed` unless `credential` is presented.
    pub fn require_credential(mut self, credential: Credential) -> Self {
        self.required_credential = Some(credential);
        self
    }

    pub fn is_open(&self, session: &SessionHandle) -> bool {
        self.sessions.contains_key(&session.id)
    }

    /// Currently open sessions, ordered by id.
    pub fn open_sessions(&self) -> Vec<SessionHandle> {
        let mut open: Vec<SessionHandle> =
            self.sessions.iter().map(|e| e.value().clone()).collect();
        open.sort_by_key(|s| s.id);
        open
    }

    /// Number of sessions ever opened through this transport.
    pub fn opened_total(&self) -> u64 {
        self.opened_total.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Transport for LoopbackTransport {
    async fn open(&self, address: &str, credential: Option<&Credential>) -> Result<SessionHandle> {
        if self.refused.contains(address) {
            return Err(TransportError::ConnectionRefused(address.to_string()));
        }
        if let Some(required) = &self.required_credential {
            if credential != Some(required) {
                return Err(TransportError::AuthenticationFailed(address.to_string()));
            }
        }

        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let session = SessionHandle::new(id, address);
        self.sessions.insert(id, session.clone());
        self.opened_total.fetch_add(1, Ordering::Relaxed);
        Ok(session)
    }

    async fn close(&self, session: &SessionHandle) -> Result<()> {
        self.sessions.remove(&session.id);
        Ok(())
    }

    async fn invoke(
        &self,
        session: &SessionHandle,
        body: &Arc<dyn Callable>,
        args: &[Value],
    ) -> std::result::Result<Value, RemoteInvocationError> {
        if !self.is_open(session) {
            return Err(TransportError::SessionClosed(session.id).into());
        }

        let ctx = SessionContext::new(session.clone());
        body.call(&ctx, args)
            .await
            .map_err(|e| RemoteInvocationError::Failed(format!("{:#}", e)))
    }
}
