//! # Session Resolution and Teardown
//!
//! Each wrapper invocation resolves its [`Remoting`] configuration into a
//! [`SessionList`] before dispatch and hands the same list back to
//! [`teardown`] on every exit path.
//!
//! ## Ownership
//!
//! - Sessions supplied through `session-list` belong to the caller and are
//!   never closed here.
//! - Sessions opened from `target-list` belong to the invocation and are all
//!   closed by teardown, including the ones opened before a failing address.

use std::fmt;
use std::time::Duration;

use crate::config::DispatchConfig;
use crate::config::OpenFailurePolicy;
use crate::remoting::Remoting;
use crate::transport::Transport;
use crate::transport::TransportError;
use crate::value::Credential;

/// Strong type for session identifiers.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// A live connection to a remote execution target.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: SessionId,
    pub address: String,
}

impl SessionHandle {
    pub fn new(id: SessionId, address: impl Into<String>) -> Self {
        Self { id, address: address.into() }
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// Supplied by the wrapper's caller, who keeps responsibility for closing.
    Caller,
    /// Opened by this invocation, which must close them.
    Invocation,
}

/// Ordered sessions for one invocation, tagged with who owns them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionList {
    sessions: Vec<SessionHandle>,
    ownership: Ownership,
}

impl SessionList {
    pub fn borrowed(sessions: Vec<SessionHandle>) -> Self {
        Self { sessions, ownership: Ownership::Caller }
    }

    pub fn owned(sessions: Vec<SessionHandle>) -> Self {
        Self { sessions, ownership: Ownership::Invocation }
    }

    pub fn empty() -> Self {
        Self::borrowed(Vec::new())
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn sessions(&self) -> &[SessionHandle] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Opening a session to one address failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("connection to '{address}' failed: {source}")]
pub struct ConnectionError {
    pub address: String,
    #[source]
    pub source: TransportError,
}

/// Resolution aborted on a connection failure.
///
/// `opened` holds the sessions opened before the failure; they are owned by
/// the invocation and must still go through [`teardown`].
#[derive(Debug)]
pub struct ResolveError {
    pub error: ConnectionError,
    pub opened: SessionList,
}

/// The sessions an invocation will dispatch to.
#[derive(Debug)]
pub struct Resolution {
    pub sessions: SessionList,
    /// Addresses skipped under [`OpenFailurePolicy::Continue`].
    pub failures: Vec<ConnectionError>,
}

/// Resolves the caller's remoting choice into sessions.
///
/// Addresses are opened one at a time in list order.
pub async fn resolve(
    transport: &dyn Transport,
    remoting: &Remoting,
    config: &DispatchConfig,
) -> Result<Resolution, ResolveError> {
    match remoting {
        Remoting::BySession(sessions) => {
            tracing::debug!(count = sessions.len(), "reusing caller sessions");
            Ok(Resolution {
                sessions: SessionList::borrowed(sessions.clone()),
                failures: Vec::new(),
            })
        }
        Remoting::ByAddress { targets, credential } => {
            let mut opened = Vec::with_capacity(targets.len());
            let mut failures = Vec::new();

            for address in targets {
                let timeout = config.open_timeout();
                match open_one(transport, address, credential.as_ref(), timeout).await {
                    Ok(session) => {
                        tracing::debug!(%session, "opened session");
                        opened.push(session);
                    }
                    Err(source) => {
                        let error = ConnectionError { address: address.clone(), source };
                        tracing::warn!(%error, "failed to open session");
                        match config.on_open_failure {
                            OpenFailurePolicy::Abort => {
                                return Err(ResolveError {
                                    error,
                                    opened: SessionList::owned(opened),
                                });
                            }
                            OpenFailurePolicy::Continue => failures.push(error),
                        }
                    }
                }
            }

            Ok(Resolution {
                sessions: SessionList::owned(opened),
                failures,
            })
        }
        Remoting::Unspecified => Ok(Resolution {
            sessions: SessionList::empty(),
            failures: Vec::new(),
        }),
    }
}

async fn open_one(
    transport: &dyn Transport,
    address: &str,
    credential: Option<&Credential>,
    timeout: Option<Duration>,
) -> Result<SessionHandle, TransportError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, transport.open(address, credential))
            .await
            .map_err(|_| TransportError::Timeout)?,
        None => transport.open(address, credential).await,
    }
}

/// What teardown did with a session list.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub closed: Vec<SessionHandle>,
    pub failures: Vec<(SessionHandle, TransportError)>,
}

/// Closes the sessions an invocation owns.
///
/// Caller-owned lists are left untouched. A failure to close one session is
/// logged and recorded, and the remaining sessions are still closed.
pub async fn teardown(
    transport: &dyn Transport,
    remoting: &Remoting,
    sessions: SessionList,
) -> TeardownReport {
    let mut report = TeardownReport::default();

    if !remoting.owns_sessions() || sessions.ownership() != Ownership::Invocation {
        tracing::debug!(count = sessions.len(), "leaving caller-owned sessions open");
        return report;
    }

    for session in sessions.sessions {
        match transport.close(&session).await {
            Ok(()) => {
                tracing::debug!(%session, "closed session");
                report.closed.push(session);
            }
            Err(e) => {
                tracing::warn!(%session, error = %e, "failed to close session");
                report.failures.push((session, e));
            }
        }
    }

    report
}
