//! Fan-out of one body call across a resolved session list.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::StreamExt;

use crate::callable::Callable;
use crate::config::DispatchConfig;
use crate::session::ConnectionError;
use crate::session::SessionHandle;
use crate::session::TeardownReport;
use crate::transport::RemoteInvocationError;
use crate::transport::Transport;
use crate::value::Value;

/// The result of running the body in one session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionOutcome {
    pub session: SessionHandle,
    pub result: Result<Value, RemoteInvocationError>,
}

/// Everything one wrapper invocation produced.
#[derive(Debug)]
pub struct DispatchReport {
    pub wrapper: String,
    /// One entry per session, in session list order.
    pub outcomes: Vec<SessionOutcome>,
    /// Addresses skipped because their session could not be opened.
    pub unreachable: Vec<ConnectionError>,
    pub teardown: TeardownReport,
}

impl DispatchReport {
    /// True when every session succeeded and no address was skipped.
    pub fn is_success(&self) -> bool {
        self.unreachable.is_empty() && self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn values(&self) -> Vec<&Value> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok()).collect()
    }

    pub fn errors(&self) -> Vec<(&SessionHandle, &RemoteInvocationError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.session, e)))
            .collect()
    }
}

/// Invokes `body` once per session with the same forwarded arguments.
///
/// At most `config.concurrency` invocations are in flight. A failing or
/// panicking session never stops the others, and outcomes come back in
/// session order.
pub async fn dispatch(
    transport: &dyn Transport,
    body: &Arc<dyn Callable>,
    sessions: &[SessionHandle],
    args: &[Value],
    config: &DispatchConfig,
) -> Vec<SessionOutcome> {
    let limit = config.invoke_timeout();

    futures::stream::iter(sessions.iter().cloned())
        .map(|session| async move {
            let result = invoke_one(transport, body, &session, args, limit).await;
            match &result {
                Ok(_) => tracing::debug!(%session, callable = body.name(), "body completed"),
                Err(e) => tracing::warn!(%session, callable = body.name(), error = %e, "body failed"),
            }
            SessionOutcome { session, result }
        })
        .buffered(config.concurrency.max(1))
        .collect()
        .await
}

async fn invoke_one(
    transport: &dyn Transport,
    body: &Arc<dyn Callable>,
    session: &SessionHandle,
    args: &[Value],
    limit: Option<Duration>,
) -> Result<Value, RemoteInvocationError> {
    // a panic must not unwind past the caller's teardown
    let call = async {
        AssertUnwindSafe(transport.invoke(session, body, args))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(RemoteInvocationError::Panicked(panic_message(&*payload)))
            })
    };
    match limit {
        Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
            let ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
            Err(RemoteInvocationError::Timeout(ms))
        }),
        None => call.await,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use crate::callable::Function;
    use crate::callable::SessionContext;
    use crate::transport::LoopbackTransport;
    use crate::transport::TransportError;

    async fn open_all(transport: &LoopbackTransport, addresses: &[&str]) -> Vec<SessionHandle> {
        let mut sessions = Vec::new();
        for address in addresses {
            sessions.push(transport.open(address, None).await.unwrap());
        }
        sessions
    }

    fn echo_address() -> Arc<dyn Callable> {
        Arc::new(Function::new("where", |ctx, _args| {
            Ok(Value::from(ctx.session().address.clone()))
        }))
    }

    #[tokio::test]
    async fn test_dispatch_in_list_order() {
        let transport = LoopbackTransport::new();
        let sessions = open_all(&transport, &["a", "b", "c"]).await;
        let order = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&order);
        let body: Arc<dyn Callable> = Arc::new(Function::new(
            "record",
            move |ctx: &SessionContext, _args| {
                seen.lock().unwrap().push(ctx.session().address.clone());
                Ok(Value::Null)
            },
        ));

        let outcomes =
            dispatch(&transport, &body, &sessions, &[], &DispatchConfig::default()).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_others() {
        let transport = LoopbackTransport::new();
        let sessions = open_all(&transport, &["a", "b", "c"]).await;
        let body: Arc<dyn Callable> = Arc::new(Function::new("picky", |ctx, _args| {
            if ctx.session().address == "b" {
                anyhow::bail!("b is broken");
            }
            Ok(Value::Bool(true))
        }));

        let outcomes =
            dispatch(&transport, &body, &sessions, &[], &DispatchConfig::default()).await;

        assert!(outcomes[0].result.is_ok());
        assert_eq!(
            outcomes[1].result,
            Err(RemoteInvocationError::Failed("b is broken".into()))
        );
        assert!(outcomes[2].result.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_outcomes_keep_session_order() {
        let transport = LoopbackTransport::new();
        let sessions = open_all(&transport, &["a", "b", "c", "d"]).await;
        let config = DispatchConfig::default().with_concurrency(4);

        let outcomes = dispatch(&transport, &echo_address(), &sessions, &[], &config).await;
        let values: Vec<_> = outcomes.iter().map(|o| o.result.clone().unwrap()).collect();

        assert_eq!(
            values,
            vec![
                Value::from("a"),
                Value::from("b"),
                Value::from("c"),
                Value::from("d"),
            ]
        );
    }

    #[tokio::test]
    async fn test_panicking_body_is_contained_per_session() {
        let transport = LoopbackTransport::new();
        let sessions = open_all(&transport, &["a", "b", "c"]).await;
        let body: Arc<dyn Callable> = Arc::new(Function::new("fragile", |ctx, _args| {
            if ctx.session().address == "b" {
                panic!("fragile body gave up on {}", ctx.session().address);
            }
            Ok(Value::Bool(true))
        }));
        let config = DispatchConfig::default().with_concurrency(3);

        let outcomes = dispatch(&transport, &body, &sessions, &[], &config).await;

        assert_eq!(outcomes[0].result, Ok(Value::Bool(true)));
        assert_eq!(
            outcomes[1].result,
            Err(RemoteInvocationError::Panicked("fragile body gave up on b".into()))
        );
        assert_eq!(outcomes[2].result, Ok(Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_closed_session_reports_transport_error() {
        let transport = LoopbackTransport::new();
        let sessions = open_all(&transport, &["a"]).await;
        transport.close(&sessions[0]).await.unwrap();

        let config = DispatchConfig::default();
        let outcomes = dispatch(&transport, &echo_address(), &sessions, &[], &config).await;
        assert!(matches!(
            outcomes[0].result,
            Err(RemoteInvocationError::Transport(TransportError::SessionClosed(_)))
        ));
    }

    #[tokio::test]
    async fn test_empty_session_list() {
        let transport = LoopbackTransport::new();
        let config = DispatchConfig::default();
        let outcomes = dispatch(&transport, &echo_address(), &[], &[], &config).await;
        assert!(outcomes.is_empty());
    }
}
