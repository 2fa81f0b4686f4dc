//! # Wrappers
//!
//! An installed wrapper pairs a compiled [`WrapperSpec`] with the body handle
//! that was resolved when it was installed.
//!
//! ## Invocation
//!
//! 1. Bind named arguments against the declared parameters and pick the
//!    parameter set (`by-address`, `by-session`, or neither).
//! 2. Resolve the remoting choice into sessions.
//! 3. Dispatch the body to every session with the forwarded arguments.
//! 4. Tear down the sessions the invocation opened, on every exit path.

use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::builder;
use crate::callable::Callable;
use crate::config::DispatchConfig;
use crate::decl::ParamSpec;
use crate::decl::TypeExpr;
use crate::dispatch;
use crate::dispatch::DispatchReport;
use crate::extract::ExtractedSignature;
use crate::remoting;
use crate::remoting::Remoting;
use crate::remoting::RemotingParameterSet;
use crate::session;
use crate::session::ConnectionError;
use crate::template;
use crate::transport::Transport;
use crate::value::Value;

/// The compiled form of a wrapper definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrapperSpec {
    /// Every declared parameter, remoting parameters first.
    pub params: Vec<ParamSpec>,
    /// Names passed positionally to the body, in order.
    pub forward: Vec<String>,
    /// Name of the callable the body resolves to.
    pub body: String,
}

impl WrapperSpec {
    /// Builds a `WrapperSpec` straight from a signature, without going through text.
    ///
    /// Produces the same spec as compiling the definition the default template
    /// would generate for `signature`.
    pub fn from_signature(
        signature: &ExtractedSignature,
        remoting: &RemotingParameterSet,
    ) -> Result<Self, builder::Error> {
        let mut params = remoting.params().to_vec();
        for descriptor in &signature.parameters {
            if remoting.contains(&descriptor.name) {
                return Err(template::Error::DuplicateParameterName(descriptor.name.clone()).into());
            }
            let spec = descriptor.spec()?;
            if spec.name != descriptor.name {
                return Err(builder::Error::DeclarationName {
                    descriptor: descriptor.name.clone(),
                    declared: spec.name,
                });
            }
            params.push(spec);
        }

        Ok(Self {
            params,
            forward: signature.parameter_names().map(String::from).collect(),
            body: signature.name.clone(),
        })
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Renders definition text in the stock layout.
    pub fn render(&self) -> String {
        let decls: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        template::stock_layout(
            &template::params_fragment(decls.iter().map(String::as_str)),
            &template::forward_fragment(self.forward.iter().map(String::as_str)),
            &template::body_fragment(&self.body),
        )
    }
}

/// Named arguments for one wrapper invocation, in the order given.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args {
    entries: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Binds `target-list`.
    pub fn targets<I, S>(self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<Value> = addresses.into_iter().map(|a| Value::String(a.into())).collect();
        self.with(remoting::TARGET_LIST, Value::List(list))
    }

    /// Binds `session-list`.
    pub fn sessions(self, sessions: impl IntoIterator<Item = session::SessionHandle>) -> Self {
        let list: Vec<Value> = sessions.into_iter().map(Value::Session).collect();
        self.with(remoting::SESSION_LIST, Value::List(list))
    }

    /// Binds `credential`.
    pub fn credential(self, credential: crate::value::Credential) -> Self {
        self.with(remoting::CREDENTIAL, credential)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("no parameter named '{0}'")]
    UnknownParameter(String),
    #[error("parameter '{0}' bound more than once")]
    DuplicateArgument(String),
    #[error("parameter '{param}' expects {expected}, got {found}")]
    TypeMismatch {
        param: String,
        expected: String,
        found: &'static str,
    },
    #[error("parameter '{param}' value {value} is outside {min}..={max}")]
    OutOfRange {
        param: String,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("parameters from sets '{first}' and '{second}' cannot be combined")]
    ParameterSetConflict { first: String, second: String },
    #[error("missing required parameter '{0}'")]
    MissingRequired(String),
}

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("wrapper '{0}' is not installed")]
    NotInstalled(String),
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error("no remoting target given: bind '{}' or '{}'", remoting::TARGET_LIST, remoting::SESSION_LIST)]
    NoTarget,
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// No target could be opened; one entry per address, in target order.
    #[error("no target could be reached: {}", join_failures(.0))]
    Unreachable(Vec<ConnectionError>),
}

fn join_failures(failures: &[ConnectionError]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Arguments after binding: the forwarded values and the caller's remoting choice.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundCall {
    /// One value per forwarded name; unbound optional parameters are `Null`.
    pub forward: Vec<Value>,
    pub remoting: Remoting,
}

pub struct Wrapper {
    name: String,
    spec: WrapperSpec,
    definition: String,
    body: Arc<dyn Callable>,
}

impl fmt::Debug for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapper")
            .field("name", &self.name)
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

impl Wrapper {
    pub(crate) fn new(
        name: impl Into<String>,
        spec: WrapperSpec,
        definition: impl Into<String>,
        body: Arc<dyn Callable>,
    ) -> Self {
        Self {
            name: name.into(),
            spec,
            definition: definition.into(),
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &WrapperSpec {
        &self.spec
    }

    /// The definition text this wrapper was installed from.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn body(&self) -> &Arc<dyn Callable> {
        &self.body
    }

    pub fn parameter_names(&self) -> Vec<&str> {
        self.spec.params.iter().map(|p| p.name.as_str()).collect()
    }

    /// Validates `args` against the declared parameters.
    ///
    /// A `Null` argument counts as unbound.
    pub fn bind(&self, args: Args) -> Result<BoundCall, BindError> {
        let mut seen = HashSet::new();
        let mut bound: HashMap<String, Value> = HashMap::new();

        for (name, value) in args.entries {
            let spec = self
                .spec
                .param(&name)
                .ok_or_else(|| BindError::UnknownParameter(name.clone()))?;
            if !seen.insert(name.clone()) {
                return Err(BindError::DuplicateArgument(name));
            }
            if value.is_null() {
                continue;
            }
            let value = coerce(spec, value)?;
            bound.insert(name, value);
        }

        let chosen = self.chosen_set(&bound)?;

        for spec in &self.spec.params {
            if spec.required && spec.applies_to(chosen) && !bound.contains_key(&spec.name) {
                return Err(BindError::MissingRequired(spec.name.clone()));
            }
        }

        let remoting = remoting_from(chosen, &mut bound);
        let forward = self
            .spec
            .forward
            .iter()
            .map(|name| bound.remove(name).unwrap_or(Value::Null))
            .collect();

        Ok(BoundCall { forward, remoting })
    }

    fn chosen_set(&self, bound: &HashMap<String, Value>) -> Result<Option<&str>, BindError> {
        let mut chosen: Option<&str> = None;
        for spec in &self.spec.params {
            let Some(set) = spec.set.as_deref() else {
                continue;
            };
            if !bound.contains_key(&spec.name) {
                continue;
            }
            match chosen {
                None => chosen = Some(set),
                Some(first) if first != set => {
                    return Err(BindError::ParameterSetConflict {
                        first: first.to_string(),
                        second: set.to_string(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(chosen)
    }

    /// Binds, resolves sessions, runs the body in each, and tears down.
    pub async fn invoke(
        &self,
        transport: &dyn Transport,
        config: &DispatchConfig,
        args: Args,
    ) -> Result<DispatchReport, InvokeError> {
        let call = self.bind(args)?;
        tracing::debug!(wrapper = %self.name, remoting = ?call.remoting, "bound arguments");

        let resolution = match session::resolve(transport, &call.remoting, config).await {
            Ok(resolution) => resolution,
            Err(session::ResolveError { error, opened }) => {
                session::teardown(transport, &call.remoting, opened).await;
                return Err(error.into());
            }
        };

        if resolution.sessions.is_empty() {
            session::teardown(transport, &call.remoting, resolution.sessions).await;
            if resolution.failures.is_empty() {
                return Err(InvokeError::NoTarget);
            }
            return Err(InvokeError::Unreachable(resolution.failures));
        }

        let outcomes = dispatch::dispatch(
            transport,
            &self.body,
            resolution.sessions.sessions(),
            &call.forward,
            config,
        )
        .await;

        let teardown = session::teardown(transport, &call.remoting, resolution.sessions).await;

        tracing::info!(
            wrapper = %self.name,
            sessions = outcomes.len(),
            failed = outcomes.iter().filter(|o| o.result.is_err()).count(),
            "invocation finished"
        );

        Ok(DispatchReport {
            wrapper: self.name.clone(),
            outcomes,
            unreachable: resolution.failures,
            teardown,
        })
    }
}

/// Type-checks one argument, promoting a lone item to a one-element list.
fn coerce(spec: &ParamSpec, value: Value) -> Result<Value, BindError> {
    let found = value.kind();
    let value = match (&spec.ty, value) {
        (TypeExpr::List(inner), v) if !matches!(v, Value::List(_)) && v.conforms(inner) => {
            Value::List(vec![v])
        }
        (_, v) => v,
    };

    if !value.conforms(&spec.ty) {
        return Err(BindError::TypeMismatch {
            param: spec.name.clone(),
            expected: spec.ty.to_string(),
            found,
        });
    }

    if let (Some((min, max)), Some(n)) = (spec.range, value.as_int()) {
        if n < min || n > max {
            return Err(BindError::OutOfRange {
                param: spec.name.clone(),
                value: n,
                min,
                max,
            });
        }
    }

    Ok(value)
}

fn remoting_from(chosen: Option<&str>, bound: &mut HashMap<String, Value>) -> Remoting {
    match chosen {
        Some(remoting::BY_ADDRESS) => {
            let targets = match bound.remove(remoting::TARGET_LIST) {
                Some(Value::List(items)) => items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            let credential = match bound.remove(remoting::CREDENTIAL) {
                Some(Value::Credential(c)) => Some(c),
                _ => None,
            };
            Remoting::ByAddress { targets, credential }
        }
        Some(remoting::BY_SESSION) => {
            let sessions = match bound.remove(remoting::SESSION_LIST) {
                Some(Value::List(items)) => items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Session(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            Remoting::BySession(sessions)
        }
        _ => Remoting::Unspecified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::callable::Function;
    use crate::compile::compile;
    use crate::extract::extract;
    use crate::template::WrapperTemplate;
    use crate::transport::LoopbackTransport;
    use crate::value::Credential;

    fn wrapper_for(f: Function) -> Wrapper {
        let f: Arc<dyn Callable> = Arc::new(f);
        let sig = extract(&f).unwrap();
        let spec = WrapperSpec::from_signature(&sig, &RemotingParameterSet::standard()).unwrap();
        let text = spec.render();
        Wrapper::new(format!("{}Remote", sig.name), spec, text, f)
    }

    fn counter() -> Wrapper {
        wrapper_for(
            Function::new("count", |_ctx, args| Ok(args[0].clone()))
                .param("n", "n: int @range(1, 10) @required")
                .param("label", "label: string"),
        )
    }

    #[test]
    fn test_from_signature_matches_compiled_text() {
        let f: Arc<dyn Callable> = Arc::new(
            Function::new("f", |_ctx, _args| Ok(Value::Null))
                .param("hosts", "hosts: [string]")
                .param("n", "n: int @required"),
        );
        let sig = extract(&f).unwrap();
        let remoting = RemotingParameterSet::standard();

        let direct = WrapperSpec::from_signature(&sig, &remoting).unwrap();
        let generated = WrapperTemplate::default().expand(&sig, &remoting).unwrap();

        assert_eq!(compile(&generated.text).unwrap(), direct);
        assert_eq!(compile(&direct.render()).unwrap(), direct);
    }

    #[test]
    fn test_from_signature_rejects_misnamed_declaration() {
        let f: Arc<dyn Callable> = Arc::new(
            Function::new("f", |_ctx, _args| Ok(Value::Null)).param("a", "b: int"),
        );
        let signature = extract(&f).unwrap();
        let err =
            WrapperSpec::from_signature(&signature, &RemotingParameterSet::standard()).unwrap_err();
        assert!(matches!(err, builder::Error::DeclarationName { .. }));
    }

    #[test]
    fn test_bind_by_address() {
        let call = counter()
            .bind(Args::new().targets(["h1", "h2"]).with("n", 3))
            .unwrap();

        assert_eq!(call.forward, vec![Value::Int(3), Value::Null]);
        assert_eq!(
            call.remoting,
            Remoting::ByAddress {
                targets: vec!["h1".into(), "h2".into()],
                credential: None,
            }
        );
    }

    #[test]
    fn test_bind_promotes_scalar_target() {
        let call = counter()
            .bind(Args::new().with("target-list", "solo").with("n", 1))
            .unwrap();
        assert_eq!(
            call.remoting,
            Remoting::ByAddress {
                targets: vec!["solo".into()],
                credential: None,
            }
        );
    }

    #[test]
    fn test_bind_with_credential() {
        let cred = Credential::new("ops", "pw");
        let call = counter()
            .bind(Args::new().targets(["h"]).credential(cred.clone()).with("n", 1))
            .unwrap();
        assert_eq!(
            call.remoting,
            Remoting::ByAddress {
                targets: vec!["h".into()],
                credential: Some(cred),
            }
        );
    }

    #[test]
    fn test_bind_credential_without_targets() {
        let err = counter()
            .bind(Args::new().credential(Credential::new("ops", "pw")).with("n", 1))
            .unwrap_err();
        assert_eq!(err, BindError::MissingRequired("target-list".into()));
    }

    #[test]
    fn test_bind_set_conflict() {
        let err = counter()
            .bind(Args::new().targets(["h"]).sessions(Vec::new()).with("n", 1))
            .unwrap_err();
        assert_eq!(
            err,
            BindError::ParameterSetConflict {
                first: "by-address".into(),
                second: "by-session".into(),
            }
        );
    }

    #[test]
    fn test_bind_no_remoting_is_unspecified() {
        let call = counter().bind(Args::new().with("n", 2)).unwrap();
        assert_eq!(call.remoting, Remoting::Unspecified);
    }

    #[test]
    fn test_bind_missing_required_own_parameter() {
        let err = counter().bind(Args::new().targets(["h"])).unwrap_err();
        assert_eq!(err, BindError::MissingRequired("n".into()));
    }

    #[test]
    fn test_bind_rejects_bad_values() {
        let w = counter();
        assert_eq!(
            w.bind(Args::new().with("nope", 1)).unwrap_err(),
            BindError::UnknownParameter("nope".into())
        );
        assert_eq!(
            w.bind(Args::new().with("n", 1).with("n", 2)).unwrap_err(),
            BindError::DuplicateArgument("n".into())
        );
        assert!(matches!(
            w.bind(Args::new().with("n", "three")).unwrap_err(),
            BindError::TypeMismatch { found: "string", .. }
        ));
        assert_eq!(
            w.bind(Args::new().with("n", 11)).unwrap_err(),
            BindError::OutOfRange { param: "n".into(), value: 11, min: 1, max: 10 }
        );
    }

    #[tokio::test]
    async fn test_invoke_without_target() {
        let transport = LoopbackTransport::new();
        let err = counter()
            .invoke(&transport, &DispatchConfig::default(), Args::new().with("n", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::NoTarget));
        assert_eq!(transport.opened_total(), 0);
    }

    #[tokio::test]
    async fn test_invoke_by_address_closes_sessions() {
        let transport = LoopbackTransport::new();
        let report = counter()
            .invoke(
                &transport,
                &DispatchConfig::default(),
                Args::new().targets(["a", "b"]).with("n", 4),
            )
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.values(), vec![&Value::Int(4), &Value::Int(4)]);
        assert_eq!(report.teardown.closed.len(), 2);
        assert!(transport.open_sessions().is_empty());
    }
}
