//! # Callables
//!
//! A callable is a named unit of logic with an ordered parameter list. The
//! [`CallableRegistry`] is the lookup the generator extracts signatures from
//! and the installer resolves bodies against.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::decl::ParameterDescriptor;
use crate::session::SessionHandle;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("callable '{0}' is not registered")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The session a body is running inside.
#[derive(Clone, Debug)]
pub struct SessionContext {
    session: SessionHandle,
}

impl SessionContext {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }
}

#[async_trait::async_trait]
pub trait Callable: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// The declared parameters in order, or `None` if the callable cannot be
    /// introspected (for example a native builtin).
    fn parameters(&self) -> Option<&[ParameterDescriptor]>;

    /// Runs the body with positional arguments in declaration order.
    async fn call(&self, ctx: &SessionContext, args: &[Value]) -> anyhow::Result<Value>;
}

type BodyFn = dyn Fn(&SessionContext, &[Value]) -> anyhow::Result<Value> + Send + Sync;

/// A closure-backed callable.
#[derive(Clone)]
pub struct Function {
    name: String,
    params: Option<Vec<ParameterDescriptor>>,
    body: Arc<BodyFn>,
}

impl Function {
    /// Creates an introspectable function with no parameters yet.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&SessionContext, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: Some(Vec::new()),
            body: Arc::new(body),
        }
    }

    /// Creates a function that exposes no parameter list.
    pub fn builtin<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&SessionContext, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: None,
            body: Arc::new(body),
        }
    }

    pub fn param(mut self, name: impl Into<String>, declaration: impl Into<String>) -> Self {
        self.params
            .get_or_insert_with(Vec::new)
            .push(ParameterDescriptor::new(name, declaration));
        self
    }

    pub fn with_parameters(mut self, params: Vec<ParameterDescriptor>) -> Self {
        self.params = Some(params);
        self
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Callable for Function {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Option<&[ParameterDescriptor]> {
        self.params.as_deref()
    }

    async fn call(&self, ctx: &SessionContext, args: &[Value]) -> anyhow::Result<Value> {
        (self.body)(ctx, args)
    }
}

/// Concurrent name to callable lookup.
///
/// Registering a name that already exists replaces the previous callable.
#[derive(Default)]
pub struct CallableRegistry {
    callables: DashMap<String, Arc<dyn Callable>>,
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, callable: impl Callable) -> Arc<dyn Callable> {
        self.register_arc(Arc::new(callable))
    }

    pub fn register_arc(&self, callable: Arc<dyn Callable>) -> Arc<dyn Callable> {
        let name = callable.name().to_string();
        tracing::debug!(callable = %name, "registered callable");
        self.callables.insert(name, Arc::clone(&callable));
        callable
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Callable>> {
        self.callables
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.callables.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callables.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.callables.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.callables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callables.is_empty()
    }
}
