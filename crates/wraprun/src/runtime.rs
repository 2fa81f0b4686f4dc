//! # Runtime Registry
//!
//! Owns the callables wrappers are generated from, the installed wrappers, and
//! the transport invocations dispatch through.
//!
//! Uses DashMap-backed registries so callables can be registered and wrappers
//! installed or invoked from multiple tasks at once.

use std::sync::Arc;

use crate::builder::WrapBuilder;
use crate::callable::Callable;
use crate::callable::CallableRegistry;
use crate::config::Config;
use crate::dispatch::DispatchReport;
use crate::registry::WrapperRegistry;
use crate::remoting::RemotingParameterSet;
use crate::transport::Transport;
use crate::wrapper::Args;
use crate::wrapper::InvokeError;

pub struct Runtime {
    callables: CallableRegistry,
    wrappers: WrapperRegistry,
    remoting: RemotingParameterSet,
    transport: Arc<dyn Transport>,
    config: Config,
}

impl Runtime {
    /// Creates a runtime with default configuration.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, Config::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: Config) -> Self {
        Self {
            callables: CallableRegistry::new(),
            wrappers: WrapperRegistry::new(),
            remoting: RemotingParameterSet::standard(),
            transport,
            config,
        }
    }

    pub fn callables(&self) -> &CallableRegistry {
        &self.callables
    }

    pub fn wrappers(&self) -> &WrapperRegistry {
        &self.wrappers
    }

    pub fn remoting(&self) -> &RemotingParameterSet {
        &self.remoting
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers a callable so wrappers can be generated from it.
    pub fn register(&self, callable: impl Callable) -> Arc<dyn Callable> {
        self.callables.register(callable)
    }

    /// Starts generating a wrapper for the callable named `source`.
    pub fn wrap(self: &Arc<Self>, source: impl Into<String>) -> WrapBuilder {
        WrapBuilder::new(Arc::clone(self), source)
    }

    /// Invokes an installed wrapper by name.
    pub async fn invoke(&self, name: &str, args: Args) -> Result<DispatchReport, InvokeError> {
        let wrapper = self
            .wrappers
            .get(name)
            .map_err(|_| InvokeError::NotInstalled(name.to_string()))?;
        wrapper
            .invoke(self.transport.as_ref(), &self.config.dispatch, args)
            .await
    }
}
