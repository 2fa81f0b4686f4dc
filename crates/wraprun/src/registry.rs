//! # Wrapper Registry
//!
//! The namespace installed wrappers live in, and the installer that puts them
//! there.
//!
//! Installation compiles the definition and resolves its body before touching
//! the namespace, so a definition that fails leaves any existing binding under
//! the same name in place. Installing a name twice replaces the first wrapper.

use std::sync::Arc;

use dashmap::DashMap;

use crate::callable;
use crate::callable::CallableRegistry;
use crate::compile;
use crate::compile::CompilationError;
use crate::remoting::RemotingParameterSet;
use crate::template::GeneratedDefinition;
use crate::wrapper::Wrapper;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("wrapper '{0}' is not installed")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstallError {
    #[error(transparent)]
    Compilation(#[from] CompilationError),
    #[error("body does not resolve: {0}")]
    UnresolvedBody(#[from] callable::Error),
    #[error("wrapper forwards {forwarded:?} but '{callable}' takes {expected:?}")]
    ForwardMismatch {
        callable: String,
        forwarded: Vec<String>,
        expected: Vec<String>,
    },
}

#[derive(Debug, Default)]
pub struct WrapperRegistry {
    wrappers: DashMap<String, Arc<Wrapper>>,
}

impl WrapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `wrapper` under its own name, replacing any previous binding.
    pub fn install(&self, wrapper: Wrapper) -> Arc<Wrapper> {
        let wrapper = Arc::new(wrapper);
        let replaced = self
            .wrappers
            .insert(wrapper.name().to_string(), Arc::clone(&wrapper))
            .is_some();
        tracing::info!(wrapper = wrapper.name(), body = %wrapper.spec().body, replaced, "installed wrapper");
        wrapper
    }

    /// Compiles `definition` and installs it as `name`.
    ///
    /// The body is looked up in `callables` now and the handle is kept, so
    /// later changes to `callables` do not affect the installed wrapper.
    pub fn install_definition(
        &self,
        name: &str,
        definition: &GeneratedDefinition,
        callables: &CallableRegistry,
        remoting: &RemotingParameterSet,
    ) -> std::result::Result<Arc<Wrapper>, InstallError> {
        let spec = compile::compile_with(&definition.text, remoting).inspect_err(|e| {
            tracing::warn!(wrapper = name, error = %e, "definition failed to compile");
        })?;

        let body = callables.resolve(&spec.body)?;
        if let Some(params) = body.parameters() {
            let expected: Vec<String> = params.iter().map(|p| p.name.clone()).collect();
            if expected != spec.forward {
                return Err(InstallError::ForwardMismatch {
                    callable: spec.body.clone(),
                    forwarded: spec.forward.clone(),
                    expected,
                });
            }
        }

        Ok(self.install(Wrapper::new(name, spec, definition.text.clone(), body)))
    }

    pub fn get(&self, name: &str) -> Result<Arc<Wrapper>> {
        self.wrappers
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    pub fn unregister(&self, name: &str) -> Result<()> {
        self.wrappers
            .remove(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        tracing::info!(wrapper = name, "unregistered wrapper");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.wrappers.contains_key(name)
    }

    /// Installed names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.wrappers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.wrappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wrappers.is_empty()
    }
}
