//! # Wrapper Builder
//!
//! Fluent API for generating a remoting wrapper from a registered callable
//! and installing it into the runtime.

use std::sync::Arc;

use crate::compile::CompilationError;
use crate::extract;
use crate::registry::InstallError;
use crate::runtime::Runtime;
use crate::template::GeneratedDefinition;
use crate::template::WrapperTemplate;
use crate::wrapper::Wrapper;
use crate::wrapper::WrapperSpec;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("lookup failed: {0}")]
    Lookup(#[from] crate::callable::Error),
    #[error("extraction failed: {0}")]
    Extract(#[from] extract::Error),
    #[error("expansion failed: {0}")]
    Template(#[from] crate::template::Error),
    #[error(transparent)]
    Compilation(#[from] CompilationError),
    #[error("install failed: {0}")]
    Install(#[from] InstallError),
    #[error("parameter '{descriptor}' is declared as '{declared}'")]
    DeclarationName { descriptor: String, declared: String },
}

pub type Result<T> = std::result::Result<T, Error>;

pub struct WrapBuilder {
    runtime: Arc<Runtime>,
    source: String,
    name: Option<String>,
    template: WrapperTemplate,
}

impl WrapBuilder {
    pub fn new(runtime: Arc<Runtime>, source: impl Into<String>) -> Self {
        Self {
            runtime,
            source: source.into(),
            name: None,
            template: WrapperTemplate::default(),
        }
    }

    /// Installs under `name` instead of the source name plus the configured suffix.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn template(mut self, template: WrapperTemplate) -> Self {
        self.template = template;
        self
    }

    fn target_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}{}", self.source, self.runtime.config().generator.suffix),
        }
    }

    fn signature(&self) -> Result<extract::ExtractedSignature> {
        let callable = self.runtime.callables().resolve(&self.source)?;
        Ok(extract::extract(&callable)?)
    }

    /// Produces the wrapper's definition text without installing it.
    pub fn generate(&self) -> Result<GeneratedDefinition> {
        let signature = self.signature()?;
        let definition = self.template.expand(&signature, self.runtime.remoting())?;
        tracing::debug!(source = %self.source, parameters = definition.parameters.len(), "generated definition");
        Ok(definition)
    }

    /// Generates, compiles and installs the wrapper.
    pub fn install(self) -> Result<Arc<Wrapper>> {
        let definition = self.generate()?;
        let name = self.target_name();
        let wrapper = self.runtime.wrappers().install_definition(
            &name,
            &definition,
            self.runtime.callables(),
            self.runtime.remoting(),
        )?;
        Ok(wrapper)
    }

    /// Installs a wrapper built directly from the signature, skipping text.
    ///
    /// The template is not used; the stored definition is the stock rendering.
    pub fn install_direct(self) -> Result<Arc<Wrapper>> {
        let signature = self.signature()?;
        let spec = WrapperSpec::from_signature(&signature, self.runtime.remoting())?;
        let definition = spec.render();
        let wrapper = Wrapper::new(self.target_name(), spec, definition, signature.body);
        Ok(self.runtime.wrappers().install(wrapper))
    }
}
