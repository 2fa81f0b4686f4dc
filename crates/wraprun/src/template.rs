//! # Template Expansion
//!
//! Fills a wrapper skeleton with three generated fragments:
//!
//! - `{{params}}`: remoting declarations first, then the original declarations
//!   verbatim, separated by `,` and a newline.
//! - `{{forward}}`: the original parameter names only, in declaration order.
//! - `{{body}}`: a `lookup("name")` expression naming the original callable.
//!
//! Substitution is positional over the template text, so fragment text is
//! never rescanned for placeholders.

use crate::compile::lexer::quote;
use crate::extract::ExtractedSignature;
use crate::remoting::RemotingParameterSet;

pub const PARAMS: &str = "{{params}}";
pub const FORWARD: &str = "{{forward}}";
pub const BODY: &str = "{{body}}";

const DECL_SEPARATOR: &str = ",\n    ";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("template must contain {placeholder} exactly once, found {occurrences}")]
    TemplateMismatch {
        placeholder: &'static str,
        occurrences: usize,
    },
    #[error("parameter '{0}' collides with a remoting parameter")]
    DuplicateParameterName(String),
    #[error("declaration of '{0}' must be a single line without comments")]
    MultilineDeclaration(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The stock layout for a definition, with the fragments already rendered.
pub(crate) fn stock_layout(params: &str, forward: &str, body: &str) -> String {
    format!(
        "# Remoting wrapper generated by wraprun.\nparam(\n    {}\n)\nforward({})\nbody {}\n",
        params, forward, body
    )
}

pub(crate) fn params_fragment<'a>(decls: impl IntoIterator<Item = &'a str>) -> String {
    decls.into_iter().collect::<Vec<_>>().join(DECL_SEPARATOR)
}

pub(crate) fn forward_fragment<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names.into_iter().collect::<Vec<_>>().join(", ")
}

pub(crate) fn body_fragment(callable: &str) -> String {
    format!("lookup({})", quote(callable))
}

/// Textual skeleton of a wrapper definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrapperTemplate {
    text: String,
}

impl Default for WrapperTemplate {
    fn default() -> Self {
        Self { text: stock_layout(PARAMS, FORWARD, BODY) }
    }
}

impl WrapperTemplate {
    /// Wraps arbitrary template text. Placeholders are checked at expansion.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn expand(
        &self,
        signature: &ExtractedSignature,
        remoting: &RemotingParameterSet,
    ) -> Result<GeneratedDefinition> {
        if let Some(clash) = signature.parameter_names().find(|n| remoting.contains(n)) {
            return Err(Error::DuplicateParameterName(clash.to_string()));
        }
        if let Some(p) = signature
            .parameters
            .iter()
            .find(|p| p.declaration.contains(['#', '\n']))
        {
            return Err(Error::MultilineDeclaration(p.name.clone()));
        }

        let remoting_decls = remoting.descriptors();
        let params = params_fragment(
            remoting_decls
                .iter()
                .chain(signature.parameters.iter())
                .map(|d| d.declaration.as_str()),
        );
        let forward = forward_fragment(signature.parameter_names());
        let body = body_fragment(&signature.name);

        let text = self.fill(&params, &forward, &body)?;

        let parameters = remoting_decls
            .iter()
            .chain(signature.parameters.iter())
            .map(|d| d.name.clone())
            .collect();

        Ok(GeneratedDefinition {
            source: signature.name.clone(),
            text,
            parameters,
            forward: signature.parameter_names().map(String::from).collect(),
        })
    }

    /// Substitutes each placeholder exactly once.
    fn fill(&self, params: &str, forward: &str, body: &str) -> Result<String> {
        let mut slots = Vec::with_capacity(3);
        for (placeholder, fragment) in [(PARAMS, params), (FORWARD, forward), (BODY, body)] {
            let found: Vec<usize> = self.text.match_indices(placeholder).map(|(i, _)| i).collect();
            if found.len() != 1 {
                return Err(Error::TemplateMismatch {
                    placeholder,
                    occurrences: found.len(),
                });
            }
            slots.push((found[0], placeholder.len(), fragment));
        }
        slots.sort_by_key(|(at, _, _)| *at);

        let mut out =
            String::with_capacity(self.text.len() + params.len() + forward.len() + body.len());
        let mut cursor = 0;
        for (at, len, fragment) in slots {
            out.push_str(&self.text[cursor..at]);
            out.push_str(fragment);
            cursor = at + len;
        }
        out.push_str(&self.text[cursor..]);
        Ok(out)
    }
}

/// The synthesized text of one wrapper, ready for the installer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedDefinition {
    /// Name of the callable the wrapper was generated from.
    pub source: String,
    pub text: String,
    /// All parameter names in the generated block, remoting parameters first.
    pub parameters: Vec<String>,
    /// Names forwarded positionally into the body.
    pub forward: Vec<String>,
}
