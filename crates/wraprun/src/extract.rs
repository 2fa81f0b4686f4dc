//! Signature extraction: reads a callable's declared parameters without running it.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::callable::Callable;
use crate::decl::ParameterDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("callable '{0}' does not expose an introspectable parameter list")]
    NotIntrospectable(String),
    #[error("callable '{callable}' declares parameter '{name}' more than once")]
    DuplicateParameterName { callable: String, name: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A callable's ordered parameters plus a handle to its body.
#[derive(Clone)]
pub struct ExtractedSignature {
    pub name: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub body: Arc<dyn Callable>,
}

impl ExtractedSignature {
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }
}

impl fmt::Debug for ExtractedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractedSignature")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

pub fn extract(callable: &Arc<dyn Callable>) -> Result<ExtractedSignature> {
    let name = callable.name().to_string();
    let params = callable
        .parameters()
        .ok_or_else(|| Error::NotIntrospectable(name.clone()))?;

    let mut seen = HashSet::with_capacity(params.len());
    for param in params {
        if !seen.insert(param.name.as_str()) {
            return Err(Error::DuplicateParameterName {
                callable: name,
                name: param.name.clone(),
            });
        }
    }

    Ok(ExtractedSignature {
        name,
        parameters: params.to_vec(),
        body: Arc::clone(callable),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use crate::callable::Function;
    use crate::value::Value;

    #[test]
    fn test_extract_preserves_order() {
        let f: Arc<dyn Callable> = Arc::new(
            Function::new("f", |_ctx, _args| Ok(Value::Null))
                .param("zeta", "zeta: int")
                .param("alpha", "alpha: string"),
        );

        let sig = extract(&f).unwrap();
        assert_eq!(sig.name, "f");
        assert_eq!(sig.parameter_names().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert!(Arc::ptr_eq(&sig.body, &f));
    }

    #[test]
    fn test_extract_does_not_run_body() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let f: Arc<dyn Callable> = Arc::new(Function::new("f", move |_ctx, _args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }));

        extract(&f).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_extract_builtin_fails() {
        let f: Arc<dyn Callable> =
            Arc::new(Function::builtin("native", |_ctx, _args| Ok(Value::Null)));
        assert_eq!(extract(&f).unwrap_err(), Error::NotIntrospectable("native".into()));
    }

    #[test]
    fn test_extract_rejects_duplicate_names() {
        let f: Arc<dyn Callable> = Arc::new(
            Function::new("f", |_ctx, _args| Ok(Value::Null))
                .param("a", "a: int")
                .param("a", "a: string"),
        );
        assert!(matches!(extract(&f).unwrap_err(), Error::DuplicateParameterName { name, .. } if name == "a"));
    }
}
