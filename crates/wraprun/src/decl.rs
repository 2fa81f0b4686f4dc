//! # Parameter Declarations
//!
//! A parameter is carried in two forms:
//!
//! - [`ParameterDescriptor`]: the name plus the literal declaration text, as
//!   exposed by a callable and spliced verbatim into generated definitions.
//! - [`ParamSpec`]: the parsed, typed form the wrapper binds arguments against.
//!
//! Declaration grammar:
//!
//! ```text
//! decl := name ":" type attr*
//! type := "any" | "bool" | "int" | "float" | "string" | "credential" | "session" | "[" type "]"
//! attr := "@required" | "@set(" ident ")" | "@range(" int "," int ")"
//! ```

use std::fmt;

use crate::compile;
use crate::compile::CompilationError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeExpr {
    Any,
    Bool,
    Int,
    Float,
    String,
    Credential,
    Session,
    List(Box<TypeExpr>),
}

impl TypeExpr {
    pub(crate) fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "any" => Self::Any,
            "bool" => Self::Bool,
            "int" => Self::Int,
            "float" => Self::Float,
            "string" => Self::String,
            "credential" => Self::Credential,
            "session" => Self::Session,
            _ => return None,
        })
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::Credential => write!(f, "credential"),
            Self::Session => write!(f, "session"),
            Self::List(inner) => write!(f, "[{}]", inner),
        }
    }
}

/// A parsed parameter declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: TypeExpr,
    /// Must be bound whenever this parameter's set is in effect.
    pub required: bool,
    /// Parameter set membership. `None` means the parameter belongs to every set.
    pub set: Option<String>,
    /// Inclusive bounds, only valid on `int`.
    pub range: Option<(i64, i64)>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            set: None,
            range: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn in_set(mut self, set: impl Into<String>) -> Self {
        self.set = Some(set.into());
        self
    }

    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }

    /// Whether this parameter is in effect for the chosen parameter set.
    pub fn applies_to(&self, chosen: Option<&str>) -> bool {
        match (&self.set, chosen) {
            (None, _) => true,
            (Some(own), Some(chosen)) => own == chosen,
            (Some(_), None) => false,
        }
    }
}

/// Renders the canonical declaration text, which parses back to the same spec.
impl fmt::Display for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)?;
        if let Some(set) = &self.set {
            write!(f, " @set({})", set)?;
        }
        if let Some((min, max)) = self.range {
            write!(f, " @range({}, {})", min, max)?;
        }
        if self.required {
            write!(f, " @required")?;
        }
        Ok(())
    }
}

/// A parameter as exposed by a callable: its name and literal declaration text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub declaration: String,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, declaration: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaration: declaration.into(),
        }
    }

    /// Builds a descriptor from declaration text alone, recovering the name by parsing it.
    pub fn from_declaration(declaration: impl Into<String>) -> Result<Self, CompilationError> {
        let declaration = declaration.into();
        let spec = compile::parse_declaration(&declaration)?;
        Ok(Self {
            name: spec.name,
            declaration,
        })
    }

    pub fn spec(&self) -> Result<ParamSpec, CompilationError> {
        compile::parse_declaration(&self.declaration)
    }
}

impl From<&ParamSpec> for ParameterDescriptor {
    fn from(spec: &ParamSpec) -> Self {
        Self::new(spec.name.clone(), spec.to_string())
    }
}
