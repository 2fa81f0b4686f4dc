//! # Argument Values
//!
//! The dynamic values that flow through a wrapper: bound by the caller,
//! type-checked against parameter declarations, and forwarded positionally
//! into the remote body.

use std::fmt;

use crate::decl::TypeExpr;
use crate::session::SessionHandle;

/// A username/secret pair carried by the `credential` remoting parameter.
///
/// The secret never appears in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    secret: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "credential({})", self.username)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Credential(Credential),
    Session(SessionHandle),
}

impl Value {
    /// Short name of the value's shape, used in binding errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Credential(_) => "credential",
            Self::Session(_) => "session",
        }
    }

    /// Whether this value satisfies a declared type.
    ///
    /// `null` conforms to nothing but `any`; required-ness is checked separately.
    pub fn conforms(&self, ty: &TypeExpr) -> bool {
        match (ty, self) {
            (TypeExpr::Any, _) => true,
            (TypeExpr::Bool, Self::Bool(_)) => true,
            (TypeExpr::Int, Self::Int(_)) => true,
            (TypeExpr::Float, Self::Float(_) | Self::Int(_)) => true,
            (TypeExpr::String, Self::String(_)) => true,
            (TypeExpr::Credential, Self::Credential(_)) => true,
            (TypeExpr::Session, Self::Session(_)) => true,
            (TypeExpr::List(inner), Self::List(items)) => items.iter().all(|v| v.conforms(inner)),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::String(s) => write!(f, "{:?}", s),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Credential(c) => write!(f, "{}", c),
            Self::Session(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Credential> for Value {
    fn from(c: Credential) -> Self {
        Self::Credential(c)
    }
}

impl From<SessionHandle> for Value {
    fn from(s: SessionHandle) -> Self {
        Self::Session(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}
