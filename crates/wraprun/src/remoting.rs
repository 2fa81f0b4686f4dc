//! # Remoting Parameters
//!
//! Every generated wrapper carries the same three parameters ahead of the
//! wrapped callable's own: `target-list` and `credential` in the `by-address`
//! set, `session-list` in the `by-session` set. Set membership makes the two
//! ways of choosing targets mutually exclusive.
//!
//! After binding, the wrapper turns these into a [`Remoting`] value that is
//! passed explicitly to session resolution and teardown.

use crate::decl::ParamSpec;
use crate::decl::ParameterDescriptor;
use crate::decl::TypeExpr;
use crate::session::SessionHandle;
use crate::value::Credential;

pub const TARGET_LIST: &str = "target-list";
pub const CREDENTIAL: &str = "credential";
pub const SESSION_LIST: &str = "session-list";

pub const BY_ADDRESS: &str = "by-address";
pub const BY_SESSION: &str = "by-session";

/// The fixed, generator-owned remoting parameters, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemotingParameterSet {
    params: Vec<ParamSpec>,
}

impl RemotingParameterSet {
    pub fn standard() -> Self {
        let params = vec![
            ParamSpec::new(TARGET_LIST, TypeExpr::List(Box::new(TypeExpr::String)))
                .in_set(BY_ADDRESS)
                .required(),
            ParamSpec::new(CREDENTIAL, TypeExpr::Credential).in_set(BY_ADDRESS),
            ParamSpec::new(SESSION_LIST, TypeExpr::List(Box::new(TypeExpr::Session)))
                .in_set(BY_SESSION)
                .required(),
        ];
        Self { params }
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Declarations in the form spliced into generated parameter blocks.
    pub fn descriptors(&self) -> Vec<ParameterDescriptor> {
        self.params.iter().map(ParameterDescriptor::from).collect()
    }
}

impl Default for RemotingParameterSet {
    fn default() -> Self {
        Self::standard()
    }
}

/// Where a single wrapper invocation should run, as chosen by its caller.
#[derive(Clone, Debug, PartialEq)]
pub enum Remoting {
    /// Open one new session per address; the invocation owns them.
    ByAddress {
        targets: Vec<String>,
        credential: Option<Credential>,
    },
    /// Reuse sessions the caller already holds; the caller keeps ownership.
    BySession(Vec<SessionHandle>),
    /// No remoting parameter was bound.
    Unspecified,
}

impl Remoting {
    /// Whether sessions resolved for this configuration belong to the invocation.
    pub fn owns_sessions(&self) -> bool {
        matches!(self, Self::ByAddress { .. })
    }
}
