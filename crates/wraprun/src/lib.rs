//! # wraprun
//!
//! Generates remoting wrappers for registered callables. A wrapper exposes the
//! callable's own parameters plus a fixed set of remoting parameters, and runs
//! the callable inside every target session the caller names.
//!
//! ## Philosophy
//!
//! - **Text In The Middle**: Wrappers are generated as definition text, then
//!   compiled and installed, so a generated wrapper can be inspected or
//!   edited before it exists.
//! - **Explicit Remoting**: The caller's choice of targets is bound into a
//!   [`remoting::Remoting`] value and handed to session resolution, rather than
//!   rediscovered from the surrounding call.
//! - **Owned Namespace**: Installed wrappers live in a [`registry::WrapperRegistry`]
//!   owned by the [`runtime::Runtime`].

pub mod builder;
pub mod callable;
pub mod compile;
pub mod config;
pub mod decl;
pub mod dispatch;
pub mod extract;
pub mod registry;
pub mod remoting;
pub mod runtime;
pub mod session;
pub mod template;
pub mod transport;
pub mod value;
pub mod wrapper;

pub use callable::Callable;
pub use callable::Function;
pub use runtime::Runtime;
pub use value::Value;
pub use wrapper::Args;
