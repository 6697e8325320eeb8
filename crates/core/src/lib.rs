//! Shared primitives used by both the natproxy broker and agent: the
//! byte-pump (`splice`), its process-wide buffer pool, TLS bring-up, and
//! the cross-module [`Error`] type.

pub mod error;
pub mod pool;
pub mod splice;
pub mod tls;

pub use error::Error;
pub use splice::splice;
