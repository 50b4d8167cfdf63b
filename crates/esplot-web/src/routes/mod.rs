//! Route handlers.

pub mod ingress;
pub mod status;
pub mod viewer;
