//! The bootstrap procedure, one module per stage.
//!
//! Each stage is a set of free functions taking the [`Repository`] handle
//! plus exactly the parameters it needs.
//!
//! [`Repository`]: crate::repository::Repository

pub mod assets;
pub mod configure;
pub mod finalize;
pub mod guard;
pub mod identity;
pub mod versions;
