//! CLI subcommands.

pub(crate) mod check;
pub(crate) mod keygen;
pub(crate) mod observe;
pub(crate) mod pending;
pub(crate) mod policy;
