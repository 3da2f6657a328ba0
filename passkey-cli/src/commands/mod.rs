//! Subcommand implementations.

pub mod assert;
pub mod check;
pub mod inspect;
pub mod keygen;
pub mod register;
