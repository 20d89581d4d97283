//! CLI command implementations.

pub mod dump;
pub mod generate;
pub mod inspect;
pub mod verify;
