//! CLI Commands

pub mod input;
pub mod sum;
pub mod verify;
pub mod versions;
