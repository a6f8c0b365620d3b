//! Replacement policies.

pub mod second_chance;
