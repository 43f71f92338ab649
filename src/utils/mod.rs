//! Small helpers shared by actions, probes and the CLI.

pub mod text;

pub use text::{excerpt, tail_excerpt};
