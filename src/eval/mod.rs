//! Evaluators for individual directive kinds.
//!
//! The renderer in [`crate::template`] decides when each directive runs;
//! these modules decide what it produces. Sequence directives live in
//! [`crate::sequence`] because they own persisted state.

pub mod date;
pub mod field;
pub mod param;
pub mod random;
