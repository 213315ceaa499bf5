//! Shared data model for compiled achievement triggers.

pub mod field;
pub mod optimize;
mod parse;
pub mod requirement;
pub mod requirement_ex;
pub mod trigger;

pub use field::{Field, FieldKind, FieldSize, format_float};
pub use optimize::{OptimizeError, optimize};
pub use parse::ParseError;
pub use requirement::{Requirement, RequirementOperator, RequirementType};
pub use requirement_ex::RequirementEx;
pub use trigger::{MAX_EXPANSION_SIZE, Trigger, ValueExpression};
