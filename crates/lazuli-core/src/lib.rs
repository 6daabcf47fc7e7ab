pub mod ir;
pub mod lower;
pub mod print;

pub use lower::{lower_program, LowerError, Lowerer};

/// Library definitions the driver prepends to every program.
pub const PRELUDE: &str = include_str!("prelude.lzl");
