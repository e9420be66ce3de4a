#[macro_use]
pub mod exception;

pub mod block;
pub mod eval;
pub mod functions;
pub mod number;
pub mod operations;
pub mod parse;
pub mod runtime;
pub mod source;
pub mod value;
pub mod variables;
