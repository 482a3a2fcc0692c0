//! SQL front end: lexing, parsing and the syntax tree.
//!
//! # Example
//!
//! ```
//! use engine::sql::{parse, SetExpr};
//!
//! let query = parse("SELECT name FROM people WHERE age > 30").unwrap();
//! assert!(matches!(query.body, SetExpr::Select(_)));
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{
    BinaryOp, Expr, FrameBound, FrameUnits, FunctionCall, JoinKind, Literal, OrderByItem, Query,
    Select, SelectItem, SetExpr, TableRef, UnaryOp, WindowFrame, WindowSpec,
};
pub use error::SyntaxError;
pub use parser::parse;
