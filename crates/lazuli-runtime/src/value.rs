//! Heap object shapes: values in weak head normal form, thunks, and the
//! mutable cells that memoize forcing.

use lazuli_core::ir::{Builtin, DataType, Expr, Identifier};
use std::rc::Rc;

/// Index of a cell slot in the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef(pub(crate) u32);

/// Index of a value slot in the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRef(pub(crate) u32);

/// Index of a thunk slot in the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThunkRef(pub(crate) u32);

/// Snapshot of the cells bound to a closure's free variables, taken when
/// the closure is created. Sorted by identifier.
pub type Captures = Vec<(Identifier, CellRef)>;

/// A value in weak head normal form. Components are cells, so they may
/// still be unevaluated.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Char(u8),
    Tuple(Vec<CellRef>),
    Union { ty: Rc<DataType>, alternative: usize, fields: Vec<CellRef> },
    /// A user lambda with its captured environment.
    Closure { parameter: Identifier, body: Expr, captures: Captures },
    /// A builtin operator, possibly partially applied.
    Native { op: Builtin, bound: Vec<CellRef> },
    /// A data constructor awaiting the rest of its fields.
    Ctor { ty: Rc<DataType>, alternative: usize, bound: Vec<CellRef> },
}

/// Categorises a value for error messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Int(_) => "integer",
        Value::Char(_) => "character",
        Value::Tuple(_) => "tuple",
        Value::Union { .. } => "union",
        Value::Closure { .. } | Value::Native { .. } | Value::Ctor { .. } => "lambda",
    }
}

#[derive(Debug, Clone)]
pub enum Thunk {
    /// Apply `f` to `x` under the application protocol.
    Apply { f: CellRef, x: CellRef },
    /// A suspended `Let`, `LetRecursive` or `Case` node together with the
    /// cells captured for its free variables.
    Closure { expr: Expr, captures: Captures },
    /// Lazy list concatenation, strict only in the head of `left`.
    Concat { left: CellRef, right: CellRef },
    /// Pull the next byte from the input stream.
    Read,
    /// Raise a runtime error when forced. Recursive-binding holes start
    /// out as one of these.
    Fail(Rc<str>),
}

#[derive(Debug, Clone, Copy)]
pub enum Content {
    Thunk(ThunkRef),
    Value(ValueRef),
}

/// The unit of memoization: a mutable box that flips from thunk to value
/// on first force. `computing` detects re-entrant forcing (divergence).
#[derive(Debug, Clone)]
pub struct Cell {
    pub(crate) computing: bool,
    pub(crate) content: Content,
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Value(Value),
    Thunk(Thunk),
    Cell(Cell),
}

impl Node {
    /// Heap edges out of this node, for the collector's mark phase.
    pub(crate) fn push_children(&self, work: &mut Vec<u32>) {
        match self {
            Node::Cell(cell) => match cell.content {
                Content::Thunk(t) => work.push(t.0),
                Content::Value(v) => work.push(v.0),
            },
            Node::Value(value) => match value {
                Value::Int(_) | Value::Char(_) => {}
                Value::Tuple(cells) => work.extend(cells.iter().map(|c| c.0)),
                Value::Union { fields, .. } => work.extend(fields.iter().map(|c| c.0)),
                Value::Closure { captures, .. } => {
                    work.extend(captures.iter().map(|(_, c)| c.0))
                }
                Value::Native { bound, .. } | Value::Ctor { bound, .. } => {
                    work.extend(bound.iter().map(|c| c.0))
                }
            },
            Node::Thunk(thunk) => match thunk {
                Thunk::Apply { f, x } => {
                    work.push(f.0);
                    work.push(x.0);
                }
                Thunk::Closure { captures, .. } => {
                    work.extend(captures.iter().map(|(_, c)| c.0))
                }
                Thunk::Concat { left, right } => {
                    work.push(left.0);
                    work.push(right.0);
                }
                Thunk::Read | Thunk::Fail(_) => {}
            },
        }
    }
}
