//! The intermediate representation consumed by the evaluator.
//!
//! IR trees are immutable and shared by structure: every node is behind an
//! `Rc`, so heap objects in the runtime can hold subtrees by reference
//! without copying and without tying their lifetime to the evaluator.

use std::rc::Rc;

/// Minted monotonically during lowering; unique within a program.
/// Equality is identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(pub u32);

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataTypeId(pub u32);

impl DataTypeId {
    pub const BOOL: DataTypeId = DataTypeId(0);
    pub const LIST: DataTypeId = DataTypeId(1);
    pub const FIRST_USER: DataTypeId = DataTypeId(2);
}

/// Alternative indices of the builtin types.
pub const ALT_FALSE: usize = 0;
pub const ALT_TRUE: usize = 1;
pub const ALT_CONS: usize = 0;
pub const ALT_NIL: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataAlternative {
    pub name: String,
    pub arity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataType {
    pub id: DataTypeId,
    pub name: String,
    pub alternatives: Vec<DataAlternative>,
}

impl DataType {
    pub fn bool() -> Rc<DataType> {
        Rc::new(DataType {
            id: DataTypeId::BOOL,
            name: "Bool".to_string(),
            alternatives: vec![
                DataAlternative { name: "False".to_string(), arity: 0 },
                DataAlternative { name: "True".to_string(), arity: 0 },
            ],
        })
    }

    pub fn list() -> Rc<DataType> {
        Rc::new(DataType {
            id: DataTypeId::LIST,
            name: "List".to_string(),
            alternatives: vec![
                DataAlternative { name: "Cons".to_string(), arity: 2 },
                DataAlternative { name: "Nil".to_string(), arity: 0 },
            ],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitAnd,
    BitOr,
    BitShift,
    Not,
    And,
    Or,
    Equal,
    LessThan,
    Chr,
    Ord,
    Concat,
    ShowInt,
    ReadInt,
    Error,
}

impl Builtin {
    pub fn arity(self) -> usize {
        match self {
            Builtin::Not | Builtin::Chr | Builtin::Ord | Builtin::ShowInt | Builtin::ReadInt
            | Builtin::Error => 1,
            Builtin::Add | Builtin::Subtract | Builtin::Multiply | Builtin::Divide
            | Builtin::Modulo | Builtin::BitAnd | Builtin::BitOr | Builtin::BitShift
            | Builtin::And | Builtin::Or | Builtin::Equal | Builtin::LessThan
            | Builtin::Concat => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Add => "add",
            Builtin::Subtract => "subtract",
            Builtin::Multiply => "multiply",
            Builtin::Divide => "divide",
            Builtin::Modulo => "modulo",
            Builtin::BitAnd => "bitAnd",
            Builtin::BitOr => "bitOr",
            Builtin::BitShift => "shift",
            Builtin::Not => "not",
            Builtin::And => "and",
            Builtin::Or => "or",
            Builtin::Equal => "equal",
            Builtin::LessThan => "lessThan",
            Builtin::Chr => "chr",
            Builtin::Ord => "ord",
            Builtin::Concat => "concat",
            Builtin::ShowInt => "showInt",
            Builtin::ReadInt => "readInt",
            Builtin::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr(Rc<ExprKind>);

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0
    }
}

impl From<ExprKind> for Expr {
    fn from(kind: ExprKind) -> Self {
        Expr::new(kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Builtin(Builtin),
    Var(Identifier),
    Int(i64),
    Char(u8),
    Tuple(Vec<Expr>),
    /// A reference to one constructor of a data type. Zero-arity
    /// alternatives evaluate straight to a union value; the rest evaluate
    /// to curried constructor functions.
    Ctor { ty: Rc<DataType>, alternative: usize },
    Apply { f: Expr, x: Expr },
    Lambda { parameter: Identifier, body: Expr },
    /// Non-recursive: the bound name is visible in `body` only.
    Let { binding: Binding, body: Expr },
    /// Mutually recursive group: all names are visible in every binding
    /// value and in the body.
    LetRecursive { bindings: Vec<Binding>, body: Expr },
    Case { scrutinee: Expr, alternatives: Vec<CaseAlternative> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: Identifier,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseAlternative {
    pub pattern: Pattern,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern(Rc<PatternKind>);

impl Pattern {
    pub fn new(kind: PatternKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn kind(&self) -> &PatternKind {
        &self.0
    }

    /// Identifiers the pattern binds, in field order.
    pub fn bindings(&self) -> Vec<Identifier> {
        match self.kind() {
            PatternKind::Bind(id) => vec![*id],
            PatternKind::Int(_) | PatternKind::Char(_) => Vec::new(),
            PatternKind::Tuple(ids) => ids.clone(),
            PatternKind::Ctor { fields, .. } => fields.clone(),
        }
    }
}

impl From<PatternKind> for Pattern {
    fn from(kind: PatternKind) -> Self {
        Pattern::new(kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    /// Wildcard that binds the whole scrutinee.
    Bind(Identifier),
    Int(i64),
    Char(u8),
    /// Arity must equal the scrutinee tuple's arity.
    Tuple(Vec<Identifier>),
    /// Matches a union value of the same data type and alternative,
    /// binding each field lazily.
    Ctor { ty: Rc<DataType>, alternative: usize, fields: Vec<Identifier> },
}
