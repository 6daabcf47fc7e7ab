pub mod loc {
    use serde::{Deserialize, Serialize};

    /// 1-based source position. The driver prepends the file name when it
    /// formats a diagnostic, so locations themselves stay file-agnostic.
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
    pub struct Location {
        pub line: u32,
        pub column: u32,
    }

    impl Location {
        pub fn new(line: u32, column: u32) -> Self {
            Self { line, column }
        }
    }

    impl std::fmt::Display for Location {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

pub mod ast {
    use crate::loc::Location;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    pub struct Ident {
        pub loc: Location,
        pub name: String,
    }

    impl Ident {
        pub fn is_constructor(&self) -> bool {
            self.name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false)
        }
    }

    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
    pub enum BinOp {
        Add,
        Subtract,
        Multiply,
        Divide,
        Modulo,
        Equal,
        NotEqual,
        Less,
        LessOrEqual,
        Greater,
        GreaterOrEqual,
        And,
        Or,
        Concat,
        Cons,
        Compose,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub enum ExprKind {
        /// Variable or constructor reference; constructors start uppercase.
        Var(String),
        Int(i64),
        Char(u8),
        Str(String),
        List(Vec<Expr>),
        /// `()` is the zero-tuple; a parenthesised single expression is
        /// never represented as a tuple.
        Tuple(Vec<Expr>),
        BinOp { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
        Apply { f: Box<Expr>, arg: Box<Expr> },
        Lambda { params: Vec<Ident>, body: Box<Expr> },
        Let { bindings: Vec<Binding>, body: Box<Expr> },
        If { condition: Box<Expr>, then_branch: Box<Expr>, else_branch: Box<Expr> },
        Case { scrutinee: Box<Expr>, alternatives: Vec<Alternative> },
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Expr {
        pub kind: ExprKind,
        pub loc: Location,
    }

    impl Expr {
        pub fn new(kind: ExprKind, loc: Location) -> Self {
            Self { kind, loc }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub enum PatternKind {
        /// Lowercase name binds the scrutinee; uppercase name is a
        /// zero-argument constructor pattern.
        Name(String),
        Int(i64),
        Char(u8),
        Tuple(Vec<Pattern>),
        List(Vec<Pattern>),
        Cons(Box<Pattern>, Box<Pattern>),
        Ctor { name: String, args: Vec<Pattern> },
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Pattern {
        pub kind: PatternKind,
        pub loc: Location,
    }

    impl Pattern {
        pub fn new(kind: PatternKind, loc: Location) -> Self {
            Self { kind, loc }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Alternative {
        pub loc: Location,
        pub pattern: Pattern,
        pub value: Expr,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Binding {
        pub loc: Location,
        pub name: Ident,
        pub params: Vec<Ident>,
        pub value: Expr,
    }

    /// One constructor of a `data` declaration. Member types are kept as
    /// raw text only; the language has no checker, so just their count
    /// (the constructor arity) is meaningful downstream.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct DataAlternative {
        pub loc: Location,
        pub name: Ident,
        pub members: Vec<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct DataDef {
        pub loc: Location,
        pub name: Ident,
        pub params: Vec<Ident>,
        pub alternatives: Vec<DataAlternative>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Program {
        pub data_defs: Vec<DataDef>,
        pub definitions: Vec<Binding>,
        pub end: Location,
    }
}
