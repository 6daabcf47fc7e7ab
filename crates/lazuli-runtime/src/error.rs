use lazuli_core::ir::Identifier;

/// Runtime failures. None of these are recovered locally; the nearest
/// driver reports the message and exits non-zero.
#[derive(thiserror::Error, Debug)]
pub enum EvalError {
    #[error("divergence")]
    Divergence,
    #[error("division by zero")]
    DivisionByZero,
    #[error("not an integer")]
    NotAnInt,
    #[error("not a character")]
    NotAChar,
    #[error("not a boolean")]
    NotABool,
    #[error("not a lambda")]
    NotALambda,
    #[error("not a list")]
    NotAList,
    #[error("unsupported (==) comparison between {0} and {1}")]
    EqualMismatch(String, String),
    #[error("unsupported (<) comparison between {0} and {1}")]
    OrderMismatch(String, String),
    #[error("tuple size mismatch in (==)")]
    EqualTupleSize,
    #[error("tuple pattern arity mismatch: {pattern} names for {scrutinee} elements")]
    TuplePatternArity { pattern: usize, scrutinee: usize },
    #[error("cannot match {scrutinee} value against {pattern} pattern")]
    MatchType { pattern: String, scrutinee: String },
    #[error("non-exhaustive case: nothing to match {scrutinee} in {case}")]
    NonExhaustiveCase { scrutinee: String, case: String },
    #[error("chr argument out of range: {0}")]
    ChrOutOfRange(i64),
    #[error("bad int in string")]
    BadInt,
    #[error("concat argument is not a list")]
    ConcatNotAList,
    #[error("type error in output")]
    BadOutput,
    #[error("{0}")]
    Raised(String),
    #[error("unbound identifier {0}")]
    Unbound(Identifier),
    #[error("internal error: {0}")]
    Internal(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
