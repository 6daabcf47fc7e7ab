//! Plain-text rendering of IR trees, used by runtime diagnostics.

use crate::ir::*;
use std::fmt;

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.name())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            PatternKind::Bind(id) => write!(f, "{id}"),
            PatternKind::Int(value) => write!(f, "{value}"),
            PatternKind::Char(c) => write!(f, "{:?}", *c as char),
            PatternKind::Tuple(ids) => {
                f.write_str("(")?;
                for (i, id) in ids.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{id}")?;
                }
                f.write_str(")")
            }
            PatternKind::Ctor { ty, alternative, fields } => {
                f.write_str(&ty.alternatives[*alternative].name)?;
                for field in fields {
                    write!(f, " {field}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Builtin(op) => write!(f, "{op}"),
            ExprKind::Var(id) => write!(f, "{id}"),
            ExprKind::Int(value) => write!(f, "{value}"),
            ExprKind::Char(c) => write!(f, "{:?}", *c as char),
            ExprKind::Tuple(elements) => {
                f.write_str("(")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str(")")
            }
            ExprKind::Ctor { ty, alternative } => {
                f.write_str(&ty.alternatives[*alternative].name)
            }
            ExprKind::Apply { f: func, x } => write!(f, "({func} {x})"),
            ExprKind::Lambda { parameter, body } => write!(f, "(\\{parameter} -> {body})"),
            ExprKind::Let { binding, body } => {
                write!(f, "(let {} = {} in {body})", binding.name, binding.value)
            }
            ExprKind::LetRecursive { bindings, body } => {
                f.write_str("(letrec")?;
                for (i, b) in bindings.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    write!(f, " {} = {}", b.name, b.value)?;
                }
                write!(f, " in {body})")
            }
            ExprKind::Case { scrutinee, alternatives } => {
                write!(f, "(case {scrutinee} of")?;
                for (i, alt) in alternatives.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    write!(f, " {} -> {}", alt.pattern, alt.value)?;
                }
                f.write_str(")")
            }
        }
    }
}
