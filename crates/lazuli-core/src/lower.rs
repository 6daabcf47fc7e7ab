//! Lowering from the surface AST to the IR.
//!
//! This pass resolves every name to a globally unique [`Identifier`],
//! desugars strings, list literals, `if`, derived comparisons and
//! composition, and turns `data` declarations into constructor bindings.
//! It performs no type inference; shape errors that survive lowering are
//! reported by the evaluator at runtime.

use crate::ir::*;
use lazuli_ast::ast;
use lazuli_ast::loc::Location;
use std::collections::HashSet;
use std::rc::Rc;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LowerError {
    #[error("{1}: use of undefined identifier `{0}`")]
    Undefined(String, Location),
    #[error("{1}: redefinition of `{0}`")]
    Redefinition(String, Location),
    #[error("{1}: `{0}` is not a data constructor")]
    NotAConstructor(String, Location),
    #[error("{1}: wrong arity for data constructor `{0}`")]
    ConstructorArity(String, Location),
    #[error("{0}: nested patterns are unsupported")]
    NestedPattern(Location),
    #[error("{0}: non-empty list patterns are unsupported")]
    ListPattern(Location),
    #[error("{0}: case expression has no alternatives")]
    EmptyCase(Location),
    #[error("{0}: no definition for main")]
    NoMain(Location),
}

impl LowerError {
    pub fn location(&self) -> Location {
        match self {
            LowerError::Undefined(_, l)
            | LowerError::Redefinition(_, l)
            | LowerError::NotAConstructor(_, l)
            | LowerError::ConstructorArity(_, l) => *l,
            LowerError::NestedPattern(l)
            | LowerError::ListPattern(l)
            | LowerError::EmptyCase(l)
            | LowerError::NoMain(l) => *l,
        }
    }
}

type Result<T> = std::result::Result<T, LowerError>;

#[derive(Clone)]
enum NameDef {
    Var(Identifier),
    Ctor(Rc<DataType>, usize),
    Builtin(Builtin),
}

struct ScopeEntry {
    name: String,
    def: NameDef,
}

pub struct Lowerer {
    next_id: u32,
    next_type: u32,
    names: Vec<ScopeEntry>,
    bool_ty: Rc<DataType>,
    list_ty: Rc<DataType>,
}

impl Default for Lowerer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lowerer {
    pub fn new() -> Self {
        let mut lowerer = Lowerer {
            next_id: 0,
            next_type: DataTypeId::FIRST_USER.0,
            names: Vec::new(),
            bool_ty: DataType::bool(),
            list_ty: DataType::list(),
        };
        let bool_ty = lowerer.bool_ty.clone();
        lowerer.define("False", NameDef::Ctor(bool_ty.clone(), ALT_FALSE));
        lowerer.define("True", NameDef::Ctor(bool_ty, ALT_TRUE));
        for (name, op) in [
            ("not", Builtin::Not),
            ("chr", Builtin::Chr),
            ("ord", Builtin::Ord),
            ("error", Builtin::Error),
            ("readInt", Builtin::ReadInt),
            ("showInt", Builtin::ShowInt),
            ("shift", Builtin::BitShift),
            ("bitAnd", Builtin::BitAnd),
            ("bitOr", Builtin::BitOr),
        ] {
            lowerer.define(name, NameDef::Builtin(op));
        }
        lowerer
    }

    fn define(&mut self, name: &str, def: NameDef) {
        self.names.push(ScopeEntry { name: name.to_string(), def });
    }

    fn fresh(&mut self) -> Identifier {
        let id = Identifier(self.next_id);
        self.next_id += 1;
        id
    }

    fn lookup(&self, name: &str) -> Option<&NameDef> {
        self.names.iter().rev().find(|entry| entry.name == name).map(|entry| &entry.def)
    }

    /// Lower a whole program to a single expression: one recursive group
    /// over every top-level binding, returning the value of `main`.
    pub fn lower_program(&mut self, program: &ast::Program) -> Result<Expr> {
        for data_def in &program.data_defs {
            self.declare_data(data_def)?;
        }

        let mut ids = Vec::with_capacity(program.definitions.len());
        for definition in &program.definitions {
            if self.lookup(&definition.name.name).is_some() {
                return Err(LowerError::Redefinition(
                    definition.name.name.clone(),
                    definition.name.loc,
                ));
            }
            let id = self.fresh();
            self.define(&definition.name.name, NameDef::Var(id));
            ids.push(id);
        }

        let mut bindings = Vec::with_capacity(program.definitions.len());
        for (definition, id) in program.definitions.iter().zip(ids) {
            bindings.push(Binding { name: id, value: self.lower_binding_value(definition)? });
        }

        let main = match self.lookup("main") {
            Some(NameDef::Var(id)) => *id,
            _ => return Err(LowerError::NoMain(program.end)),
        };
        log::debug!("lowered program: {} bindings, {} identifiers", bindings.len(), self.next_id);
        Ok(ExprKind::LetRecursive { bindings, body: ExprKind::Var(main).into() }.into())
    }

    fn declare_data(&mut self, data_def: &ast::DataDef) -> Result<()> {
        let id = DataTypeId(self.next_type);
        self.next_type += 1;
        let ty = Rc::new(DataType {
            id,
            name: data_def.name.name.clone(),
            alternatives: data_def
                .alternatives
                .iter()
                .map(|alt| DataAlternative { name: alt.name.name.clone(), arity: alt.members.len() })
                .collect(),
        });
        for (index, alt) in data_def.alternatives.iter().enumerate() {
            if self.lookup(&alt.name.name).is_some() {
                return Err(LowerError::Redefinition(alt.name.name.clone(), alt.loc));
            }
            self.define(&alt.name.name, NameDef::Ctor(ty.clone(), index));
        }
        Ok(())
    }

    /// `f x y = e` lowers to `f = \x -> \y -> e` with fresh parameters.
    fn lower_binding_value(&mut self, binding: &ast::Binding) -> Result<Expr> {
        let before = self.names.len();
        let mut params = Vec::with_capacity(binding.params.len());
        for param in &binding.params {
            let id = self.fresh();
            self.define(&param.name, NameDef::Var(id));
            params.push(id);
        }
        let mut result = self.lower_expr(&binding.value)?;
        self.names.truncate(before);
        for parameter in params.into_iter().rev() {
            result = ExprKind::Lambda { parameter, body: result }.into();
        }
        Ok(result)
    }

    fn ctor(&self, ty: &Rc<DataType>, alternative: usize) -> Expr {
        ExprKind::Ctor { ty: ty.clone(), alternative }.into()
    }

    fn apply(f: Expr, x: Expr) -> Expr {
        ExprKind::Apply { f, x }.into()
    }

    fn apply2(f: Expr, a: Expr, b: Expr) -> Expr {
        Self::apply(Self::apply(f, a), b)
    }

    fn builtin2(op: Builtin, a: Expr, b: Expr) -> Expr {
        Self::apply2(ExprKind::Builtin(op).into(), a, b)
    }

    fn not(x: Expr) -> Expr {
        Self::apply(ExprKind::Builtin(Builtin::Not).into(), x)
    }

    fn cons(&self, head: Expr, tail: Expr) -> Expr {
        Self::apply2(self.ctor(&self.list_ty, ALT_CONS), head, tail)
    }

    fn nil(&self) -> Expr {
        self.ctor(&self.list_ty, ALT_NIL)
    }

    fn lower_expr(&mut self, expr: &ast::Expr) -> Result<Expr> {
        match &expr.kind {
            ast::ExprKind::Var(name) => match self.lookup(name) {
                Some(NameDef::Var(id)) => Ok(ExprKind::Var(*id).into()),
                Some(NameDef::Ctor(ty, index)) => {
                    let (ty, index) = (ty.clone(), *index);
                    Ok(self.ctor(&ty, index))
                }
                Some(NameDef::Builtin(op)) => Ok(ExprKind::Builtin(*op).into()),
                None => Err(LowerError::Undefined(name.clone(), expr.loc)),
            },
            ast::ExprKind::Int(value) => Ok(ExprKind::Int(*value).into()),
            ast::ExprKind::Char(c) => Ok(ExprKind::Char(*c).into()),
            ast::ExprKind::Str(s) => {
                let mut result = self.nil();
                for byte in s.bytes().rev() {
                    result = self.cons(ExprKind::Char(byte).into(), result);
                }
                Ok(result)
            }
            ast::ExprKind::List(elements) => {
                let mut lowered = Vec::with_capacity(elements.len());
                for element in elements {
                    lowered.push(self.lower_expr(element)?);
                }
                let mut result = self.nil();
                for element in lowered.into_iter().rev() {
                    result = self.cons(element, result);
                }
                Ok(result)
            }
            ast::ExprKind::Tuple(elements) => {
                let mut lowered = Vec::with_capacity(elements.len());
                for element in elements {
                    lowered.push(self.lower_expr(element)?);
                }
                Ok(ExprKind::Tuple(lowered).into())
            }
            ast::ExprKind::BinOp { op, lhs, rhs } => {
                let a = self.lower_expr(lhs)?;
                let b = self.lower_expr(rhs)?;
                Ok(self.lower_binop(*op, a, b))
            }
            ast::ExprKind::Apply { f, arg } => {
                let f = self.lower_expr(f)?;
                let x = self.lower_expr(arg)?;
                Ok(Self::apply(f, x))
            }
            ast::ExprKind::Lambda { params, body } => {
                let before = self.names.len();
                let mut ids = Vec::with_capacity(params.len());
                for param in params {
                    let id = self.fresh();
                    self.define(&param.name, NameDef::Var(id));
                    ids.push(id);
                }
                let mut result = self.lower_expr(body)?;
                self.names.truncate(before);
                for parameter in ids.into_iter().rev() {
                    result = ExprKind::Lambda { parameter, body: result }.into();
                }
                Ok(result)
            }
            ast::ExprKind::Let { bindings, body } => {
                let before = self.names.len();
                let mut seen = HashSet::new();
                let mut ids = Vec::with_capacity(bindings.len());
                for binding in bindings {
                    if !seen.insert(binding.name.name.clone()) {
                        return Err(LowerError::Redefinition(
                            binding.name.name.clone(),
                            binding.name.loc,
                        ));
                    }
                    let id = self.fresh();
                    self.define(&binding.name.name, NameDef::Var(id));
                    ids.push(id);
                }
                let mut lowered = Vec::with_capacity(bindings.len());
                for (binding, id) in bindings.iter().zip(ids) {
                    lowered.push(Binding { name: id, value: self.lower_binding_value(binding)? });
                }
                let body = self.lower_expr(body)?;
                self.names.truncate(before);
                Ok(ExprKind::LetRecursive { bindings: lowered, body }.into())
            }
            ast::ExprKind::If { condition, then_branch, else_branch } => {
                let condition = self.lower_expr(condition)?;
                let then_branch = self.lower_expr(then_branch)?;
                let else_branch = self.lower_expr(else_branch)?;
                let true_pattern = PatternKind::Ctor {
                    ty: self.bool_ty.clone(),
                    alternative: ALT_TRUE,
                    fields: Vec::new(),
                };
                let false_pattern = PatternKind::Ctor {
                    ty: self.bool_ty.clone(),
                    alternative: ALT_FALSE,
                    fields: Vec::new(),
                };
                Ok(ExprKind::Case {
                    scrutinee: condition,
                    alternatives: vec![
                        CaseAlternative { pattern: true_pattern.into(), value: then_branch },
                        CaseAlternative { pattern: false_pattern.into(), value: else_branch },
                    ],
                }
                .into())
            }
            ast::ExprKind::Case { scrutinee, alternatives } => {
                if alternatives.is_empty() {
                    return Err(LowerError::EmptyCase(expr.loc));
                }
                let scrutinee = self.lower_expr(scrutinee)?;
                let mut lowered = Vec::with_capacity(alternatives.len());
                for alternative in alternatives {
                    let before = self.names.len();
                    let pattern = self.lower_pattern(&alternative.pattern)?;
                    let value = self.lower_expr(&alternative.value)?;
                    self.names.truncate(before);
                    lowered.push(CaseAlternative { pattern, value });
                }
                Ok(ExprKind::Case { scrutinee, alternatives: lowered }.into())
            }
        }
    }

    fn lower_binop(&mut self, op: ast::BinOp, a: Expr, b: Expr) -> Expr {
        use lazuli_ast::ast::BinOp;
        match op {
            BinOp::Add => Self::builtin2(Builtin::Add, a, b),
            BinOp::Subtract => Self::builtin2(Builtin::Subtract, a, b),
            BinOp::Multiply => Self::builtin2(Builtin::Multiply, a, b),
            BinOp::Divide => Self::builtin2(Builtin::Divide, a, b),
            BinOp::Modulo => Self::builtin2(Builtin::Modulo, a, b),
            BinOp::And => Self::builtin2(Builtin::And, a, b),
            BinOp::Or => Self::builtin2(Builtin::Or, a, b),
            BinOp::Concat => Self::builtin2(Builtin::Concat, a, b),
            BinOp::Equal => Self::builtin2(Builtin::Equal, a, b),
            // a != b  ~>  not (a == b)
            BinOp::NotEqual => Self::not(Self::builtin2(Builtin::Equal, a, b)),
            BinOp::Less => Self::builtin2(Builtin::LessThan, a, b),
            // a <= b  ~>  not (b < a)
            BinOp::LessOrEqual => Self::not(Self::builtin2(Builtin::LessThan, b, a)),
            // a > b  ~>  b < a
            BinOp::Greater => Self::builtin2(Builtin::LessThan, b, a),
            // a >= b  ~>  not (a < b)
            BinOp::GreaterOrEqual => Self::not(Self::builtin2(Builtin::LessThan, a, b)),
            BinOp::Cons => self.cons(a, b),
            // f . g  ~>  \v -> f (g v)
            BinOp::Compose => {
                let v = self.fresh();
                ExprKind::Lambda {
                    parameter: v,
                    body: Self::apply(a, Self::apply(b, ExprKind::Var(v).into())),
                }
                .into()
            }
        }
    }

    /// Lower a surface pattern, pushing its bindings onto the scope. The
    /// caller truncates the scope after the alternative body is lowered.
    fn lower_pattern(&mut self, pattern: &ast::Pattern) -> Result<Pattern> {
        match &pattern.kind {
            ast::PatternKind::Name(name) => {
                if name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false) {
                    let (ty, index) = self.lookup_ctor(name, pattern.loc)?;
                    if ty.alternatives[index].arity != 0 {
                        return Err(LowerError::ConstructorArity(name.clone(), pattern.loc));
                    }
                    Ok(PatternKind::Ctor { ty, alternative: index, fields: Vec::new() }.into())
                } else {
                    let id = self.fresh();
                    self.define(name, NameDef::Var(id));
                    Ok(PatternKind::Bind(id).into())
                }
            }
            ast::PatternKind::Int(value) => Ok(PatternKind::Int(*value).into()),
            ast::PatternKind::Char(c) => Ok(PatternKind::Char(*c).into()),
            ast::PatternKind::Tuple(elements) => {
                let ids = self.bind_elements(elements)?;
                Ok(PatternKind::Tuple(ids).into())
            }
            ast::PatternKind::List(elements) => {
                if !elements.is_empty() {
                    return Err(LowerError::ListPattern(pattern.loc));
                }
                Ok(PatternKind::Ctor {
                    ty: self.list_ty.clone(),
                    alternative: ALT_NIL,
                    fields: Vec::new(),
                }
                .into())
            }
            ast::PatternKind::Cons(head, tail) => {
                let elements = [head.as_ref().clone(), tail.as_ref().clone()];
                let fields = self.bind_elements(&elements)?;
                Ok(PatternKind::Ctor {
                    ty: self.list_ty.clone(),
                    alternative: ALT_CONS,
                    fields,
                }
                .into())
            }
            ast::PatternKind::Ctor { name, args } => {
                let (ty, index) = self.lookup_ctor(name, pattern.loc)?;
                if ty.alternatives[index].arity != args.len() {
                    return Err(LowerError::ConstructorArity(name.clone(), pattern.loc));
                }
                let fields = self.bind_elements(args)?;
                Ok(PatternKind::Ctor { ty, alternative: index, fields }.into())
            }
        }
    }

    fn lookup_ctor(&self, name: &str, loc: Location) -> Result<(Rc<DataType>, usize)> {
        match self.lookup(name) {
            Some(NameDef::Ctor(ty, index)) => Ok((ty.clone(), *index)),
            Some(_) => Err(LowerError::NotAConstructor(name.to_string(), loc)),
            None => Err(LowerError::Undefined(name.to_string(), loc)),
        }
    }

    /// Sub-patterns of tuples, cons cells and constructors must be plain
    /// lowercase identifiers; anything deeper is a nested pattern.
    fn bind_elements(&mut self, elements: &[ast::Pattern]) -> Result<Vec<Identifier>> {
        let mut ids = Vec::with_capacity(elements.len());
        let mut seen = HashSet::new();
        for element in elements {
            match &element.kind {
                ast::PatternKind::Name(name)
                    if name.chars().next().map(|c| c.is_ascii_lowercase()).unwrap_or(false) =>
                {
                    if !seen.insert(name.clone()) {
                        return Err(LowerError::Redefinition(name.clone(), element.loc));
                    }
                    let id = self.fresh();
                    self.define(name, NameDef::Var(id));
                    ids.push(id);
                }
                _ => return Err(LowerError::NestedPattern(element.loc)),
            }
        }
        Ok(ids)
    }
}

/// Convenience wrapper over [`Lowerer`] for the common whole-program case.
pub fn lower_program(program: &ast::Program) -> std::result::Result<Expr, LowerError> {
    Lowerer::new().lower_program(program)
}
