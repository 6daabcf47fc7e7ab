//! Graph reduction to weak head normal form.
//!
//! The interpreter owns the heap and drives evaluation by demand: the
//! output loop forces the next cons cell of the program's result, which
//! forces only what the program observes. Applications go through a value
//! stack (`stack`); lexical scope goes through per-identifier stacks of
//! cells (`names`); and host routines that hold heap references across
//! allocations park them in `scope`, the third root set of the collector.

use crate::error::EvalError;
use crate::heap::Heap;
use crate::value::{kind_name, Captures, Cell, CellRef, Content, Node, Thunk, ThunkRef, Value, ValueRef};
use ahash::AHashMap;
use lazuli_core::ir::{
    Builtin, DataType, DataTypeId, Expr, ExprKind, Identifier, PatternKind, ALT_CONS, ALT_NIL,
    ALT_TRUE,
};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Bytes, Read, Write};
use std::rc::Rc;

type Result<T> = std::result::Result<T, EvalError>;

pub struct Interpreter<R: Read, W: Write> {
    heap: Heap,
    names: AHashMap<Identifier, Vec<CellRef>>,
    stack: Vec<CellRef>,
    scope: Vec<u32>,
    input: Bytes<R>,
    output: W,
    bool_ty: Rc<DataType>,
    list_ty: Rc<DataType>,
}

impl<R: Read, W: Write> Interpreter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Interpreter {
            heap: Heap::new(),
            names: AHashMap::new(),
            stack: Vec::new(),
            scope: Vec::new(),
            input: input.bytes(),
            output,
            bool_ty: DataType::bool(),
            list_ty: DataType::list(),
        }
    }

    /// Collect at every allocation; evaluation outcomes must not change.
    pub fn gc_stress(&mut self, on: bool) {
        self.heap.gc_stress = on;
    }

    pub fn live_nodes(&self) -> usize {
        self.heap.live()
    }

    /// Apply the program to the input stream and pull the resulting list
    /// one character at a time, writing each to the output sink.
    pub fn run(&mut self, program: &Expr) -> Result<()> {
        let result = self.run_inner(program);
        match self.output.flush() {
            Ok(()) => result,
            Err(e) => result.and(Err(e.into())),
        }
    }

    fn run_inner(&mut self, program: &Expr) -> Result<()> {
        let mark = self.scope.len();
        let main = self.lazy_evaluate(program)?;
        self.scope.push(main.0);
        let read = {
            let t = self.alloc_thunk(Thunk::Read);
            self.alloc_cell_thunk(t)
        };
        self.scope.push(read.0);
        let apply = self.alloc_thunk(Thunk::Apply { f: main, x: read });
        let mut output = self.alloc_cell_thunk(apply);
        let out_slot = self.scope.len();
        self.scope.push(output.0);
        loop {
            let v = self.force(output)?;
            let shape = match self.value(v) {
                Value::Union { ty, alternative, fields } if ty.id == DataTypeId::LIST => {
                    (*alternative, fields.clone())
                }
                _ => return Err(EvalError::BadOutput),
            };
            if shape.0 == ALT_CONS {
                let head = self.force(shape.1[0])?;
                let byte = match self.value(head) {
                    Value::Char(c) => *c,
                    _ => return Err(EvalError::BadOutput),
                };
                self.output.write_all(&[byte])?;
                output = shape.1[1];
                self.scope[out_slot] = output.0;
            } else {
                break;
            }
        }
        self.scope.truncate(mark);
        Ok(())
    }

    // Allocation. A collection triggered here marks the children of the
    // node being inserted in addition to the root sets, so a single
    // allocation may safely reference objects that are not otherwise
    // reachable.
    fn alloc(&mut self, node: Node) -> u32 {
        if self.heap.wants_collect() {
            let Interpreter { heap, names, stack, scope, .. } = self;
            let roots = names
                .values()
                .flatten()
                .map(|c| c.0)
                .chain(stack.iter().map(|c| c.0))
                .chain(scope.iter().copied());
            heap.collect(roots, Some(&node));
        }
        self.heap.insert(node)
    }

    fn alloc_value(&mut self, value: Value) -> ValueRef {
        ValueRef(self.alloc(Node::Value(value)))
    }

    fn alloc_thunk(&mut self, thunk: Thunk) -> ThunkRef {
        ThunkRef(self.alloc(Node::Thunk(thunk)))
    }

    fn alloc_cell_value(&mut self, value: ValueRef) -> CellRef {
        CellRef(self.alloc(Node::Cell(Cell { computing: false, content: Content::Value(value) })))
    }

    fn alloc_cell_thunk(&mut self, thunk: ThunkRef) -> CellRef {
        CellRef(self.alloc(Node::Cell(Cell { computing: false, content: Content::Thunk(thunk) })))
    }

    fn alloc_bool(&mut self, value: bool) -> ValueRef {
        self.alloc_value(Value::Union {
            ty: self.bool_ty.clone(),
            alternative: value as usize,
            fields: Vec::new(),
        })
    }

    fn alloc_nil(&mut self) -> ValueRef {
        self.alloc_value(Value::Union {
            ty: self.list_ty.clone(),
            alternative: ALT_NIL,
            fields: Vec::new(),
        })
    }

    // Typed accessors.
    pub fn value(&self, v: ValueRef) -> &Value {
        match self.heap.node(v.0) {
            Node::Value(value) => value,
            _ => unreachable!("value reference to non-value slot"),
        }
    }

    fn cell(&self, c: CellRef) -> &Cell {
        match self.heap.node(c.0) {
            Node::Cell(cell) => cell,
            _ => unreachable!("cell reference to non-cell slot"),
        }
    }

    fn cell_mut(&mut self, c: CellRef) -> &mut Cell {
        match self.heap.node_mut(c.0) {
            Node::Cell(cell) => cell,
            _ => unreachable!("cell reference to non-cell slot"),
        }
    }

    fn thunk(&self, t: ThunkRef) -> &Thunk {
        match self.heap.node(t.0) {
            Node::Thunk(thunk) => thunk,
            _ => unreachable!("thunk reference to non-thunk slot"),
        }
    }

    fn type_name(&self, v: ValueRef) -> String {
        match self.value(v) {
            Value::Union { ty, .. } => ty.name.clone(),
            other => kind_name(other).to_string(),
        }
    }

    // Name environment.
    fn name_top(&self, id: Identifier) -> Result<CellRef> {
        self.names.get(&id).and_then(|cells| cells.last()).copied().ok_or(EvalError::Unbound(id))
    }

    fn name_push(&mut self, id: Identifier, cell: CellRef) {
        self.names.entry(id).or_default().push(cell);
    }

    fn name_pop(&mut self, id: Identifier) {
        if let Some(cells) = self.names.get_mut(&id) {
            cells.pop();
        }
    }

    fn push_captures(&mut self, captures: &Captures) {
        for (id, cell) in captures {
            self.name_push(*id, *cell);
        }
    }

    fn pop_captures(&mut self, captures: &Captures) {
        for (id, _) in captures {
            self.name_pop(*id);
        }
    }

    /// Force a cell to weak head normal form, memoizing the result. The
    /// caller must keep `cell` reachable (it usually is, through `names`,
    /// the stack, or an enclosing thunk).
    pub fn force(&mut self, cell: CellRef) -> Result<ValueRef> {
        let (content, computing) = {
            let c = self.cell(cell);
            (c.content, c.computing)
        };
        match content {
            Content::Value(v) => Ok(v),
            Content::Thunk(t) => {
                // A thunk that forces its own cell has no weak head
                // normal form.
                if computing {
                    return Err(EvalError::Divergence);
                }
                self.cell_mut(cell).computing = true;
                let v = self.run_thunk(t)?;
                let c = self.cell_mut(cell);
                c.content = Content::Value(v);
                c.computing = false;
                Ok(v)
            }
        }
    }

    fn run_thunk(&mut self, t: ThunkRef) -> Result<ValueRef> {
        let thunk = self.thunk(t).clone();
        match thunk {
            Thunk::Apply { f, x } => {
                self.stack.push(x);
                let fv = self.force(f)?;
                self.enter(fv)?;
                let top = *self.stack.last().ok_or(EvalError::Internal("empty stack"))?;
                let v = self.force(top)?;
                self.stack.pop();
                Ok(v)
            }
            Thunk::Closure { expr, captures } => {
                self.push_captures(&captures);
                let result = self.run_closure_body(&expr);
                self.pop_captures(&captures);
                result
            }
            Thunk::Concat { left, right } => self.concat_step(left, right),
            Thunk::Read => match self.input.next() {
                Some(Ok(byte)) => {
                    let ch = self.alloc_value(Value::Char(byte));
                    let head = self.alloc_cell_value(ch);
                    let mark = self.scope.len();
                    self.scope.push(head.0);
                    let t = self.alloc_thunk(Thunk::Read);
                    let tail = self.alloc_cell_thunk(t);
                    let v = self.alloc_value(Value::Union {
                        ty: self.list_ty.clone(),
                        alternative: ALT_CONS,
                        fields: vec![head, tail],
                    });
                    self.scope.truncate(mark);
                    Ok(v)
                }
                _ => Ok(self.alloc_nil()),
            },
            Thunk::Fail(message) => Err(EvalError::Raised(message.to_string())),
        }
    }

    fn run_closure_body(&mut self, expr: &Expr) -> Result<ValueRef> {
        match expr.kind() {
            ExprKind::Let { binding, body } => {
                let cell = self.lazy_evaluate(&binding.value)?;
                self.name_push(binding.name, cell);
                let result = self.evaluate(body);
                self.name_pop(binding.name);
                result
            }
            ExprKind::LetRecursive { bindings, body } => {
                // Pre-install a hole per binding, then patch each hole
                // with its produced cell. A right-hand side whose result
                // cell *is* the hole has no weak head normal form.
                let mut holes = Vec::with_capacity(bindings.len());
                for binding in bindings {
                    let fail =
                        self.alloc_thunk(Thunk::Fail("this should never be executed".into()));
                    let hole = self.alloc_cell_thunk(fail);
                    self.name_push(binding.name, hole);
                    holes.push(hole);
                }
                for (binding, hole) in bindings.iter().zip(&holes) {
                    let value = self.lazy_evaluate(&binding.value)?;
                    if value == *hole {
                        let fail = self.alloc_thunk(Thunk::Fail("divergence".into()));
                        let cell = self.cell_mut(*hole);
                        cell.content = Content::Thunk(fail);
                        cell.computing = false;
                    } else {
                        let produced = self.cell(value).clone();
                        *self.cell_mut(*hole) = produced;
                    }
                }
                let result = self.evaluate(body);
                for binding in bindings {
                    self.name_pop(binding.name);
                }
                result
            }
            ExprKind::Case { scrutinee, alternatives } => {
                let mark = self.scope.len();
                let v = self.evaluate(scrutinee)?;
                self.scope.push(v.0);
                let mut matched = None;
                for alternative in alternatives {
                    if let Some(result) = self.try_alternative(v, alternative)? {
                        matched = Some(result);
                        break;
                    }
                }
                self.scope.truncate(mark);
                match matched {
                    Some(result) => Ok(result),
                    None => Err(EvalError::NonExhaustiveCase {
                        scrutinee: self.type_name(v),
                        case: expr.to_string(),
                    }),
                }
            }
            _ => Err(EvalError::Internal("closure thunk over a non-binding node")),
        }
    }

    fn try_alternative(
        &mut self,
        v: ValueRef,
        alternative: &lazuli_core::ir::CaseAlternative,
    ) -> Result<Option<ValueRef>> {
        match alternative.pattern.kind() {
            PatternKind::Bind(id) => {
                let cell = self.alloc_cell_value(v);
                self.name_push(*id, cell);
                let result = self.evaluate(&alternative.value);
                self.name_pop(*id);
                result.map(Some)
            }
            PatternKind::Int(expected) => match self.value(v) {
                Value::Int(actual) if actual == expected => {
                    self.evaluate(&alternative.value).map(Some)
                }
                _ => Ok(None),
            },
            PatternKind::Char(expected) => match self.value(v) {
                Value::Char(actual) if actual == expected => {
                    self.evaluate(&alternative.value).map(Some)
                }
                _ => Ok(None),
            },
            PatternKind::Tuple(ids) => {
                let cells = match self.value(v) {
                    Value::Tuple(cells) => {
                        if cells.len() != ids.len() {
                            return Err(EvalError::TuplePatternArity {
                                pattern: ids.len(),
                                scrutinee: cells.len(),
                            });
                        }
                        cells.clone()
                    }
                    _ => return Ok(None),
                };
                for (id, cell) in ids.iter().zip(&cells) {
                    self.name_push(*id, *cell);
                }
                let result = self.evaluate(&alternative.value);
                for id in ids {
                    self.name_pop(*id);
                }
                result.map(Some)
            }
            PatternKind::Ctor { ty, alternative: index, fields } => {
                let cells = match self.value(v) {
                    Value::Union { ty: value_ty, alternative: value_index, fields: value_fields } => {
                        if value_ty.id != ty.id {
                            return Err(EvalError::MatchType {
                                pattern: ty.name.clone(),
                                scrutinee: value_ty.name.clone(),
                            });
                        }
                        if value_index != index {
                            return Ok(None);
                        }
                        if value_fields.len() != fields.len() {
                            return Err(EvalError::Internal("constructor arity mismatch"));
                        }
                        value_fields.clone()
                    }
                    other => {
                        return Err(EvalError::MatchType {
                            pattern: ty.name.clone(),
                            scrutinee: kind_name(other).to_string(),
                        })
                    }
                };
                for (id, cell) in fields.iter().zip(&cells) {
                    self.name_push(*id, *cell);
                }
                let result = self.evaluate(&alternative.value);
                for id in fields {
                    self.name_pop(*id);
                }
                result.map(Some)
            }
        }
    }

    /// Evaluate an expression to weak head normal form.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<ValueRef> {
        match expr.kind() {
            ExprKind::Builtin(op) => {
                Ok(self.alloc_value(Value::Native { op: *op, bound: Vec::new() }))
            }
            ExprKind::Var(id) => {
                let cell = self.name_top(*id)?;
                self.force(cell)
            }
            ExprKind::Int(value) => Ok(self.alloc_value(Value::Int(*value))),
            ExprKind::Char(c) => Ok(self.alloc_value(Value::Char(*c))),
            ExprKind::Tuple(elements) => {
                let mark = self.scope.len();
                let mut cells = Vec::with_capacity(elements.len());
                for element in elements {
                    let cell = self.lazy_evaluate(element)?;
                    self.scope.push(cell.0);
                    cells.push(cell);
                }
                let v = self.alloc_value(Value::Tuple(cells));
                self.scope.truncate(mark);
                Ok(v)
            }
            ExprKind::Ctor { ty, alternative } => {
                if ty.alternatives[*alternative].arity == 0 {
                    Ok(self.alloc_value(Value::Union {
                        ty: ty.clone(),
                        alternative: *alternative,
                        fields: Vec::new(),
                    }))
                } else {
                    Ok(self.alloc_value(Value::Ctor {
                        ty: ty.clone(),
                        alternative: *alternative,
                        bound: Vec::new(),
                    }))
                }
            }
            ExprKind::Lambda { parameter, body } => {
                let captures = self.resolve(expr)?;
                Ok(self.alloc_value(Value::Closure {
                    parameter: *parameter,
                    body: body.clone(),
                    captures,
                }))
            }
            ExprKind::Apply { .. }
            | ExprKind::Let { .. }
            | ExprKind::LetRecursive { .. }
            | ExprKind::Case { .. } => {
                let cell = self.lazy_evaluate(expr)?;
                let mark = self.scope.len();
                self.scope.push(cell.0);
                let result = self.force(cell);
                self.scope.truncate(mark);
                result
            }
        }
    }

    /// Evaluate an expression to a cell, deferring work where possible.
    /// Variables share their existing cell; that sharing is what ties
    /// recursive knots.
    pub fn lazy_evaluate(&mut self, expr: &Expr) -> Result<CellRef> {
        match expr.kind() {
            ExprKind::Var(id) => self.name_top(*id),
            ExprKind::Apply { f, x } => {
                let mark = self.scope.len();
                let f = self.lazy_evaluate(f)?;
                self.scope.push(f.0);
                let x = self.lazy_evaluate(x)?;
                self.scope.push(x.0);
                let t = self.alloc_thunk(Thunk::Apply { f, x });
                let cell = self.alloc_cell_thunk(t);
                self.scope.truncate(mark);
                Ok(cell)
            }
            ExprKind::Let { .. } | ExprKind::LetRecursive { .. } | ExprKind::Case { .. } => {
                let captures = self.resolve(expr)?;
                let t = self.alloc_thunk(Thunk::Closure { expr: expr.clone(), captures });
                Ok(self.alloc_cell_thunk(t))
            }
            _ => {
                let v = self.evaluate(expr)?;
                Ok(self.alloc_cell_value(v))
            }
        }
    }

    // The application protocol: a lambda value consumes the argument on
    // top of the stack and replaces it with a cell holding its result.
    fn enter(&mut self, v: ValueRef) -> Result<()> {
        match self.value(v) {
            Value::Closure { parameter, body, captures } => {
                let parameter = *parameter;
                let body = body.clone();
                let captures = captures.clone();
                self.push_captures(&captures);
                let argument = *self.stack.last().ok_or(EvalError::Internal("empty stack"))?;
                self.name_push(parameter, argument);
                let result = self.lazy_evaluate(&body);
                self.name_pop(parameter);
                self.pop_captures(&captures);
                let cell = result?;
                match self.stack.last_mut() {
                    Some(top) => *top = cell,
                    None => return Err(EvalError::Internal("empty stack")),
                }
                Ok(())
            }
            Value::Native { op, bound } => {
                let op = *op;
                let bound = bound.clone();
                self.enter_native(op, bound)
            }
            Value::Ctor { ty, alternative, bound } => {
                let ty = ty.clone();
                let alternative = *alternative;
                let bound = bound.clone();
                self.enter_ctor(ty, alternative, bound)
            }
            _ => Err(EvalError::NotALambda),
        }
    }

    fn enter_native(&mut self, op: Builtin, bound: Vec<CellRef>) -> Result<()> {
        let arity = op.arity();
        debug_assert!(bound.len() < arity);
        if arity - bound.len() > 1 {
            // Accumulate one more argument into a new partial application.
            let argument = *self.stack.last().ok_or(EvalError::Internal("empty stack"))?;
            let mut bound = bound;
            bound.push(argument);
            let v = self.alloc_value(Value::Native { op, bound });
            let cell = self.alloc_cell_value(v);
            match self.stack.last_mut() {
                Some(top) => *top = cell,
                None => return Err(EvalError::Internal("empty stack")),
            }
            Ok(())
        } else {
            // Saturated: splice the bound arguments beneath the top, run
            // the native body, and leave a single result cell.
            let top = self.stack.pop().ok_or(EvalError::Internal("empty stack"))?;
            self.stack.extend(bound);
            self.stack.push(top);
            let depth = self.stack.len();
            if depth < arity {
                return Err(EvalError::Internal("native function underflow"));
            }
            let args: Vec<CellRef> = self.stack[depth - arity..].to_vec();
            let v = self.run_builtin(op, &args)?;
            self.stack.truncate(depth - arity);
            let cell = self.alloc_cell_value(v);
            self.stack.push(cell);
            Ok(())
        }
    }

    fn enter_ctor(&mut self, ty: Rc<DataType>, alternative: usize, bound: Vec<CellRef>) -> Result<()> {
        let arity = ty.alternatives[alternative].arity;
        debug_assert!(bound.len() < arity);
        let argument = *self.stack.last().ok_or(EvalError::Internal("empty stack"))?;
        let mut bound = bound;
        bound.push(argument);
        let v = if bound.len() == arity {
            self.alloc_value(Value::Union { ty, alternative, fields: bound })
        } else {
            self.alloc_value(Value::Ctor { ty, alternative, bound })
        };
        let cell = self.alloc_cell_value(v);
        match self.stack.last_mut() {
            Some(top) => *top = cell,
            None => return Err(EvalError::Internal("empty stack")),
        }
        Ok(())
    }

    // Builtins. `args` stay on the stack while these run, which keeps
    // them rooted.
    fn run_builtin(&mut self, op: Builtin, args: &[CellRef]) -> Result<ValueRef> {
        match op {
            Builtin::Add
            | Builtin::Subtract
            | Builtin::Multiply
            | Builtin::Divide
            | Builtin::Modulo
            | Builtin::BitAnd
            | Builtin::BitOr
            | Builtin::BitShift => {
                let l = self.force_int(args[0])?;
                let r = self.force_int(args[1])?;
                let value = match op {
                    Builtin::Add => l.wrapping_add(r),
                    Builtin::Subtract => l.wrapping_sub(r),
                    Builtin::Multiply => l.wrapping_mul(r),
                    Builtin::Divide => {
                        if r == 0 {
                            return Err(EvalError::DivisionByZero);
                        }
                        l.wrapping_div(r)
                    }
                    Builtin::Modulo => {
                        if r == 0 {
                            return Err(EvalError::DivisionByZero);
                        }
                        l.wrapping_rem(r)
                    }
                    Builtin::BitAnd => l & r,
                    Builtin::BitOr => l | r,
                    Builtin::BitShift => shift(l, r),
                    _ => unreachable!(),
                };
                Ok(self.alloc_value(Value::Int(value)))
            }
            Builtin::Not => {
                let value = self.force_bool(args[0])?;
                Ok(self.alloc_bool(!value))
            }
            Builtin::And => {
                let (left, value) = self.force_bool_value(args[0])?;
                if !value {
                    return Ok(left);
                }
                let (right, _) = self.force_bool_value(args[1])?;
                Ok(right)
            }
            Builtin::Or => {
                let (left, value) = self.force_bool_value(args[0])?;
                if value {
                    return Ok(left);
                }
                let (right, _) = self.force_bool_value(args[1])?;
                Ok(right)
            }
            Builtin::Equal => {
                let value = self.equal(args[0], args[1])?;
                Ok(self.alloc_bool(value))
            }
            Builtin::LessThan => {
                let l = self.force(args[0])?;
                let r = self.force(args[1])?;
                let value = match (self.value(l), self.value(r)) {
                    (Value::Int(a), Value::Int(b)) => a < b,
                    (Value::Char(a), Value::Char(b)) => a < b,
                    _ => {
                        return Err(EvalError::OrderMismatch(self.type_name(l), self.type_name(r)))
                    }
                };
                Ok(self.alloc_bool(value))
            }
            Builtin::Chr => {
                let value = self.force_int(args[0])?;
                if !(0..128).contains(&value) {
                    return Err(EvalError::ChrOutOfRange(value));
                }
                Ok(self.alloc_value(Value::Char(value as u8)))
            }
            Builtin::Ord => {
                let c = self.force_char(args[0])?;
                Ok(self.alloc_value(Value::Int(c as i64)))
            }
            Builtin::Concat => self.concat_step(args[0], args[1]),
            Builtin::ShowInt => {
                let value = self.force_int(args[0])?;
                self.show_int(value)
            }
            Builtin::ReadInt => {
                let text = self.force_text(args[0])?;
                match parse_leading_int(&text) {
                    Some(value) => Ok(self.alloc_value(Value::Int(value))),
                    None => Err(EvalError::BadInt),
                }
            }
            Builtin::Error => {
                let text = self.force_text(args[0])?;
                Err(EvalError::Raised(text))
            }
        }
    }

    /// One step of lazy concatenation: `Cons(h, t) ++ r` becomes
    /// `Cons(h, t ++ r)` without touching `t`; `Nil ++ r` forces `r`.
    fn concat_step(&mut self, left: CellRef, right: CellRef) -> Result<ValueRef> {
        let v = self.force(left)?;
        let (ty, alternative, fields) = match self.value(v) {
            Value::Union { ty, alternative, fields } if ty.id == DataTypeId::LIST => {
                (ty.clone(), *alternative, fields.clone())
            }
            _ => return Err(EvalError::ConcatNotAList),
        };
        if alternative == ALT_CONS {
            let t = self.alloc_thunk(Thunk::Concat { left: fields[1], right });
            let tail = self.alloc_cell_thunk(t);
            Ok(self.alloc_value(Value::Union {
                ty,
                alternative: ALT_CONS,
                fields: vec![fields[0], tail],
            }))
        } else {
            self.force(right)
        }
    }

    fn show_int(&mut self, value: i64) -> Result<ValueRef> {
        let text = value.to_string();
        let mark = self.scope.len();
        let mut result = self.alloc_nil();
        self.scope.push(result.0);
        for byte in text.bytes().rev() {
            let ch = self.alloc_value(Value::Char(byte));
            let head = self.alloc_cell_value(ch);
            self.scope.push(head.0);
            let tail = self.alloc_cell_value(result);
            result = self.alloc_value(Value::Union {
                ty: self.list_ty.clone(),
                alternative: ALT_CONS,
                fields: vec![head, tail],
            });
            self.scope.push(result.0);
        }
        self.scope.truncate(mark);
        Ok(result)
    }

    /// Force a character list to a host string. The list stays reachable
    /// through `list`, whose cells memoize as they are walked.
    fn force_text(&mut self, list: CellRef) -> Result<String> {
        let mut text = String::new();
        let mut cursor = list;
        loop {
            let v = self.force(cursor)?;
            let (alternative, fields) = match self.value(v) {
                Value::Union { ty, alternative, fields } if ty.id == DataTypeId::LIST => {
                    (*alternative, fields.clone())
                }
                _ => return Err(EvalError::NotAList),
            };
            if alternative == ALT_NIL {
                return Ok(text);
            }
            let head = self.force(fields[0])?;
            match self.value(head) {
                Value::Char(c) => text.push(*c as char),
                _ => return Err(EvalError::NotAChar),
            }
            cursor = fields[1];
        }
    }

    /// Structural equality. Defined for integers, characters, tuples of
    /// equal size, and unions of the same data type.
    fn equal(&mut self, a: CellRef, b: CellRef) -> Result<bool> {
        let va = self.force(a)?;
        let vb = self.force(b)?;
        let left = self.value(va).clone();
        let right = self.value(vb).clone();
        match (left, right) {
            (Value::Int(x), Value::Int(y)) => Ok(x == y),
            (Value::Char(x), Value::Char(y)) => Ok(x == y),
            (Value::Tuple(xs), Value::Tuple(ys)) => {
                if xs.len() != ys.len() {
                    return Err(EvalError::EqualTupleSize);
                }
                for (x, y) in xs.iter().zip(&ys) {
                    if !self.equal(*x, *y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (
                Value::Union { ty: ta, alternative: aa, fields: fa },
                Value::Union { ty: tb, alternative: ab, fields: fb },
            ) => {
                if ta.id != tb.id {
                    return Err(EvalError::EqualMismatch(ta.name.clone(), tb.name.clone()));
                }
                if aa != ab {
                    return Ok(false);
                }
                for (x, y) in fa.iter().zip(&fb) {
                    if !self.equal(*x, *y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (x, y) => {
                Err(EvalError::EqualMismatch(kind_name(&x).to_string(), kind_name(&y).to_string()))
            }
        }
    }

    fn force_int(&mut self, cell: CellRef) -> Result<i64> {
        let v = self.force(cell)?;
        match self.value(v) {
            Value::Int(value) => Ok(*value),
            _ => Err(EvalError::NotAnInt),
        }
    }

    fn force_char(&mut self, cell: CellRef) -> Result<u8> {
        let v = self.force(cell)?;
        match self.value(v) {
            Value::Char(c) => Ok(*c),
            _ => Err(EvalError::NotAChar),
        }
    }

    fn force_bool(&mut self, cell: CellRef) -> Result<bool> {
        self.force_bool_value(cell).map(|(_, value)| value)
    }

    fn force_bool_value(&mut self, cell: CellRef) -> Result<(ValueRef, bool)> {
        let v = self.force(cell)?;
        match self.value(v) {
            Value::Union { ty, alternative, .. } if ty.id == DataTypeId::BOOL => {
                Ok((v, *alternative == ALT_TRUE))
            }
            _ => Err(EvalError::NotABool),
        }
    }

    // Captures: free variables of a closure body, snapshotting the cell
    // currently on top of each one's name stack. Identifiers bound within
    // the body are skipped.
    fn resolve(&self, expr: &Expr) -> Result<Captures> {
        let mut bound = BTreeSet::new();
        let mut captures = BTreeMap::new();
        self.resolve_into(expr, &mut bound, &mut captures)?;
        Ok(captures.into_iter().collect())
    }

    fn resolve_into(
        &self,
        expr: &Expr,
        bound: &mut BTreeSet<Identifier>,
        captures: &mut BTreeMap<Identifier, CellRef>,
    ) -> Result<()> {
        match expr.kind() {
            ExprKind::Builtin(_) | ExprKind::Int(_) | ExprKind::Char(_) | ExprKind::Ctor { .. } => {
                Ok(())
            }
            ExprKind::Var(id) => {
                if !bound.contains(id) && !captures.contains_key(id) {
                    captures.insert(*id, self.name_top(*id)?);
                }
                Ok(())
            }
            ExprKind::Tuple(elements) => {
                for element in elements {
                    self.resolve_into(element, bound, captures)?;
                }
                Ok(())
            }
            ExprKind::Apply { f, x } => {
                self.resolve_into(f, bound, captures)?;
                self.resolve_into(x, bound, captures)
            }
            ExprKind::Lambda { parameter, body } => {
                let added = bound.insert(*parameter);
                self.resolve_into(body, bound, captures)?;
                if added {
                    bound.remove(parameter);
                }
                Ok(())
            }
            ExprKind::Let { binding, body } => {
                self.resolve_into(&binding.value, bound, captures)?;
                let added = bound.insert(binding.name);
                self.resolve_into(body, bound, captures)?;
                if added {
                    bound.remove(&binding.name);
                }
                Ok(())
            }
            ExprKind::LetRecursive { bindings, body } => {
                let mut added = Vec::new();
                for binding in bindings {
                    if bound.insert(binding.name) {
                        added.push(binding.name);
                    }
                }
                for binding in bindings {
                    self.resolve_into(&binding.value, bound, captures)?;
                }
                self.resolve_into(body, bound, captures)?;
                for id in added {
                    bound.remove(&id);
                }
                Ok(())
            }
            ExprKind::Case { scrutinee, alternatives } => {
                self.resolve_into(scrutinee, bound, captures)?;
                for alternative in alternatives {
                    let mut added = Vec::new();
                    for id in alternative.pattern.bindings() {
                        if bound.insert(id) {
                            added.push(id);
                        }
                    }
                    self.resolve_into(&alternative.value, bound, captures)?;
                    for id in added {
                        bound.remove(&id);
                    }
                }
                Ok(())
            }
        }
    }
}

/// `a << b` for non-negative `b`, arithmetic `a >> -b` otherwise. Shift
/// counts beyond 63 saturate instead of wrapping.
fn shift(value: i64, amount: i64) -> i64 {
    if amount >= 64 {
        0
    } else if amount >= 0 {
        value << amount
    } else if amount <= -64 {
        value >> 63
    } else {
        value >> -amount
    }
}

/// Signed decimal prefix of `text`, ignoring anything after the digits.
/// `None` if there are no digits or the value overflows.
fn parse_leading_int(text: &str) -> Option<i64> {
    let bytes = text.as_bytes();
    let mut i = 0;
    let negative = bytes.first() == Some(&b'-');
    if negative {
        i = 1;
    }
    let start = i;
    // Accumulate negated to cover i64::MIN.
    let mut value: i64 = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        value = value.checked_mul(10)?.checked_sub((bytes[i] - b'0') as i64)?;
        i += 1;
    }
    if i == start {
        return None;
    }
    if negative {
        Some(value)
    } else {
        value.checked_neg()
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_leading_int, shift};

    #[test]
    fn leading_int_ignores_trailing_text() {
        assert_eq!(parse_leading_int("41"), Some(41));
        assert_eq!(parse_leading_int("41\n"), Some(41));
        assert_eq!(parse_leading_int("-7rest"), Some(-7));
        assert_eq!(parse_leading_int("x"), None);
        assert_eq!(parse_leading_int(""), None);
        assert_eq!(parse_leading_int("-"), None);
        assert_eq!(parse_leading_int("9223372036854775807"), Some(i64::MAX));
        assert_eq!(parse_leading_int("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_leading_int("9223372036854775808"), None);
    }

    #[test]
    fn shift_is_arithmetic_for_negative_counts() {
        assert_eq!(shift(1, 3), 8);
        assert_eq!(shift(-16, -2), -4);
        assert_eq!(shift(5, 0), 5);
        assert_eq!(shift(1, 64), 0);
        assert_eq!(shift(-1, -200), -1);
        assert_eq!(shift(i64::MAX, -200), 0);
    }
}
