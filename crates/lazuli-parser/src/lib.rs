use lazuli_ast::ast::*;
use lazuli_ast::loc::Location;
use lazuli_lexer::{Lexed, Tok};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{loc}: {message}")]
pub struct ParseError {
    pub loc: Location,
    pub message: String,
}

type Result<T> = std::result::Result<T, ParseError>;

/// Parse a layout-resolved token stream into a surface program.
pub fn parse(tokens: &[Lexed]) -> Result<Program> {
    if tokens.is_empty() {
        let end = Location::new(1, 1);
        return Ok(Program { data_defs: Vec::new(), definitions: Vec::new(), end });
    }
    Parser { tokens, pos: 0 }.parse_program()
}

struct Parser<'t> {
    tokens: &'t [Lexed],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> &Tok {
        // The stream always ends with Tok::End, which nothing consumes.
        &self.tokens[self.pos.min(self.tokens.len() - 1)].tok
    }

    fn loc(&self) -> Location {
        self.tokens[self.pos.min(self.tokens.len() - 1)].loc
    }

    fn bump(&mut self) -> &'t Lexed {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn next_is(&self, tok: &Tok) -> bool {
        self.peek() == tok
    }

    fn consume(&mut self, tok: &Tok) -> bool {
        if self.next_is(tok) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok) -> Result<Location> {
        let loc = self.loc();
        if self.consume(tok) {
            Ok(loc)
        } else {
            Err(self.error(format!("expected {}, got {}", tok, self.peek())))
        }
    }

    fn error(&self, message: String) -> ParseError {
        ParseError { loc: self.loc(), message }
    }

    fn parse_program(&mut self) -> Result<Program> {
        let mut program = Program { data_defs: Vec::new(), definitions: Vec::new(), end: self.loc() };
        loop {
            while self.consume(&Tok::Newline) {}
            program.end = self.loc();
            if self.consume(&Tok::End) {
                break;
            }
            if self.next_is(&Tok::Data) {
                program.data_defs.push(self.parse_data()?);
            } else {
                program.definitions.push(self.parse_binding()?);
            }
        }
        Ok(program)
    }

    fn parse_var_ident(&mut self) -> Result<Ident> {
        let loc = self.loc();
        match self.peek() {
            Tok::Ident(name) if name.chars().next().map(|c| c.is_ascii_lowercase()).unwrap_or(false) => {
                let name = name.clone();
                self.bump();
                Ok(Ident { loc, name })
            }
            other => Err(self.error(format!("expected identifier, got {other}"))),
        }
    }

    fn parse_ctor_ident(&mut self) -> Result<Ident> {
        let loc = self.loc();
        match self.peek() {
            Tok::Ident(name) if name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false) => {
                let name = name.clone();
                self.bump();
                Ok(Ident { loc, name })
            }
            other => Err(self.error(format!("expected constructor name, got {other}"))),
        }
    }

    fn parse_binding(&mut self) -> Result<Binding> {
        let name = self.parse_var_ident()?;
        let mut params = Vec::new();
        while !self.next_is(&Tok::Equals) {
            params.push(self.parse_var_ident()?);
        }
        let loc = self.expect(&Tok::Equals)?;
        let value = self.parse_expression()?;
        Ok(Binding { loc, name, params, value })
    }

    /// `data Name p1 ... = Alt1 t11 t12 | Alt2 ...`, optionally with the
    /// alternatives on an indented continuation.
    fn parse_data(&mut self) -> Result<DataDef> {
        let loc = self.expect(&Tok::Data)?;
        let name = self.parse_ctor_ident()?;
        let mut params = Vec::new();
        while !self.next_is(&Tok::Equals) {
            params.push(self.parse_var_ident()?);
        }
        self.expect(&Tok::Equals)?;
        let indented = self.consume(&Tok::Indent);
        let mut alternatives = Vec::new();
        loop {
            alternatives.push(self.parse_data_alternative()?);
            if self.consume(&Tok::Pipe) {
                continue;
            }
            if indented && self.consume(&Tok::Newline) {
                self.expect(&Tok::Pipe)?;
                continue;
            }
            break;
        }
        if indented {
            self.expect(&Tok::Dedent)?;
        }
        Ok(DataDef { loc, name, params, alternatives })
    }

    fn parse_data_alternative(&mut self) -> Result<DataAlternative> {
        let name = self.parse_ctor_ident()?;
        let loc = name.loc;
        let mut members = Vec::new();
        while let Some(member) = self.try_parse_type_atom()? {
            members.push(member);
        }
        Ok(DataAlternative { loc, name, members })
    }

    /// Alternative member types matter only for their count; they are
    /// collected as raw text.
    fn try_parse_type_atom(&mut self) -> Result<Option<String>> {
        match self.peek() {
            Tok::Ident(name) => {
                let name = name.clone();
                self.bump();
                Ok(Some(name))
            }
            Tok::LBracket => {
                self.bump();
                let mut depth = 1usize;
                let mut text = String::from("[");
                while depth > 0 {
                    match self.bump().tok.clone() {
                        Tok::LBracket => {
                            depth += 1;
                            text.push('[');
                        }
                        Tok::RBracket => {
                            depth -= 1;
                            text.push(']');
                        }
                        Tok::Ident(name) => text.push_str(&name),
                        Tok::End => return Err(self.error("unterminated type".into())),
                        _ => text.push('?'),
                    }
                }
                Ok(Some(text))
            }
            Tok::LParen => {
                self.bump();
                let mut depth = 1usize;
                let mut text = String::from("(");
                while depth > 0 {
                    match self.bump().tok.clone() {
                        Tok::LParen => {
                            depth += 1;
                            text.push('(');
                        }
                        Tok::RParen => {
                            depth -= 1;
                            text.push(')');
                        }
                        Tok::Ident(name) => text.push_str(&name),
                        Tok::Comma => text.push(','),
                        Tok::End => return Err(self.error("unterminated type".into())),
                        _ => text.push('?'),
                    }
                }
                Ok(Some(text))
            }
            _ => Ok(None),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        if self.consume(&Tok::Indent) {
            let result = self.parse_expression()?;
            self.expect(&Tok::Dedent)?;
            return Ok(result);
        }
        match self.peek() {
            Tok::Case => self.parse_case(),
            Tok::If => self.parse_if(),
            Tok::Let => self.parse_let(),
            Tok::Backslash => self.parse_lambda(),
            _ => self.parse_cons(),
        }
    }

    fn binop(op: BinOp, loc: Location, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(ExprKind::BinOp { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, loc)
    }

    fn parse_cons(&mut self) -> Result<Expr> {
        let lhs = self.parse_compose()?;
        let loc = self.loc();
        if self.consume(&Tok::Colon) {
            let rhs = self.parse_cons()?;
            Ok(Self::binop(BinOp::Cons, loc, lhs, rhs))
        } else {
            Ok(lhs)
        }
    }

    fn parse_compose(&mut self) -> Result<Expr> {
        let lhs = self.parse_or()?;
        let loc = self.loc();
        if self.consume(&Tok::Dot) {
            let rhs = self.parse_compose()?;
            Ok(Self::binop(BinOp::Compose, loc, lhs, rhs))
        } else {
            Ok(lhs)
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut result = self.parse_and()?;
        loop {
            let loc = self.loc();
            if self.consume(&Tok::OrOr) {
                let rhs = self.parse_and()?;
                result = Self::binop(BinOp::Or, loc, result, rhs);
            } else {
                return Ok(result);
            }
        }
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut result = self.parse_compare()?;
        loop {
            let loc = self.loc();
            if self.consume(&Tok::AndAnd) {
                let rhs = self.parse_compare()?;
                result = Self::binop(BinOp::And, loc, result, rhs);
            } else {
                return Ok(result);
            }
        }
    }

    /// Comparisons do not chain: `a == b == c` is a parse error at the
    /// second operator.
    fn parse_compare(&mut self) -> Result<Expr> {
        let lhs = self.parse_concat()?;
        let loc = self.loc();
        let op = match self.peek() {
            Tok::EqEq => BinOp::Equal,
            Tok::NotEq => BinOp::NotEqual,
            Tok::Less => BinOp::Less,
            Tok::LessEq => BinOp::LessOrEqual,
            Tok::Greater => BinOp::Greater,
            Tok::GreaterEq => BinOp::GreaterOrEqual,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.parse_concat()?;
        Ok(Self::binop(op, loc, lhs, rhs))
    }

    fn parse_concat(&mut self) -> Result<Expr> {
        let lhs = self.parse_additive()?;
        let loc = self.loc();
        if self.consume(&Tok::PlusPlus) {
            let rhs = self.parse_concat()?;
            Ok(Self::binop(BinOp::Concat, loc, lhs, rhs))
        } else {
            Ok(lhs)
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut result = self.parse_multiplicative()?;
        loop {
            let loc = self.loc();
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Subtract,
                _ => return Ok(result),
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            result = Self::binop(op, loc, result, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut result = self.parse_apply()?;
        loop {
            let loc = self.loc();
            let op = match self.peek() {
                Tok::Star => BinOp::Multiply,
                Tok::Slash => BinOp::Divide,
                Tok::Percent => BinOp::Modulo,
                _ => return Ok(result),
            };
            self.bump();
            let rhs = self.parse_apply()?;
            result = Self::binop(op, loc, result, rhs);
        }
    }

    fn is_term_start(&self) -> bool {
        matches!(
            self.peek(),
            Tok::Ident(_) | Tok::Int(_) | Tok::Char(_) | Tok::Str(_) | Tok::LParen | Tok::LBracket
        )
    }

    fn parse_apply(&mut self) -> Result<Expr> {
        let mut result = self.parse_term()?;
        while self.is_term_start() {
            let loc = self.loc();
            let arg = self.parse_term()?;
            result = Expr::new(ExprKind::Apply { f: Box::new(result), arg: Box::new(arg) }, loc);
        }
        Ok(result)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let loc = self.loc();
        match self.peek().clone() {
            Tok::LParen => {
                self.bump();
                if self.consume(&Tok::RParen) {
                    return Ok(Expr::new(ExprKind::Tuple(Vec::new()), loc));
                }
                let mut elements = vec![self.parse_expression()?];
                while self.consume(&Tok::Comma) {
                    elements.push(self.parse_expression()?);
                }
                self.expect(&Tok::RParen)?;
                if elements.len() == 1 {
                    Ok(elements.pop().unwrap())
                } else {
                    Ok(Expr::new(ExprKind::Tuple(elements), loc))
                }
            }
            Tok::LBracket => self.parse_list(),
            Tok::Minus => {
                self.bump();
                match self.peek().clone() {
                    Tok::Int(value) => {
                        self.bump();
                        Ok(Expr::new(ExprKind::Int(-value), loc))
                    }
                    other => Err(self.error(format!("expected integer after `-`, got {other}"))),
                }
            }
            Tok::Ident(name) => {
                self.bump();
                Ok(Expr::new(ExprKind::Var(name), loc))
            }
            Tok::Int(value) => {
                self.bump();
                Ok(Expr::new(ExprKind::Int(value), loc))
            }
            Tok::Char(c) => {
                self.bump();
                Ok(Expr::new(ExprKind::Char(c), loc))
            }
            Tok::Str(s) => {
                self.bump();
                Ok(Expr::new(ExprKind::Str(s), loc))
            }
            other => Err(self.error(format!("expected term, got {other}"))),
        }
    }

    fn parse_list(&mut self) -> Result<Expr> {
        let loc = self.expect(&Tok::LBracket)?;
        let indented = self.consume(&Tok::Indent);
        let mut elements = Vec::new();
        loop {
            if indented {
                self.consume(&Tok::Newline);
            }
            let dedented = indented && self.consume(&Tok::Dedent);
            if (!indented || dedented) && self.consume(&Tok::RBracket) {
                break;
            }
            if dedented {
                return Err(self.error(format!("expected `]`, got {}", self.peek())));
            }
            elements.push(self.parse_expression()?);
            self.consume(&Tok::Comma);
        }
        Ok(Expr::new(ExprKind::List(elements), loc))
    }

    fn parse_case(&mut self) -> Result<Expr> {
        let loc = self.expect(&Tok::Case)?;
        let scrutinee = self.parse_expression()?;
        self.expect(&Tok::Of)?;
        self.expect(&Tok::Indent)?;
        let mut alternatives = Vec::new();
        loop {
            let pattern = self.parse_pattern()?;
            let alt_loc = self.loc();
            self.expect(&Tok::Arrow)?;
            let value = self.parse_expression()?;
            alternatives.push(Alternative { loc: alt_loc, pattern, value });
            if self.consume(&Tok::Dedent) {
                break;
            }
            self.expect(&Tok::Newline)?;
        }
        Ok(Expr::new(ExprKind::Case { scrutinee: Box::new(scrutinee), alternatives }, loc))
    }

    fn parse_if(&mut self) -> Result<Expr> {
        let loc = self.expect(&Tok::If)?;
        let condition = self.parse_expression()?;
        self.expect(&Tok::Then)?;
        let then_branch = self.parse_expression()?;
        self.expect(&Tok::Else)?;
        let else_branch = self.parse_expression()?;
        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            loc,
        ))
    }

    fn parse_let(&mut self) -> Result<Expr> {
        let loc = self.expect(&Tok::Let)?;
        let mut bindings = Vec::new();
        if self.consume(&Tok::Indent) {
            loop {
                bindings.push(self.parse_binding()?);
                if self.consume(&Tok::Dedent) {
                    break;
                }
                self.expect(&Tok::Newline)?;
            }
        } else {
            bindings.push(self.parse_binding()?);
        }
        self.consume(&Tok::Newline);
        self.expect(&Tok::In)?;
        let body = self.parse_expression()?;
        Ok(Expr::new(ExprKind::Let { bindings, body: Box::new(body) }, loc))
    }

    fn parse_lambda(&mut self) -> Result<Expr> {
        let loc = self.expect(&Tok::Backslash)?;
        let mut params = vec![self.parse_var_ident()?];
        while !self.next_is(&Tok::Arrow) {
            params.push(self.parse_var_ident()?);
        }
        self.expect(&Tok::Arrow)?;
        let body = self.parse_expression()?;
        Ok(Expr::new(ExprKind::Lambda { params, body: Box::new(body) }, loc))
    }

    fn parse_pattern(&mut self) -> Result<Pattern> {
        let first = self.parse_pattern_app()?;
        let loc = self.loc();
        if self.consume(&Tok::Colon) {
            let rest = self.parse_pattern()?;
            Ok(Pattern::new(PatternKind::Cons(Box::new(first), Box::new(rest)), loc))
        } else {
            Ok(first)
        }
    }

    fn is_pattern_atom_start(&self) -> bool {
        matches!(
            self.peek(),
            Tok::Ident(_) | Tok::Int(_) | Tok::Char(_) | Tok::LParen | Tok::LBracket | Tok::Minus
        )
    }

    fn parse_pattern_app(&mut self) -> Result<Pattern> {
        let atom = self.parse_pattern_atom()?;
        let is_ctor = matches!(
            &atom.kind,
            PatternKind::Name(name) if name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false)
        );
        if is_ctor && self.is_pattern_atom_start() {
            let name = match atom.kind {
                PatternKind::Name(name) => name,
                _ => unreachable!(),
            };
            let mut args = Vec::new();
            while self.is_pattern_atom_start() {
                args.push(self.parse_pattern_atom()?);
            }
            Ok(Pattern::new(PatternKind::Ctor { name, args }, atom.loc))
        } else {
            Ok(atom)
        }
    }

    fn parse_pattern_atom(&mut self) -> Result<Pattern> {
        let loc = self.loc();
        match self.peek().clone() {
            Tok::Ident(name) => {
                self.bump();
                Ok(Pattern::new(PatternKind::Name(name), loc))
            }
            Tok::Int(value) => {
                self.bump();
                Ok(Pattern::new(PatternKind::Int(value), loc))
            }
            Tok::Minus => {
                self.bump();
                match self.peek().clone() {
                    Tok::Int(value) => {
                        self.bump();
                        Ok(Pattern::new(PatternKind::Int(-value), loc))
                    }
                    other => Err(self.error(format!("expected integer after `-`, got {other}"))),
                }
            }
            Tok::Char(c) => {
                self.bump();
                Ok(Pattern::new(PatternKind::Char(c), loc))
            }
            Tok::LParen => {
                self.bump();
                if self.consume(&Tok::RParen) {
                    return Ok(Pattern::new(PatternKind::Tuple(Vec::new()), loc));
                }
                let mut elements = vec![self.parse_pattern()?];
                while self.consume(&Tok::Comma) {
                    elements.push(self.parse_pattern()?);
                }
                self.expect(&Tok::RParen)?;
                if elements.len() == 1 {
                    Ok(elements.pop().unwrap())
                } else {
                    Ok(Pattern::new(PatternKind::Tuple(elements), loc))
                }
            }
            Tok::LBracket => {
                self.bump();
                if self.consume(&Tok::RBracket) {
                    return Ok(Pattern::new(PatternKind::List(Vec::new()), loc));
                }
                let mut elements = vec![self.parse_pattern()?];
                while self.consume(&Tok::Comma) {
                    elements.push(self.parse_pattern()?);
                }
                self.expect(&Tok::RBracket)?;
                Ok(Pattern::new(PatternKind::List(elements), loc))
            }
            other => Err(self.error(format!("expected pattern, got {other}"))),
        }
    }
}
