//! Hand-written recursive-descent parser.
//!
//! `examples/original_source/src/Parser/Parser.cpp` drives a Pratt table
//! keyed by `TokenType` with one `(prefix, infix, precedence)` triple per
//! token; this rewrite inlines that same precedence ladder (assignment,
//! ternary, range, or, and, equality, ordering, additive, multiplicative,
//! unary, postfix, primary) as a chain of ordinary recursive-descent
//! methods, one per level, which reads more directly in Rust than a table
//! of function pointers. Declarations (`import`/`type`/`class`/`fn`) and
//! statements are a single top-down `match` per kind, same shape as the
//! original's `declaration()`/`statement()`.
//!
//! `switch` cases here are `LITERAL: body` without a leading `case`
//! keyword — the token set this rewrite's scanner produces has no `case`
//! keyword, so the arm literal itself is what distinguishes a case from
//! `default:`.

use crate::ast::*;
use crate::diagnostics::Diagnostics;
use crate::token::{Token, TokenKind};

pub struct ParsedModule {
    pub top_level: Vec<StmtId>,
    pub classes: ClassTable,
    pub functions: FunctionTable,
    pub imports: Vec<String>,
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    ast: &'a mut Ast,
    diagnostics: &'a mut Diagnostics,
    classes: ClassTable,
    functions: FunctionTable,
    imports: Vec<String>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, ast: &'a mut Ast, diagnostics: &'a mut Diagnostics) -> Parser<'a> {
        Parser {
            tokens,
            pos: 0,
            ast,
            diagnostics,
            classes: ClassTable::new(),
            functions: FunctionTable::new(),
            imports: Vec::new(),
        }
    }

    pub fn parse_module(mut self) -> ParsedModule {
        let mut top_level = Vec::new();
        while !self.is_at_end() {
            if self.match_tok(TokenKind::Import) {
                self.import_decl();
                continue;
            }
            top_level.push(self.declaration());
        }
        ParsedModule { top_level, classes: self.classes, functions: self.functions, imports: self.imports }
    }

    // --- token stream plumbing -------------------------------------------------

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if !self.is_at_end() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn match_tok(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes `kind` or logs a parse error and skips one token so a
    /// malformed program can't stall the `while !self.check(...)` loops
    /// that surround most call sites.
    fn expect(&mut self, kind: TokenKind, msg: &str) -> Token {
        if self.check(kind) {
            self.advance()
        } else {
            let tok = self.peek().clone();
            self.diagnostics.parse_error(&format!("{}, found {:?}", msg, tok.kind), tok.line);
            if !self.is_at_end() {
                self.advance();
            }
            tok
        }
    }

    fn expect_ident(&mut self) -> String {
        if self.check(TokenKind::Identifier) {
            self.advance().lexeme
        } else {
            let tok = self.peek().clone();
            self.diagnostics.parse_error(&format!("expected identifier, found {:?}", tok.kind), tok.line);
            if !self.is_at_end() {
                self.advance();
            }
            tok.lexeme
        }
    }

    fn null_type(&mut self) -> TypeId {
        self.ast.add_type(TypeNode::simple(TypeKind::Primitive(Primitive::Null)))
    }

    // --- declarations ------------------------------------------------------

    fn import_decl(&mut self) {
        let path = if self.check(TokenKind::String) { self.advance().lexeme } else { self.expect_ident() };
        self.expect(TokenKind::Semicolon, "expected ';' after import");
        self.imports.push(path);
    }

    fn declaration(&mut self) -> StmtId {
        match self.peek().kind {
            TokenKind::Class => self.class_decl(),
            TokenKind::Fn => self.function_decl(true),
            TokenKind::Type => self.type_decl(),
            _ => self.statement(),
        }
    }

    fn type_decl(&mut self) -> StmtId {
        let line = self.peek().line;
        self.advance();
        let name = self.expect_ident();
        self.expect(TokenKind::Equal, "expected '=' in type alias");
        let aliased = self.parse_type();
        self.expect(TokenKind::Semicolon, "expected ';' after type alias");
        self.ast.add_stmt(StmtKind::Type { name, aliased }, line)
    }

    fn parse_visibility(&mut self) -> Visibility {
        if self.match_tok(TokenKind::Public) {
            Visibility::Public
        } else if self.match_tok(TokenKind::Private) {
            Visibility::Private
        } else if self.match_tok(TokenKind::Protected) {
            Visibility::Protected
        } else {
            Visibility::Public
        }
    }

    fn class_decl(&mut self) -> StmtId {
        let line = self.peek().line;
        self.advance();
        let name = self.expect_ident();
        let superclass = if self.match_tok(TokenKind::Colon) { Some(self.expect_ident()) } else { None };
        self.expect(TokenKind::LeftBrace, "expected '{' to start class body");

        let mut members = Vec::new();
        let mut methods = Vec::new();
        let mut ctor = None;
        let mut dtor = None;
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            let visibility = self.parse_visibility();
            if self.check(TokenKind::Fn) {
                self.advance();
                if self.match_tok(TokenKind::Tilde) {
                    let dtor_name = self.expect_ident();
                    self.expect(TokenKind::LeftParen, "destructor takes no parameters");
                    self.expect(TokenKind::RightParen, "destructor takes no parameters");
                    let return_type = self.null_type();
                    let body = self.block();
                    let decl = FunctionDecl {
                        name: format!("~{}", dtor_name),
                        params: Vec::new(),
                        return_type,
                        body,
                        visibility,
                        is_ctor: false,
                        is_dtor: true,
                        mangled_name: None,
                    };
                    let id = self.ast.add_stmt(StmtKind::Function(decl), line);
                    methods.push(id);
                    dtor = Some(id);
                } else {
                    let method_name = self.expect_ident();
                    let params = self.parse_params();
                    let return_type = if self.match_tok(TokenKind::Arrow) { self.parse_type() } else { self.null_type() };
                    let body = self.block();
                    let is_ctor = method_name == name;
                    let decl = FunctionDecl {
                        name: method_name,
                        params,
                        return_type,
                        body,
                        visibility,
                        is_ctor,
                        is_dtor: false,
                        mangled_name: None,
                    };
                    let id = self.ast.add_stmt(StmtKind::Function(decl), line);
                    methods.push(id);
                    if is_ctor {
                        ctor = Some(id);
                    }
                }
            } else {
                let member_name = self.expect_ident();
                self.expect(TokenKind::Colon, "expected ':' after member name");
                let ty = self.parse_type();
                let initializer = if self.match_tok(TokenKind::Equal) { Some(self.expression_no_comma()) } else { None };
                self.expect(TokenKind::Semicolon, "expected ';' after member declaration");
                members.push(Member { name: member_name, ty, visibility, initializer });
            }
        }
        self.expect(TokenKind::RightBrace, "expected '}' to close class body");

        let decl = ClassDecl { name: name.clone(), members, methods, ctor, dtor, superclass };
        let id = self.ast.add_stmt(StmtKind::Class(decl), line);
        self.classes.insert(name, id);
        id
    }

    fn function_decl(&mut self, register: bool) -> StmtId {
        let line = self.peek().line;
        self.advance();
        let name = self.expect_ident();
        let params = self.parse_params();
        let return_type = if self.match_tok(TokenKind::Arrow) { self.parse_type() } else { self.null_type() };
        let body = self.block();
        let decl = FunctionDecl {
            name: name.clone(),
            params,
            return_type,
            body,
            visibility: Visibility::Public,
            is_ctor: false,
            is_dtor: false,
            mangled_name: None,
        };
        let id = self.ast.add_stmt(StmtKind::Function(decl), line);
        if register {
            self.functions.insert(name, id);
        }
        id
    }

    fn parse_params(&mut self) -> Vec<Param> {
        self.expect(TokenKind::LeftParen, "expected '(' to start parameter list");
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                let name = self.expect_ident();
                self.expect(TokenKind::Colon, "expected ':' after parameter name");
                let ty = self.parse_type();
                params.push(Param { name, ty });
                if !self.match_tok(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "expected ')' to close parameter list");
        params
    }

    /// `[const] [ref] (int|float|string|bool|null|[T]|(T,U,..)|typeof(e)|Name)`
    fn parse_type(&mut self) -> TypeId {
        let is_const = self.match_tok(TokenKind::Const);
        let is_ref = self.match_tok(TokenKind::Ref);
        let is_const = is_const || self.match_tok(TokenKind::Const);

        let kind = if self.match_tok(TokenKind::LeftBracket) {
            let inner = self.parse_type();
            self.expect(TokenKind::RightBracket, "expected ']' to close list type");
            TypeKind::List(inner)
        } else if self.match_tok(TokenKind::LeftParen) {
            let mut elements = vec![self.parse_type()];
            while self.match_tok(TokenKind::Comma) {
                elements.push(self.parse_type());
            }
            self.expect(TokenKind::RightParen, "expected ')' to close tuple type");
            TypeKind::Tuple(elements)
        } else if self.match_tok(TokenKind::Typeof) {
            self.expect(TokenKind::LeftParen, "expected '(' after 'typeof'");
            let expr = self.expression_no_comma();
            self.expect(TokenKind::RightParen, "expected ')' after 'typeof' operand");
            TypeKind::Typeof(expr)
        } else if self.match_tok(TokenKind::Int_) {
            TypeKind::Primitive(Primitive::Int)
        } else if self.match_tok(TokenKind::Float_) {
            TypeKind::Primitive(Primitive::Float)
        } else if self.match_tok(TokenKind::String_) {
            TypeKind::Primitive(Primitive::String)
        } else if self.match_tok(TokenKind::Bool) {
            TypeKind::Primitive(Primitive::Bool)
        } else if self.match_tok(TokenKind::Null) {
            TypeKind::Primitive(Primitive::Null)
        } else if self.check(TokenKind::Identifier) {
            let name = self.advance().lexeme;
            TypeKind::UserDefined { name, class: None }
        } else {
            let tok = self.peek().clone();
            self.diagnostics.parse_error(&format!("expected a type, found {:?}", tok.kind), tok.line);
            if !self.is_at_end() {
                self.advance();
            }
            TypeKind::Primitive(Primitive::Null)
        };
        self.ast.add_type(TypeNode { kind, is_const, is_ref })
    }

    // --- statements ----------------------------------------------------------

    fn block(&mut self) -> StmtId {
        let line = self.peek().line;
        self.expect(TokenKind::LeftBrace, "expected '{' to start a block");
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            stmts.push(self.statement());
        }
        self.expect(TokenKind::RightBrace, "expected '}' to close a block");
        self.ast.add_stmt(StmtKind::Block(stmts), line)
    }

    fn statement(&mut self) -> StmtId {
        match self.peek().kind {
            TokenKind::LeftBrace => self.block(),
            TokenKind::If => self.if_stmt(),
            TokenKind::While => self.while_stmt(),
            TokenKind::For => self.for_stmt(),
            TokenKind::Switch => self.switch_stmt(),
            TokenKind::Return => self.return_stmt(),
            TokenKind::Break => {
                let line = self.advance().line;
                self.expect(TokenKind::Semicolon, "expected ';' after 'break'");
                self.ast.add_stmt(StmtKind::Break, line)
            }
            TokenKind::Continue => {
                let line = self.advance().line;
                self.expect(TokenKind::Semicolon, "expected ';' after 'continue'");
                self.ast.add_stmt(StmtKind::Continue, line)
            }
            TokenKind::Var => self.var_stmt(),
            TokenKind::Ref => self.ref_var_stmt(),
            TokenKind::Fn => self.function_decl(false),
            TokenKind::Class => self.class_decl(),
            TokenKind::Type => self.type_decl(),
            _ => {
                let line = self.peek().line;
                let expr = self.expression();
                self.expect(TokenKind::Semicolon, "expected ';' after expression");
                self.ast.add_stmt(StmtKind::Expression(expr), line)
            }
        }
    }

    fn var_stmt(&mut self) -> StmtId {
        let line = self.advance().line; // 'var'
        if self.check(TokenKind::LeftParen) {
            self.advance();
            let mut names = Vec::new();
            loop {
                names.push(self.expect_ident());
                if !self.match_tok(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RightParen, "expected ')' to close tuple pattern");
            self.expect(TokenKind::Equal, "tuple destructuring requires an initializer");
            let initializer = self.expression_no_comma();
            self.expect(TokenKind::Semicolon, "expected ';' after variable declaration");
            return self.ast.add_stmt(StmtKind::VarTuple { names, declared_type: None, initializer }, line);
        }

        let name = self.expect_ident();
        let (declared_type, explicit_type) =
            if self.match_tok(TokenKind::Colon) { (Some(self.parse_type()), true) } else { (None, false) };
        let initializer = if self.match_tok(TokenKind::Equal) { Some(self.expression_no_comma()) } else { None };
        self.expect(TokenKind::Semicolon, "expected ';' after variable declaration");
        self.ast.add_stmt(StmtKind::Var { name, declared_type, initializer, is_ref: false, explicit_type }, line)
    }

    fn ref_var_stmt(&mut self) -> StmtId {
        let line = self.advance().line; // 'ref'
        let name = self.expect_ident();
        let declared_type = if self.match_tok(TokenKind::Colon) { Some(self.parse_type()) } else { None };
        let explicit_type = declared_type.is_some();
        self.expect(TokenKind::Equal, "a 'ref' binding requires an initializer");
        let initializer = Some(self.expression_no_comma());
        self.expect(TokenKind::Semicolon, "expected ';' after 'ref' declaration");
        self.ast.add_stmt(StmtKind::Var { name, declared_type, initializer, is_ref: true, explicit_type }, line)
    }

    fn if_stmt(&mut self) -> StmtId {
        let line = self.advance().line;
        self.expect(TokenKind::LeftParen, "expected '(' after 'if'");
        let condition = self.expression_no_comma();
        self.expect(TokenKind::RightParen, "expected ')' after condition");
        let then_branch = self.statement();
        let else_branch = if self.match_tok(TokenKind::Else) { Some(self.statement()) } else { None };
        self.ast.add_stmt(StmtKind::If { condition, then_branch, else_branch }, line)
    }

    fn while_stmt(&mut self) -> StmtId {
        let line = self.advance().line;
        self.expect(TokenKind::LeftParen, "expected '(' after 'while'");
        let condition = self.expression_no_comma();
        self.expect(TokenKind::RightParen, "expected ')' after condition");
        let body = self.statement();
        self.ast.add_stmt(StmtKind::While { condition, body }, line)
    }

    fn for_stmt(&mut self) -> StmtId {
        let line = self.advance().line;
        self.expect(TokenKind::LeftParen, "expected '(' after 'for'");
        let init = if self.match_tok(TokenKind::Semicolon) {
            None
        } else if self.check(TokenKind::Var) {
            Some(self.var_stmt())
        } else {
            let line = self.peek().line;
            let expr = self.expression();
            self.expect(TokenKind::Semicolon, "expected ';' after for-loop initializer");
            Some(self.ast.add_stmt(StmtKind::Expression(expr), line))
        };
        let condition = if self.check(TokenKind::Semicolon) { None } else { Some(self.expression_no_comma()) };
        self.expect(TokenKind::Semicolon, "expected ';' after for-loop condition");
        let increment = if self.check(TokenKind::RightParen) { None } else { Some(self.expression()) };
        self.expect(TokenKind::RightParen, "expected ')' after for-loop clauses");
        let body = self.statement();
        self.ast.add_stmt(StmtKind::For { init, condition, increment, body }, line)
    }

    fn is_case_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Int
                | TokenKind::Float
                | TokenKind::String
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::Default
        )
    }

    fn literal_value(&mut self) -> Literal {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Int => {
                self.advance();
                Literal::Int(tok.lexeme.parse().unwrap_or(0))
            }
            TokenKind::Float => {
                self.advance();
                Literal::Float(tok.lexeme.parse().unwrap_or(0.0))
            }
            TokenKind::String => {
                self.advance();
                Literal::Str(tok.lexeme)
            }
            TokenKind::True => {
                self.advance();
                Literal::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                Literal::Bool(false)
            }
            TokenKind::Null => {
                self.advance();
                Literal::Null
            }
            other => {
                self.diagnostics.parse_error(&format!("expected a case literal, found {:?}", other), tok.line);
                self.advance();
                Literal::Null
            }
        }
    }

    fn switch_stmt(&mut self) -> StmtId {
        let line = self.advance().line;
        self.expect(TokenKind::LeftParen, "expected '(' after 'switch'");
        let condition = self.expression_no_comma();
        self.expect(TokenKind::RightParen, "expected ')' after switch condition");
        self.expect(TokenKind::LeftBrace, "expected '{' to start switch body");

        let mut cases = Vec::new();
        let mut default = None;
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            if self.match_tok(TokenKind::Default) {
                self.expect(TokenKind::Colon, "expected ':' after 'default'");
                let mut body = Vec::new();
                while !self.check(TokenKind::RightBrace) && !self.is_case_start() {
                    body.push(self.statement());
                }
                default = Some(body);
            } else {
                let value = self.literal_value();
                self.expect(TokenKind::Colon, "expected ':' after case value");
                let mut body = Vec::new();
                while !self.check(TokenKind::RightBrace) && !self.is_case_start() {
                    body.push(self.statement());
                }
                cases.push(SwitchCase { value, body });
            }
        }
        self.expect(TokenKind::RightBrace, "expected '}' to close switch body");
        self.ast.add_stmt(StmtKind::Switch { condition, cases, default }, line)
    }

    fn return_stmt(&mut self) -> StmtId {
        let line = self.advance().line;
        let value = if self.check(TokenKind::Semicolon) { None } else { Some(self.expression()) };
        self.expect(TokenKind::Semicolon, "expected ';' after 'return'");
        self.ast.add_stmt(StmtKind::Return { value }, line)
    }

    // --- expressions -----------------------------------------------------------
    // assignment -> range -> ternary -> or -> and -> equality -> ordering
    // -> additive -> multiplicative -> unary -> postfix -> primary
    //
    // The scanner has no tokens for `&`/`|`/`^`/`<<`/`>>`, so those `BinOp`
    // variants (kept for the VM's opcode set, see `chunk.rs`) have no
    // surface syntax in this parser.

    fn expression(&mut self) -> ExprId {
        let line = self.peek().line;
        let first = self.assignment();
        if self.check(TokenKind::Comma) {
            let mut exprs = vec![first];
            while self.match_tok(TokenKind::Comma) {
                exprs.push(self.assignment());
            }
            self.ast.add_expr(ExprKind::Comma { exprs }, line)
        } else {
            first
        }
    }

    fn expression_no_comma(&mut self) -> ExprId {
        self.assignment()
    }

    fn assignment(&mut self) -> ExprId {
        let line = self.peek().line;
        let target = self.ternary();
        let op = match self.peek().kind {
            TokenKind::Equal => Some(CompoundOp::Plain),
            TokenKind::PlusEqual => Some(CompoundOp::Add),
            TokenKind::MinusEqual => Some(CompoundOp::Sub),
            TokenKind::StarEqual => Some(CompoundOp::Mul),
            TokenKind::SlashEqual => Some(CompoundOp::Div),
            _ => None,
        };
        let Some(op) = op else { return target };
        self.advance();
        let value = self.assignment();
        self.build_assign(target, op, value, line)
    }

    /// Routes an assignment target through `Set`/`ListAssign` when it's a
    /// member or index expression, so the VM write-back lands on the
    /// member/element rather than a bare stack slot. Shared by `assignment`
    /// and `desugar_incdec`, since `x.f++`/`list[0]++` hit the same targets.
    fn build_assign(&mut self, target: ExprId, op: CompoundOp, value: ExprId, line: u32) -> ExprId {
        match self.ast.expr(target).kind.clone() {
            ExprKind::Index { object, index } => {
                self.ast.add_expr(ExprKind::ListAssign { list: object, index, op, value }, line)
            }
            ExprKind::Get { object, name } => {
                self.ast.add_expr(ExprKind::Set { object, name, op, value }, line)
            }
            _ => self.ast.add_expr(ExprKind::Assign { op, target, value }, line),
        }
    }

    fn ternary(&mut self) -> ExprId {
        let line = self.peek().line;
        let condition = self.range_expr();
        if self.match_tok(TokenKind::Question) {
            let then_branch = self.assignment();
            self.expect(TokenKind::Colon, "expected ':' in ternary expression");
            let else_branch = self.assignment();
            self.ast.add_expr(ExprKind::Ternary { condition, then_branch, else_branch }, line)
        } else {
            condition
        }
    }

    fn range_expr(&mut self) -> ExprId {
        let line = self.peek().line;
        let start = self.or_expr();
        if self.match_tok(TokenKind::DotDot) {
            let end = self.or_expr();
            self.ast.add_expr(ExprKind::Range { start, end, inclusive: false }, line)
        } else if self.match_tok(TokenKind::DotDotEq) {
            let end = self.or_expr();
            self.ast.add_expr(ExprKind::Range { start, end, inclusive: true }, line)
        } else {
            start
        }
    }

    fn or_expr(&mut self) -> ExprId {
        let mut left = self.and_expr();
        while self.check(TokenKind::OrOr) || self.check(TokenKind::Or) {
            let line = self.advance().line;
            let right = self.and_expr();
            left = self.ast.add_expr(ExprKind::Logical { op: LogicalOp::Or, left, right }, line);
        }
        left
    }

    fn and_expr(&mut self) -> ExprId {
        let mut left = self.equality();
        while self.check(TokenKind::AndAnd) || self.check(TokenKind::And) {
            let line = self.advance().line;
            let right = self.equality();
            left = self.ast.add_expr(ExprKind::Logical { op: LogicalOp::And, left, right }, line);
        }
        left
    }

    fn equality(&mut self) -> ExprId {
        let mut left = self.ordering();
        loop {
            let op = match self.peek().kind {
                TokenKind::EqualEqual => BinOp::Eq,
                TokenKind::BangEqual => BinOp::Neq,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.ordering();
            left = self.ast.add_expr(ExprKind::Binary { op, left, right }, line);
        }
        left
    }

    fn ordering(&mut self) -> ExprId {
        let mut left = self.additive();
        loop {
            let op = match self.peek().kind {
                TokenKind::Greater => BinOp::Gt,
                TokenKind::GreaterEqual => BinOp::Gte,
                TokenKind::Less => BinOp::Lt,
                TokenKind::LessEqual => BinOp::Lte,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.additive();
            left = self.ast.add_expr(ExprKind::Binary { op, left, right }, line);
        }
        left
    }

    fn additive(&mut self) -> ExprId {
        let mut left = self.multiplicative();
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.multiplicative();
            left = self.ast.add_expr(ExprKind::Binary { op, left, right }, line);
        }
        left
    }

    fn multiplicative(&mut self) -> ExprId {
        let mut left = self.unary();
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.unary();
            left = self.ast.add_expr(ExprKind::Binary { op, left, right }, line);
        }
        left
    }

    fn unary(&mut self) -> ExprId {
        let line = self.peek().line;
        if self.match_tok(TokenKind::Minus) {
            let operand = self.unary();
            self.ast.add_expr(ExprKind::Unary { op: UnOp::Neg, operand }, line)
        } else if self.match_tok(TokenKind::Bang) || self.match_tok(TokenKind::Not) {
            let operand = self.unary();
            self.ast.add_expr(ExprKind::Unary { op: UnOp::Not, operand }, line)
        } else if self.match_tok(TokenKind::Tilde) {
            let operand = self.unary();
            self.ast.add_expr(ExprKind::Unary { op: UnOp::BitNot, operand }, line)
        } else if self.match_tok(TokenKind::Move) {
            let inner = self.unary();
            self.ast.add_expr(ExprKind::Move { inner }, line)
        } else {
            self.postfix()
        }
    }

    fn postfix(&mut self) -> ExprId {
        let mut expr = self.primary();
        loop {
            let line = self.peek().line;
            if self.match_tok(TokenKind::Dot) {
                let name = self.expect_ident();
                expr = self.ast.add_expr(ExprKind::Get { object: expr, name }, line);
            } else if self.match_tok(TokenKind::LeftParen) {
                let mut args = Vec::new();
                if !self.check(TokenKind::RightParen) {
                    loop {
                        args.push(self.expression_no_comma());
                        if !self.match_tok(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RightParen, "expected ')' to close call arguments");
                expr = self.ast.add_expr(ExprKind::Call { callee: expr, args }, line);
            } else if self.match_tok(TokenKind::LeftBracket) {
                let index = self.expression_no_comma();
                self.expect(TokenKind::RightBracket, "expected ']' to close index expression");
                expr = self.ast.add_expr(ExprKind::Index { object: expr, index }, line);
            } else if self.match_tok(TokenKind::PlusPlus) {
                expr = self.desugar_incdec(expr, CompoundOp::Add, line);
            } else if self.match_tok(TokenKind::MinusMinus) {
                expr = self.desugar_incdec(expr, CompoundOp::Sub, line);
            } else {
                break;
            }
        }
        expr
    }

    /// `x++`/`x--` desugar to a compound self-assignment by one, same as
    /// the emitter already handles for `x += 1`.
    fn desugar_incdec(&mut self, target: ExprId, op: CompoundOp, line: u32) -> ExprId {
        let one = self.ast.add_expr(ExprKind::Literal(Literal::Int(1)), line);
        self.build_assign(target, op, one, line)
    }

    fn primary(&mut self) -> ExprId {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Int => {
                self.advance();
                self.ast.add_expr(ExprKind::Literal(Literal::Int(tok.lexeme.parse().unwrap_or(0))), tok.line)
            }
            TokenKind::Float => {
                self.advance();
                self.ast.add_expr(ExprKind::Literal(Literal::Float(tok.lexeme.parse().unwrap_or(0.0))), tok.line)
            }
            TokenKind::String => {
                self.advance();
                self.ast.add_expr(ExprKind::Literal(Literal::Str(tok.lexeme)), tok.line)
            }
            TokenKind::True => {
                self.advance();
                self.ast.add_expr(ExprKind::Literal(Literal::Bool(true)), tok.line)
            }
            TokenKind::False => {
                self.advance();
                self.ast.add_expr(ExprKind::Literal(Literal::Bool(false)), tok.line)
            }
            TokenKind::Null => {
                self.advance();
                self.ast.add_expr(ExprKind::Literal(Literal::Null), tok.line)
            }
            TokenKind::This => {
                self.advance();
                self.ast.add_expr(ExprKind::This, tok.line)
            }
            TokenKind::Super => {
                self.advance();
                self.expect(TokenKind::Dot, "expected '.' after 'super'");
                let method = self.expect_ident();
                self.ast.add_expr(ExprKind::Super { method }, tok.line)
            }
            TokenKind::Identifier => {
                self.advance();
                if self.match_tok(TokenKind::ColonColon) {
                    if self.check(TokenKind::Identifier) {
                        let member = self.expect_ident();
                        self.ast.add_expr(ExprKind::ScopeAccess { module: tok.lexeme, member }, tok.line)
                    } else {
                        self.ast.add_expr(ExprKind::ScopeName { module: tok.lexeme }, tok.line)
                    }
                } else {
                    self.ast.add_expr(ExprKind::Variable { name: tok.lexeme }, tok.line)
                }
            }
            TokenKind::LeftParen => {
                self.advance();
                if self.match_tok(TokenKind::RightParen) {
                    return self.ast.add_expr(ExprKind::Tuple { elements: Vec::new() }, tok.line);
                }
                let first = self.expression_no_comma();
                if self.match_tok(TokenKind::Comma) {
                    let mut elements = vec![first];
                    if !self.check(TokenKind::RightParen) {
                        loop {
                            elements.push(self.expression_no_comma());
                            if !self.match_tok(TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RightParen, "expected ')' to close tuple literal");
                    self.ast.add_expr(ExprKind::Tuple { elements }, tok.line)
                } else {
                    self.expect(TokenKind::RightParen, "expected ')' to close grouped expression");
                    self.ast.add_expr(ExprKind::Grouping { inner: first }, tok.line)
                }
            }
            TokenKind::LeftBracket => {
                self.advance();
                if self.match_tok(TokenKind::RightBracket) {
                    return self.ast.add_expr(ExprKind::List { elements: Vec::new() }, tok.line);
                }
                let first = self.expression_no_comma();
                if self.match_tok(TokenKind::Semicolon) {
                    let count = self.expression_no_comma();
                    self.expect(TokenKind::RightBracket, "expected ']' to close list-repeat literal");
                    self.ast.add_expr(ExprKind::ListRepeat { value: first, count }, tok.line)
                } else {
                    let mut elements = vec![first];
                    while self.match_tok(TokenKind::Comma) {
                        if self.check(TokenKind::RightBracket) {
                            break;
                        }
                        elements.push(self.expression_no_comma());
                    }
                    self.expect(TokenKind::RightBracket, "expected ']' to close list literal");
                    self.ast.add_expr(ExprKind::List { elements }, tok.line)
                }
            }
            other => {
                self.diagnostics.parse_error(&format!("unexpected token {:?} in expression", other), tok.line);
                self.advance();
                self.ast.add_expr(ExprKind::Literal(Literal::Null), tok.line)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(src: &str) -> (Ast, ParsedModule) {
        let mut ast = Ast::new();
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(src).scan(&mut diagnostics);
        let module = Parser::new(tokens, &mut ast, &mut diagnostics).parse_module();
        assert!(!diagnostics.had_error(), "unexpected parse errors");
        (ast, module)
    }

    #[test]
    fn parses_var_declaration_with_arithmetic_initializer() {
        let (ast, module) = parse("var x: int = 1 + 2 * 3;");
        assert_eq!(module.top_level.len(), 1);
        match &ast.stmt(module.top_level[0]).kind {
            StmtKind::Var { name, is_ref, .. } => {
                assert_eq!(name, "x");
                assert!(!is_ref);
            }
            other => panic!("expected Var, got {:?}", other),
        }
    }

    #[test]
    fn parses_ref_binding_and_reassignment() {
        let (ast, module) = parse("var x: int = 1; ref y: ref int = x; y = 5;");
        assert_eq!(module.top_level.len(), 3);
        match &ast.stmt(module.top_level[1]).kind {
            StmtKind::Var { is_ref, .. } => assert!(is_ref),
            other => panic!("expected Var, got {:?}", other),
        }
    }

    #[test]
    fn parses_function_with_return_type_and_call() {
        let (_, module) = parse("fn add(a: int, b: int) -> int { return a + b; } var r = add(1, 2);");
        assert_eq!(module.functions.len(), 1);
        assert!(module.functions.contains_key("add"));
    }

    #[test]
    fn parses_class_with_members_and_constructor() {
        let (ast, module) = parse(
            "class Point { x: int = 0; y: int = 0; fn Point(x: int, y: int) { this.x = x; this.y = y; } }",
        );
        assert_eq!(module.classes.len(), 1);
        let class_id = *module.classes.get("Point").unwrap();
        assert_eq!(ast.class(class_id).members.len(), 2);
        assert!(ast.class(class_id).ctor.is_some());
    }

    #[test]
    fn parses_switch_statement_without_case_keyword() {
        let (_, module) =
            parse("switch (1) { 1: var a = 1; 2: var b = 2; default: var c = 3; }");
        assert_eq!(module.top_level.len(), 1);
    }
}
