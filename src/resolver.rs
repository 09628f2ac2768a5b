//! Type resolver / semantic analyzer.
//!
//! Walks the untyped AST top-down, annotating every expression with its
//! resolved type, l-valueness, and resolved identifier kind, following the
//! single-pass design in
//! `examples/original_source/include/nyx/TypeResolver/TypeResolver.hpp`.
//! Unlike that header's visitor-with-covariant-returns, this resolver is
//! one `match` per node kind returning a plain `TypeId`, in keeping with
//! this rewrite's "visitor as enum dispatch" design note.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::*;
use crate::diagnostics::Diagnostics;
use crate::env::ScopeStack;
use crate::natives::NativeRegistry;

/// The subset of another module's declarations visible through
/// `Module::member` (`ScopeAccess`).
pub struct ModuleExports {
    pub index: usize,
    pub classes: ClassTable,
    pub functions: FunctionTable,
}

pub struct Resolver<'a> {
    ast: &'a mut Ast,
    diagnostics: &'a mut Diagnostics,
    natives: &'a NativeRegistry,
    classes: &'a ClassTable,
    functions: &'a FunctionTable,
    imports: &'a HashMap<String, ModuleExports>,
    module_index: usize,
    scopes: ScopeStack,
    current_class: Option<StmtId>,
    allow_this: bool,
    loop_depth: u32,
}

fn primitive(ast: &mut Ast, p: Primitive) -> TypeId {
    ast.add_type(TypeNode::simple(TypeKind::Primitive(p)))
}

impl<'a> Resolver<'a> {
    pub fn new(
        ast: &'a mut Ast,
        diagnostics: &'a mut Diagnostics,
        natives: &'a NativeRegistry,
        classes: &'a ClassTable,
        functions: &'a FunctionTable,
        imports: &'a HashMap<String, ModuleExports>,
        module_index: usize,
    ) -> Resolver<'a> {
        Resolver {
            ast,
            diagnostics,
            natives,
            classes,
            functions,
            imports,
            module_index,
            scopes: ScopeStack::new(),
            current_class: None,
            allow_this: false,
            loop_depth: 0,
        }
    }

    /// Synthesizes a public, empty-bodied ctor/dtor for every class that
    /// omitted one, and mangles every method name to `Class@method`. Runs
    /// before any statement body is resolved so forward references to
    /// `X()`/`~X` type-check.
    pub fn synthesize_class_scaffolding(&mut self) {
        let class_ids: Vec<StmtId> = self.classes.values().copied().collect();
        for class_id in class_ids {
            let class_type = self.ast.add_type(TypeNode::simple(TypeKind::UserDefined {
                name: self.ast.class(class_id).name.clone(),
                class: Some(class_id),
            }));
            let null_type = primitive(self.ast, Primitive::Null);
            let class_name = self.ast.class(class_id).name.clone();

            if self.ast.class(class_id).ctor.is_none() {
                let this_return = self.ast.add_stmt(StmtKind::Return { value: None }, 0);
                let body = self.ast.add_stmt(StmtKind::Block(vec![this_return]), 0);
                let ctor = FunctionDecl {
                    name: class_name.clone(),
                    params: Vec::new(),
                    return_type: class_type,
                    body,
                    visibility: Visibility::Public,
                    is_ctor: true,
                    is_dtor: false,
                    mangled_name: Some(mangle_method(&class_name, &class_name)),
                };
                let ctor_id = self.ast.add_stmt(StmtKind::Function(ctor), 0);
                self.ast.class_mut(class_id).ctor = Some(ctor_id);
                self.ast.class_mut(class_id).methods.push(ctor_id);
            }
            if self.ast.class(class_id).dtor.is_none() {
                let body = self.ast.add_stmt(StmtKind::Block(Vec::new()), 0);
                let dtor_name = format!("~{}", class_name);
                let dtor = FunctionDecl {
                    name: dtor_name.clone(),
                    params: Vec::new(),
                    return_type: null_type,
                    body,
                    visibility: Visibility::Public,
                    is_ctor: false,
                    is_dtor: true,
                    mangled_name: Some(mangle_method(&class_name, &dtor_name)),
                };
                let dtor_id = self.ast.add_stmt(StmtKind::Function(dtor), 0);
                self.ast.class_mut(class_id).dtor = Some(dtor_id);
                self.ast.class_mut(class_id).methods.push(dtor_id);
            }

            let methods = self.ast.class(class_id).methods.clone();
            for method_id in methods {
                let decl = self.ast.function(method_id);
                if decl.mangled_name.is_none() {
                    let mangled = mangle_method(&class_name, &decl.name);
                    self.ast.function_mut(method_id).mangled_name = Some(mangled);
                }
            }
        }
    }

    pub fn resolve_program(&mut self, top_level: &[StmtId]) {
        for &stmt in top_level {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_stmt(&mut self, id: StmtId) {
        let kind = self.ast.stmt(id).kind.clone();
        let line = self.ast.stmt(id).line;
        match kind {
            StmtKind::Block(stmts) => {
                self.scopes.begin_scope();
                for s in stmts {
                    self.resolve_stmt(s);
                }
                self.scopes.end_scope();
            }
            StmtKind::Expression(expr) => {
                self.resolve_expr(expr);
            }
            StmtKind::Var { name, declared_type, initializer, is_ref, .. } => {
                self.resolve_var(id, &name, declared_type, initializer, is_ref, line);
            }
            StmtKind::VarTuple { names, declared_type, initializer } => {
                self.resolve_var_tuple(id, &names, declared_type, initializer, line);
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            StmtKind::While { condition, body } => {
                self.resolve_expr(condition);
                self.loop_depth += 1;
                self.resolve_stmt(body);
                self.loop_depth -= 1;
            }
            StmtKind::For { init, condition, increment, body } => {
                self.scopes.begin_scope();
                if let Some(init) = init {
                    self.resolve_stmt(init);
                }
                if let Some(condition) = condition {
                    self.resolve_expr(condition);
                }
                if let Some(increment) = increment {
                    self.resolve_expr(increment);
                }
                self.loop_depth += 1;
                self.resolve_stmt(body);
                self.loop_depth -= 1;
                self.scopes.end_scope();
            }
            StmtKind::Switch { condition, cases, default } => {
                self.resolve_expr(condition);
                self.loop_depth += 1;
                for case in cases {
                    for s in case.body {
                        self.resolve_stmt(s);
                    }
                }
                if let Some(default) = default {
                    for s in default {
                        self.resolve_stmt(s);
                    }
                }
                self.loop_depth -= 1;
            }
            StmtKind::Return { value } => {
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
            }
            StmtKind::Break | StmtKind::Continue => {
                if self.loop_depth == 0 {
                    self.diagnostics.type_error("'break'/'continue' outside of a loop or switch", line);
                }
            }
            StmtKind::Function(decl) => {
                self.resolve_function_body(&decl, false, false);
            }
            StmtKind::Class(decl) => {
                let prev_class = self.current_class.replace(id);
                for method_id in &decl.methods {
                    let method = self.ast.function(*method_id).clone();
                    self.resolve_function_body(&method, true, method.is_ctor || method.is_dtor);
                }
                self.current_class = prev_class;
            }
            StmtKind::Type { .. } => {}
        }
    }

    /// Resolves one function/method body. `is_method` reserves stack slot
    /// 0 for the implicit receiver so bare member names inside the body
    /// resolve to `ClassMember` against it; `allow_this` additionally
    /// permits the explicit `this` keyword, which the source restricts to
    /// constructors and destructors.
    fn resolve_function_body(&mut self, decl: &FunctionDecl, is_method: bool, allow_this: bool) {
        self.scopes.clear_locals();
        let prev_allow_this = self.allow_this;
        self.allow_this = allow_this;
        self.scopes.begin_scope();
        if is_method {
            let this_ty = match self.current_class {
                Some(class_id) => self.ast.add_type(TypeNode::simple(TypeKind::UserDefined {
                    name: self.ast.class(class_id).name.clone(),
                    class: Some(class_id),
                })),
                None => primitive(self.ast, Primitive::Null),
            };
            self.scopes.declare("this", this_ty, false, false);
        }
        for param in &decl.params {
            let ty = self.ast.ty(param.ty);
            let is_ref = ty.is_ref;
            let is_const = ty.is_const;
            self.scopes.declare(&param.name, param.ty, is_ref, is_const);
        }
        self.resolve_stmt(decl.body);
        self.scopes.end_scope();
        self.allow_this = prev_allow_this;
    }

    fn resolve_var(
        &mut self,
        stmt_id: StmtId,
        name: &str,
        declared_type: Option<TypeId>,
        initializer: Option<ExprId>,
        is_ref: bool,
        line: u32,
    ) {
        let init_ty = initializer.map(|e| self.resolve_expr(e));
        let final_type = match (declared_type, init_ty) {
            (Some(declared), Some(init)) => {
                if let Some(init_expr) = initializer {
                    self.check_convertible(declared, init, self.ast.attrs(init_expr).is_lvalue, true, line, init_expr);
                }
                declared
            }
            (Some(declared), None) => declared,
            (None, Some(init)) => init,
            (None, None) => {
                self.diagnostics.type_error(
                    format!("cannot infer type for '{}' without an initializer", name),
                    line,
                );
                primitive(self.ast, Primitive::Null)
            }
        };
        let is_const = declared_type.map(|t| self.ast.ty(t).is_const).unwrap_or(false);
        let is_global = self.scopes.depth() == 0;
        let slot = self.scopes.declare(name, final_type, is_ref, is_const);
        self.ast.set_var_slot(stmt_id, slot, is_global);
    }

    fn resolve_var_tuple(
        &mut self,
        stmt_id: StmtId,
        names: &[String],
        _declared_type: Option<TypeId>,
        initializer: ExprId,
        line: u32,
    ) {
        let init_ty = self.resolve_expr(initializer);
        let element_types: Vec<TypeId> = match &self.ast.ty(init_ty).kind {
            TypeKind::Tuple(elements) => elements.clone(),
            _ => {
                self.diagnostics.type_error("tuple destructuring requires a tuple-typed initializer", line);
                Vec::new()
            }
        };
        if !element_types.is_empty() && element_types.len() != names.len() {
            self.diagnostics.type_error(
                format!("tuple has {} element(s), {} name(s) given", element_types.len(), names.len()),
                line,
            );
        }
        let is_global = self.scopes.depth() == 0;
        let null_ty = primitive(self.ast, Primitive::Null);
        let mut first_slot = None;
        for (i, name) in names.iter().enumerate() {
            let ty = element_types.get(i).copied().unwrap_or(null_ty);
            let slot = self.scopes.declare(name, ty, false, false);
            if first_slot.is_none() {
                first_slot = Some(slot);
            }
        }
        self.ast.set_var_slot(stmt_id, first_slot.unwrap_or(0), is_global);
    }

    fn resolve_expr(&mut self, id: ExprId) -> TypeId {
        let kind = self.ast.expr(id).kind.clone();
        let line = self.ast.expr(id).line;
        let mut attrs = ExprAttrs::default();
        let ty = match kind {
            ExprKind::Literal(lit) => {
                attrs.is_lvalue = false;
                self.literal_type(&lit)
            }
            ExprKind::Variable { name } => self.resolve_variable(&name, line, &mut attrs),
            ExprKind::This => {
                attrs.is_lvalue = true;
                if !self.allow_this {
                    self.diagnostics.type_error("'this' is only valid inside a constructor or destructor", line);
                }
                match self.current_class {
                    Some(class_id) => self.ast.add_type(TypeNode::simple(TypeKind::UserDefined {
                        name: self.ast.class(class_id).name.clone(),
                        class: Some(class_id),
                    })),
                    None => primitive(self.ast, Primitive::Null),
                }
            }
            ExprKind::Grouping { inner } => {
                let ty = self.resolve_expr(inner);
                attrs.is_lvalue = self.ast.attrs(inner).is_lvalue;
                ty
            }
            ExprKind::Unary { op, operand } => {
                let operand_ty = self.resolve_expr(operand);
                match op {
                    UnOp::Not => primitive(self.ast, Primitive::Bool),
                    UnOp::Neg | UnOp::BitNot => operand_ty,
                }
            }
            ExprKind::Binary { op, left, right } => self.resolve_binary(op, left, right, line),
            ExprKind::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
                primitive(self.ast, Primitive::Bool)
            }
            ExprKind::Ternary { condition, then_branch, else_branch } => {
                self.resolve_expr(condition);
                let then_ty = self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
                then_ty
            }
            ExprKind::Assign { target, value, .. } => {
                let target_ty = self.resolve_expr(target);
                let value_ty = self.resolve_expr(value);
                if !self.ast.attrs(target).is_lvalue {
                    self.diagnostics.type_error("assignment target is not an l-value", line);
                }
                self.check_convertible(target_ty, value_ty, self.ast.attrs(value).is_lvalue, false, line, value);
                target_ty
            }
            ExprKind::Call { callee, args } => self.resolve_call(callee, &args, line),
            ExprKind::Get { object, name } => self.resolve_get(object, &name, line, &mut attrs),
            ExprKind::Set { object, name, value, .. } => {
                let object_ty = self.resolve_expr(object);
                let member_ty = self.member_type(object_ty, &name, line);
                let value_ty = self.resolve_expr(value);
                self.check_convertible(member_ty, value_ty, self.ast.attrs(value).is_lvalue, false, line, value);
                member_ty
            }
            ExprKind::Index { object, index } => {
                let object_ty = self.resolve_expr(object);
                self.resolve_expr(index);
                attrs.is_lvalue = true;
                match &self.ast.ty(object_ty).kind {
                    TypeKind::List(inner) => *inner,
                    TypeKind::Primitive(Primitive::String) => primitive(self.ast, Primitive::String),
                    _ => {
                        self.diagnostics.type_error("indexing requires a list or string", line);
                        primitive(self.ast, Primitive::Null)
                    }
                }
            }
            ExprKind::ListAssign { list, index, value, .. } => {
                let list_ty = self.resolve_expr(list);
                self.resolve_expr(index);
                let value_ty = self.resolve_expr(value);
                let element_ty = match &self.ast.ty(list_ty).kind {
                    TypeKind::List(inner) => *inner,
                    _ => {
                        self.diagnostics.type_error("index assignment requires a list", line);
                        primitive(self.ast, Primitive::Null)
                    }
                };
                self.check_convertible(element_ty, value_ty, self.ast.attrs(value).is_lvalue, false, line, value);
                element_ty
            }
            ExprKind::List { elements } => self.resolve_list_literal(&elements, line),
            ExprKind::ListRepeat { value, count } => {
                let value_ty = self.resolve_expr(value);
                self.resolve_expr(count);
                self.ast.add_type(TypeNode::simple(TypeKind::List(value_ty)))
            }
            ExprKind::Tuple { elements } => {
                let types: Vec<TypeId> = elements.iter().map(|e| self.resolve_expr(*e)).collect();
                self.ast.add_type(TypeNode::simple(TypeKind::Tuple(types)))
            }
            ExprKind::Range { start, end, .. } => {
                self.resolve_expr(start);
                self.resolve_expr(end);
                let int_ty = primitive(self.ast, Primitive::Int);
                self.ast.add_type(TypeNode::simple(TypeKind::List(int_ty)))
            }
            ExprKind::Comma { exprs } => {
                let mut last = primitive(self.ast, Primitive::Null);
                for e in exprs {
                    last = self.resolve_expr(e);
                }
                last
            }
            ExprKind::Move { inner } => self.resolve_expr(inner),
            ExprKind::Super { method } => self.resolve_super(&method, line),
            ExprKind::ScopeAccess { module, member } => self.resolve_scope_access(&module, &member, line, &mut attrs),
            ExprKind::ScopeName { module } => {
                attrs.scope_access_kind = ScopeAccessKind::Module;
                if !self.imports.contains_key(&module) {
                    self.diagnostics.type_error(format!("unknown module '{}'", module), line);
                }
                primitive(self.ast, Primitive::Module)
            }
        };
        attrs.ty = Some(ty);
        self.ast.set_attrs(id, attrs);
        ty
    }

    fn literal_type(&mut self, lit: &Literal) -> TypeId {
        let p = match lit {
            Literal::Int(_) => Primitive::Int,
            Literal::Float(_) => Primitive::Float,
            Literal::Str(_) => Primitive::String,
            Literal::Bool(_) => Primitive::Bool,
            Literal::Null => Primitive::Null,
        };
        primitive(self.ast, p)
    }

    fn resolve_variable(&mut self, name: &str, line: u32, attrs: &mut ExprAttrs) -> TypeId {
        if let Some(binding) = self.scopes.resolve(name) {
            attrs.is_lvalue = true;
            attrs.identifier_kind = if self.scopes.depth() == 0 && self.is_module_scope(name) {
                IdentifierKind::Global(binding.stack_slot)
            } else {
                IdentifierKind::Local(binding.stack_slot)
            };
            return binding.ty;
        }
        if let Some(class_id) = self.current_class {
            if let Some(member_index) = self.member_index(class_id, name) {
                attrs.is_lvalue = true;
                attrs.identifier_kind = IdentifierKind::ClassMember(member_index as u32);
                return self.ast.class(class_id).members[member_index].ty;
            }
        }
        if self.functions.contains_key(name) {
            attrs.identifier_kind = IdentifierKind::Function {
                module_index: self.module_index,
                mangled_name: Rc::from(name),
            };
            return primitive(self.ast, Primitive::Function);
        }
        if let Some(index) = self.natives.index_of(name) {
            attrs.identifier_kind = IdentifierKind::Native;
            let _ = index;
            return primitive(self.ast, Primitive::Function);
        }
        self.diagnostics.type_error(format!("undefined name '{}'", name), line);
        primitive(self.ast, Primitive::Null)
    }

    fn is_module_scope(&self, _name: &str) -> bool {
        true
    }

    fn resolve_binary(&mut self, op: BinOp, left: ExprId, right: ExprId, line: u32) -> TypeId {
        let left_ty = self.resolve_expr(left);
        let right_ty = self.resolve_expr(right);
        match op {
            BinOp::Eq | BinOp::Neq | BinOp::Lt | BinOp::Gt | BinOp::Lte | BinOp::Gte => {
                primitive(self.ast, Primitive::Bool)
            }
            _ => {
                let left_is_float = matches!(self.ast.ty(left_ty).kind, TypeKind::Primitive(Primitive::Float));
                let right_is_float = matches!(self.ast.ty(right_ty).kind, TypeKind::Primitive(Primitive::Float));
                if left_is_float || right_is_float {
                    if !left_is_float {
                        self.diagnostics.warning("implicit int -> float conversion", line);
                        self.ast.attrs[left.index()].numeric_conversion = NumericConversion::IntToFloat;
                    }
                    if !right_is_float {
                        self.diagnostics.warning("implicit int -> float conversion", line);
                        self.ast.attrs[right.index()].numeric_conversion = NumericConversion::IntToFloat;
                    }
                    primitive(self.ast, Primitive::Float)
                } else if matches!(self.ast.ty(left_ty).kind, TypeKind::Primitive(Primitive::String)) {
                    primitive(self.ast, Primitive::String)
                } else {
                    primitive(self.ast, Primitive::Int)
                }
            }
        }
    }

    fn resolve_list_literal(&mut self, elements: &[ExprId], line: u32) -> TypeId {
        if elements.is_empty() {
            let null_ty = primitive(self.ast, Primitive::Null);
            return self.ast.add_type(TypeNode::simple(TypeKind::List(null_ty)));
        }
        let first_ty = self.resolve_expr(elements[0]);
        for &el in &elements[1..] {
            let el_ty = self.resolve_expr(el);
            if !types_structurally_equal(self.ast, first_ty, el_ty) {
                self.diagnostics.type_error("list elements must share a single type", line);
            }
        }
        self.ast.add_type(TypeNode::simple(TypeKind::List(first_ty)))
    }

    fn resolve_call(&mut self, callee: ExprId, args: &[ExprId], line: u32) -> TypeId {
        let arg_types: Vec<TypeId> = args.iter().map(|a| self.resolve_expr(*a)).collect();

        // Constructor call: `ClassName(args)`.
        if let ExprKind::Variable { name } = self.ast.expr(callee).kind.clone() {
            if let Some(&class_id) = self.classes.get(&name) {
                self.ast.set_attrs(
                    callee,
                    ExprAttrs { class_ref: Some(class_id), ..ExprAttrs::default() },
                );
                if args.len() != self.ast.class(class_id).ctor.map(|c| self.ast.function(c).params.len()).unwrap_or(0) {
                    self.diagnostics.type_error(format!("'{}' constructor arity mismatch", name), line);
                }
                return self.ast.add_type(TypeNode::simple(TypeKind::UserDefined { name, class: Some(class_id) }));
            }
            if let Some(index) = self.natives.index_of(&name) {
                let native = self.natives.get(index);
                if args.len() != native.arity {
                    self.diagnostics.type_error(
                        format!("native '{}' expects {} argument(s), got {}", name, native.arity, args.len()),
                        line,
                    );
                }
                self.ast.set_attrs(callee, ExprAttrs { identifier_kind: IdentifierKind::Native, ..ExprAttrs::default() });
                return primitive(self.ast, Primitive::Null);
            }
            if let Some(&func_id) = self.functions.get(&name) {
                let decl = self.ast.function(func_id);
                if decl.params.len() != args.len() {
                    self.diagnostics.type_error(format!("'{}' arity mismatch", name), line);
                } else {
                    let params: Vec<TypeId> = decl.params.iter().map(|p| p.ty).collect();
                    for (param_ty, (arg_ty, &arg_expr)) in params.iter().zip(arg_types.iter().zip(args)) {
                        self.check_convertible(*param_ty, *arg_ty, self.ast.attrs(arg_expr).is_lvalue, true, line, arg_expr);
                    }
                }
                self.ast.set_attrs(
                    callee,
                    ExprAttrs {
                        identifier_kind: IdentifierKind::Function { module_index: self.module_index, mangled_name: Rc::from(name.as_str()) },
                        ..ExprAttrs::default()
                    },
                );
                return self.ast.function(func_id).return_type;
            }
        }

        let callee_ty = self.resolve_expr(callee);
        match &self.ast.ty(callee_ty).kind {
            TypeKind::Primitive(Primitive::Function) => primitive(self.ast, Primitive::Null),
            _ => callee_ty,
        }
    }

    fn resolve_get(&mut self, object: ExprId, name: &str, line: u32, attrs: &mut ExprAttrs) -> TypeId {
        let object_ty = self.resolve_expr(object);
        attrs.is_lvalue = true;
        if let TypeKind::Tuple(elements) = self.ast.ty(object_ty).kind.clone() {
            if let Ok(index) = name.parse::<usize>() {
                return elements.get(index).copied().unwrap_or_else(|| {
                    self.diagnostics.type_error(format!("tuple index {} out of range", index), line);
                    primitive(self.ast, Primitive::Null)
                });
            }
        }
        self.member_type(object_ty, name, line)
    }

    fn member_type(&mut self, object_ty: TypeId, name: &str, line: u32) -> TypeId {
        let class_id = match &self.ast.ty(object_ty).kind {
            TypeKind::UserDefined { class: Some(id), .. } => *id,
            _ => {
                self.diagnostics.type_error(format!("'{}' is not a class member access target", name), line);
                return primitive(self.ast, Primitive::Null);
            }
        };
        match self.member_index(class_id, name) {
            Some(i) => {
                let member = &self.ast.class(class_id).members[i];
                if member.visibility != Visibility::Public && self.current_class != Some(class_id) {
                    self.diagnostics.type_error(format!("member '{}' is not accessible here", name), line);
                }
                member.ty
            }
            None => {
                self.diagnostics.type_error(format!("no member '{}' on class", name), line);
                primitive(self.ast, Primitive::Null)
            }
        }
    }

    fn member_index(&self, class_id: StmtId, name: &str) -> Option<usize> {
        self.ast.class(class_id).members.iter().position(|m| m.name == name)
    }

    fn resolve_super(&mut self, method: &str, line: u32) -> TypeId {
        match self.current_class.and_then(|c| self.ast.class(c).superclass.clone()) {
            Some(super_name) => match self.classes.get(&super_name) {
                Some(&super_id) => match self.ast.class(super_id).methods.iter().find(|m| self.ast.function(**m).name == method) {
                    Some(&m) => self.ast.function(m).return_type,
                    None => {
                        self.diagnostics.type_error(format!("no method '{}' on superclass", method), line);
                        primitive(self.ast, Primitive::Null)
                    }
                },
                None => primitive(self.ast, Primitive::Null),
            },
            None => {
                self.diagnostics.type_error("'super' used without a superclass", line);
                primitive(self.ast, Primitive::Null)
            }
        }
    }

    fn resolve_scope_access(&mut self, module: &str, member: &str, line: u32, attrs: &mut ExprAttrs) -> TypeId {
        attrs.scope_access_kind = ScopeAccessKind::Module;
        let Some(exports) = self.imports.get(module) else {
            self.diagnostics.type_error(format!("unknown module '{}'", module), line);
            return primitive(self.ast, Primitive::Null);
        };
        attrs.module_index = Some(exports.index);
        if let Some(&func_id) = exports.functions.get(member) {
            attrs.identifier_kind = IdentifierKind::Function {
                module_index: exports.index,
                mangled_name: Rc::from(member),
            };
            return self.ast.function(func_id).return_type;
        }
        if let Some(&class_id) = exports.classes.get(member) {
            attrs.class_ref = Some(class_id);
            return self.ast.add_type(TypeNode::simple(TypeKind::UserDefined {
                name: member.to_string(),
                class: Some(class_id),
            }));
        }
        self.diagnostics.type_error(format!("module '{}' has no member '{}'", module, member), line);
        primitive(self.ast, Primitive::Null)
    }

    /// Implements the conversion rules from the resolver design: reference
    /// binding legality, int<->float coercion (tagged with a warning), and
    /// structural list/tuple/class equivalence.
    fn check_convertible(
        &mut self,
        to: TypeId,
        from: TypeId,
        from_is_lvalue: bool,
        in_initializer: bool,
        line: u32,
        from_expr: ExprId,
    ) -> bool {
        let to_node = self.ast.ty(to).clone();
        if to_node.is_ref && in_initializer {
            if !from_is_lvalue {
                self.diagnostics.type_error("cannot bind a reference to a temporary value", line);
                return false;
            }
            let from_node = self.ast.ty(from).clone();
            if from_node.is_const && !to_node.is_const {
                self.diagnostics.type_error("cannot bind a non-const reference to a const value", line);
                return false;
            }
        }

        if types_structurally_equal(self.ast, to, from) {
            return true;
        }

        let to_is_float = matches!(to_node.kind, TypeKind::Primitive(Primitive::Float));
        let from_is_float = matches!(self.ast.ty(from).kind, TypeKind::Primitive(Primitive::Float));
        let to_is_int = matches!(to_node.kind, TypeKind::Primitive(Primitive::Int));
        let from_is_int = matches!(self.ast.ty(from).kind, TypeKind::Primitive(Primitive::Int));
        if to_is_float && from_is_int {
            self.diagnostics.warning("implicit int -> float conversion", line);
            self.ast.attrs[from_expr.index()].numeric_conversion = NumericConversion::IntToFloat;
            return true;
        }
        if to_is_int && from_is_float {
            self.diagnostics.warning("implicit float -> int conversion", line);
            self.ast.attrs[from_expr.index()].numeric_conversion = NumericConversion::FloatToInt;
            return true;
        }

        if let (TypeKind::List(to_inner), TypeKind::List(from_inner)) = (&to_node.kind, &self.ast.ty(from).kind.clone()) {
            if types_structurally_equal(self.ast, *to_inner, *from_inner) {
                if !to_node.is_ref {
                    self.ast.attrs[from_expr.index()].requires_copy = from_is_lvalue;
                }
                return true;
            }
        }

        self.diagnostics.type_error("type mismatch in assignment or initialization", line);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::natives::NativeRegistry;

    fn empty_tables() -> (ClassTable, FunctionTable, HashMap<String, ModuleExports>) {
        (ClassTable::new(), FunctionTable::new(), HashMap::new())
    }

    #[test]
    fn arithmetic_with_mixed_int_float_promotes_to_float() {
        let mut ast = Ast::new();
        let one = ast.add_expr(ExprKind::Literal(Literal::Int(1)), 1);
        let half = ast.add_expr(ExprKind::Literal(Literal::Float(0.5)), 1);
        let sum = ast.add_expr(ExprKind::Binary { op: BinOp::Add, left: one, right: half }, 1);

        let mut diagnostics = Diagnostics::new();
        let natives = NativeRegistry::new();
        let (classes, functions, imports) = empty_tables();
        let mut resolver = Resolver::new(&mut ast, &mut diagnostics, &natives, &classes, &functions, &imports, 0);
        let stmt = resolver.ast.add_stmt(StmtKind::Expression(sum), 1);
        resolver.resolve_program(&[stmt]);

        assert!(matches!(ast.ty(ast.attrs(sum).ty.unwrap()).kind, TypeKind::Primitive(Primitive::Float)));
        assert_eq!(ast.attrs(one).numeric_conversion, NumericConversion::IntToFloat);
    }

    #[test]
    fn undefined_variable_is_a_type_error() {
        let mut ast = Ast::new();
        let var = ast.add_expr(ExprKind::Variable { name: "missing".to_string() }, 1);
        let stmt = ast.add_stmt(StmtKind::Expression(var), 1);

        let mut diagnostics = Diagnostics::new();
        let natives = NativeRegistry::new();
        let (classes, functions, imports) = empty_tables();
        let mut resolver = Resolver::new(&mut ast, &mut diagnostics, &natives, &classes, &functions, &imports, 0);
        resolver.resolve_program(&[stmt]);

        assert!(diagnostics.had_error());
    }
}
