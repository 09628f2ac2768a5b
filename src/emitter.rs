//! Bytecode emitter: lowers the type-annotated AST into one
//! `RuntimeModule` per source module.
//!
//! Grounded on `examples/original_source/include/nyx/Backend/CodeGenerators/ByteCodeGenerator.hpp`
//! for the scope/teardown/calling-convention design, and on the teacher's
//! own bytecode-generation pass (`examples/emdash-udashboard/src/bytecode.rs`)
//! for the general shape of "one emitter struct owning a `current chunk`
//! pointer that gets swapped while compiling a nested function".

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::*;
use crate::chunk::{Chunk, ChunkError, Opcode};
use crate::strings::StringCache;
use crate::value::Value;

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    #[error("'break' or 'continue' outside of a loop or switch")]
    DanglingJump,
}

pub struct RuntimeFunction {
    pub code: Chunk,
    pub arity: usize,
    pub mangled_name: String,
    pub module_index: usize,
}

pub struct RuntimeModule {
    pub name: String,
    pub source_path: String,
    pub module_index: usize,
    pub top_level_code: Chunk,
    pub teardown_code: Chunk,
    pub functions: HashMap<String, RuntimeFunction>,
}

#[derive(Clone, Copy)]
struct LocalDesc {
    ty: TypeId,
    is_ref: bool,
    is_string: bool,
    is_list: bool,
}

struct LoopContext {
    breaks: Vec<usize>,
    continues: Vec<usize>,
    continue_target: Option<usize>,
}

pub struct Emitter<'a> {
    ast: &'a Ast,
    strings: &'a mut StringCache,
    module_index: usize,
    chunk: Chunk,
    locals: Vec<LocalDesc>,
    scope_marks: Vec<usize>,
    loops: Vec<LoopContext>,
    functions: HashMap<String, RuntimeFunction>,
    /// Mangled name -> parameter types, for every function and method in
    /// this module, built before any body is emitted so a call site can
    /// see a callee's parameter ref-ness regardless of declaration order.
    param_types: HashMap<String, Vec<TypeId>>,
    /// Set for the duration of a constructor body: a bare `return;` or
    /// falling off the end must leave `this` on the stack, not `null`.
    in_ctor: bool,
}

fn is_string_type(ast: &Ast, ty: TypeId) -> bool {
    matches!(ast.ty(ty).kind, TypeKind::Primitive(Primitive::String))
}

fn is_list_type(ast: &Ast, ty: TypeId) -> bool {
    matches!(ast.ty(ty).kind, TypeKind::List(_) | TypeKind::Tuple(_))
}

impl<'a> Emitter<'a> {
    pub fn new(ast: &'a Ast, strings: &'a mut StringCache, module_index: usize) -> Emitter<'a> {
        Emitter {
            ast,
            strings,
            module_index,
            chunk: Chunk::new(),
            locals: Vec::new(),
            scope_marks: Vec::new(),
            loops: Vec::new(),
            functions: HashMap::new(),
            param_types: HashMap::new(),
            in_ctor: false,
        }
    }

    pub fn emit_module(
        mut self,
        name: &str,
        source_path: &str,
        top_level: &[StmtId],
        classes: &ClassTable,
    ) -> Result<RuntimeModule, EmitError> {
        for &class_id in classes.values() {
            for &method_id in &self.ast.class(class_id).methods {
                let decl = self.ast.function(method_id);
                let mangled = decl.mangled_name.clone().unwrap_or_else(|| decl.name.clone());
                self.param_types.insert(mangled, decl.params.iter().map(|p| p.ty).collect());
            }
        }
        for &stmt in top_level {
            if let StmtKind::Function(_) = self.ast.stmt(stmt).kind {
                let decl = self.ast.function(stmt);
                let mangled = decl.mangled_name.clone().unwrap_or_else(|| decl.name.clone());
                self.param_types.insert(mangled, decl.params.iter().map(|p| p.ty).collect());
            }
        }
        for &class_id in classes.values() {
            let methods = self.ast.class(class_id).methods.clone();
            for method_id in methods {
                self.emit_function(method_id, true)?;
            }
        }
        for &stmt in top_level {
            if let StmtKind::Function(_) = self.ast.stmt(stmt).kind {
                self.emit_function(stmt, false)?;
            }
        }

        self.chunk = Chunk::new();
        for &stmt in top_level {
            if !matches!(self.ast.stmt(stmt).kind, StmtKind::Function(_) | StmtKind::Class(_) | StmtKind::Type { .. }) {
                self.emit_stmt(stmt)?;
            }
        }
        self.emit_op(Opcode::Halt, 0, 0)?;
        let top_level_code = std::mem::replace(&mut self.chunk, Chunk::new());

        // Teardown: release module globals in reverse declaration order.
        // Globals live in the module frame array rather than on any call's
        // value stack, so this walks top-level Var/VarTuple statements
        // directly instead of consulting `self.locals`.
        let mut globals: Vec<(u32, LocalDesc)> = Vec::new();
        for &stmt in top_level {
            match &self.ast.stmt(stmt).kind {
                StmtKind::Var { declared_type, initializer, is_ref, .. } if self.ast.var_is_global(stmt) => {
                    let ty = declared_type
                        .or_else(|| initializer.and_then(|e| self.ast.attrs(e).ty))
                        .expect("Var without resolved type");
                    globals.push((
                        self.ast.var_slot(stmt),
                        LocalDesc { ty, is_ref: *is_ref, is_string: !*is_ref && is_string_type(self.ast, ty), is_list: !*is_ref && is_list_type(self.ast, ty) },
                    ));
                }
                StmtKind::VarTuple { names, initializer, .. } if self.ast.var_is_global(stmt) => {
                    let tuple_ty = self.ast.attrs(*initializer).ty.unwrap();
                    let element_types: Vec<TypeId> = match &self.ast.ty(tuple_ty).kind {
                        TypeKind::Tuple(elements) => elements.clone(),
                        _ => Vec::new(),
                    };
                    let first_slot = self.ast.var_slot(stmt);
                    for (i, _) in names.iter().enumerate() {
                        let ty = element_types.get(i).copied().unwrap_or(tuple_ty);
                        globals.push((
                            first_slot + i as u32,
                            LocalDesc { ty, is_ref: false, is_string: is_string_type(self.ast, ty), is_list: is_list_type(self.ast, ty) },
                        ));
                    }
                }
                _ => {}
            }
        }
        for (slot, desc) in globals.into_iter().rev() {
            self.emit_op(Opcode::AccessGlobal, slot, 0)?;
            self.emit_teardown_for(&desc, 0)?;
        }
        self.emit_op(Opcode::Halt, 0, 0)?;
        let teardown_code = std::mem::replace(&mut self.chunk, Chunk::new());

        Ok(RuntimeModule {
            name: name.to_string(),
            source_path: source_path.to_string(),
            module_index: self.module_index,
            top_level_code,
            teardown_code,
            functions: self.functions,
        })
    }

    fn emit_function(&mut self, stmt_id: StmtId, is_method: bool) -> Result<(), EmitError> {
        let decl = self.ast.function(stmt_id).clone();
        let saved_chunk = std::mem::replace(&mut self.chunk, Chunk::new());
        let saved_locals = std::mem::take(&mut self.locals);

        if is_method {
            // Slot 0 is the implicit receiver; callers push it ahead of
            // the explicit argument list (see `emit_method_call`).
            self.locals.push(LocalDesc { ty: decl.return_type, is_ref: false, is_string: false, is_list: true });
        }
        for param in &decl.params {
            let ty = self.ast.ty(param.ty);
            self.locals.push(LocalDesc {
                ty: param.ty,
                is_ref: ty.is_ref,
                is_string: is_string_type(self.ast, param.ty),
                is_list: is_list_type(self.ast, param.ty),
            });
        }
        let saved_in_ctor = std::mem::replace(&mut self.in_ctor, decl.is_ctor);
        self.emit_stmt(decl.body)?;
        // Fall off the end without an explicit `return`: a constructor
        // leaves `this` (slot 0) rather than `null`, since its caller treats
        // the call's result as the constructed instance; `TrapReturn` exists
        // for truly falling through a non-null-returning function, which the
        // resolver should have already flagged via a missing terminal
        // `Return`.
        if decl.is_ctor {
            self.emit_op(Opcode::AccessLocal, 0, 0)?;
        } else {
            self.emit_op(Opcode::PushNull, 0, 0)?;
        }
        self.emit_op(Opcode::Return, self.locals.len() as u32, 0)?;
        self.in_ctor = saved_in_ctor;

        let code = std::mem::replace(&mut self.chunk, saved_chunk);
        let arity = self.locals.len();
        self.locals = saved_locals;

        let mangled_name = decl.mangled_name.clone().unwrap_or_else(|| decl.name.clone());
        self.functions.insert(
            mangled_name.clone(),
            RuntimeFunction { code, arity, mangled_name, module_index: self.module_index },
        );
        Ok(())
    }

    fn begin_scope(&mut self) {
        self.scope_marks.push(self.locals.len());
    }

    fn end_scope(&mut self, line: u32) -> Result<(), EmitError> {
        let mark = self.scope_marks.pop().unwrap_or(0);
        while self.locals.len() > mark {
            let local = self.locals.pop().unwrap();
            self.emit_teardown_for(&local, line)?;
        }
        Ok(())
    }

    fn dtor_mangled_for(&self, ty: TypeId) -> Option<String> {
        let TypeKind::UserDefined { class: Some(class_id), .. } = &self.ast.ty(ty).kind else {
            return None;
        };
        let dtor = self.ast.class(*class_id).dtor.expect("dtor synthesized by resolver");
        self.ast.function(dtor).mangled_name.clone()
    }

    fn emit_teardown_for(&mut self, local: &LocalDesc, line: u32) -> Result<(), EmitError> {
        if local.is_ref {
            self.emit_op(Opcode::Pop, 0, line)?;
        } else if local.is_string {
            self.emit_op(Opcode::PopString, 0, line)?;
        } else if let Some(dtor_mangled) = self.dtor_mangled_for(local.ty) {
            // The local's instance is on top of the stack; call its
            // destructor with that value as the receiver, then discard the
            // destructor's own (always-null) return value.
            self.load_function(dtor_mangled, line)?;
            self.emit_op(Opcode::Swap, 0, line)?;
            self.emit_op(Opcode::CallFunction, 1, line)?;
            self.emit_op(Opcode::Pop, 0, line)?;
        } else if local.is_list {
            self.emit_op(Opcode::PopList, 0, line)?;
        } else {
            self.emit_op(Opcode::Pop, 0, line)?;
        }
        Ok(())
    }

    /// `Return`'s own stack-truncation skips the normal per-local teardown
    /// a fall-through block exit runs, so any class-typed local still in
    /// scope at a `return` would otherwise never get destructed. Calls
    /// each one's destructor on a duplicate of its value, leaving the
    /// original stack layout (including the just-computed return value on
    /// top) untouched for `Return` to truncate as usual.
    fn emit_return_class_teardowns(&mut self, line: u32) -> Result<(), EmitError> {
        let locals = self.locals.clone();
        let total = locals.len();
        for (i, local) in locals.iter().enumerate().rev() {
            if local.is_ref {
                continue;
            }
            if let Some(dtor_mangled) = self.dtor_mangled_for(local.ty) {
                let distance = (total - i) as u32;
                self.emit_op(Opcode::AccessFromTop, distance, line)?;
                self.load_function(dtor_mangled, line)?;
                self.emit_op(Opcode::Swap, 0, line)?;
                self.emit_op(Opcode::CallFunction, 1, line)?;
                self.emit_op(Opcode::Pop, 0, line)?;
            }
        }
        Ok(())
    }

    fn emit_op(&mut self, opcode: Opcode, operand: u32, line: u32) -> Result<usize, EmitError> {
        Ok(self.chunk.emit(opcode, operand, line)?)
    }

    fn patch(&mut self, index: usize, operand: u32) -> Result<(), EmitError> {
        Ok(self.chunk.patch_operand(index, operand)?)
    }

    fn here(&self) -> usize {
        self.chunk.len()
    }

    fn emit_stmt(&mut self, id: StmtId) -> Result<(), EmitError> {
        let line = self.ast.stmt(id).line;
        match self.ast.stmt(id).kind.clone() {
            StmtKind::Block(stmts) => {
                self.begin_scope();
                for s in stmts {
                    self.emit_stmt(s)?;
                }
                self.end_scope(line)?;
            }
            StmtKind::Expression(expr) => {
                self.emit_expr(expr)?;
                self.emit_discard(expr, line)?;
            }
            StmtKind::Var { declared_type, initializer, is_ref, .. } => {
                self.emit_var(id, declared_type, initializer, is_ref, line)?;
            }
            StmtKind::VarTuple { names, initializer, .. } => {
                self.emit_var_tuple(id, &names, initializer, line)?;
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                self.emit_expr(condition)?;
                let jump_over_then = self.emit_op(Opcode::PopJumpIfFalse, 0, line)?;
                self.emit_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    let jump_over_else = self.emit_op(Opcode::JumpForward, 0, line)?;
                    self.patch(jump_over_then, (self.here() - jump_over_then) as u32)?;
                    self.emit_stmt(else_branch)?;
                    self.patch(jump_over_else, (self.here() - jump_over_else) as u32)?;
                } else {
                    self.patch(jump_over_then, (self.here() - jump_over_then) as u32)?;
                }
            }
            StmtKind::While { condition, body } => {
                let loop_start = self.here();
                self.emit_expr(condition)?;
                let exit_jump = self.emit_op(Opcode::PopJumpIfFalse, 0, line)?;
                self.loops.push(LoopContext { breaks: Vec::new(), continues: Vec::new(), continue_target: None });
                self.emit_stmt(body)?;
                let ctx = self.loops.pop().unwrap();
                for continue_site in ctx.continues {
                    self.patch(continue_site, (loop_start as i64 - continue_site as i64).unsigned_abs() as u32)?;
                }
                let back = self.emit_op(Opcode::JumpBackward, 0, line)?;
                self.patch(back, (back - loop_start) as u32)?;
                self.patch(exit_jump, (self.here() - exit_jump) as u32)?;
                for break_site in ctx.breaks {
                    self.patch(break_site, (self.here() - break_site) as u32)?;
                }
            }
            StmtKind::For { init, condition, increment, body } => {
                self.begin_scope();
                if let Some(init) = init {
                    self.emit_stmt(init)?;
                }
                let loop_start = self.here();
                let exit_jump = if let Some(condition) = condition {
                    self.emit_expr(condition)?;
                    Some(self.emit_op(Opcode::PopJumpIfFalse, 0, line)?)
                } else {
                    None
                };
                self.loops.push(LoopContext { breaks: Vec::new(), continues: Vec::new(), continue_target: None });
                self.emit_stmt(body)?;
                let ctx = self.loops.pop().unwrap();
                let increment_site = self.here();
                for continue_site in ctx.continues {
                    self.patch(continue_site, (increment_site - continue_site) as u32)?;
                }
                if let Some(increment) = increment {
                    self.emit_expr(increment)?;
                    self.emit_discard(increment, line)?;
                }
                let back = self.emit_op(Opcode::JumpBackward, 0, line)?;
                self.patch(back, (back - loop_start) as u32)?;
                if let Some(exit_jump) = exit_jump {
                    self.patch(exit_jump, (self.here() - exit_jump) as u32)?;
                }
                for break_site in ctx.breaks {
                    self.patch(break_site, (self.here() - break_site) as u32)?;
                }
                self.end_scope(line)?;
            }
            StmtKind::Switch { condition, cases, default } => {
                // Every case test runs first (falling through to the next
                // test on a miss) and jumps into its body once matched;
                // bodies are laid out after the whole test chain, each
                // ending in an implicit break, mirroring a compiled
                // jump-table switch rather than C-style fallthrough.
                self.emit_expr(condition)?;
                self.loops.push(LoopContext { breaks: Vec::new(), continues: Vec::new(), continue_target: None });
                let mut match_jumps = Vec::with_capacity(cases.len());
                for case in &cases {
                    let value = match &case.value {
                        Literal::Int(i) => Value::Int(*i),
                        Literal::Float(f) => Value::Float(*f),
                        Literal::Bool(b) => Value::Bool(*b),
                        Literal::Str(s) => Value::Str(self.strings.intern(s)),
                        Literal::Null => Value::Null,
                    };
                    let const_index = self.chunk.add_constant(value)?;
                    self.emit_op(Opcode::AccessFromTop, 0, line)?;
                    self.emit_op(Opcode::Constant, const_index as u32, line)?;
                    match_jumps.push(self.emit_op(Opcode::PopJumpIfEqual, 0, line)?);
                }
                let miss_jump = self.emit_op(Opcode::JumpForward, 0, line)?;
                for (case, site) in cases.iter().zip(match_jumps) {
                    self.patch_here(site)?;
                    for &s in &case.body {
                        self.emit_stmt(s)?;
                    }
                    let exit = self.emit_op(Opcode::JumpForward, 0, line)?;
                    self.loops.last_mut().unwrap().breaks.push(exit);
                }
                self.patch_here(miss_jump)?;
                if let Some(default) = default {
                    for s in default {
                        self.emit_stmt(s)?;
                    }
                }
                let ctx = self.loops.pop().unwrap();
                for break_site in ctx.breaks {
                    self.patch(break_site, (self.here() - break_site) as u32)?;
                }
                self.emit_op(Opcode::Pop, 0, line)?;
            }
            StmtKind::Return { value } => {
                match value {
                    Some(v) => {
                        self.emit_expr(v)?;
                    }
                    None if self.in_ctor => {
                        // A bare `return;` inside a constructor still hands
                        // `this` back to the caller.
                        self.emit_op(Opcode::AccessLocal, 0, line)?;
                    }
                    None => {
                        self.emit_op(Opcode::PushNull, 0, line)?;
                    }
                }
                // `Return`'s bulk pop/truncate doesn't run per-local
                // teardown the way a normal fall-through end-of-block does,
                // so an early return would otherwise skip destructors for
                // every still-live local it jumps past.
                self.emit_return_class_teardowns(line)?;
                self.emit_op(Opcode::Return, self.locals.len() as u32, line)?;
            }
            StmtKind::Break => {
                let site = self.emit_op(Opcode::JumpForward, 0, line)?;
                self.loops.last_mut().ok_or(EmitError::DanglingJump)?.breaks.push(site);
            }
            StmtKind::Continue => {
                let site = self.emit_op(Opcode::JumpForward, 0, line)?;
                self.loops.last_mut().ok_or(EmitError::DanglingJump)?.continues.push(site);
            }
            StmtKind::Function(_) | StmtKind::Class(_) | StmtKind::Type { .. } => {}
        }
        Ok(())
    }

    fn patch_here(&mut self, site: usize) -> Result<(), EmitError> {
        self.patch(site, (self.here() - site) as u32)
    }

    fn emit_var(
        &mut self,
        stmt_id: StmtId,
        declared_type: Option<TypeId>,
        initializer: Option<ExprId>,
        is_ref: bool,
        line: u32,
    ) -> Result<(), EmitError> {
        match initializer {
            Some(expr) if is_ref => {
                self.emit_address_of(expr, line)?;
            }
            Some(expr) => {
                self.emit_expr(expr)?;
                self.emit_convert(expr, line)?;
                if self.ast.attrs(expr).requires_copy {
                    self.emit_op(Opcode::CopyList, 0, line)?;
                }
            }
            None => {
                self.emit_op(Opcode::PushNull, 0, line)?;
            }
        }
        let ty = declared_type
            .or_else(|| initializer.and_then(|e| self.ast.attrs(e).ty))
            .unwrap_or_else(|| panic!("Var without resolved type"));
        if self.ast.var_is_global(stmt_id) {
            // Module globals live in the module's own frame array, not on
            // this call's value stack: write through, then discard the
            // stack copy the same way an expression-statement result is
            // discarded.
            self.emit_op(Opcode::AssignGlobal, self.ast.var_slot(stmt_id), line)?;
            self.emit_teardown_for(
                &LocalDesc { ty, is_ref, is_string: !is_ref && is_string_type(self.ast, ty), is_list: !is_ref && is_list_type(self.ast, ty) },
                line,
            )?;
        } else {
            self.locals.push(LocalDesc {
                ty,
                is_ref,
                is_string: !is_ref && is_string_type(self.ast, ty),
                is_list: !is_ref && is_list_type(self.ast, ty),
            });
        }
        Ok(())
    }

    fn emit_var_tuple(&mut self, stmt_id: StmtId, names: &[String], initializer: ExprId, line: u32) -> Result<(), EmitError> {
        self.emit_expr(initializer)?;
        let tuple_ty = self.ast.attrs(initializer).ty.unwrap();
        let element_types: Vec<TypeId> = match &self.ast.ty(tuple_ty).kind {
            TypeKind::Tuple(elements) => elements.clone(),
            _ => Vec::new(),
        };
        let is_global = self.ast.var_is_global(stmt_id);
        let first_slot = self.ast.var_slot(stmt_id);
        for (i, _name) in names.iter().enumerate() {
            let is_last = i + 1 == names.len();
            if !is_last {
                self.emit_op(Opcode::AccessFromTop, 0, line)?;
            }
            let index_value = Value::Int(i as i32);
            let const_index = self.chunk.add_constant(index_value)?;
            self.emit_op(Opcode::Constant, const_index as u32, line)?;
            self.emit_op(Opcode::CheckListIndex, 0, line)?;
            self.emit_op(Opcode::IndexList, 0, line)?;
            let ty = element_types.get(i).copied().unwrap_or(tuple_ty);
            if is_global {
                self.emit_op(Opcode::AssignGlobal, first_slot + i as u32, line)?;
                self.emit_teardown_for(
                    &LocalDesc { ty, is_ref: false, is_string: is_string_type(self.ast, ty), is_list: is_list_type(self.ast, ty) },
                    line,
                )?;
            } else {
                self.locals.push(LocalDesc {
                    ty,
                    is_ref: false,
                    is_string: is_string_type(self.ast, ty),
                    is_list: is_list_type(self.ast, ty),
                });
            }
        }
        Ok(())
    }

    /// Emits code that leaves a `Value::Ref` pointing at `expr`'s storage
    /// on the stack, for `ref` variable bindings and reference-parameter
    /// arguments. Falls back to the plain value for anything that isn't
    /// an lvalue the resolver would have already rejected.
    fn emit_address_of(&mut self, expr: ExprId, line: u32) -> Result<(), EmitError> {
        match self.ast.expr(expr).kind.clone() {
            ExprKind::Variable { .. } | ExprKind::This => {
                let attrs = self.ast.attrs(expr).clone();
                match attrs.identifier_kind {
                    IdentifierKind::Local(slot) => {
                        self.emit_op(Opcode::MakeRefToLocal, slot, line)?;
                    }
                    IdentifierKind::Global(slot) => {
                        self.emit_op(Opcode::MakeRefToGlobal, slot, line)?;
                    }
                    IdentifierKind::ClassMember(index) => {
                        self.emit_op(Opcode::AccessLocal, 0, line)?;
                        let idx = self.chunk.add_constant(Value::Int(index as i32))?;
                        self.emit_op(Opcode::Constant, idx as u32, line)?;
                        self.emit_op(Opcode::CheckListIndex, 0, line)?;
                        self.emit_op(Opcode::MakeRefToIndex, 0, line)?;
                    }
                    _ => self.emit_expr(expr)?,
                }
            }
            ExprKind::Index { object, index } => {
                self.emit_expr(object)?;
                self.emit_expr(index)?;
                self.emit_op(Opcode::CheckListIndex, 0, line)?;
                self.emit_op(Opcode::MakeRefToIndex, 0, line)?;
            }
            _ => self.emit_expr(expr)?,
        }
        Ok(())
    }

    /// Emits the teardown instruction appropriate for an expression
    /// statement's discarded value.
    fn emit_discard(&mut self, expr: ExprId, line: u32) -> Result<(), EmitError> {
        // Assignment forms write their result back into a local/global/list
        // slot and leave nothing behind, unlike every other expression kind
        // `emit_discard` is asked to clean up after.
        if matches!(
            self.ast.expr(expr).kind,
            ExprKind::Assign { .. } | ExprKind::Set { .. } | ExprKind::ListAssign { .. }
        ) {
            return Ok(());
        }
        let ty = self.ast.attrs(expr).ty;
        match ty {
            Some(ty) if is_string_type(self.ast, ty) => self.emit_op(Opcode::PopString, 0, line)?,
            Some(ty) if is_list_type(self.ast, ty) => self.emit_op(Opcode::PopList, 0, line)?,
            _ => self.emit_op(Opcode::Pop, 0, line)?,
        };
        Ok(())
    }

    fn emit_expr(&mut self, id: ExprId) -> Result<(), EmitError> {
        let line = self.ast.expr(id).line;
        let kind = self.ast.expr(id).kind.clone();
        match kind {
            ExprKind::Literal(lit) => self.emit_literal(&lit, line)?,
            ExprKind::Variable { .. } | ExprKind::This => self.emit_identifier_load(id, line)?,
            ExprKind::Grouping { inner } => self.emit_expr(inner)?,
            ExprKind::Move { inner } => self.emit_expr(inner)?,
            ExprKind::Unary { op, operand } => {
                self.emit_expr(operand)?;
                let is_float = self.ast.attrs(operand).ty.map(|t| is_float_type(self.ast, t)).unwrap_or(false);
                match op {
                    UnOp::Neg if is_float => self.emit_op(Opcode::FNeg, 0, line)?,
                    UnOp::Neg => self.emit_op(Opcode::INeg, 0, line)?,
                    UnOp::Not => self.emit_op(Opcode::Not, 0, line)?,
                    UnOp::BitNot => self.emit_op(Opcode::BitNot, 0, line)?,
                };
            }
            ExprKind::Binary { op, left, right } => self.emit_binary(op, left, right, line)?,
            ExprKind::Logical { op, left, right } => self.emit_logical(op, left, right, line)?,
            ExprKind::Ternary { condition, then_branch, else_branch } => {
                self.emit_expr(condition)?;
                let else_jump = self.emit_op(Opcode::PopJumpIfFalse, 0, line)?;
                self.emit_expr(then_branch)?;
                let end_jump = self.emit_op(Opcode::JumpForward, 0, line)?;
                self.patch_here(else_jump)?;
                self.emit_expr(else_branch)?;
                self.patch_here(end_jump)?;
            }
            ExprKind::Assign { op, target, value } => self.emit_assign(target, op, value, line)?,
            ExprKind::Call { callee, args } => self.emit_call(callee, &args, line)?,
            ExprKind::Get { object, name } => self.emit_get(object, &name, line)?,
            ExprKind::Set { object, name, op, value } => self.emit_set(object, &name, op, value, line)?,
            ExprKind::Index { object, index } => {
                self.emit_expr(object)?;
                self.emit_expr(index)?;
                let is_string_obj = self.ast.attrs(object).ty.map(|t| is_string_type(self.ast, t)).unwrap_or(false);
                if is_string_obj {
                    self.emit_op(Opcode::CheckStringIndex, 0, line)?;
                    self.emit_op(Opcode::IndexString, 0, line)?;
                } else {
                    self.emit_op(Opcode::CheckListIndex, 0, line)?;
                    self.emit_op(Opcode::IndexList, 0, line)?;
                }
            }
            ExprKind::ListAssign { list, index, op, value } => {
                self.emit_expr(list)?;
                self.emit_expr(index)?;
                if op == CompoundOp::Plain {
                    self.emit_expr(value)?;
                    self.emit_convert(value, line)?;
                } else {
                    // Stack is [list, index]; duplicate both to read the
                    // current element before combining it with `value`,
                    // leaving [list, index, result] for `AssignList`.
                    self.emit_op(Opcode::AccessFromTop, 1, line)?;
                    self.emit_op(Opcode::AccessFromTop, 1, line)?;
                    self.emit_op(Opcode::CheckListIndex, 0, line)?;
                    self.emit_op(Opcode::IndexList, 0, line)?;
                    self.emit_expr(value)?;
                    self.emit_convert(value, line)?;
                    let element_ty = self.ast.attrs(list).ty.and_then(|t| match &self.ast.ty(t).kind {
                        TypeKind::List(inner) => Some(*inner),
                        _ => None,
                    });
                    let is_float = element_ty.map(|t| is_float_type(self.ast, t)).unwrap_or(false);
                    self.emit_op(compound_opcode(op, is_float), 0, line)?;
                }
                self.emit_op(Opcode::AssignList, 0, line)?;
            }
            ExprKind::List { elements } => self.emit_list_literal(&elements, line)?,
            ExprKind::ListRepeat { value, count } => {
                self.emit_op(Opcode::MakeList, 0, line)?;
                self.emit_expr(count)?;
                self.emit_expr(value)?;
                self.emit_op(Opcode::AppendList, 0, line)?;
            }
            ExprKind::Tuple { elements } => self.emit_list_literal(&elements, line)?,
            ExprKind::Range { start, end, inclusive } => self.emit_range(start, end, inclusive, line)?,
            ExprKind::Comma { exprs } => {
                for (i, e) in exprs.iter().enumerate() {
                    self.emit_expr(*e)?;
                    if i + 1 != exprs.len() {
                        self.emit_discard(*e, line)?;
                    }
                }
            }
            ExprKind::Super { .. } => {
                self.emit_op(Opcode::PushNull, 0, line)?;
            }
            ExprKind::ScopeAccess { .. } => {
                // A class reference (`Module::Class`) has no runtime value
                // of its own — only `emit_call` reads `attrs.class_ref` to
                // build the constructor call. Anything else resolved to a
                // function member loads through the same path as a plain
                // identifier.
                if self.ast.attrs(id).class_ref.is_some() {
                    self.emit_op(Opcode::PushNull, 0, line)?;
                } else {
                    self.emit_identifier_load(id, line)?;
                }
            }
            ExprKind::ScopeName { .. } => {
                self.emit_op(Opcode::PushNull, 0, line)?;
            }
        }
        Ok(())
    }

    fn emit_literal(&mut self, lit: &Literal, line: u32) -> Result<(), EmitError> {
        match lit {
            Literal::Bool(true) => {
                self.emit_op(Opcode::PushTrue, 0, line)?;
            }
            Literal::Bool(false) => {
                self.emit_op(Opcode::PushFalse, 0, line)?;
            }
            Literal::Null => {
                self.emit_op(Opcode::PushNull, 0, line)?;
            }
            Literal::Int(i) => {
                let idx = self.chunk.add_constant(Value::Int(*i))?;
                self.emit_op(Opcode::Constant, idx as u32, line)?;
            }
            Literal::Float(f) => {
                let idx = self.chunk.add_constant(Value::Float(*f))?;
                self.emit_op(Opcode::Constant, idx as u32, line)?;
            }
            Literal::Str(s) => {
                let handle = self.strings.intern(s);
                let idx = self.chunk.add_string(handle);
                self.emit_op(Opcode::ConstantString, idx as u32, line)?;
            }
        }
        Ok(())
    }

    fn emit_identifier_load(&mut self, id: ExprId, line: u32) -> Result<(), EmitError> {
        let attrs = self.ast.attrs(id).clone();
        let is_ref_read = attrs.ty.map(|t| self.ast.ty(t).is_ref).unwrap_or(false);
        match attrs.identifier_kind {
            IdentifierKind::Local(slot) => {
                self.emit_op(Opcode::AccessLocal, slot, line)?;
                if is_ref_read {
                    self.emit_op(Opcode::Deref, 0, line)?;
                }
            }
            IdentifierKind::Global(slot) => {
                self.emit_op(Opcode::AccessGlobal, slot, line)?;
                if is_ref_read {
                    self.emit_op(Opcode::Deref, 0, line)?;
                }
            }
            IdentifierKind::ClassMember(index) => {
                // `this` lives in local slot 0 inside a method.
                self.emit_op(Opcode::AccessLocal, 0, line)?;
                let idx = self.chunk.add_constant(Value::Int(index as i32))?;
                self.emit_op(Opcode::Constant, idx as u32, line)?;
                self.emit_op(Opcode::CheckListIndex, 0, line)?;
                self.emit_op(Opcode::IndexList, 0, line)?;
            }
            IdentifierKind::Function { mangled_name, module_index } => {
                if module_index == self.module_index {
                    let handle = self.strings.intern(&mangled_name);
                    let idx = self.chunk.add_string(handle);
                    self.emit_op(Opcode::LoadFunctionSameModule, idx as u32, line)?;
                } else {
                    let handle = self.strings.intern(&format!("{}:{}", module_index, mangled_name));
                    let idx = self.chunk.add_string(handle);
                    self.emit_op(Opcode::LoadFunctionModuleIndex, idx as u32, line)?;
                }
            }
            IdentifierKind::Native => {
                self.emit_op(Opcode::PushNull, 0, line)?;
            }
            IdentifierKind::Module(_) | IdentifierKind::Unresolved => {
                self.emit_op(Opcode::PushNull, 0, line)?;
            }
        }
        Ok(())
    }

    fn emit_binary(&mut self, op: BinOp, left: ExprId, right: ExprId, line: u32) -> Result<(), EmitError> {
        self.emit_expr(left)?;
        self.emit_convert(left, line)?;
        self.emit_expr(right)?;
        self.emit_convert(right, line)?;
        let result_ty = self.ast.attrs(left).ty;
        let is_float = result_ty.map(|t| is_float_type(self.ast, t)).unwrap_or(false)
            || self.ast.attrs(right).ty.map(|t| is_float_type(self.ast, t)).unwrap_or(false);
        let is_string = result_ty.map(|t| is_string_type(self.ast, t)).unwrap_or(false);
        let opcode = match op {
            BinOp::Add if is_string => Opcode::Concatenate,
            BinOp::Add if is_float => Opcode::FAdd,
            BinOp::Add => Opcode::IAdd,
            BinOp::Sub if is_float => Opcode::FSub,
            BinOp::Sub => Opcode::ISub,
            BinOp::Mul if is_float => Opcode::FMul,
            BinOp::Mul => Opcode::IMul,
            BinOp::Div if is_float => Opcode::FDiv,
            BinOp::Div => Opcode::IDiv,
            BinOp::Mod if is_float => Opcode::FMod,
            BinOp::Mod => Opcode::IMod,
            BinOp::Lt => Opcode::Lesser,
            BinOp::Gt => Opcode::Greater,
            BinOp::Lte => Opcode::Greater, // followed by Not, see below
            BinOp::Gte => Opcode::Lesser,
            BinOp::Eq if is_string => Opcode::EqualSl,
            BinOp::Eq => Opcode::Equal,
            BinOp::Neq => Opcode::Equal, // followed by Not, see below
            BinOp::Shl => Opcode::ShiftLeft,
            BinOp::Shr => Opcode::ShiftRight,
            BinOp::BitAnd => Opcode::BitAnd,
            BinOp::BitOr => Opcode::BitOr,
            BinOp::BitXor => Opcode::BitXor,
        };
        self.emit_op(opcode, 0, line)?;
        if matches!(op, BinOp::Lte | BinOp::Gte | BinOp::Neq) {
            self.emit_op(Opcode::Not, 0, line)?;
        }
        Ok(())
    }

    fn emit_convert(&mut self, expr: ExprId, line: u32) -> Result<(), EmitError> {
        match self.ast.attrs(expr).numeric_conversion {
            NumericConversion::IntToFloat => {
                self.emit_op(Opcode::IntToFloat, 0, line)?;
            }
            NumericConversion::FloatToInt => {
                self.emit_op(Opcode::FloatToInt, 0, line)?;
            }
            NumericConversion::None => {}
        }
        Ok(())
    }

    fn emit_logical(&mut self, op: LogicalOp, left: ExprId, right: ExprId, line: u32) -> Result<(), EmitError> {
        self.emit_expr(left)?;
        let short_circuit = match op {
            LogicalOp::And => self.emit_op(Opcode::JumpIfFalse, 0, line)?,
            LogicalOp::Or => self.emit_op(Opcode::JumpIfTrue, 0, line)?,
        };
        self.emit_op(Opcode::Pop, 0, line)?;
        self.emit_expr(right)?;
        self.patch_here(short_circuit)?;
        Ok(())
    }

    fn emit_assign(&mut self, target: ExprId, op: CompoundOp, value: ExprId, line: u32) -> Result<(), EmitError> {
        if op != CompoundOp::Plain {
            self.emit_expr(target)?;
        }
        self.emit_expr(value)?;
        self.emit_convert(value, line)?;
        if self.ast.attrs(value).requires_copy {
            self.emit_op(Opcode::CopyList, 0, line)?;
        }
        if op != CompoundOp::Plain {
            let is_float = self.ast.attrs(target).ty.map(|t| is_float_type(self.ast, t)).unwrap_or(false);
            self.emit_op(compound_opcode(op, is_float), 0, line)?;
        }
        match &self.ast.expr(target).kind {
            ExprKind::Variable { .. } => {
                let attrs = self.ast.attrs(target).clone();
                match attrs.identifier_kind {
                    IdentifierKind::Local(slot) => {
                        self.emit_op(Opcode::AssignLocal, slot, line)?;
                    }
                    IdentifierKind::Global(slot) => {
                        self.emit_op(Opcode::AssignGlobal, slot, line)?;
                    }
                    _ => {
                        self.emit_op(Opcode::Pop, 0, line)?;
                    }
                }
            }
            ExprKind::This => {
                self.emit_op(Opcode::AssignLocal, 0, line)?;
            }
            _ => {
                self.emit_op(Opcode::Pop, 0, line)?;
            }
        }
        Ok(())
    }

    /// Calling convention: the callee function value is pushed first,
    /// then its arguments (the receiver counts as argument 0 for a
    /// constructor or method call), then `CallFunction` with the total
    /// argument count as its operand — the VM slices that many values off
    /// the stack top for the new frame's locals and pops the function
    /// value that was left beneath them.
    fn emit_call(&mut self, callee: ExprId, args: &[ExprId], line: u32) -> Result<(), EmitError> {
        if let Some(class_id) = self.ast.attrs(callee).class_ref {
            let ctor = self.ast.class(class_id).ctor.expect("ctor synthesized by resolver");
            let ctor_mangled = self.ast.function(ctor).mangled_name.clone().unwrap();
            self.load_function(ctor_mangled.clone(), line)?;
            let member_count = self.ast.class(class_id).members.len();
            self.emit_op(Opcode::MakeList, member_count as u32, line)?;
            for member in self.ast.class(class_id).members.clone() {
                match member.initializer {
                    Some(init) => self.emit_expr(init)?,
                    None => {
                        self.emit_op(Opcode::PushNull, 0, line)?;
                    }
                }
                self.emit_op(Opcode::AppendList, 0, line)?;
            }
            let param_types = self.param_types.get(&ctor_mangled).cloned();
            self.emit_call_args(param_types.as_deref(), args, line)?;
            self.emit_op(Opcode::CallFunction, (1 + args.len()) as u32, line)?;
            return Ok(());
        }

        if let IdentifierKind::Native = self.ast.attrs(callee).identifier_kind {
            if let ExprKind::Variable { name } = &self.ast.expr(callee).kind {
                self.emit_native_call(name, args, line)?;
                return Ok(());
            }
        }

        if let ExprKind::Get { object, name } = self.ast.expr(callee).kind.clone() {
            if let Some(mangled) = self.lookup_method(object, &name) {
                self.load_function(mangled.clone(), line)?;
                self.emit_expr(object)?;
                let param_types = self.param_types.get(&mangled).cloned();
                self.emit_call_args(param_types.as_deref(), args, line)?;
                self.emit_op(Opcode::CallFunction, (1 + args.len()) as u32, line)?;
                return Ok(());
            }
        }

        let static_params = match &self.ast.attrs(callee).identifier_kind {
            IdentifierKind::Function { mangled_name, .. } => self.param_types.get(&**mangled_name).cloned(),
            _ => None,
        };
        self.emit_identifier_load(callee, line)?;
        self.emit_call_args(static_params.as_deref(), args, line)?;
        self.emit_op(Opcode::CallFunction, args.len() as u32, line)?;
        Ok(())
    }

    /// Emits each argument, taking its address with `MakeRefTo*` when the
    /// callee's parameter is a reference and the argument isn't already
    /// one (`param_types` is `None` for calls through a dynamically-held
    /// function value, which fall back to by-value passing).
    fn emit_call_args(&mut self, param_types: Option<&[TypeId]>, args: &[ExprId], line: u32) -> Result<(), EmitError> {
        for (i, &arg) in args.iter().enumerate() {
            let param_is_ref = param_types
                .and_then(|p| p.get(i))
                .map(|&t| self.ast.ty(t).is_ref)
                .unwrap_or(false);
            let arg_is_ref = self.ast.attrs(arg).ty.map(|t| self.ast.ty(t).is_ref).unwrap_or(false);
            if param_is_ref && !arg_is_ref {
                self.emit_address_of(arg, line)?;
            } else {
                self.emit_expr(arg)?;
                self.emit_convert(arg, line)?;
                if self.ast.attrs(arg).requires_copy {
                    self.emit_op(Opcode::CopyList, 0, line)?;
                }
            }
        }
        Ok(())
    }

    fn lookup_method(&self, object: ExprId, name: &str) -> Option<String> {
        let ty = self.ast.attrs(object).ty?;
        match &self.ast.ty(ty).kind {
            TypeKind::UserDefined { class: Some(class_id), .. } => self
                .ast
                .class(*class_id)
                .methods
                .iter()
                .map(|&m| self.ast.function(m))
                .find(|decl| decl.name == name)
                .and_then(|decl| decl.mangled_name.clone()),
            _ => None,
        }
    }

    fn load_function(&mut self, mangled_name: String, line: u32) -> Result<(), EmitError> {
        let handle = self.strings.intern(&mangled_name);
        let idx = self.chunk.add_string(handle);
        self.emit_op(Opcode::LoadFunctionSameModule, idx as u32, line)?;
        Ok(())
    }

    fn emit_native_call(&mut self, name: &str, args: &[ExprId], line: u32) -> Result<(), EmitError> {
        for &arg in args {
            self.emit_expr(arg)?;
        }
        let handle = self.strings.intern(name);
        let idx = self.chunk.add_string(handle);
        self.emit_op(Opcode::CallNative, idx as u32, line)?;
        // Native argument teardown happens inside the VM's native-call
        // handler, which knows each argument's runtime tag directly.
        Ok(())
    }

    fn emit_get(&mut self, object: ExprId, name: &str, line: u32) -> Result<(), EmitError> {
        self.emit_expr(object)?;
        let object_ty = self.ast.attrs(object).ty;
        if let Some(ty) = object_ty {
            if let TypeKind::Tuple(_) = &self.ast.ty(ty).kind {
                if let Ok(index) = name.parse::<i32>() {
                    let idx = self.chunk.add_constant(Value::Int(index))?;
                    self.emit_op(Opcode::Constant, idx as u32, line)?;
                    self.emit_op(Opcode::CheckListIndex, 0, line)?;
                    self.emit_op(Opcode::IndexList, 0, line)?;
                    return Ok(());
                }
            }
            if let TypeKind::UserDefined { class: Some(class_id), .. } = &self.ast.ty(ty).kind {
                if let Some(index) = self.ast.class(*class_id).members.iter().position(|m| m.name == name) {
                    let idx = self.chunk.add_constant(Value::Int(index as i32))?;
                    self.emit_op(Opcode::Constant, idx as u32, line)?;
                    self.emit_op(Opcode::CheckListIndex, 0, line)?;
                    self.emit_op(Opcode::IndexList, 0, line)?;
                    return Ok(());
                }
            }
        }
        self.emit_op(Opcode::PushNull, 0, line)?;
        Ok(())
    }

    fn emit_set(&mut self, object: ExprId, name: &str, op: CompoundOp, value: ExprId, line: u32) -> Result<(), EmitError> {
        self.emit_expr(object)?;
        let object_ty = self.ast.attrs(object).ty;
        let member = object_ty.and_then(|ty| match &self.ast.ty(ty).kind {
            TypeKind::UserDefined { class: Some(class_id), .. } => self
                .ast
                .class(*class_id)
                .members
                .iter()
                .position(|m| m.name == name)
                .map(|index| (index, self.ast.class(*class_id).members[index].ty)),
            _ => None,
        });
        if let Some((index, member_ty)) = member {
            let idx = self.chunk.add_constant(Value::Int(index as i32))?;
            if op == CompoundOp::Plain {
                self.emit_op(Opcode::Constant, idx as u32, line)?;
                self.emit_expr(value)?;
                self.emit_convert(value, line)?;
                self.emit_op(Opcode::AssignList, 0, line)?;
            } else {
                // Stack is [object]; duplicate it and the member index to
                // read the current value before combining it with `value`,
                // leaving [object, index, result] for `AssignList`.
                self.emit_op(Opcode::Constant, idx as u32, line)?;
                self.emit_op(Opcode::AccessFromTop, 1, line)?;
                self.emit_op(Opcode::AccessFromTop, 1, line)?;
                self.emit_op(Opcode::CheckListIndex, 0, line)?;
                self.emit_op(Opcode::IndexList, 0, line)?;
                self.emit_expr(value)?;
                self.emit_convert(value, line)?;
                let is_float = is_float_type(self.ast, member_ty);
                self.emit_op(compound_opcode(op, is_float), 0, line)?;
                self.emit_op(Opcode::AssignList, 0, line)?;
            }
        } else {
            self.emit_expr(value)?;
        }
        Ok(())
    }

    fn emit_list_literal(&mut self, elements: &[ExprId], line: u32) -> Result<(), EmitError> {
        self.emit_op(Opcode::MakeList, elements.len() as u32, line)?;
        for &el in elements {
            self.emit_expr(el)?;
            if self.ast.attrs(el).requires_copy {
                self.emit_op(Opcode::CopyList, 0, line)?;
            }
            self.emit_op(Opcode::AppendList, 0, line)?;
        }
        Ok(())
    }

    /// `a .. b` / `a ..= b`: builds the list inline by pushing the
    /// accumulator local and looping `AppendList` until the bound.
    fn emit_range(&mut self, start: ExprId, end: ExprId, inclusive: bool, line: u32) -> Result<(), EmitError> {
        self.begin_scope();
        self.emit_op(Opcode::MakeList, 0, line)?;
        let element_ty = self.ast.attrs(start).ty.unwrap_or_else(|| self.ast.attrs(end).ty.unwrap());
        self.locals.push(LocalDesc { ty: element_ty, is_ref: false, is_string: false, is_list: true });
        let list_slot = (self.locals.len() - 1) as u32;

        self.emit_expr(start)?;
        let int_ty = self.ast.attrs(start).ty.unwrap();
        self.locals.push(LocalDesc { ty: int_ty, is_ref: false, is_string: false, is_list: false });
        let cursor_slot = (self.locals.len() - 1) as u32;

        self.emit_expr(end)?;
        self.locals.push(LocalDesc { ty: int_ty, is_ref: false, is_string: false, is_list: false });
        let end_slot = (self.locals.len() - 1) as u32;

        let loop_start = self.here();
        self.emit_op(Opcode::AccessLocal, cursor_slot, line)?;
        self.emit_op(Opcode::AccessLocal, end_slot, line)?;
        let opcode = if inclusive { Opcode::Greater } else { Opcode::Lesser };
        if inclusive {
            // cursor > end -> stop; invert to "cursor <= end -> continue"
            self.emit_op(opcode, 0, line)?;
            self.emit_op(Opcode::Not, 0, line)?;
        } else {
            self.emit_op(opcode, 0, line)?;
        }
        let exit_jump = self.emit_op(Opcode::PopJumpIfFalse, 0, line)?;

        self.emit_op(Opcode::AccessLocal, list_slot, line)?;
        self.emit_op(Opcode::AccessLocal, cursor_slot, line)?;
        self.emit_op(Opcode::AppendList, 0, line)?;

        let one_idx = self.chunk.add_constant(Value::Int(1))?;
        self.emit_op(Opcode::AccessLocal, cursor_slot, line)?;
        self.emit_op(Opcode::Constant, one_idx as u32, line)?;
        self.emit_op(Opcode::IAdd, 0, line)?;
        self.emit_op(Opcode::AssignLocal, cursor_slot, line)?;
        self.emit_op(Opcode::Pop, 0, line)?;

        let back = self.emit_op(Opcode::JumpBackward, 0, line)?;
        self.patch(back, (back - loop_start) as u32)?;
        self.patch_here(exit_jump)?;

        // Stack is [list, cursor, end]; push a copy of list on top then
        // walk it past the two scratch scalars and the original list
        // local with swap/pop pairs, leaving only the copy behind.
        self.emit_op(Opcode::AccessLocal, list_slot, line)?;
        self.emit_op(Opcode::Swap, 0, line)?;
        self.emit_op(Opcode::Pop, 0, line)?;
        self.emit_op(Opcode::Swap, 0, line)?;
        self.emit_op(Opcode::Pop, 0, line)?;
        self.emit_op(Opcode::Swap, 0, line)?;
        self.emit_op(Opcode::PopList, 0, line)?;
        self.locals.truncate(self.locals.len() - 3);
        self.scope_marks.pop();
        Ok(())
    }
}

fn is_float_type(ast: &Ast, ty: TypeId) -> bool {
    matches!(ast.ty(ty).kind, TypeKind::Primitive(Primitive::Float))
}

/// Picks the arithmetic opcode for a compound assignment's read-modify-write
/// step. Panics on `CompoundOp::Plain`, which never reaches here: plain
/// assignment overwrites rather than combining with the current value.
fn compound_opcode(op: CompoundOp, is_float: bool) -> Opcode {
    match (op, is_float) {
        (CompoundOp::Add, true) => Opcode::FAdd,
        (CompoundOp::Add, false) => Opcode::IAdd,
        (CompoundOp::Sub, true) => Opcode::FSub,
        (CompoundOp::Sub, false) => Opcode::ISub,
        (CompoundOp::Mul, true) => Opcode::FMul,
        (CompoundOp::Mul, false) => Opcode::IMul,
        (CompoundOp::Div, true) => Opcode::FDiv,
        (CompoundOp::Div, false) => Opcode::IDiv,
        (CompoundOp::Plain, _) => unreachable!(),
    }
}

pub type FunctionRuntimeTable = HashMap<String, Rc<RuntimeFunction>>;
