//! Lexical scope stack used by the type resolver to assign each local
//! variable a stack slot and look up names by lexical nesting.
//!
//! The teacher's `Env<T>` is a parent-linked chain of `Rc`-shared maps
//! built for a tree-walking interpreter that keeps whole scopes alive as
//! closures capture them. The resolver instead walks the source once and
//! only needs to know, at any point, which names are currently live and at
//! what stack offset — so scopes here are a single flat `Vec<Binding>`
//! stack, popped in declaration order as blocks close, matching the
//! source's own scope-table design (`examples/original_source/include/nyx/TypeResolver/TypeResolver.hpp`).

use crate::ast::TypeId;

#[derive(Clone, Debug)]
pub struct Binding {
    pub name: String,
    pub ty: TypeId,
    pub depth: u32,
    pub stack_slot: u32,
    pub is_ref: bool,
    pub is_const: bool,
}

#[derive(Default)]
pub struct ScopeStack {
    bindings: Vec<Binding>,
    depth: u32,
}

impl ScopeStack {
    pub fn new() -> ScopeStack {
        ScopeStack::default()
    }

    pub fn begin_scope(&mut self) {
        self.depth += 1;
    }

    /// Pops every binding declared at the current depth, in reverse
    /// declaration order, for the emitter's per-slot teardown sequence.
    pub fn end_scope(&mut self) -> Vec<Binding> {
        let depth = self.depth;
        let mut popped = Vec::new();
        while matches!(self.bindings.last(), Some(b) if b.depth >= depth) {
            popped.push(self.bindings.pop().unwrap());
        }
        self.depth -= 1;
        popped
    }

    /// Declares `name` in the current scope, returning its stack slot
    /// (the count of locals live at declaration time).
    pub fn declare(&mut self, name: &str, ty: TypeId, is_ref: bool, is_const: bool) -> u32 {
        let slot = self.bindings.len() as u32;
        self.bindings.push(Binding {
            name: name.to_string(),
            ty,
            depth: self.depth,
            stack_slot: slot,
            is_ref,
            is_const,
        });
        slot
    }

    /// Looks up the nearest (innermost-shadowing) binding for `name`.
    pub fn resolve(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().rev().find(|b| b.name == name)
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn local_count(&self) -> usize {
        self.bindings.len()
    }

    /// Drops every binding declared below module scope (depth > 0);
    /// called between top-level functions, which do not share a
    /// stack-slot namespace with each other but still see module globals.
    pub fn clear_locals(&mut self) {
        self.bindings.retain(|b| b.depth == 0);
        self.depth = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Ast, Primitive, TypeKind, TypeNode};

    #[test]
    fn shadowing_resolves_to_innermost_binding() {
        let mut ast = Ast::new();
        let int_ty = ast.add_type(TypeNode::simple(TypeKind::Primitive(Primitive::Int)));
        let mut scopes = ScopeStack::new();
        scopes.declare("x", int_ty, false, false);
        scopes.begin_scope();
        let inner_slot = scopes.declare("x", int_ty, false, false);
        assert_eq!(scopes.resolve("x").unwrap().stack_slot, inner_slot);
        scopes.end_scope();
        assert_eq!(scopes.resolve("x").unwrap().stack_slot, 0);
    }

    #[test]
    fn end_scope_returns_bindings_in_pop_order() {
        let mut ast = Ast::new();
        let int_ty = ast.add_type(TypeNode::simple(TypeKind::Primitive(Primitive::Int)));
        let mut scopes = ScopeStack::new();
        scopes.begin_scope();
        scopes.declare("a", int_ty, false, false);
        scopes.declare("b", int_ty, false, false);
        let popped = scopes.end_scope();
        assert_eq!(popped.iter().map(|b| b.name.as_str()).collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(scopes.local_count(), 0);
    }
}
