//! Abstract syntax tree: expression/statement/type node kinds plus the
//! post-resolution attribute records the type resolver attaches to every
//! expression.
//!
//! The original AST (`examples/original_source/include/nyx/AST/AST.hpp`)
//! links nodes with bare back-pointers — `ClassStmt -> ctor/dtor`,
//! `UserDefinedType -> resolved class` — which the design notes call out as
//! cycle-prone. `Ast` instead holds parallel arenas of `ExprNode`/
//! `StmtNode`/`TypeNode`, addressed by small `Copy` ids, following the
//! typed-arena idiom rather than carrying `Rc`-cycle back-pointers.

use std::collections::HashMap;
use std::rc::Rc;

macro_rules! node_id {
    ($name:ident) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

node_id!(ExprId);
node_id!(StmtId);
node_id!(TypeId);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
    Neq,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompoundOp {
    Plain,
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i32),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Assign { op: CompoundOp, target: ExprId, value: ExprId },
    Binary { op: BinOp, left: ExprId, right: ExprId },
    Call { callee: ExprId, args: Vec<ExprId> },
    Comma { exprs: Vec<ExprId> },
    Get { object: ExprId, name: String },
    Grouping { inner: ExprId },
    Index { object: ExprId, index: ExprId },
    List { elements: Vec<ExprId> },
    ListAssign { list: ExprId, index: ExprId, op: CompoundOp, value: ExprId },
    ListRepeat { value: ExprId, count: ExprId },
    Literal(Literal),
    Logical { op: LogicalOp, left: ExprId, right: ExprId },
    Move { inner: ExprId },
    Range { start: ExprId, end: ExprId, inclusive: bool },
    ScopeAccess { module: String, member: String },
    ScopeName { module: String },
    Set { object: ExprId, name: String, op: CompoundOp, value: ExprId },
    Super { method: String },
    Ternary { condition: ExprId, then_branch: ExprId, else_branch: ExprId },
    This,
    Tuple { elements: Vec<ExprId> },
    Unary { op: UnOp, operand: ExprId },
    Variable { name: String },
}

/// Where a resolved identifier lives. Replaces the union-like overloading
/// of `module_index`/`stack_slot` the original AST nodes carry directly.
#[derive(Clone, Debug, PartialEq)]
pub enum IdentifierKind {
    Unresolved,
    Local(u32),
    Global(u32),
    ClassMember(u32),
    Native,
    Function { module_index: usize, mangled_name: Rc<str> },
    Module(usize),
}

impl Default for IdentifierKind {
    fn default() -> Self {
        IdentifierKind::Unresolved
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum NumericConversion {
    #[default]
    None,
    IntToFloat,
    FloatToInt,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ScopeAccessKind {
    #[default]
    None,
    Module,
    ClassStatic,
    Native,
}

/// Post-resolution attribute record attached to every expression node.
#[derive(Clone, Debug, Default)]
pub struct ExprAttrs {
    pub ty: Option<TypeId>,
    pub is_lvalue: bool,
    pub numeric_conversion: NumericConversion,
    pub identifier_kind: IdentifierKind,
    pub requires_copy: bool,
    pub class_ref: Option<StmtId>,
    pub module_index: Option<usize>,
    pub scope_access_kind: ScopeAccessKind,
}

#[derive(Clone, Debug)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub line: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Primitive {
    Bool,
    Int,
    Float,
    String,
    Null,
    Function,
    Module,
}

#[derive(Clone, Debug)]
pub enum TypeKind {
    Primitive(Primitive),
    UserDefined { name: String, class: Option<StmtId> },
    List(TypeId),
    Tuple(Vec<TypeId>),
    Typeof(ExprId),
}

#[derive(Clone, Debug)]
pub struct TypeNode {
    pub kind: TypeKind,
    pub is_const: bool,
    pub is_ref: bool,
}

impl TypeNode {
    pub fn simple(kind: TypeKind) -> TypeNode {
        TypeNode { kind, is_const: false, is_ref: false }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Clone, Debug)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeId,
    pub body: StmtId,
    pub visibility: Visibility,
    pub is_ctor: bool,
    pub is_dtor: bool,
    /// Set by the resolver once mangled (`ClassName@method` for methods).
    pub mangled_name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Member {
    pub name: String,
    pub ty: TypeId,
    pub visibility: Visibility,
    pub initializer: Option<ExprId>,
}

#[derive(Clone, Debug)]
pub struct ClassDecl {
    pub name: String,
    pub members: Vec<Member>,
    pub methods: Vec<StmtId>,
    pub ctor: Option<StmtId>,
    pub dtor: Option<StmtId>,
    pub superclass: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SwitchCase {
    pub value: Literal,
    pub body: Vec<StmtId>,
}

#[derive(Clone, Debug)]
pub enum StmtKind {
    Block(Vec<StmtId>),
    Break,
    Class(ClassDecl),
    Continue,
    Expression(ExprId),
    For { init: Option<StmtId>, condition: Option<ExprId>, increment: Option<ExprId>, body: StmtId },
    Function(FunctionDecl),
    If { condition: ExprId, then_branch: StmtId, else_branch: Option<StmtId> },
    Return { value: Option<ExprId> },
    Switch { condition: ExprId, cases: Vec<SwitchCase>, default: Option<Vec<StmtId>> },
    Type { name: String, aliased: TypeId },
    Var { name: String, declared_type: Option<TypeId>, initializer: Option<ExprId>, is_ref: bool, explicit_type: bool },
    VarTuple { names: Vec<String>, declared_type: Option<TypeId>, initializer: ExprId },
    While { condition: ExprId, body: StmtId },
}

#[derive(Clone, Debug)]
pub struct StmtNode {
    pub kind: StmtKind,
    pub line: u32,
}

/// Owning arena for one module's AST. Ids are only meaningful relative to
/// the `Ast` that produced them.
#[derive(Default)]
pub struct Ast {
    exprs: Vec<ExprNode>,
    stmts: Vec<StmtNode>,
    types: Vec<TypeNode>,
    pub attrs: Vec<ExprAttrs>,
    /// Stack slot assigned by the resolver to `Var`/`VarTuple` declaration
    /// sites (`None` until resolved), read back by the emitter so it does
    /// not need to re-run scope resolution.
    var_slots: Vec<Option<u32>>,
    var_is_global: Vec<bool>,
}

impl Ast {
    pub fn new() -> Ast {
        Ast::default()
    }

    pub fn add_expr(&mut self, kind: ExprKind, line: u32) -> ExprId {
        self.exprs.push(ExprNode { kind, line });
        self.attrs.push(ExprAttrs::default());
        ExprId((self.exprs.len() - 1) as u32)
    }

    pub fn add_stmt(&mut self, kind: StmtKind, line: u32) -> StmtId {
        self.stmts.push(StmtNode { kind, line });
        self.var_slots.push(None);
        self.var_is_global.push(false);
        StmtId((self.stmts.len() - 1) as u32)
    }

    pub fn set_var_slot(&mut self, id: StmtId, slot: u32, is_global: bool) {
        self.var_slots[id.index()] = Some(slot);
        self.var_is_global[id.index()] = is_global;
    }

    pub fn var_slot(&self, id: StmtId) -> u32 {
        self.var_slots[id.index()].expect("Var/VarTuple resolved before emission")
    }

    pub fn var_is_global(&self, id: StmtId) -> bool {
        self.var_is_global[id.index()]
    }

    pub fn add_type(&mut self, node: TypeNode) -> TypeId {
        self.types.push(node);
        TypeId((self.types.len() - 1) as u32)
    }

    pub fn expr(&self, id: ExprId) -> &ExprNode {
        &self.exprs[id.index()]
    }

    pub fn stmt(&self, id: StmtId) -> &StmtNode {
        &self.stmts[id.index()]
    }

    pub fn ty(&self, id: TypeId) -> &TypeNode {
        &self.types[id.index()]
    }

    pub fn attrs(&self, id: ExprId) -> &ExprAttrs {
        &self.attrs[id.index()]
    }

    pub fn set_attrs(&mut self, id: ExprId, attrs: ExprAttrs) {
        self.attrs[id.index()] = attrs;
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }

    pub fn class_mut(&mut self, id: StmtId) -> &mut ClassDecl {
        match &mut self.stmts[id.index()].kind {
            StmtKind::Class(decl) => decl,
            _ => panic!("StmtId does not refer to a class"),
        }
    }

    pub fn class(&self, id: StmtId) -> &ClassDecl {
        match &self.stmts[id.index()].kind {
            StmtKind::Class(decl) => decl,
            _ => panic!("StmtId does not refer to a class"),
        }
    }

    pub fn function(&self, id: StmtId) -> &FunctionDecl {
        match &self.stmts[id.index()].kind {
            StmtKind::Function(decl) => decl,
            _ => panic!("StmtId does not refer to a function"),
        }
    }

    pub fn function_mut(&mut self, id: StmtId) -> &mut FunctionDecl {
        match &mut self.stmts[id.index()].kind {
            StmtKind::Function(decl) => decl,
            _ => panic!("StmtId does not refer to a function"),
        }
    }
}

/// Structural type equality, ignoring `is_const`/`is_ref` (callers that
/// care about qualifiers check those separately per the conversion rules
/// in `resolver.rs`).
pub fn types_structurally_equal(ast: &Ast, a: TypeId, b: TypeId) -> bool {
    match (&ast.ty(a).kind, &ast.ty(b).kind) {
        (TypeKind::Primitive(x), TypeKind::Primitive(y)) => x == y,
        (TypeKind::UserDefined { name: x, .. }, TypeKind::UserDefined { name: y, .. }) => x == y,
        (TypeKind::List(x), TypeKind::List(y)) => types_structurally_equal(ast, *x, *y),
        (TypeKind::Tuple(xs), TypeKind::Tuple(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| types_structurally_equal(ast, *x, *y))
        }
        _ => false,
    }
}

pub fn mangle_method(class_name: &str, method_name: &str) -> String {
    format!("{}@{}", class_name, method_name)
}

pub type ClassTable = HashMap<String, StmtId>;
pub type FunctionTable = HashMap<String, StmtId>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_ids_index_their_own_vec() {
        let mut ast = Ast::new();
        let lit = ast.add_expr(ExprKind::Literal(Literal::Int(41)), 1);
        let bin = ast.add_expr(
            ExprKind::Binary { op: BinOp::Add, left: lit, right: lit },
            1,
        );
        match &ast.expr(bin).kind {
            ExprKind::Binary { op, .. } => assert_eq!(*op, BinOp::Add),
            _ => panic!("expected Binary"),
        }
    }

    #[test]
    fn structural_type_equality_ignores_qualifiers() {
        let mut ast = Ast::new();
        let int_a = ast.add_type(TypeNode { kind: TypeKind::Primitive(Primitive::Int), is_const: true, is_ref: false });
        let int_b = ast.add_type(TypeNode::simple(TypeKind::Primitive(Primitive::Int)));
        assert!(types_structurally_equal(&ast, int_a, int_b));
    }

    #[test]
    fn mangles_method_names_with_at_sign() {
        assert_eq!(mangle_method("Counter", "increment"), "Counter@increment");
    }
}
