//! Runtime tagged values.
//!
//! Grounded on the original VM's `Value` enum (`examples/emdash-udashboard/src/vm.rs`):
//! a `Copy`-ish tagged union over the primitives plus lists, references and
//! functions. Unlike the teacher's dashboard VM, `Nyx` values must also
//! represent references into the value stack and both owning and
//! non-owning list handles, per the source specification's ownership
//! discipline (`LIST` vs `LIST_REF`).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use enumflags2::BitFlags;

use crate::strings::StringHandle;

/// A class instance is represented structurally as a `List` of its member
/// values in declaration order (the emitter's constructor-call lowering
/// builds exactly this shape with `MAKE_LIST`); there is no separate
/// `Value::Instance` variant.
pub type ListStorage = Rc<RefCell<Vec<Value>>>;

#[derive(Clone, Debug)]
pub struct FunctionRef {
    pub module_index: usize,
    pub mangled_name: Rc<str>,
}

#[derive(Clone, Debug)]
pub enum Value {
    Int(i32),
    Float(f64),
    Str(StringHandle),
    Bool(bool),
    Null,
    /// Absolute index into the VM's flat value stack. Never owns.
    Ref(usize),
    /// Owning handle: responsible for running an aggregate destructor (if
    /// its element type is destructible) before being dropped.
    List(ListStorage),
    /// Non-owning view of someone else's list storage.
    ListRef(ListStorage),
    Function(Rc<FunctionRef>),
}

#[derive(BitFlags, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PrimitiveTag {
    Int = 0b0000_0001,
    Float = 0b0000_0010,
    Str = 0b0000_0100,
    Bool = 0b0000_1000,
    Null = 0b0001_0000,
    Ref = 0b0010_0000,
    List = 0b0100_0000,
    Function = 0b1000_0000,
}

pub type PrimitiveSet = BitFlags<PrimitiveTag>;

impl fmt::Display for PrimitiveTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveTag::Int => "int",
            PrimitiveTag::Float => "float",
            PrimitiveTag::Str => "string",
            PrimitiveTag::Bool => "bool",
            PrimitiveTag::Null => "null",
            PrimitiveTag::Ref => "ref",
            PrimitiveTag::List => "list",
            PrimitiveTag::Function => "function",
        };
        write!(f, "{}", name)
    }
}

impl Value {
    pub fn tag(&self) -> PrimitiveTag {
        match self {
            Value::Int(_) => PrimitiveTag::Int,
            Value::Float(_) => PrimitiveTag::Float,
            Value::Str(_) => PrimitiveTag::Str,
            Value::Bool(_) => PrimitiveTag::Bool,
            Value::Null => PrimitiveTag::Null,
            Value::Ref(_) => PrimitiveTag::Ref,
            Value::List(_) | Value::ListRef(_) => PrimitiveTag::List,
            Value::Function(_) => PrimitiveTag::Function,
        }
    }

    /// `ListRef` -> owning `List` conversion backing the `COPY_LIST`
    /// opcode: a fresh, independent vector with the same (recursively
    /// copied) contents.
    pub fn deep_copy_list(&self) -> Value {
        match self {
            Value::List(items) | Value::ListRef(items) => {
                let copied: Vec<Value> = items.borrow().iter().map(Value::deep_copy).collect();
                Value::List(Rc::new(RefCell::new(copied)))
            }
            other => other.deep_copy(),
        }
    }

    /// Structural copy used when assigning a value into a scope that does
    /// not alias the source (primitives copy trivially; lists copy
    /// recursively; references and functions copy their handle).
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::List(items) => {
                let copied: Vec<Value> = items.borrow().iter().map(Value::deep_copy).collect();
                Value::List(Rc::new(RefCell::new(copied)))
            }
            other => other.clone(),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Null => false,
            _ => true,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Ref(slot) => write!(f, "<ref {}>", slot),
            Value::List(items) | Value::ListRef(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Function(func) => write!(f, "<fn {}>", func.mangled_name),
        }
    }
}
