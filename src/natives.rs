//! Native function registry.
//!
//! Grounded on `examples/original_source/include/Backend/VirtualMachine/Natives.hpp`,
//! which tables each builtin's name, arity, return type and accepted
//! argument primitives. The accepted-type sets use `enumflags2::BitFlags`
//! the same way the teacher's `vm.rs` represents its own native argument
//! checks, rather than a `Vec<PrimitiveTag>` or a closure-based predicate.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};

use crate::strings::StringCache;
use crate::value::{PrimitiveSet, PrimitiveTag, Value};

thread_local! {
    /// When set, `print` appends here instead of writing to real stdout.
    /// Thread-local so tests running on separate `cargo test` threads don't
    /// see each other's captured output.
    static STDOUT_CAPTURE: RefCell<Option<String>> = RefCell::new(None);
}

/// Test support: runs `f` with `print` output captured into a string
/// instead of going to the process's real stdout, and returns both `f`'s
/// result and everything it printed.
pub fn with_captured_stdout<T>(f: impl FnOnce() -> T) -> (T, String) {
    STDOUT_CAPTURE.with(|cell| *cell.borrow_mut() = Some(String::new()));
    let result = f();
    let captured = STDOUT_CAPTURE.with(|cell| cell.borrow_mut().take().unwrap_or_default());
    (result, captured)
}

#[derive(Debug, thiserror::Error)]
pub enum NativeError {
    #[error("native '{name}' expects {expected} argument(s), got {got}")]
    Arity { name: &'static str, expected: usize, got: usize },
    #[error("native '{name}' argument {index} has type {got}, expected one of {expected}")]
    TypeMismatch { name: &'static str, index: usize, got: PrimitiveTag, expected: String },
    #[error("native '{name}' failed: {reason}")]
    Failed { name: &'static str, reason: String },
}

pub struct NativeFn {
    pub name: &'static str,
    pub arity: usize,
    pub accepted: Vec<PrimitiveSet>,
    pub call: fn(&[Value], &mut StringCache) -> Result<Value, NativeError>,
}

fn accepts_any() -> PrimitiveSet {
    PrimitiveTag::Int
        | PrimitiveTag::Float
        | PrimitiveTag::Str
        | PrimitiveTag::Bool
        | PrimitiveTag::Null
        | PrimitiveTag::List
        | PrimitiveTag::Function
}

fn native_print(args: &[Value], _strings: &mut StringCache) -> Result<Value, NativeError> {
    let captured = STDOUT_CAPTURE.with(|cell| {
        let mut cell = cell.borrow_mut();
        match cell.as_mut() {
            Some(buf) => {
                buf.push_str(&args[0].to_string());
                true
            }
            None => false,
        }
    });
    if !captured {
        let mut stdout = io::stdout();
        let _ = write!(stdout, "{}", args[0]);
        let _ = stdout.flush();
    }
    Ok(Value::Null)
}

fn native_int(args: &[Value], _strings: &mut StringCache) -> Result<Value, NativeError> {
    let result = match &args[0] {
        Value::Int(i) => *i,
        Value::Float(f) => *f as i32,
        Value::Bool(b) => *b as i32,
        Value::Str(s) => s.as_str().trim().parse::<i32>().map_err(|_| NativeError::Failed {
            name: "int",
            reason: format!("'{}' is not a valid integer", s),
        })?,
        other => {
            return Err(NativeError::TypeMismatch {
                name: "int",
                index: 0,
                got: other.tag(),
                expected: "int|float|bool|string".to_string(),
            })
        }
    };
    Ok(Value::Int(result))
}

fn native_float(args: &[Value], _strings: &mut StringCache) -> Result<Value, NativeError> {
    let result = match &args[0] {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Str(s) => s.as_str().trim().parse::<f64>().map_err(|_| NativeError::Failed {
            name: "float",
            reason: format!("'{}' is not a valid float", s),
        })?,
        other => {
            return Err(NativeError::TypeMismatch {
                name: "float",
                index: 0,
                got: other.tag(),
                expected: "int|float|string".to_string(),
            })
        }
    };
    Ok(Value::Float(result))
}

fn native_string(args: &[Value], strings: &mut StringCache) -> Result<Value, NativeError> {
    Ok(Value::Str(strings.intern(&args[0].to_string())))
}

fn native_readline(args: &[Value], strings: &mut StringCache) -> Result<Value, NativeError> {
    let prompt = match &args[0] {
        Value::Str(s) => s.as_str().to_string(),
        other => {
            return Err(NativeError::TypeMismatch {
                name: "readline",
                index: 0,
                got: other.tag(),
                expected: "string".to_string(),
            })
        }
    };
    let mut stdout = io::stdout();
    let _ = write!(stdout, "{}", prompt);
    let _ = stdout.flush();
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).map_err(|e| NativeError::Failed {
        name: "readline",
        reason: e.to_string(),
    })?;
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Value::Str(strings.intern(&line)))
}

fn native_size(args: &[Value], _strings: &mut StringCache) -> Result<Value, NativeError> {
    let len = match &args[0] {
        Value::Str(s) => s.as_str().len(),
        Value::List(items) | Value::ListRef(items) => items.borrow().len(),
        other => {
            return Err(NativeError::TypeMismatch {
                name: "size",
                index: 0,
                got: other.tag(),
                expected: "string|list".to_string(),
            })
        }
    };
    Ok(Value::Int(len as i32))
}

/// Fixed registry, indexed by declaration order (the resolver records the
/// index as the native's operand for `CallNative`).
pub struct NativeRegistry {
    natives: Vec<NativeFn>,
}

impl Default for NativeRegistry {
    fn default() -> Self {
        NativeRegistry {
            natives: vec![
                NativeFn { name: "print", arity: 1, accepted: vec![accepts_any()], call: native_print },
                NativeFn {
                    name: "int",
                    arity: 1,
                    accepted: vec![PrimitiveTag::Int | PrimitiveTag::Float | PrimitiveTag::Bool | PrimitiveTag::Str],
                    call: native_int,
                },
                NativeFn {
                    name: "float",
                    arity: 1,
                    accepted: vec![PrimitiveTag::Int | PrimitiveTag::Float | PrimitiveTag::Str],
                    call: native_float,
                },
                NativeFn { name: "string", arity: 1, accepted: vec![accepts_any()], call: native_string },
                NativeFn {
                    name: "readline",
                    arity: 1,
                    accepted: vec![PrimitiveTag::Str.into()],
                    call: native_readline,
                },
                NativeFn {
                    name: "size",
                    arity: 1,
                    accepted: vec![PrimitiveTag::Str | PrimitiveTag::List],
                    call: native_size,
                },
            ],
        }
    }
}

impl NativeRegistry {
    pub fn new() -> NativeRegistry {
        NativeRegistry::default()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.natives.iter().position(|n| n.name == name)
    }

    pub fn get(&self, index: usize) -> &NativeFn {
        &self.natives[index]
    }

    pub fn len(&self) -> usize {
        self.natives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.natives.is_empty()
    }

    pub fn check_args(&self, index: usize, args: &[Value]) -> Result<(), NativeError> {
        let native = self.get(index);
        if args.len() != native.arity {
            return Err(NativeError::Arity { name: native.name, expected: native.arity, got: args.len() });
        }
        for (i, (arg, accepted)) in args.iter().zip(&native.accepted).enumerate() {
            if !accepted.contains(arg.tag()) {
                return Err(NativeError::TypeMismatch {
                    name: native.name,
                    index: i,
                    got: arg.tag(),
                    expected: format!("{:?}", accepted),
                });
            }
        }
        Ok(())
    }

    pub fn call(&self, index: usize, args: &[Value], strings: &mut StringCache) -> Result<Value, NativeError> {
        self.check_args(index, args)?;
        (self.get(index).call)(args, strings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_accepts_list_and_string_but_rejects_int() {
        let registry = NativeRegistry::new();
        let idx = registry.index_of("size").unwrap();
        let mut strings = StringCache::new();
        assert!(registry.call(idx, &[Value::Str(strings.intern("hi"))], &mut strings).is_ok());
        assert!(matches!(
            registry.call(idx, &[Value::Int(3)], &mut strings),
            Err(NativeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let registry = NativeRegistry::new();
        let idx = registry.index_of("print").unwrap();
        let mut strings = StringCache::new();
        let err = registry.call(idx, &[], &mut strings).unwrap_err();
        assert!(matches!(err, NativeError::Arity { .. }));
    }

    #[test]
    fn int_parses_numeric_strings() {
        let registry = NativeRegistry::new();
        let idx = registry.index_of("int").unwrap();
        let mut strings = StringCache::new();
        let result = registry.call(idx, &[Value::Str(strings.intern("42"))], &mut strings).unwrap();
        assert!(matches!(result, Value::Int(42)));
    }
}
