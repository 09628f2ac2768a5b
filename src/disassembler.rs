//! Bytecode listing printer backing `--disassemble-code`.
//!
//! Grounded on the teacher's own disassembler (`examples/emdash-udashboard/src/bytecode.rs`'s
//! `Display` impl for a compiled chunk): one line per instruction, opcode
//! name padded to a fixed column, operand and (for loads/constants) the
//! resolved value or string shown as a trailing comment.

use std::fmt::Write;

use crate::chunk::{Chunk, Instruction, Opcode};
use crate::emitter::RuntimeModule;

fn operand_comment(chunk: &Chunk, insn: Instruction) -> Option<String> {
    let operand = insn.operand() as usize;
    match insn.opcode() {
        Opcode::Constant => Some(format!("; {}", chunk.constant(operand))),
        Opcode::ConstantString
        | Opcode::LoadFunctionSameModule
        | Opcode::LoadFunctionModuleIndex
        | Opcode::LoadFunctionModulePath
        | Opcode::CallNative => Some(format!("; {:?}", chunk.string(operand).as_str())),
        Opcode::JumpForward | Opcode::JumpIfTrue | Opcode::JumpIfFalse | Opcode::PopJumpIfEqual | Opcode::PopJumpIfFalse => {
            None
        }
        _ => None,
    }
}

fn disassemble_chunk(out: &mut String, chunk: &Chunk) {
    for (ip, &word) in chunk.code().iter().enumerate() {
        let insn = Instruction(word);
        let line = chunk.line_for(ip);
        let comment = operand_comment(chunk, insn).unwrap_or_default();
        let _ = writeln!(out, "{:>5}  L{:<4} {:<24} {:>8}  {}", ip, line, format!("{:?}", insn.opcode()), insn.operand(), comment);
    }
}

/// Renders every chunk in `module` (top-level, teardown, and every
/// function body) as a plain-text listing.
pub fn disassemble_module(module: &RuntimeModule) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== module {} ({}) ==", module.name, module.source_path);
    let _ = writeln!(out, "-- top level --");
    disassemble_chunk(&mut out, &module.top_level_code);
    let _ = writeln!(out, "-- teardown --");
    disassemble_chunk(&mut out, &module.teardown_code);

    let mut names: Vec<&String> = module.functions.keys().collect();
    names.sort();
    for name in names {
        let func = &module.functions[name];
        let _ = writeln!(out, "-- fn {} (arity {}) --", func.mangled_name, func.arity);
        disassemble_chunk(&mut out, &func.code);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;

    #[test]
    fn lists_one_line_per_instruction_with_operand() {
        let mut chunk = Chunk::new();
        chunk.emit(Opcode::PushNull, 0, 1).unwrap();
        let idx = chunk.add_constant(crate::value::Value::Int(41)).unwrap();
        chunk.emit(Opcode::Constant, idx as u32, 1).unwrap();
        let mut out = String::new();
        disassemble_chunk(&mut out, &chunk);
        assert_eq!(out.lines().count(), 2);
        assert!(out.contains("Constant"));
        assert!(out.contains("41"));
    }
}
