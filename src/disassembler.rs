//! Human-readable bytecode listings

use crate::bytecode::Opcode;
use crate::invokable::{Invokable, Method};
use crate::value::Value;
use std::fmt::Write;

/// Render `invokable` and its nested blocks, one instruction per line
pub fn disassemble(invokable: &Invokable) -> String {
    let mut out = String::new();
    write_invokable(&mut out, invokable, 0);
    out
}

fn write_invokable(out: &mut String, invokable: &Invokable, indent: usize) {
    let pad = "    ".repeat(indent);
    let _ = writeln!(
        out,
        "{}{} (args: {}, locals: {}, max stack: {}, level: {})",
        pad,
        invokable,
        invokable.num_args(),
        invokable.num_locals(),
        invokable.max_stack(),
        invokable.context_level()
    );

    let bytecodes = invokable.bytecodes();
    let mut index = 0;
    while let Some(&byte) = bytecodes.get(index) {
        let Some(opcode) = Opcode::from_byte(byte) else {
            let _ = writeln!(out, "{}  {:4}  <invalid {:#04x}>", pad, index, byte);
            index += 1;
            continue;
        };
        let operands = bytecodes.get(index + 1..index + opcode.length());
        let _ = write!(out, "{}  {:4}  {:<16}", pad, index, opcode.mnemonic());
        match operands {
            None => {
                let _ = write!(out, " <truncated>");
            }
            Some([operand, level]) => {
                let _ = write!(out, " {}, {}", operand, level);
            }
            Some([operand]) => {
                let _ = write!(out, " {}", operand);
                if opcode.has_literal_operand() {
                    let literal = invokable.literals().get(*operand as usize);
                    let _ = write!(out, " ; {}", describe_literal(literal));
                }
            }
            Some(_) => {}
        }
        out.push('\n');

        if opcode == Opcode::PushBlock {
            let literal = operands
                .and_then(|operands| operands.first())
                .and_then(|&operand| invokable.literals().get(operand as usize));
            if let Some(Value::Method(Method::Compiled(block))) = literal {
                write_invokable(out, block, indent + 1);
            }
        }
        index += opcode.length();
    }
}

fn describe_literal(literal: Option<&Value>) -> String {
    match literal {
        Some(Value::Method(Method::Compiled(block))) => format!("block #{}", block.signature()),
        Some(value) => value.describe(),
        None => "<missing literal>".to_string(),
    }
}
