//! Bytecode instruction set
//!
//! The encodings and instruction lengths are fixed: externally produced
//! method bytecode depends on them.
//!
//! | length | opcodes |
//! |---|---|
//! | 1 | `HALT`, `DUP`, `POP`, `RETURN_LOCAL`, `RETURN_NON_LOCAL` |
//! | 2 | `PUSH_FIELD`, `PUSH_BLOCK`, `PUSH_CONSTANT`, `PUSH_GLOBAL`, `POP_FIELD`, `SEND`, `SUPER_SEND` |
//! | 3 | `PUSH_LOCAL`, `PUSH_ARGUMENT`, `POP_LOCAL`, `POP_ARGUMENT` |
//!
//! Two-byte instructions carry either a field index (`PUSH_FIELD`,
//! `POP_FIELD`) or a literal index. Three-byte instructions carry
//! `(index, context level)`.

use std::fmt;

/// Bytecode opcode
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Return the stack top; the implicit top-level return
    Halt = 0,
    /// Push a copy of the stack top
    Dup = 1,
    /// Push local `index` of context `level`
    PushLocal = 2,
    /// Push argument `index` of context `level`
    PushArgument = 3,
    /// Push field `index` of self
    PushField = 4,
    /// Push a new block for the Invokable literal, capturing this frame
    PushBlock = 5,
    /// Push a literal
    PushConstant = 6,
    /// Push the global named by a symbol literal
    PushGlobal = 7,
    /// Discard the stack top
    Pop = 8,
    /// Pop into local `index` of context `level`
    PopLocal = 9,
    /// Pop into argument `index` of context `level`
    PopArgument = 10,
    /// Pop into field `index` of self
    PopField = 11,
    /// Send the selector literal to the receiver below the arguments
    Send = 12,
    /// Send starting lookup at the superclass of the method's holder
    SuperSend = 13,
    /// Pop and return from this frame
    ReturnLocal = 14,
    /// Pop and return from the home method of this block
    ReturnNonLocal = 15,
}

impl Opcode {
    pub const COUNT: usize = 16;

    const ALL: [Opcode; Opcode::COUNT] = [
        Opcode::Halt,
        Opcode::Dup,
        Opcode::PushLocal,
        Opcode::PushArgument,
        Opcode::PushField,
        Opcode::PushBlock,
        Opcode::PushConstant,
        Opcode::PushGlobal,
        Opcode::Pop,
        Opcode::PopLocal,
        Opcode::PopArgument,
        Opcode::PopField,
        Opcode::Send,
        Opcode::SuperSend,
        Opcode::ReturnLocal,
        Opcode::ReturnNonLocal,
    ];

    /// Instruction lengths indexed by opcode
    const LENGTHS: [usize; Opcode::COUNT] = [1, 1, 3, 3, 2, 2, 2, 2, 1, 3, 3, 2, 2, 2, 1, 1];

    /// Decode a byte; `None` for bytes outside the instruction set
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    #[inline]
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Instruction length in bytes, opcode included
    #[inline]
    pub fn length(self) -> usize {
        Self::LENGTHS.get(self as usize).copied().unwrap_or(1)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Halt => "HALT",
            Opcode::Dup => "DUP",
            Opcode::PushLocal => "PUSH_LOCAL",
            Opcode::PushArgument => "PUSH_ARGUMENT",
            Opcode::PushField => "PUSH_FIELD",
            Opcode::PushBlock => "PUSH_BLOCK",
            Opcode::PushConstant => "PUSH_CONSTANT",
            Opcode::PushGlobal => "PUSH_GLOBAL",
            Opcode::Pop => "POP",
            Opcode::PopLocal => "POP_LOCAL",
            Opcode::PopArgument => "POP_ARGUMENT",
            Opcode::PopField => "POP_FIELD",
            Opcode::Send => "SEND",
            Opcode::SuperSend => "SUPER_SEND",
            Opcode::ReturnLocal => "RETURN_LOCAL",
            Opcode::ReturnNonLocal => "RETURN_NON_LOCAL",
        }
    }

    /// True when the one-byte operand indexes the literal table
    pub fn has_literal_operand(self) -> bool {
        matches!(
            self,
            Opcode::PushBlock
                | Opcode::PushConstant
                | Opcode::PushGlobal
                | Opcode::Send
                | Opcode::SuperSend
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
