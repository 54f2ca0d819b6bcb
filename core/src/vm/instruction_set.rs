//! Monkey VM Instructions - Variable-Length Byte Format
//!
//! This module defines the instruction set for the stack-based virtual machine
//! and the primitives to encode, decode and disassemble it.
//!
//! # Instruction Format
//!
//! An instruction is one opcode byte followed by zero or more operands. The
//! width of every operand is fixed per opcode and operands are big-endian:
//! ```text
//! ┌────────────┬──────────────────┬─────┐
//! │   Opcode   │    Operand 0     │ ... │
//! │  (8 bits)  │ (8 or 16 bits)   │     │
//! └────────────┴──────────────────┴─────┘
//! ```
//!
//! The total length of an instruction is `1 + sum(operand_widths)`. Because
//! widths never depend on the operand value, the compiler can overwrite an
//! operand in place when patching jumps.
//!
//! # Stack Discipline
//!
//! Stack effect notation: `[..., operand1, operand2] -> [..., result]`

use core::fmt;
use core::ops::Deref;

use crate::vm::EncodingError;

/// Single-byte operation tag.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ========================================================================
    // Constants & Stack (0x00 - 0x04)
    // ========================================================================
    /// Push constant from pool
    /// Operand: u16 index | Stack: [...] -> [..., value]
    Constant = 0x00,

    /// Discard top value. Emitted after every expression statement.
    /// Stack: [..., a] -> [...]
    Pop = 0x01,

    /// Stack: [...] -> [..., true]
    True = 0x02,

    /// Stack: [...] -> [..., false]
    False = 0x03,

    /// Stack: [...] -> [..., null]
    Null = 0x04,

    // ========================================================================
    // Arithmetic (0x05 - 0x0A)
    // ========================================================================
    /// Stack: [..., a, b] -> [..., a + b]
    Add = 0x05,

    /// Stack: [..., a, b] -> [..., a - b]
    Sub = 0x06,

    /// Stack: [..., a, b] -> [..., a * b]
    Mul = 0x07,

    /// Stack: [..., a, b] -> [..., a / b]
    Div = 0x08,

    /// Integer negation
    /// Stack: [..., a] -> [..., -a]
    Minus = 0x09,

    /// Logical negation of truthiness
    /// Stack: [..., a] -> [..., !a]
    Bang = 0x0A,

    // ========================================================================
    // Comparison (0x0B - 0x0D)
    // ========================================================================
    /// Stack: [..., a, b] -> [..., a == b]
    Equal = 0x0B,

    /// Stack: [..., a, b] -> [..., a != b]
    NotEqual = 0x0C,

    /// There is no `LessThan`: `a < b` is compiled as `b > a`.
    /// Stack: [..., a, b] -> [..., a > b]
    GreaterThan = 0x0D,

    // ========================================================================
    // Control Flow (0x0E - 0x0F)
    // ========================================================================
    /// Unconditional jump to an absolute byte offset in the current function.
    /// Operand: u16 target
    Jump = 0x0E,

    /// Pop and jump if falsy
    /// Operand: u16 target | Stack: [..., cond] -> [...]
    JumpNotTruthy = 0x0F,

    // ========================================================================
    // Bindings (0x10 - 0x15)
    // ========================================================================
    /// Operand: u16 slot | Stack: [..., value] -> [...]
    SetGlobal = 0x10,

    /// Operand: u16 slot | Stack: [...] -> [..., value]
    GetGlobal = 0x11,

    /// Slot is relative to the frame's base pointer.
    /// Operand: u8 slot | Stack: [..., value] -> [...]
    SetLocal = 0x12,

    /// Operand: u8 slot | Stack: [...] -> [..., value]
    GetLocal = 0x13,

    /// Operand: u8 builtin index | Stack: [...] -> [..., builtin]
    GetBuiltin = 0x14,

    /// Load a value captured by the running closure.
    /// Operand: u8 index | Stack: [...] -> [..., value]
    GetFree = 0x15,

    // ========================================================================
    // Collections (0x16 - 0x18)
    // ========================================================================
    /// Operand: u16 count | Stack: [..., e1, ..., eN] -> [..., array]
    Array = 0x16,

    /// Operand: u16 count (twice the number of pairs)
    /// Stack: [..., k1, v1, ..., kN, vN] -> [..., hash]
    Hash = 0x17,

    /// Stack: [..., collection, index] -> [..., element]
    Index = 0x18,

    // ========================================================================
    // Functions (0x19 - 0x1D)
    // ========================================================================
    /// Operand: u16 argument count
    /// Stack: [..., arg1, ..., argN, callee] -> [..., result]
    Call = 0x19,

    /// Stack: [..., retval] -> caller's [..., retval]
    ReturnValue = 0x1A,

    /// Stack: [...] -> caller's [..., null]
    Return = 0x1B,

    /// Build a closure around a compiled function constant.
    /// Operands: u16 constant index, u8 free count
    /// Stack: [..., free1, ..., freeN] -> [..., closure]
    Closure = 0x1C,

    /// Push the function being executed (self-recursion).
    /// Stack: [...] -> [..., closure]
    CurrentClosure = 0x1D,
}

/// Number of defined opcodes. Opcode values are dense in `0..OPCODE_COUNT`.
pub const OPCODE_COUNT: usize = 0x1E;

/// Mnemonic and operand layout of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Definition {
    pub name: &'static str,
    /// Byte width of each operand, in order.
    pub operand_widths: &'static [usize],
}

impl Definition {
    const fn new(name: &'static str, operand_widths: &'static [usize]) -> Self {
        Self {
            name,
            operand_widths,
        }
    }

    /// Total encoded length of an instruction with this definition.
    pub fn instruction_len(&self) -> usize {
        1 + self.operand_widths.iter().sum::<usize>()
    }
}

/// Indexed by opcode value.
static DEFINITIONS: [Definition; OPCODE_COUNT] = [
    Definition::new("Constant", &[2]),
    Definition::new("Pop", &[]),
    Definition::new("True", &[]),
    Definition::new("False", &[]),
    Definition::new("Null", &[]),
    Definition::new("Add", &[]),
    Definition::new("Sub", &[]),
    Definition::new("Mul", &[]),
    Definition::new("Div", &[]),
    Definition::new("Minus", &[]),
    Definition::new("Bang", &[]),
    Definition::new("Equal", &[]),
    Definition::new("NotEqual", &[]),
    Definition::new("GreaterThan", &[]),
    Definition::new("Jump", &[2]),
    Definition::new("JumpNotTruthy", &[2]),
    Definition::new("SetGlobal", &[2]),
    Definition::new("GetGlobal", &[2]),
    Definition::new("SetLocal", &[1]),
    Definition::new("GetLocal", &[1]),
    Definition::new("GetBuiltin", &[1]),
    Definition::new("GetFree", &[1]),
    Definition::new("Array", &[2]),
    Definition::new("Hash", &[2]),
    Definition::new("Index", &[]),
    Definition::new("Call", &[2]),
    Definition::new("ReturnValue", &[]),
    Definition::new("Return", &[]),
    Definition::new("Closure", &[2, 1]),
    Definition::new("CurrentClosure", &[]),
];

impl Opcode {
    /// Every opcode, in discriminant order.
    pub const ALL: [Opcode; OPCODE_COUNT] = [
        Opcode::Constant,
        Opcode::Pop,
        Opcode::True,
        Opcode::False,
        Opcode::Null,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Minus,
        Opcode::Bang,
        Opcode::Equal,
        Opcode::NotEqual,
        Opcode::GreaterThan,
        Opcode::Jump,
        Opcode::JumpNotTruthy,
        Opcode::SetGlobal,
        Opcode::GetGlobal,
        Opcode::SetLocal,
        Opcode::GetLocal,
        Opcode::GetBuiltin,
        Opcode::GetFree,
        Opcode::Array,
        Opcode::Hash,
        Opcode::Index,
        Opcode::Call,
        Opcode::ReturnValue,
        Opcode::Return,
        Opcode::Closure,
        Opcode::CurrentClosure,
    ];

    pub fn definition(self) -> &'static Definition {
        &DEFINITIONS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.definition().name
    }
}

impl TryFrom<u8> for Opcode {
    type Error = EncodingError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Opcode::ALL
            .get(byte as usize)
            .copied()
            .ok_or(EncodingError::UnknownOpcode(byte))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Look up the definition of a raw opcode byte.
pub fn lookup(byte: u8) -> Result<&'static Definition, EncodingError> {
    Opcode::try_from(byte).map(Opcode::definition)
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode one instruction.
///
/// Fails if the operand count does not match the opcode's definition or if an
/// operand does not fit its declared width.
pub fn make(op: Opcode, operands: &[usize]) -> Result<Instructions, EncodingError> {
    let def = op.definition();
    if operands.len() != def.operand_widths.len() {
        return Err(EncodingError::OperandCount {
            opcode: def.name,
            expected: def.operand_widths.len(),
            got: operands.len(),
        });
    }

    let mut bytes = Vec::with_capacity(def.instruction_len());
    bytes.push(op as u8);
    for (&operand, &width) in operands.iter().zip(def.operand_widths) {
        match width {
            2 => {
                let value = u16::try_from(operand).map_err(|_| EncodingError::OperandOverflow {
                    opcode: def.name,
                    operand,
                    width,
                })?;
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            1 => {
                let value = u8::try_from(operand).map_err(|_| EncodingError::OperandOverflow {
                    opcode: def.name,
                    operand,
                    width,
                })?;
                bytes.push(value);
            }
            _ => unreachable!("no opcode declares a {width}-byte operand"),
        }
    }
    Ok(Instructions(bytes))
}

/// Decode the operands that follow an opcode byte.
///
/// `bytes` starts right after the opcode. Returns the operands and the number
/// of bytes consumed, so callers can advance an instruction pointer.
pub fn read_operands(
    def: &Definition,
    bytes: &[u8],
) -> Result<(Vec<usize>, usize), EncodingError> {
    let mut operands = Vec::with_capacity(def.operand_widths.len());
    let mut offset = 0;
    for &width in def.operand_widths {
        let operand = match width {
            2 => read_u16(bytes, offset).map(usize::from),
            1 => read_u8(bytes, offset).map(usize::from),
            _ => None,
        }
        .ok_or(EncodingError::Truncated {
            opcode: def.name,
            offset,
        })?;
        operands.push(operand);
        offset += width;
    }
    Ok((operands, offset))
}

#[inline]
pub fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let hi = *bytes.get(offset)?;
    let lo = *bytes.get(offset + 1)?;
    Some(u16::from_be_bytes([hi, lo]))
}

#[inline]
pub fn read_u8(bytes: &[u8], offset: usize) -> Option<u8> {
    bytes.get(offset).copied()
}

// ============================================================================
// Instruction Buffer
// ============================================================================

/// A flat buffer of encoded instructions.
///
/// `Display` renders the disassembly, one instruction per line:
/// `<4-digit offset> <mnemonic> <operands>`.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Instructions(Vec<u8>);

impl Instructions {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Append `other`, returning the offset where it starts.
    pub fn append(&mut self, other: &Instructions) -> usize {
        let position = self.0.len();
        self.0.extend_from_slice(&other.0);
        position
    }

    /// Overwrite bytes starting at `position`. The replacement must fit.
    pub fn overwrite(&mut self, position: usize, replacement: &Instructions) {
        let end = position + replacement.0.len();
        debug_assert!(end <= self.0.len(), "replacement runs past the buffer");
        self.0[position..end].copy_from_slice(&replacement.0);
    }

    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    /// Disassemble into a string. Same as `to_string()`.
    pub fn disassemble(&self) -> String {
        format!("{}", self)
    }
}

impl Deref for Instructions {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Instructions {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl FromIterator<Instructions> for Instructions {
    fn from_iter<I: IntoIterator<Item = Instructions>>(iter: I) -> Self {
        let mut out = Instructions::new();
        for ins in iter {
            out.append(&ins);
        }
        out
    }
}

impl fmt::Display for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ip = 0;
        while ip < self.0.len() {
            let def = match lookup(self.0[ip]) {
                Ok(def) => def,
                Err(e) => {
                    // Diagnostic output only: resync at the next byte.
                    writeln!(f, "ERROR: {}", e)?;
                    ip += 1;
                    continue;
                }
            };

            match read_operands(def, &self.0[ip + 1..]) {
                Ok((operands, read)) => {
                    write!(f, "{:04} {}", ip, def.name)?;
                    for operand in &operands {
                        write!(f, " {}", operand)?;
                    }
                    writeln!(f)?;
                    ip += 1 + read;
                }
                Err(e) => {
                    writeln!(f, "{:04} ERROR: {}", ip, e)?;
                    break;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{}", self)
        } else {
            f.debug_tuple("Instructions").field(&self.0).finish()
        }
    }
}
