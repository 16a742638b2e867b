//! eBPF instruction model
//!
//! eBPF instructions are 64-bit fixed-length, encoded as:
//! ```text
//! opcode:8 src_reg:4 dst_reg:4 offset:16 imm:32
//! ```
//!
//! Instructions in a stream may carry a symbolic label (`symbol`) and jump
//! instructions may carry a symbolic target (`target`). Labels stay symbolic
//! until [`resolve_labels`] rewrites every target into a relative 16-bit
//! offset, so emitters never deal in instruction indices.

use thiserror::Error;

/// eBPF register identifiers (r0-r10)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reg {
    /// Return value from helpers, exit value for the eBPF program
    R0 = 0,
    /// First argument to BPF helpers, also context pointer
    R1 = 1,
    /// Second argument to BPF helpers
    R2 = 2,
    /// Third argument to BPF helpers
    R3 = 3,
    /// Fourth argument to BPF helpers
    R4 = 4,
    /// Fifth argument to BPF helpers
    R5 = 5,
    /// Callee-saved register
    R6 = 6,
    /// Callee-saved register
    R7 = 7,
    /// Callee-saved register
    R8 = 8,
    /// Callee-saved register
    R9 = 9,
    /// Frame pointer (read-only)
    R10 = 10,
}

impl Reg {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// BPF helper function numbers
///
/// Helpers are identified by their stable numeric id in the kernel ABI.
/// See: https://man7.org/linux/man-pages/man7/bpf-helpers.7.html
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Helper {
    /// int bpf_probe_read(dst, size, unsafe_ptr)
    ProbeRead = 4,
    /// long bpf_probe_read_user(dst, size, unsafe_ptr)
    ProbeReadUser = 112,
    /// long bpf_probe_read_kernel(dst, size, unsafe_ptr)
    ProbeReadKernel = 113,
}

/// eBPF instruction opcodes
pub mod opcode {
    // Instruction classes (3 bits)
    pub const BPF_LDX: u8 = 0x01;
    pub const BPF_STX: u8 = 0x03;
    pub const BPF_ALU: u8 = 0x04;
    pub const BPF_JMP: u8 = 0x05;
    pub const BPF_ALU64: u8 = 0x07;

    // Size modifiers (2 bits)
    pub const BPF_W: u8 = 0x00; // 32-bit
    pub const BPF_H: u8 = 0x08; // 16-bit
    pub const BPF_B: u8 = 0x10; // 8-bit
    pub const BPF_DW: u8 = 0x18; // 64-bit

    // Source modifiers
    pub const BPF_K: u8 = 0x00; // Immediate
    pub const BPF_X: u8 = 0x08; // Register

    // ALU operations (4 bits, shifted left by 4)
    pub const BPF_ADD: u8 = 0x00;
    pub const BPF_AND: u8 = 0x50;
    pub const BPF_LSH: u8 = 0x60;
    pub const BPF_RSH: u8 = 0x70;
    pub const BPF_MOV: u8 = 0xb0;

    // Jump operations
    pub const BPF_JA: u8 = 0x00; // Jump always
    pub const BPF_JEQ: u8 = 0x10; // Jump if equal
    pub const BPF_JGT: u8 = 0x20; // Jump if greater than
    pub const BPF_JGE: u8 = 0x30; // Jump if greater or equal
    pub const BPF_JNE: u8 = 0x50; // Jump if not equal
    pub const BPF_JSGT: u8 = 0x60; // Jump if signed greater than
    pub const BPF_JSGE: u8 = 0x70; // Jump if signed greater or equal
    pub const BPF_CALL: u8 = 0x80; // Function call
    pub const BPF_EXIT: u8 = 0x90; // Exit program
    pub const BPF_JLT: u8 = 0xa0; // Jump if less than
    pub const BPF_JLE: u8 = 0xb0; // Jump if less or equal
    pub const BPF_JSLT: u8 = 0xc0; // Jump if signed less than
    pub const BPF_JSLE: u8 = 0xd0; // Jump if signed less or equal

    // Memory modes
    pub const BPF_MEM: u8 = 0x60;

    // Composite opcodes for common operations
    pub const MOV64_IMM: u8 = BPF_ALU64 | BPF_MOV | BPF_K; // 0xb7
    pub const MOV64_REG: u8 = BPF_ALU64 | BPF_MOV | BPF_X; // 0xbf
    pub const ADD64_IMM: u8 = BPF_ALU64 | BPF_ADD | BPF_K; // 0x07
    pub const AND64_IMM: u8 = BPF_ALU64 | BPF_AND | BPF_K; // 0x57
    pub const LSH64_IMM: u8 = BPF_ALU64 | BPF_LSH | BPF_K; // 0x67
    pub const RSH64_IMM: u8 = BPF_ALU64 | BPF_RSH | BPF_K; // 0x77
    pub const CALL: u8 = BPF_JMP | BPF_CALL; // 0x85
    pub const EXIT: u8 = BPF_JMP | BPF_EXIT; // 0x95
}

/// A single eBPF instruction (64-bit), possibly labelled
///
/// `symbol` names this instruction as a jump target; `target` is the label a
/// conditional jump refers to. Both are `None` on ordinary instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insn {
    /// Operation code
    pub opcode: u8,
    /// Destination register (4 bits, lower nibble)
    pub dst_reg: u8,
    /// Source register (4 bits, upper nibble)
    pub src_reg: u8,
    /// Signed offset for memory/branch operations
    pub offset: i16,
    /// Signed immediate value
    pub imm: i32,
    /// Symbolic label defined at this instruction
    pub symbol: Option<String>,
    /// Symbolic label this jump targets
    pub target: Option<String>,
}

/// Errors from symbolic label resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("label {0:?} is referenced but never defined")]
    Undefined(String),

    #[error("label {0:?} is defined more than once")]
    Duplicate(String),

    #[error("jump to label {0:?} does not fit in a 16-bit offset")]
    OutOfRange(String),
}

/// Resolve every symbolic jump target in `insns` to a relative i16 offset.
///
/// The offset is relative to the instruction following the jump, per the BPF
/// ISA. Fails when a target is undefined, a label is defined twice, or the
/// jump distance overflows 16 bits. Targets are kept on the instructions for
/// display; [`encode`] ignores them.
pub fn resolve_labels(insns: &mut [Insn]) -> Result<(), LabelError> {
    let mut defs: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for (idx, insn) in insns.iter().enumerate() {
        if let Some(sym) = insn.symbol.as_deref() {
            if defs.insert(sym, idx).is_some() {
                return Err(LabelError::Duplicate(sym.to_string()));
            }
        }
    }

    let mut fixups = Vec::new();
    for (idx, insn) in insns.iter().enumerate() {
        let Some(label) = insn.target.as_deref() else {
            continue;
        };
        let Some(&def) = defs.get(label) else {
            return Err(LabelError::Undefined(label.to_string()));
        };
        let rel = def as i64 - idx as i64 - 1;
        let offset =
            i16::try_from(rel).map_err(|_| LabelError::OutOfRange(label.to_string()))?;
        fixups.push((idx, offset));
    }

    for (idx, offset) in fixups {
        insns[idx].offset = offset;
    }
    Ok(())
}

/// Encode a resolved instruction stream to flat little-endian bytecode.
pub fn encode(insns: &[Insn]) -> Vec<u8> {
    let mut bytecode = Vec::with_capacity(insns.len() * 8);
    for insn in insns {
        bytecode.extend_from_slice(&insn.encode());
    }
    bytecode
}

mod encoding;
