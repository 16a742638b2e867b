use thiserror::Error;

use crate::expr::BinOp;
use crate::insn::{Helper, Insn, Reg};

/// Register holding the boolean verdict (the program's return value)
pub const RESULT_REG: Reg = Reg::R0;
/// Register carrying the root pointer argument on entry
pub const ARG_REG: Reg = Reg::R1;
/// Working register: chain cursor during the walk, loaded value afterwards.
/// r3 is also the probe-read helper's `unsafe_ptr` argument, so the cursor
/// never has to move before a call.
pub const WORK_REG: Reg = Reg::R3;
/// Scratch stack slot receiving each probe-read, relative to the frame
/// pointer. Clobbered on every hop; surrounding programs must not use it.
pub const SCRATCH_SLOT: i16 = -8;

/// Terminal-field facts driving normalization and operator selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo {
    /// Comparison constant; [`normalize_target`] folds truncation and byte
    /// swapping into it
    pub constant: u64,
    /// Field size in bytes: 1, 2, 4 or 8
    pub size: u32,
    /// Ordered comparisons use the signed jump variants
    pub signed: bool,
    /// Field is stored big-endian
    pub big_endian: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpError {
    #[error("unexpected operator {0}")]
    UnexpectedOperator(BinOp),
}

/// Emit one safe-dereference sequence per hop.
///
/// Each hop adds the hop's byte offset to the cursor, probe-reads a dword
/// through the scratch slot, and loads it back. Every hop but the last is
/// followed by a null check branching to `exit_label`; the terminal value may
/// legitimately be zero. Intermediate pointers land back in [`WORK_REG`], the
/// final value in `dst`.
///
/// Returns whether `exit_label` was referenced, so the caller knows whether
/// the label must be materialised.
pub fn emit_chain(insns: &mut Vec<Insn>, offsets: &[u32], dst: Reg, exit_label: &str) -> bool {
    let mut label_used = false;

    for (idx, &offset) in offsets.iter().enumerate() {
        let last = idx + 1 == offsets.len();

        if offset != 0 {
            insns.push(Insn::add64_imm(WORK_REG, offset as i32));
        }

        // bpf_probe_read_kernel(dst: r1, size: r2, unsafe_ptr: r3)
        insns.push(Insn::mov64_imm(Reg::R2, 8));
        insns.push(Insn::mov64_reg(Reg::R1, Reg::R10));
        insns.push(Insn::add64_imm(Reg::R1, i32::from(SCRATCH_SLOT)));
        insns.push(Insn::call(Helper::ProbeReadKernel));
        insns.push(Insn::ldxdw(
            if last { dst } else { WORK_REG },
            Reg::R10,
            SCRATCH_SLOT,
        ));

        if !last {
            insns.push(Insn::jeq_imm(WORK_REG, 0, exit_label));
            label_used = true;
        }
    }

    label_used
}

/// Normalize the loaded dword to the field's width and return the matching
/// effective constant.
///
/// The dword load leaves garbage in the upper bytes of narrower fields:
/// fields up to 16 bits are masked, 32-bit fields are zero-extended with a
/// shift pair, 64-bit fields need nothing. Byte swaps for big-endian fields
/// are folded into the constant so no runtime swap instruction is emitted.
///
/// 32-bit fields use the zero-extending shift pair regardless of signedness;
/// equality is unaffected, but ordered compares of a signed 32-bit field
/// against a negative constant follow the zero-extended values.
pub fn normalize_target(insns: &mut Vec<Insn>, tgt: &TargetInfo, work: Reg) -> u64 {
    match tgt.size {
        1 => {
            insns.push(Insn::and64_imm(work, 0xff));
            tgt.constant & 0xff
        }
        2 => {
            insns.push(Insn::and64_imm(work, 0xffff));
            let constant = tgt.constant as u16;
            u64::from(if tgt.big_endian {
                constant.swap_bytes()
            } else {
                constant
            })
        }
        4 => {
            insns.push(Insn::lsh64_imm(work, 32));
            insns.push(Insn::rsh64_imm(work, 32));
            let constant = tgt.constant as u32;
            u64::from(if tgt.big_endian {
                constant.swap_bytes()
            } else {
                constant
            })
        }
        _ => {
            if tgt.big_endian {
                tgt.constant.swap_bytes()
            } else {
                tgt.constant
            }
        }
    }
}

/// Translate the comparison operator into `mov result, 1` plus a single
/// conditional jump to `return_label`.
///
/// The jump opcode depends only on the operator and the terminal type's
/// signedness, never on the constant. Equality uses the unsigned opcodes for
/// both encodings. Anything outside the comparison set is rejected.
pub fn emit_op(
    insns: &mut Vec<Insn>,
    op: BinOp,
    tgt: &TargetInfo,
    work: Reg,
    result: Reg,
    return_label: &str,
) -> Result<(), OpError> {
    let imm = tgt.constant as i32;
    let jump = match (op, tgt.signed) {
        (BinOp::Eq, _) => Insn::jeq_imm(work, imm, return_label),
        (BinOp::Ne, _) => Insn::jne_imm(work, imm, return_label),
        (BinOp::Lt, false) => Insn::jlt_imm(work, imm, return_label),
        (BinOp::Lt, true) => Insn::jslt_imm(work, imm, return_label),
        (BinOp::Le, false) => Insn::jle_imm(work, imm, return_label),
        (BinOp::Le, true) => Insn::jsle_imm(work, imm, return_label),
        (BinOp::Gt, false) => Insn::jgt_imm(work, imm, return_label),
        (BinOp::Gt, true) => Insn::jsgt_imm(work, imm, return_label),
        (BinOp::Ge, false) => Insn::jge_imm(work, imm, return_label),
        (BinOp::Ge, true) => Insn::jsge_imm(work, imm, return_label),
        (other, _) => return Err(OpError::UnexpectedOperator(other)),
    };

    insns.push(Insn::mov64_imm(result, 1));
    insns.push(jump);
    Ok(())
}
