use super::*;

impl Insn {
    /// Create a new instruction
    pub const fn new(opcode: u8, dst_reg: u8, src_reg: u8, offset: i16, imm: i32) -> Self {
        Self {
            opcode,
            dst_reg,
            src_reg,
            offset,
            imm,
            symbol: None,
            target: None,
        }
    }

    /// Attach a symbolic label to this instruction
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Encode the instruction to 8 bytes (little-endian)
    pub fn encode(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[0] = self.opcode;
        bytes[1] = (self.src_reg << 4) | (self.dst_reg & 0x0f);
        bytes[2..4].copy_from_slice(&self.offset.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.imm.to_le_bytes());
        bytes
    }

    /// Whether this is a conditional or unconditional jump (not a call/exit)
    pub fn is_jump(&self) -> bool {
        let op = self.opcode & 0xf0;
        self.opcode & 0x07 == opcode::BPF_JMP && op != opcode::BPF_CALL && op != opcode::BPF_EXIT
    }

    // ===== Instruction builders =====

    /// MOV64 dst, imm - Load 32-bit immediate into 64-bit register (sign-extends)
    pub const fn mov64_imm(dst: Reg, imm: i32) -> Self {
        Self::new(opcode::MOV64_IMM, dst.as_u8(), 0, 0, imm)
    }

    /// MOV64 dst, src - Copy register
    pub const fn mov64_reg(dst: Reg, src: Reg) -> Self {
        Self::new(opcode::MOV64_REG, dst.as_u8(), src.as_u8(), 0, 0)
    }

    /// ADD64 dst, imm - Add immediate to register
    pub const fn add64_imm(dst: Reg, imm: i32) -> Self {
        Self::new(opcode::ADD64_IMM, dst.as_u8(), 0, 0, imm)
    }

    /// AND64 dst, imm - Bitwise AND register with immediate
    pub const fn and64_imm(dst: Reg, imm: i32) -> Self {
        Self::new(opcode::AND64_IMM, dst.as_u8(), 0, 0, imm)
    }

    /// LSH64 dst, imm - Left shift register by immediate
    pub const fn lsh64_imm(dst: Reg, imm: i32) -> Self {
        Self::new(opcode::LSH64_IMM, dst.as_u8(), 0, 0, imm)
    }

    /// RSH64 dst, imm - Logical right shift register by immediate
    pub const fn rsh64_imm(dst: Reg, imm: i32) -> Self {
        Self::new(opcode::RSH64_IMM, dst.as_u8(), 0, 0, imm)
    }

    /// LDXB dst, [src+off] - Load 8-bit value from memory to register
    pub const fn ldxb(dst: Reg, src: Reg, offset: i16) -> Self {
        Self::new(
            opcode::BPF_LDX | opcode::BPF_B | opcode::BPF_MEM,
            dst.as_u8(),
            src.as_u8(),
            offset,
            0,
        )
    }

    /// LDXH dst, [src+off] - Load 16-bit value from memory to register
    pub const fn ldxh(dst: Reg, src: Reg, offset: i16) -> Self {
        Self::new(
            opcode::BPF_LDX | opcode::BPF_H | opcode::BPF_MEM,
            dst.as_u8(),
            src.as_u8(),
            offset,
            0,
        )
    }

    /// LDXW dst, [src+off] - Load 32-bit value from memory to register
    pub const fn ldxw(dst: Reg, src: Reg, offset: i16) -> Self {
        Self::new(
            opcode::BPF_LDX | opcode::BPF_W | opcode::BPF_MEM,
            dst.as_u8(),
            src.as_u8(),
            offset,
            0,
        )
    }

    /// LDXDW dst, [src+off] - Load 64-bit value from memory to register
    pub const fn ldxdw(dst: Reg, src: Reg, offset: i16) -> Self {
        Self::new(
            opcode::BPF_LDX | opcode::BPF_DW | opcode::BPF_MEM,
            dst.as_u8(),
            src.as_u8(),
            offset,
            0,
        )
    }

    /// STXB [dst+off], src - Store 8-bit value from register to memory
    pub const fn stxb(dst: Reg, offset: i16, src: Reg) -> Self {
        Self::new(
            opcode::BPF_STX | opcode::BPF_B | opcode::BPF_MEM,
            dst.as_u8(),
            src.as_u8(),
            offset,
            0,
        )
    }

    /// STXH [dst+off], src - Store 16-bit value from register to memory
    pub const fn stxh(dst: Reg, offset: i16, src: Reg) -> Self {
        Self::new(
            opcode::BPF_STX | opcode::BPF_H | opcode::BPF_MEM,
            dst.as_u8(),
            src.as_u8(),
            offset,
            0,
        )
    }

    /// STXW [dst+off], src - Store 32-bit value from register to memory
    pub const fn stxw(dst: Reg, offset: i16, src: Reg) -> Self {
        Self::new(
            opcode::BPF_STX | opcode::BPF_W | opcode::BPF_MEM,
            dst.as_u8(),
            src.as_u8(),
            offset,
            0,
        )
    }

    /// STXDW [dst+off], src - Store 64-bit value from register to memory
    pub const fn stxdw(dst: Reg, offset: i16, src: Reg) -> Self {
        Self::new(
            opcode::BPF_STX | opcode::BPF_DW | opcode::BPF_MEM,
            dst.as_u8(),
            src.as_u8(),
            offset,
            0,
        )
    }

    /// CALL helper - Call a BPF helper function by its numeric id
    pub const fn call(helper: Helper) -> Self {
        Self::new(opcode::CALL, 0, 0, 0, helper as i32)
    }

    /// EXIT - Exit the eBPF program (return value in r0)
    pub const fn exit() -> Self {
        Self::new(opcode::EXIT, 0, 0, 0, 0)
    }

    /// JA target - Unconditional jump to a labelled instruction
    pub fn ja(target: impl Into<String>) -> Self {
        let mut insn = Self::new(opcode::BPF_JMP | opcode::BPF_JA, 0, 0, 0, 0);
        insn.target = Some(target.into());
        insn
    }

    fn jmp_imm(op: u8, dst: Reg, imm: i32, target: impl Into<String>) -> Self {
        let mut insn = Self::new(opcode::BPF_JMP | op | opcode::BPF_K, dst.as_u8(), 0, 0, imm);
        insn.target = Some(target.into());
        insn
    }

    /// JEQ dst, imm, target - Jump if dst == imm
    pub fn jeq_imm(dst: Reg, imm: i32, target: impl Into<String>) -> Self {
        Self::jmp_imm(opcode::BPF_JEQ, dst, imm, target)
    }

    /// JNE dst, imm, target - Jump if dst != imm
    pub fn jne_imm(dst: Reg, imm: i32, target: impl Into<String>) -> Self {
        Self::jmp_imm(opcode::BPF_JNE, dst, imm, target)
    }

    /// JLT dst, imm, target - Jump if dst < imm (unsigned)
    pub fn jlt_imm(dst: Reg, imm: i32, target: impl Into<String>) -> Self {
        Self::jmp_imm(opcode::BPF_JLT, dst, imm, target)
    }

    /// JLE dst, imm, target - Jump if dst <= imm (unsigned)
    pub fn jle_imm(dst: Reg, imm: i32, target: impl Into<String>) -> Self {
        Self::jmp_imm(opcode::BPF_JLE, dst, imm, target)
    }

    /// JGT dst, imm, target - Jump if dst > imm (unsigned)
    pub fn jgt_imm(dst: Reg, imm: i32, target: impl Into<String>) -> Self {
        Self::jmp_imm(opcode::BPF_JGT, dst, imm, target)
    }

    /// JGE dst, imm, target - Jump if dst >= imm (unsigned)
    pub fn jge_imm(dst: Reg, imm: i32, target: impl Into<String>) -> Self {
        Self::jmp_imm(opcode::BPF_JGE, dst, imm, target)
    }

    /// JSLT dst, imm, target - Jump if dst < imm (signed)
    pub fn jslt_imm(dst: Reg, imm: i32, target: impl Into<String>) -> Self {
        Self::jmp_imm(opcode::BPF_JSLT, dst, imm, target)
    }

    /// JSLE dst, imm, target - Jump if dst <= imm (signed)
    pub fn jsle_imm(dst: Reg, imm: i32, target: impl Into<String>) -> Self {
        Self::jmp_imm(opcode::BPF_JSLE, dst, imm, target)
    }

    /// JSGT dst, imm, target - Jump if dst > imm (signed)
    pub fn jsgt_imm(dst: Reg, imm: i32, target: impl Into<String>) -> Self {
        Self::jmp_imm(opcode::BPF_JSGT, dst, imm, target)
    }

    /// JSGE dst, imm, target - Jump if dst >= imm (signed)
    pub fn jsge_imm(dst: Reg, imm: i32, target: impl Into<String>) -> Self {
        Self::jmp_imm(opcode::BPF_JSGE, dst, imm, target)
    }
}
