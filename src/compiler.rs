//! Expression-to-instructions compilation
//!
//! The pipeline: parse the predicate, validate its shape, walk the
//! member-access chain against the type graph to get per-hop byte offsets,
//! classify the terminal field, then emit the instruction stream: probe-read
//! chain, width/endianness normalization, comparison jump, and the shared
//! prologue/epilogue with the reserved exit labels.
//!
//! Compilation is a pure function over immutable inputs; the type graph is
//! only read and the returned buffer is owned by the caller.

use tracing::debug;

use crate::btf::{Btf, TypeId};
use crate::expr::{self, BinOp, Expr};
use crate::insn::{Insn, Reg};

mod classify;
mod emit;
mod resolve;
mod validate;


pub use classify::{classify, ClassifyError, FieldClass};
pub use emit::{
    emit_chain, emit_op, normalize_target, OpError, TargetInfo, ARG_REG, RESULT_REG, SCRATCH_SLOT,
    WORK_REG,
};
pub use resolve::{resolve, FieldAccess, ResolveError};
pub use validate::{validate_left_operand, ValidateError};

/// Label on the `mov r0, 0` epilogue instruction null checks jump to
pub const EXIT_FAIL_LABEL: &str = "__exit_fail";
/// Label on the shared `exit` instruction
pub const RETURN_LABEL: &str = "__return";

/// Errors from predicate compilation
///
/// Every failure is total: no partial instruction stream is returned. The
/// variants wrap the failing phase's error with a context prefix; classifier
/// errors pass through verbatim.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("invalid options: {0}")]
    InvalidOptions(&'static str),

    #[error("failed to parse expression: {0}")]
    Parse(#[from] expr::ParseError),

    #[error("expression is not struct/union member access: {0}")]
    Validate(#[from] ValidateError),

    #[error("failed to convert expr to access offsets: {0}")]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("failed to parse right operand as number: {0:?}")]
    RightOperand(String),

    #[error("expr should be struct/union member access")]
    NotMemberAccess,

    #[error("failed to convert operator to instructions: {0}")]
    Op(#[from] OpError),
}

/// Compile a predicate string into a self-contained instruction stream.
///
/// `root` is the static type of the pointer argument arriving in
/// [`ARG_REG`]; it must be a `Pointer`. The returned stream leaves the
/// boolean verdict in [`RESULT_REG`] and ends in a labelled `exit`; labels
/// are still symbolic (see [`crate::insn::resolve_labels`]).
pub fn compile(btf: &Btf, root: TypeId, expr: &str) -> Result<Vec<Insn>, CompileError> {
    let ast = expr::parse(expr)?;
    compile_expr(btf, root, &ast)
}

/// Compile an already-parsed predicate. See [`compile`].
pub fn compile_expr(btf: &Btf, root: TypeId, expr: &Expr) -> Result<Vec<Insn>, CompileError> {
    validate_left_operand(expr)?;

    // Bare access forms are pointer/value truthiness tests.
    let (op, right) = match expr {
        Expr::Binary { op, right, .. } => (*op, Some(right.as_ref())),
        _ => (BinOp::Ne, None),
    };

    let access = resolve(btf, root, expr)?;
    debug!(
        offsets = ?access.offsets,
        big_endian = access.big_endian,
        "resolved member access chain"
    );

    let constant = match right {
        None => 0,
        Some(Expr::Number(text)) => {
            expr::parse_int(text).ok_or_else(|| CompileError::RightOperand(text.clone()))?
        }
        Some(_) => return Err(CompileError::RightOperand(String::new())),
    };

    let class = if access.offsets.is_empty() {
        // The chain is the root pointer itself; compare it as one.
        FieldClass {
            size: 8,
            signed: false,
        }
    } else {
        classify(btf, &access)?
    };

    let mut tgt = TargetInfo {
        constant,
        size: class.size,
        signed: class.signed,
        big_endian: access.big_endian,
    };

    let mut insns = Vec::new();
    insns.push(Insn::mov64_reg(WORK_REG, ARG_REG));
    emit_chain(&mut insns, &access.offsets, WORK_REG, EXIT_FAIL_LABEL);
    tgt.constant = normalize_target(&mut insns, &tgt, WORK_REG);
    emit_op(&mut insns, op, &tgt, WORK_REG, RESULT_REG, RETURN_LABEL)?;

    // EXIT_FAIL is always materialised so any null check resolves; with no
    // null checks it just falls through to the shared exit.
    insns.push(Insn::mov64_imm(RESULT_REG, 0).with_symbol(EXIT_FAIL_LABEL));
    insns.push(Insn::exit().with_symbol(RETURN_LABEL));

    debug!(len = insns.len(), "compiled predicate");
    Ok(insns)
}

/// Options for [`access`]
pub struct AccessOptions<'a> {
    /// Existing instruction stream to append to
    pub insns: Vec<Insn>,
    /// Member-access expression, e.g. `"skb->dev->ifindex"`
    pub expr: &'a str,
    /// Type graph
    pub btf: &'a Btf,
    /// Static type of the root pointer
    pub root: TypeId,
    /// Register holding the root pointer on entry
    pub src: Reg,
    /// Register receiving the loaded, width-normalized field value
    pub dst: Reg,
    /// Label jumped to when an intermediate pointer is null
    pub exit_label: &'a str,
}

/// Result of [`access`]
#[derive(Debug)]
pub struct AccessResult {
    pub insns: Vec<Insn>,
    /// Whether `exit_label` was referenced; when true the caller must define
    /// it somewhere in the surrounding program.
    pub label_used: bool,
}

/// Emit only the dereference chain for an expression, without the comparison.
///
/// Appends prologue + chain + width normalization to `opts.insns`, leaving
/// the terminal field's value in `opts.dst`. Used to splice a member access
/// into a larger program; the terminal type is still classified so malformed
/// fields are rejected up front.
pub fn access(opts: AccessOptions<'_>) -> Result<AccessResult, CompileError> {
    if opts.expr.is_empty() {
        return Err(CompileError::InvalidOptions("expr is empty"));
    }
    if opts.exit_label.is_empty() {
        return Err(CompileError::InvalidOptions("exit label is empty"));
    }

    let ast = expr::parse(opts.expr)?;
    validate_left_operand(&ast)?;

    let access = resolve(opts.btf, opts.root, &ast)?;
    if access.offsets.is_empty() {
        return Err(CompileError::NotMemberAccess);
    }
    let class = classify(opts.btf, &access)?;
    debug!(offsets = ?access.offsets, dst = ?opts.dst, "emitting access chain");

    let mut insns = opts.insns;
    if opts.src != WORK_REG {
        insns.push(Insn::mov64_reg(WORK_REG, opts.src));
    }
    let label_used = emit_chain(&mut insns, &access.offsets, opts.dst, opts.exit_label);

    let tgt = TargetInfo {
        constant: 0,
        size: class.size,
        signed: class.signed,
        big_endian: access.big_endian,
    };
    normalize_target(&mut insns, &tgt, opts.dst);

    Ok(AccessResult { insns, label_used })
}
