use thiserror::Error;

use crate::btf::{Btf, ResolvedMember, Type, TypeId};
use crate::expr::{AccessOp, Expr};

/// Result of walking a member-access chain against the type graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAccess {
    /// One byte offset per pointer hop (`->`), each relative to the object
    /// dereferenced by the previous hop. `.` steps fold into the next hop.
    pub offsets: Vec<u32>,
    /// Type of the terminal field (the root pointer itself for the bare form)
    pub last_field: TypeId,
    /// Terminal member, when the chain ends in one
    pub last_member: Option<ResolvedMember>,
    /// Whether the terminal field, or any type on the path, is big-endian
    pub big_endian: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("failed to find member {member} of {parent}")]
    MemberNotFound { parent: String, member: String },

    #[error("cannot dereference non-pointer type {0}")]
    NotIndirectable(String),

    #[error("cannot select member {member} of non-struct/union type {parent}")]
    NotAggregate { parent: String, member: String },

    #[error("type id {0:?} is not present in the type graph")]
    InvalidType(TypeId),
}

/// Walk the chain of the predicate's left operand, producing the per-hop
/// byte offsets and the terminal field's type.
///
/// `root` is the static type of the chain's root identifier and must be a
/// pointer for any chain with at least one `->`. Bitfield members resolve
/// normally; the classifier rejects them afterwards.
pub fn resolve(btf: &Btf, root: TypeId, expr: &Expr) -> Result<FieldAccess, ResolveError> {
    let chain = match expr {
        Expr::Binary { left, .. } => left.as_ref(),
        other => other,
    };

    // Flatten the right-rooted member nodes into source order.
    let mut steps = Vec::new();
    let mut cur = chain;
    while let Expr::Member { op, base, member } = cur {
        steps.push((*op, member.as_str()));
        cur = base.as_ref();
    }
    steps.reverse();

    let mut cur_type = root;
    let mut big_endian = btf.is_big_endian(root);
    let mut pending_bits: u32 = 0;
    let mut offsets = Vec::new();
    let mut last_member = None;

    for (idx, (op, member_name)) in steps.iter().enumerate() {
        if *op == AccessOp::Arrow {
            let stripped = btf.skip_mods_and_typedefs(cur_type);
            let Type::Pointer { target } = ty(btf, stripped)? else {
                return Err(ResolveError::NotIndirectable(type_label(btf, cur_type)));
            };
            // The first dereference consumes the root pointer as-is; later
            // ones first close out the offset accumulated since the previous
            // hop (bitfield offsets round down to their byte).
            if idx > 0 {
                offsets.push(pending_bits / 8);
                pending_bits = 0;
            }
            cur_type = *target;
            big_endian |= btf.is_big_endian(cur_type);
        }

        let aggregate = btf.skip_mods_and_typedefs(cur_type);
        match ty(btf, aggregate)? {
            Type::Struct(_) | Type::Union(_) => {}
            _ => {
                return Err(ResolveError::NotAggregate {
                    parent: type_label(btf, cur_type),
                    member: member_name.to_string(),
                })
            }
        }

        let found = btf.find_member(aggregate, member_name).ok_or_else(|| {
            ResolveError::MemberNotFound {
                parent: type_label(btf, aggregate),
                member: member_name.to_string(),
            }
        })?;

        pending_bits += found.bit_offset;
        cur_type = found.ty;
        big_endian |= btf.is_big_endian(cur_type);
        last_member = Some(found);
    }

    if last_member.is_some() {
        offsets.push(pending_bits / 8);
    }

    Ok(FieldAccess {
        offsets,
        last_field: cur_type,
        last_member,
        big_endian,
    })
}

fn ty(btf: &Btf, id: TypeId) -> Result<&Type, ResolveError> {
    btf.get(id).ok_or(ResolveError::InvalidType(id))
}

fn type_label(btf: &Btf, id: TypeId) -> String {
    btf.name_of(id).unwrap_or("<anonymous>").to_string()
}
