use thiserror::Error;

use crate::btf::{Btf, Type};

use super::resolve::FieldAccess;

/// Width and comparison signedness of a terminal field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldClass {
    /// Size in bytes: 1, 2, 4 or 8
    pub size: u32,
    /// Ordered comparisons use the signed jump variants
    pub signed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("unexpected member access of bitfield")]
    UnexpectedBitfield,

    #[error("unexpected type of last field: {0}")]
    UnexpectedTerminalType(String),
}

/// Check that the terminal field is a comparable integer or pointer.
///
/// Bitfields (unaligned bit offset or non-zero bitfield size) are rejected;
/// so is any non-Int/Pointer/Enum kind and any size outside 1/2/4/8.
pub fn classify(btf: &Btf, access: &FieldAccess) -> Result<FieldClass, ClassifyError> {
    if let Some(member) = &access.last_member {
        if member.bit_offset % 8 != 0 || member.bitfield_size > 0 {
            return Err(ClassifyError::UnexpectedBitfield);
        }
    }

    let stripped = btf.skip_mods_and_typedefs(access.last_field);
    match btf.get(stripped) {
        Some(Type::Pointer { .. }) => Ok(FieldClass {
            size: 8,
            signed: false,
        }),
        Some(Type::Int(int)) if matches!(int.size, 1 | 2 | 4 | 8) => Ok(FieldClass {
            size: int.size,
            signed: int.signed,
        }),
        Some(Type::Enum { size, .. }) if matches!(size, 1 | 2 | 4 | 8) => Ok(FieldClass {
            size: *size,
            signed: true,
        }),
        _ => Err(ClassifyError::UnexpectedTerminalType(
            btf.name_of(access.last_field)
                .unwrap_or("<anonymous>")
                .to_string(),
        )),
    }
}
