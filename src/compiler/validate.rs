use thiserror::Error;

use crate::expr::Expr;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidateError {
    #[error("left operand is not a member access chain rooted in an identifier")]
    NotMemberAccess,
}

/// Check the predicate's shape.
///
/// The left operand of a comparison (or the whole expression for the bare
/// form) must reach an identifier through member-access steps only. Literals,
/// nested comparisons and anything else on the left are rejected here, before
/// the type walk.
pub fn validate_left_operand(expr: &Expr) -> Result<(), ValidateError> {
    let mut cur = match expr {
        Expr::Binary { left, .. } => left.as_ref(),
        other => other,
    };

    loop {
        match cur {
            Expr::Name(_) => return Ok(()),
            Expr::Member { base, .. } => cur = base.as_ref(),
            _ => return Err(ValidateError::NotMemberAccess),
        }
    }
}
