// src/permission.rs

use crate::error::AuthError;
use crate::validator::claims::VerifiedClaims;

pub const GET_ACTORS: &str = "get:actors";
pub const POST_ACTORS: &str = "post:actors";
pub const PATCH_ACTORS: &str = "patch:actors";
pub const DELETE_ACTORS: &str = "delete:actors";
pub const GET_MOVIES: &str = "get:movies";
pub const POST_MOVIES: &str = "post:movies";
pub const PATCH_MOVIES: &str = "patch:movies";
pub const DELETE_MOVIES: &str = "delete:movies";

/// Succeeds iff `required` is one of the token's granted permissions.
pub fn require_permission(claims: &VerifiedClaims, required: &str) -> Result<(), AuthError> {
    if claims.has_permission(required) {
        Ok(())
    } else {
        Err(AuthError::InsufficientScope(required.to_string()))
    }
}
