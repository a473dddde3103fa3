//! Resource ownership checks

use crate::models::user::Principal;

/// A principal may modify a resource it owns; admins may modify anything.
pub fn can_modify(principal: &Principal, owner_id: i64) -> bool {
    principal.id == owner_id || principal.role.is_admin()
}
