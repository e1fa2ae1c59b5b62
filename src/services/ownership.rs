//! Ownership policy gating every farm-scoped mutation.
//!
//! A farm with `owner_id = NULL` is unclaimed; the first non-admin actor who
//! mutates it becomes its owner as a side effect. The claim is written as a
//! conditional update (`owner_id = actor WHERE owner_id IS NULL`) and the
//! affected-row count decides the winner, so two concurrent first claims
//! cannot both land.

use diesel::prelude::*;
use diesel::PgConnection;
use log::info;

use crate::auth::Role;
use crate::db::models::Farm;
use crate::error::ApiError;
use crate::schema;

/// Authenticated principal acting on a farm-scoped resource.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

/// Outcome of evaluating the policy against a farm's current owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipDecision {
    /// Actor may proceed, no state change.
    Granted,
    /// Actor may proceed once it has claimed the unowned farm.
    Claim,
    /// Farm belongs to somebody else.
    Denied,
}

pub fn evaluate(role: Role, owner_id: Option<i64>, actor_id: i64) -> OwnershipDecision {
    match role {
        Role::Admin => OwnershipDecision::Granted,
        Role::Operator => match owner_id {
            None => OwnershipDecision::Claim,
            Some(owner) if owner == actor_id => OwnershipDecision::Granted,
            Some(_) => OwnershipDecision::Denied,
        },
    }
}

/// Authorize a mutation on `farm_id` by `actor`, claiming the farm when it is
/// unowned. Fails with `NotFound` when the farm is absent and `Forbidden`
/// when it is owned by a different user.
pub fn authorize_farm_mutation(conn: &mut PgConnection, actor: Actor, farm_id: i64) -> Result<(), ApiError> {
    use schema::farms::dsl as F;

    let farm: Farm = F::farms
        .find(farm_id)
        .select(Farm::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("farm not found".to_string()))?;

    match evaluate(actor.role, farm.owner_id, actor.user_id) {
        OwnershipDecision::Granted => Ok(()),
        OwnershipDecision::Denied => Err(ApiError::Forbidden("farm is owned by another user".to_string())),
        OwnershipDecision::Claim => {
            let claimed = diesel::update(F::farms.filter(F::id.eq(farm_id).and(F::owner_id.is_null())))
                .set(F::owner_id.eq(actor.user_id))
                .execute(conn)?;
            if claimed == 1 {
                info!("farm {} claimed by user {}", farm_id, actor.user_id);
                return Ok(());
            }

            // Lost the race: someone else's claim landed between the read and
            // the update. Re-read and only proceed if that someone was us.
            let owner: Option<i64> = F::farms
                .find(farm_id)
                .select(F::owner_id)
                .first(conn)
                .optional()?
                .flatten();
            match owner {
                Some(winner) if winner == actor.user_id => Ok(()),
                _ => Err(ApiError::Forbidden("farm is owned by another user".to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_bypasses_ownership_unconditionally() {
        assert_eq!(evaluate(Role::Admin, None, 1), OwnershipDecision::Granted);
        assert_eq!(evaluate(Role::Admin, Some(1), 1), OwnershipDecision::Granted);
        assert_eq!(evaluate(Role::Admin, Some(2), 1), OwnershipDecision::Granted);
    }

    #[test]
    fn operator_claims_unowned_farm() {
        assert_eq!(evaluate(Role::Operator, None, 1), OwnershipDecision::Claim);
    }

    #[test]
    fn operator_keeps_access_to_own_farm() {
        assert_eq!(evaluate(Role::Operator, Some(7), 7), OwnershipDecision::Granted);
    }

    #[test]
    fn operator_is_denied_on_foreign_farm() {
        assert_eq!(evaluate(Role::Operator, Some(7), 8), OwnershipDecision::Denied);
    }
}
