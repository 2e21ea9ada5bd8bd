//! The tenancy guard.
//!
//! Every unscoped read is implicitly narrowed to what the current user may
//! see. The visibility clause is folded into the filter's top-level `$and`
//! conjunction so it composes safely with any user-supplied top-level `$or`.

use mongodb::bson::{Bson, Document, doc};

use crate::tenant::TenancyContext;
use crate::types::document::{SELF_ORGANIZATION, SELF_OWNER};

/// Injects the owner/organization visibility clause.
///
/// No-op when the caller already supplied an explicit owner filter, or when
/// there is no authenticated user (anonymous read is allowed unless the
/// caller narrowed by owner).
pub fn apply_visibility(filter: &mut Document, ctx: &TenancyContext) {
    if filter.contains_key(SELF_OWNER) {
        return;
    }
    let Some(user) = ctx.user_id() else {
        return;
    };

    match ctx.organization_id() {
        Some(organization) => {
            let clause = doc! {
                "$or": [
                    { SELF_OWNER: user },
                    { SELF_ORGANIZATION: organization },
                    { SELF_ORGANIZATION: Bson::Null },
                ]
            };
            push_conjunct(filter, clause);
        }
        None => {
            filter.insert(SELF_OWNER, user);
        }
    }
}

/// Appends a clause to the filter's top-level `$and` array, creating it if
/// needed. Shared with search injection, which has the same composition
/// constraint.
pub(crate) fn push_conjunct(filter: &mut Document, clause: Document) {
    match filter.get_array_mut("$and") {
        Ok(conjuncts) => conjuncts.push(Bson::Document(clause)),
        Err(_) => {
            filter.insert("$and", vec![Bson::Document(clause)]);
        }
    }
}
