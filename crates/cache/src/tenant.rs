//! Tenancy context for visibility scoping.
//!
//! [`TenancyContext`] carries the resolved current user's identity into the
//! query pipeline. It is produced by the authentication subsystem (outside
//! this crate) and consumed read-only: the engine never mutates it, it only
//! derives visibility clauses from it.

use mongodb::bson::Document;

use crate::repository::SourceObject;
use crate::types::document::{SELF_ORGANIZATION, SELF_OWNER};

/// The resolved current user, for owner/organization visibility scoping.
///
/// An anonymous context (no user id) adds no visibility clause at all:
/// anonymous read is allowed unless the caller has already narrowed by owner.
/// This is an explicit design decision, not an omission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenancyContext {
    user_id: Option<String>,
    organization_id: Option<String>,
}

impl TenancyContext {
    /// Creates an anonymous (unscoped) context.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Creates a context for an authenticated user without an organization.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            organization_id: None,
        }
    }

    /// Attaches the user's organization.
    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Returns the user id, if authenticated.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Returns the organization id, if any.
    pub fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }

    /// Returns true when there is no authenticated user.
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    /// Application-code visibility check for authoritative records.
    ///
    /// Used on the fallback path, where the store bypassed the compiled
    /// tenancy filter. Mirrors the clause built by
    /// [`apply_visibility`](crate::query::tenancy::apply_visibility):
    /// owner match, organization match, or unowned-by-any-organization.
    pub fn can_view(&self, object: &SourceObject) -> bool {
        let Some(user) = self.user_id.as_deref() else {
            return true;
        };
        if object.owner_id.as_deref() == Some(user) {
            return true;
        }
        match (&self.organization_id, &object.organization_id) {
            (Some(ctx_org), Some(obj_org)) => ctx_org == obj_org,
            (Some(_), None) => true,
            // No organization on the user: only the owner clause applies.
            (None, _) => false,
        }
    }

    /// Visibility check against a cached document's `_self` metadata.
    pub fn can_view_document(&self, document: &Document) -> bool {
        let Some(user) = self.user_id.as_deref() else {
            return true;
        };
        let owner = dotted_str(document, SELF_OWNER);
        if owner == Some(user) {
            return true;
        }
        match (self.organization_id.as_deref(), dotted_str(document, SELF_ORGANIZATION)) {
            (Some(ctx_org), Some(doc_org)) => ctx_org == doc_org,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

/// Resolves a dot-path string field inside nested documents.
fn dotted_str<'a>(document: &'a Document, path: &str) -> Option<&'a str> {
    let mut current = document;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            return current.get_str(segment).ok();
        }
        current = current.get_document(segment).ok()?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn object(owner: Option<&str>, org: Option<&str>) -> SourceObject {
        SourceObject {
            id: "obj-1".to_string(),
            schema_id: uuid::Uuid::nil(),
            schema_ref: "https://example.org/schema/person".to_string(),
            owner_id: owner.map(String::from),
            organization_id: org.map(String::from),
            attributes: serde_json::Map::new(),
            embedded: Default::default(),
        }
    }

    #[test]
    fn test_anonymous_sees_everything() {
        let ctx = TenancyContext::anonymous();
        assert!(ctx.can_view(&object(Some("alice"), Some("acme"))));
    }

    #[test]
    fn test_owner_sees_own_objects() {
        let ctx = TenancyContext::for_user("alice");
        assert!(ctx.can_view(&object(Some("alice"), None)));
        assert!(!ctx.can_view(&object(Some("bob"), None)));
    }

    #[test]
    fn test_organization_member_sees_org_and_unowned() {
        let ctx = TenancyContext::for_user("alice").with_organization("acme");
        assert!(ctx.can_view(&object(Some("bob"), Some("acme"))));
        assert!(ctx.can_view(&object(Some("bob"), None)));
        assert!(!ctx.can_view(&object(Some("bob"), Some("globex"))));
    }

    #[test]
    fn test_document_visibility_matches_source_visibility() {
        let ctx = TenancyContext::for_user("alice").with_organization("acme");
        let visible = doc! {
            "_self": { "owner": { "id": "bob" }, "organization": { "id": "acme" } }
        };
        let hidden = doc! {
            "_self": { "owner": { "id": "bob" }, "organization": { "id": "globex" } }
        };
        assert!(ctx.can_view_document(&visible));
        assert!(!ctx.can_view_document(&hidden));
    }
}
