use crate::error::Result;
use crate::registry::NamespaceRegistry;
use crate::types::{OwnershipTagSet, Tenant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimDecision {
    /// No tags: the first publisher takes the name.
    Unclaimed,
    /// The tenant already owns the name and is updating it.
    OwnedBySelf,
    /// Another tenant owns the name.
    Reserved,
}

impl ClaimDecision {
    #[must_use]
    pub fn evaluate(tags: &OwnershipTagSet, tenant: &Tenant) -> Self {
        if tags.is_unclaimed() {
            Self::Unclaimed
        } else if tags.is_owned_by(&tenant.id) {
            Self::OwnedBySelf
        } else {
            Self::Reserved
        }
    }

    #[must_use]
    pub fn is_allowed(self) -> bool {
        !matches!(self, Self::Reserved)
    }
}

/// Decides whether `tenant` may create or update `script_name`.
pub async fn check_claim(
    registry: &dyn NamespaceRegistry,
    script_name: &str,
    tenant: &Tenant,
) -> Result<ClaimDecision> {
    let tags = registry.get_tags(script_name).await?;
    Ok(ClaimDecision::evaluate(&tags, tenant))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::registry::MemoryRegistry;

    fn tenant(id: &str) -> Tenant {
        Tenant {
            id: id.to_string(),
            display_name: id.to_string(),
            plan_tier: "basic".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unclaimed_name_is_allowed() {
        let registry = MemoryRegistry::new();
        let decision = check_claim(&registry, "fresh", &tenant("t-1")).await.unwrap();
        assert_eq!(decision, ClaimDecision::Unclaimed);
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_owner_may_update_and_others_are_denied() {
        let registry = MemoryRegistry::new();
        registry.put_script("s", Bytes::from_static(b"code")).await.unwrap();
        registry
            .put_tags("s", &OwnershipTagSet::for_owner(&tenant("t-1")))
            .await
            .unwrap();

        assert_eq!(
            check_claim(&registry, "s", &tenant("t-1")).await.unwrap(),
            ClaimDecision::OwnedBySelf
        );
        let other = check_claim(&registry, "s", &tenant("t-2")).await.unwrap();
        assert_eq!(other, ClaimDecision::Reserved);
        assert!(!other.is_allowed());
    }

    #[tokio::test]
    async fn test_uploaded_but_untagged_name_is_unclaimed() {
        let registry = MemoryRegistry::new();
        registry.put_script("s", Bytes::from_static(b"code")).await.unwrap();
        assert_eq!(
            check_claim(&registry, "s", &tenant("t-2")).await.unwrap(),
            ClaimDecision::Unclaimed
        );
    }

    #[test]
    fn test_plan_tag_alone_does_not_grant_ownership() {
        let tags = OwnershipTagSet::from(vec!["basic".to_string()]);
        let mut t = tenant("t-1");
        t.plan_tier = "basic".to_string();
        assert_eq!(ClaimDecision::evaluate(&tags, &t), ClaimDecision::Reserved);
    }
}
