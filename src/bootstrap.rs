//! Administrative setup and inspection: seeding the customer directory,
//! clearing the dispatch namespace and reporting what is deployed.

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use crate::auth::{generate_token, token_digest};
use crate::error::{Error, Result};
use crate::registry::NamespaceRegistry;
use crate::store::Store;
use crate::types::{ApiScript, ResourceLimits, TagFilter, Tenant, TenantToken};

/// `(id, display name, plan tier, token)` for the demo customers.
pub const DEMO_TENANTS: [(&str, &str, &str, &str); 2] = [
    ("559968cd-b048-4bbc-ba21-d12625fcee45", "Customer 1", "basic", "a1b2c3"),
    ("2612b586-4799-42ff-8c44-d4841e1e70ed", "Customer 2", "advanced", "d4e5f6"),
];

/// Recreates the tables and inserts the demo customers and their tokens.
pub fn seed_demo_tenants(store: &dyn Store) -> Result<Vec<Tenant>> {
    store.reset()?;

    let mut tenants = Vec::with_capacity(DEMO_TENANTS.len());
    for (id, name, plan, token) in DEMO_TENANTS {
        let tenant = Tenant {
            id: id.to_string(),
            display_name: name.to_string(),
            plan_tier: plan.to_string(),
        };
        store.create_tenant(&tenant)?;
        store.create_tenant_token(&TenantToken {
            token_digest: token_digest(token),
            tenant_id: tenant.id.clone(),
        })?;
        tenants.push(tenant);
    }
    Ok(tenants)
}

/// Creates a tenant with a fresh id and token. The raw token is returned
/// once and never stored.
pub fn create_tenant(store: &dyn Store, display_name: &str, plan_tier: &str) -> Result<(Tenant, String)> {
    let tenant = Tenant {
        id: Uuid::new_v4().to_string(),
        display_name: display_name.to_string(),
        plan_tier: plan_tier.to_string(),
    };
    store.create_tenant(&tenant)?;

    let raw_token = generate_token();
    store.create_tenant_token(&TenantToken {
        token_digest: token_digest(&raw_token),
        tenant_id: tenant.id.clone(),
    })?;

    Ok((tenant, raw_token))
}

/// Deletes every script in the namespace. Resource policies are left alone.
pub async fn clear_namespace(registry: &dyn NamespaceRegistry) -> Result<usize> {
    let scripts = registry.list_scripts().await?;
    for script in &scripts {
        registry.delete_script(&script.id).await?;
        tracing::info!(script = %script.id, "Deleted script");
    }
    Ok(scripts.len())
}

/// A deployed script with the policies dispatch would apply to it.
#[derive(Debug, Clone)]
pub struct ScriptStatus {
    pub script: ApiScript,
    pub limits: Option<ResourceLimits>,
    pub outbound: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceStatus {
    pub tenants: Vec<Tenant>,
    pub scripts: Vec<ScriptStatus>,
    /// Names with stored policies but no script in the namespace.
    pub orphaned_policies: Vec<String>,
}

/// Reports customers, scripts with their tags and stored policies. With
/// `tenant_id`, only that customer and the scripts it owns.
pub async fn namespace_status(
    store: &dyn Store,
    registry: &dyn NamespaceRegistry,
    tenant_id: Option<&str>,
) -> Result<NamespaceStatus> {
    let (tenants, scripts) = match tenant_id {
        Some(id) => {
            let tenant = store.get_tenant(id)?.ok_or(Error::NotFound)?;
            let scripts = registry
                .list_scripts_by_tags(&[TagFilter::allow(tenant.id.as_str())])
                .await?;
            (vec![tenant], scripts)
        }
        None => (store.list_tenants()?, registry.list_scripts().await?),
    };

    let mut limits: HashMap<String, ResourceLimits> = store
        .list_resource_policies()?
        .into_iter()
        .map(|p| (p.script_name, p.limits))
        .collect();
    let mut outbound: HashMap<String, String> = store
        .list_outbound_policies()?
        .into_iter()
        .map(|p| (p.script_name, p.outbound_script_name))
        .collect();

    let scripts: Vec<ScriptStatus> = scripts
        .into_iter()
        .map(|script| ScriptStatus {
            limits: limits.remove(&script.id),
            outbound: outbound.remove(&script.id),
            script,
        })
        .collect();

    let orphaned_policies = if tenant_id.is_some() {
        Vec::new()
    } else {
        limits
            .into_keys()
            .chain(outbound.into_keys())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    };

    Ok(NamespaceStatus {
        tenants,
        scripts,
        orphaned_policies,
    })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tempfile::TempDir;

    use super::*;
    use crate::auth::resolve_tenant;
    use crate::registry::MemoryRegistry;
    use crate::store::SqliteStore;
    use crate::types::{OwnershipTagSet, ResourcePolicy};

    fn open_store(temp: &TempDir) -> SqliteStore {
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        store
    }

    #[test]
    fn test_seeded_tokens_resolve() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        seed_demo_tenants(&store).unwrap();

        let first = resolve_tenant(&store, Some("a1b2c3")).unwrap();
        assert_eq!(first.id, "559968cd-b048-4bbc-ba21-d12625fcee45");
        assert_eq!(first.plan_tier, "basic");
        let second = resolve_tenant(&store, Some("d4e5f6")).unwrap();
        assert_eq!(second.plan_tier, "advanced");
    }

    #[test]
    fn test_seeding_twice_is_a_reset() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        seed_demo_tenants(&store).unwrap();
        seed_demo_tenants(&store).unwrap();
        assert_eq!(store.list_tenants().unwrap().len(), 2);
    }

    #[test]
    fn test_created_tenant_token_resolves() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let (tenant, token) = create_tenant(&store, "Acme", "enterprise").unwrap();
        assert_eq!(resolve_tenant(&store, Some(&token)).unwrap(), tenant);
    }

    #[tokio::test]
    async fn test_clear_namespace_removes_all_scripts() {
        let registry = MemoryRegistry::new();
        for name in ["a", "b"] {
            registry.put_script(name, Bytes::from_static(b"code")).await.unwrap();
        }

        assert_eq!(clear_namespace(&registry).await.unwrap(), 2);
        assert!(registry.list_scripts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_joins_scripts_with_policies() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let tenants = seed_demo_tenants(&store).unwrap();
        let registry = MemoryRegistry::new();

        registry.put_script("limited", Bytes::from_static(b"code")).await.unwrap();
        registry
            .put_tags("limited", &OwnershipTagSet::for_owner(&tenants[0]))
            .await
            .unwrap();
        registry.put_script("other", Bytes::from_static(b"code")).await.unwrap();
        registry
            .put_tags("other", &OwnershipTagSet::for_owner(&tenants[1]))
            .await
            .unwrap();
        let limits = ResourceLimits {
            cpu_ms: Some(50),
            memory: None,
        };
        for name in ["limited", "deleted"] {
            store
                .upsert_resource_policy(&ResourcePolicy {
                    script_name: name.to_string(),
                    limits,
                })
                .unwrap();
        }

        let status = namespace_status(&store, &registry, None).await.unwrap();
        assert_eq!(status.tenants.len(), 2);
        assert_eq!(status.scripts.len(), 2);
        let limited = status.scripts.iter().find(|s| s.script.id == "limited").unwrap();
        assert_eq!(limited.limits, Some(limits));
        assert!(limited.script.tags.contains(&tenants[0].id));
        assert_eq!(status.orphaned_policies, vec!["deleted".to_string()]);

        let scoped = namespace_status(&store, &registry, Some(&tenants[1].id))
            .await
            .unwrap();
        assert_eq!(scoped.tenants, vec![tenants[1].clone()]);
        assert_eq!(scoped.scripts.len(), 1);
        assert_eq!(scoped.scripts[0].script.id, "other");
        assert!(scoped.orphaned_policies.is_empty());
    }

    #[tokio::test]
    async fn test_status_for_unknown_tenant() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let registry = MemoryRegistry::new();

        let result = namespace_status(&store, &registry, Some("nobody")).await;
        assert!(matches!(result, Err(Error::NotFound)));
    }
}
