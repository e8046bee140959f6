use std::collections::BTreeSet;
use std::fmt;

use super::Tenant;

/// Tags attached to a script in the namespace registry.
///
/// The owning tenant's id is one of the tags; an empty set means the name is
/// unclaimed. This is the only ownership record in the system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipTagSet(BTreeSet<String>);

impl OwnershipTagSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The tags written on publish: the owner's id and its plan tier.
    #[must_use]
    pub fn for_owner(tenant: &Tenant) -> Self {
        [tenant.id.clone(), tenant.plan_tier.clone()]
            .into_iter()
            .collect()
    }

    #[must_use]
    pub fn is_unclaimed(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn is_owned_by(&self, tenant_id: &str) -> bool {
        self.0.contains(tenant_id)
    }

    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<String> for OwnershipTagSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().filter(|t| !t.is_empty()).collect())
    }
}

impl From<Vec<String>> for OwnershipTagSet {
    fn from(tags: Vec<String>) -> Self {
        tags.into_iter().collect()
    }
}

/// A tag predicate for registry list queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub tag: String,
    pub allow: bool,
}

impl TagFilter {
    #[must_use]
    pub fn allow(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            allow: true,
        }
    }

    #[must_use]
    pub fn deny(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            allow: false,
        }
    }

    /// Whether a script carrying `tags` passes this filter.
    #[must_use]
    pub fn matches(&self, tags: &OwnershipTagSet) -> bool {
        tags.contains(&self.tag) == self.allow
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.allow { "yes" } else { "no" };
        write!(f, "{}:{}", self.tag, verdict)
    }
}
