use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::json;

use super::NamespaceRegistry;
use crate::error::{Error, Result};
use crate::types::{ApiScript, OwnershipTagSet, TagFilter};

#[derive(Debug, Clone)]
struct StoredScript {
    content: Bytes,
    tags: OwnershipTagSet,
    created_on: DateTime<Utc>,
    modified_on: DateTime<Utc>,
}

impl StoredScript {
    fn view(&self, id: &str) -> ApiScript {
        ApiScript {
            id: id.to_string(),
            created_on: Some(self.created_on),
            modified_on: Some(self.modified_on),
            tags: self.tags.to_vec(),
        }
    }
}

/// In-process registry for local runs and tests.
///
/// Empty uploads are rejected the way the real registry rejects a script
/// that fails validation, and tag writes can be made to fail on demand.
#[derive(Default)]
pub struct MemoryRegistry {
    scripts: Mutex<BTreeMap<String, StoredScript>>,
    fail_tag_writes: AtomicUsize,
    unavailable: AtomicBool,
    tag_read_delay: Mutex<Option<Duration>>,
}

impl MemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` tag writes fail.
    pub fn fail_next_tag_writes(&self, count: usize) {
        self.fail_tag_writes.store(count, Ordering::SeqCst);
    }

    /// Every call fails as if the registry were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Sleep before answering tag reads, widening the check-then-act window.
    pub fn set_tag_read_delay(&self, delay: Option<Duration>) {
        *self.tag_read_delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    #[must_use]
    pub fn script_content(&self, name: &str) -> Option<Bytes> {
        self.scripts().get(name).map(|s| s.content.clone())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.scripts().contains_key(name)
    }

    fn scripts(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredScript>> {
        self.scripts.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::DependencyUnavailable("registry unreachable".into()));
        }
        Ok(())
    }

    fn take_tag_failure(&self) -> bool {
        self.fail_tag_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl NamespaceRegistry for MemoryRegistry {
    async fn list_scripts(&self) -> Result<Vec<ApiScript>> {
        self.ensure_available()?;
        Ok(self
            .scripts()
            .iter()
            .map(|(id, script)| script.view(id))
            .collect())
    }

    async fn list_scripts_by_tags(&self, filters: &[TagFilter]) -> Result<Vec<ApiScript>> {
        self.ensure_available()?;
        Ok(self
            .scripts()
            .iter()
            .filter(|(_, script)| filters.iter().all(|f| f.matches(&script.tags)))
            .map(|(id, script)| script.view(id))
            .collect())
    }

    async fn get_tags(&self, name: &str) -> Result<OwnershipTagSet> {
        self.ensure_available()?;
        let delay = *self.tag_read_delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .scripts()
            .get(name)
            .map(|s| s.tags.clone())
            .unwrap_or_default())
    }

    async fn put_script(&self, name: &str, content: Bytes) -> Result<()> {
        self.ensure_available()?;
        if content.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::UpstreamValidation {
                status: 400,
                body: json!({
                    "success": false,
                    "errors": [{ "code": 10021, "message": "No script content provided" }],
                }),
            });
        }

        let now = Utc::now();
        let mut scripts = self.scripts();
        match scripts.get_mut(name) {
            Some(existing) => {
                existing.content = content;
                existing.modified_on = now;
            }
            None => {
                scripts.insert(
                    name.to_string(),
                    StoredScript {
                        content,
                        tags: OwnershipTagSet::new(),
                        created_on: now,
                        modified_on: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn put_tags(&self, name: &str, tags: &OwnershipTagSet) -> Result<()> {
        self.ensure_available()?;
        if self.take_tag_failure() {
            return Err(Error::DependencyUnavailable("registry put tags returned 500".into()));
        }
        let mut scripts = self.scripts();
        let script = scripts
            .get_mut(name)
            .ok_or_else(|| Error::DependencyUnavailable("registry put tags returned 404".into()))?;
        script.tags = tags.clone();
        Ok(())
    }

    async fn delete_script(&self, name: &str) -> Result<()> {
        self.ensure_available()?;
        self.scripts().remove(name);
        Ok(())
    }
}
