//! ResourceRegistry for mapping URL slugs to resource descriptions.

use crate::domain::resource::catalog;
use crate::domain::resource::ResourceSpec;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<String, Arc<ResourceSpec>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-filled with every school screen.
    pub fn school() -> Self {
        let mut reg = Self::new();
        for spec in catalog::school_resources() {
            reg.register(spec);
        }
        reg
    }

    /// Registers (or replaces) a resource under its `key`.
    pub fn register(&mut self, spec: ResourceSpec) {
        self.resources.insert(spec.key.to_string(), Arc::new(spec));
    }

    pub fn get(&self, key: &str) -> Option<Arc<ResourceSpec>> {
        self.resources.get(key).cloned()
    }

    /// All resources, ordered by key.
    pub fn list(&self) -> Vec<Arc<ResourceSpec>> {
        self.resources.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn school_catalog_is_consistent() {
        let reg = ResourceRegistry::school();
        let all = reg.list();
        assert_eq!(all.len(), 9);

        let tables: HashSet<_> = all.iter().map(|r| r.table).collect();
        assert_eq!(tables.len(), all.len());

        for r in &all {
            assert!(!r.search_columns.is_empty(), "{} has no search columns", r.key);
            for c in r.search_columns {
                assert!(r.field(c).is_some(), "{}: search column {} is not a field", r.key, c);
            }
            if let Some(status) = &r.status {
                assert!(status.values.contains(&status.initial));
            }
        }
    }

    #[test]
    fn lookup_by_slug() {
        let reg = ResourceRegistry::school();
        let jobs = reg.get("jobs").map(|r| r.table);
        assert_eq!(jobs, Some("jobs"));
        assert!(reg.get("nope").is_none());
        assert!(reg.get("users-roles").map(|r| r.admin_only).unwrap_or(false));
    }
}
