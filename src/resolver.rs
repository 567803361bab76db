//! Resource kind resolution.
//!
//! The resolver is built from the cluster's resource catalog and maps the kind
//! names used in metric definitions (`Pod`, `po`, `pods`) to fully-qualified
//! descriptors. It owns its tables; callers rebuild it explicitly.

use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// Fully-qualified identity of a resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKindDescriptor {
    /// Empty for the core group.
    pub group: String,
    pub version: String,
    pub kind: String,
    /// Lower-case plural used in list URLs.
    pub plural: String,
    pub namespaced: bool,
}

impl ResourceKindDescriptor {
    /// `v1` for the core group, `group/version` otherwise.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl std::fmt::Display for ResourceKindDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.kind, self.api_version())
    }
}

/// One resource type as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
    /// Derived from the kind when omitted.
    #[serde(default)]
    pub plural: String,
    #[serde(default = "default_namespaced")]
    pub namespaced: bool,
    #[serde(default)]
    pub short_names: Vec<String>,
}

fn default_namespaced() -> bool {
    true
}

impl CatalogEntry {
    pub fn descriptor(&self) -> ResourceKindDescriptor {
        let plural = if self.plural.is_empty() {
            naive_plural(&self.kind)
        } else {
            self.plural.clone()
        };
        ResourceKindDescriptor {
            group: self.group.clone(),
            version: self.version.clone(),
            kind: self.kind.clone(),
            plural,
            namespaced: self.namespaced,
        }
    }
}

fn naive_plural(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with('x') || lower.ends_with("ch") {
        format!("{lower}es")
    } else if let Some(stem) = lower.strip_suffix('y') {
        if stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            format!("{lower}s")
        } else {
            format!("{stem}ies")
        }
    } else {
        format!("{lower}s")
    }
}

/// Kind-name and alias tables built from one catalog.
#[derive(Debug, Clone, Default)]
pub struct KindResolver {
    kinds: HashMap<String, ResourceKindDescriptor>,
    aliases: HashMap<String, ResourceKindDescriptor>,
}

impl KindResolver {
    /// Builds both tables. The first catalog entry for a kind wins, so callers
    /// list preferred versions first. Short names are seeded before plurals and
    /// the first claim on an alias wins.
    pub fn from_catalog(catalog: &[CatalogEntry]) -> Self {
        let mut kinds: HashMap<String, ResourceKindDescriptor> = HashMap::new();
        for entry in catalog {
            kinds
                .entry(entry.kind.clone())
                .or_insert_with(|| entry.descriptor());
        }

        let mut aliases: HashMap<String, ResourceKindDescriptor> = HashMap::new();
        for entry in catalog {
            let Some(descriptor) = kinds.get(&entry.kind) else {
                continue;
            };
            for short in &entry.short_names {
                aliases
                    .entry(short.clone())
                    .or_insert_with(|| descriptor.clone());
            }
        }
        for descriptor in kinds.values() {
            aliases
                .entry(descriptor.plural.clone())
                .or_insert_with(|| descriptor.clone());
        }

        Self { kinds, aliases }
    }

    /// Direct kind table first, then aliases.
    pub fn resolve(&self, name: &str) -> Result<&ResourceKindDescriptor, ResolveError> {
        self.kinds
            .get(name)
            .or_else(|| self.aliases.get(name))
            .ok_or_else(|| ResolveError::NotFound {
                name: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Every kind with the aliases that point at it, sorted by kind name.
    pub fn listing(&self) -> Vec<(ResourceKindDescriptor, Vec<String>)> {
        let mut rows: Vec<(ResourceKindDescriptor, Vec<String>)> = self
            .kinds
            .values()
            .map(|descriptor| {
                let mut names: Vec<String> = self
                    .aliases
                    .iter()
                    .filter(|(_, target)| *target == descriptor)
                    .map(|(alias, _)| alias.clone())
                    .collect();
                names.sort();
                (descriptor.clone(), names)
            })
            .collect();
        rows.sort_by(|a, b| a.0.kind.cmp(&b.0.kind).then_with(|| a.0.group.cmp(&b.0.group)));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(group: &str, version: &str, kind: &str, shorts: &[&str]) -> CatalogEntry {
        CatalogEntry {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            plural: String::new(),
            namespaced: true,
            short_names: shorts.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn catalog() -> Vec<CatalogEntry> {
        vec![
            entry("", "v1", "Pod", &["po"]),
            entry("apps", "v1", "Deployment", &["deploy"]),
            entry("example.io", "v1", "Backup", &["bk"]),
            entry("example.io", "v1beta1", "Backup", &["bk"]),
            entry("other.io", "v1", "Bucket", &["bk", "bkt"]),
            entry("", "v1", "Endpoints", &["ep"]),
            entry("networking.k8s.io", "v1", "NetworkPolicy", &["netpol"]),
        ]
    }

    #[test]
    fn test_resolve_by_kind_alias_and_plural() {
        let resolver = KindResolver::from_catalog(&catalog());
        assert_eq!(resolver.resolve("Pod").unwrap().api_version(), "v1");
        assert_eq!(resolver.resolve("po").unwrap().kind, "Pod");
        assert_eq!(resolver.resolve("pods").unwrap().kind, "Pod");
        assert_eq!(resolver.resolve("deploy").unwrap().api_version(), "apps/v1");
        assert_eq!(resolver.resolve("networkpolicies").unwrap().kind, "NetworkPolicy");
        assert_eq!(resolver.resolve("deployments").unwrap().kind, "Deployment");
        assert_eq!(resolver.resolve("ep").unwrap().kind, "Endpoints");
    }

    #[test]
    fn test_first_entry_wins() {
        let resolver = KindResolver::from_catalog(&catalog());
        assert_eq!(resolver.resolve("Backup").unwrap().version, "v1");
        assert_eq!(resolver.resolve("bk").unwrap().kind, "Backup");
        assert_eq!(resolver.resolve("bkt").unwrap().kind, "Bucket");
    }

    #[test]
    fn test_unknown_name() {
        let resolver = KindResolver::from_catalog(&catalog());
        assert_eq!(
            resolver.resolve("Widget"),
            Err(ResolveError::NotFound { name: "Widget".into() })
        );
        assert!(KindResolver::default().resolve("Pod").is_err());
    }

    #[test]
    fn test_listing_groups_aliases() {
        let resolver = KindResolver::from_catalog(&catalog());
        let listing = resolver.listing();
        assert_eq!(listing.len(), resolver.len());
        let (pod, names) = listing.iter().find(|(d, _)| d.kind == "Pod").unwrap();
        assert_eq!(pod.plural, "pods");
        assert_eq!(names, &vec!["po".to_string(), "pods".to_string()]);
    }

    #[test]
    fn test_catalog_entry_from_yaml() {
        let yaml = "group: example.io\nversion: v1\nkind: Backup\nshortNames: [bk]\n";
        let entry: CatalogEntry = serde_yaml::from_str(yaml).unwrap();
        assert!(entry.namespaced);
        assert_eq!(entry.descriptor().plural, "backups");
    }
}
