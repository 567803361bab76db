//! Kinds command implementation.
//!
//! Lists the resource kinds the configured source serves.

use kube_resource_exporter::KindResolver;

use crate::config::Config;
use crate::source::build_store;

/// Lists resolvable kinds and their aliases.
pub fn command_kinds(filter: Option<&str>, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = build_store(config)?;
    let resolver = KindResolver::from_catalog(&store.catalog()?);
    let needle = filter.map(str::to_ascii_lowercase);

    println!("📋 Resource Kinds");
    println!("=================\n");
    println!("{:30} {:35} {:10} Aliases", "Kind", "API Version", "Scope");
    println!("{}", "-".repeat(100));

    let mut shown = 0;
    for (kind, aliases) in resolver.listing() {
        let matches = needle.as_deref().map_or(true, |n| {
            kind.kind.to_ascii_lowercase().contains(n)
                || aliases.iter().any(|a| a.to_ascii_lowercase().contains(n))
        });
        if !matches {
            continue;
        }
        shown += 1;
        println!(
            "{:30} {:35} {:10} {}",
            kind.kind,
            kind.api_version(),
            if kind.namespaced { "Namespaced" } else { "Cluster" },
            aliases.join(", ")
        );
    }

    println!("\n{} of {} kinds", shown, resolver.len());
    Ok(())
}
