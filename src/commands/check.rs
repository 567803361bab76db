//! Check command implementation.
//!
//! Validates the configuration and, unless offline, the resource source.

use crate::config::{validate_effective_config, validate_metrics, Config};
use crate::source::{build_registry, build_store};
use crate::startup_checks::validate_source;

/// Validates configuration and reachability of the resource source.
pub fn command_check(offline: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Kube Resource Exporter - Check");
    println!("=================================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📊 Checking metric definitions...");
    let errors = validate_metrics(&config.metrics);
    if config.metrics.is_empty() {
        println!("   ⚠️  No metrics configured");
    } else if errors.is_empty() {
        println!("   ✅ {} metric definitions compile", config.metrics.len());
    } else {
        for e in &errors {
            println!("   ❌ {}", e);
        }
        all_ok = false;
    }

    if offline {
        println!("\n📡 Skipping resource source (--offline)");
    } else {
        println!("\n📡 Checking resource source...");
        match build_store(config) {
            Ok(store) => {
                let registry = build_registry(config);
                match validate_source(store.as_ref(), &registry) {
                    Ok(0) => println!("   ✅ Every configured kind resolves"),
                    Ok(unresolved) => println!(
                        "   ⚠️  {} metric(s) reference kinds the source does not serve",
                        unresolved
                    ),
                    Err(e) => {
                        println!("   ❌ {}", e);
                        all_ok = false;
                    }
                }
            }
            Err(e) => {
                println!("   ❌ Cannot open resource source: {}", e);
                all_ok = false;
            }
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - exporter is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review the output above");
        std::process::exit(1);
    }
}
