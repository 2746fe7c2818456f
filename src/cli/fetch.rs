use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use regostore_policy_store::{
    resolve_root, PolicyReader, RegoObjectCategory, RegoStore, RegoStoreBuilder,
    StoreSettings,
};
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::cli::{load_cli_settings, GlobalSettingsArgs};

#[derive(Args, Clone, Debug)]
pub struct FetchArgs {
    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Show one framework with its resolved controls
    #[arg(long, value_name = "NAME")]
    pub framework: Option<String>,

    /// Show one control with its resolved rules
    #[arg(long, value_name = "ID")]
    pub control: Option<String>,
}

pub async fn cmd_fetch(
    args: FetchArgs,
    config: Option<&Path>,
    global: &GlobalSettingsArgs,
) -> Result<()> {
    let mut settings = load_cli_settings(config, global)?;
    settings.coordinates.refresh_interval_minutes = 0;

    let store = RegoStoreBuilder::from_settings(&settings)
        .open()
        .await
        .with_context(|| format!("Fetch from {} failed", store_root(&settings)))?;
    info!(generation = store.generation(), "artifacts fetched");

    let mut report = summary(&store);
    if let Some(name) = &args.framework {
        let framework = store
            .framework_by_name(name)
            .ok_or_else(|| anyhow!("Framework '{}' not found", name))?;
        report["framework"] = serde_json::to_value(&framework)?;
    }
    if let Some(id) = &args.control {
        let control = store
            .control_by_id(id)
            .ok_or_else(|| anyhow!("Control '{}' not found", id))?;
        report["control"] = serde_json::to_value(&control)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&store, &report);
    }
    Ok(())
}

fn store_root(settings: &StoreSettings) -> String {
    resolve_root(&settings.coordinates).root
}

fn category_count(store: &RegoStore, category: RegoObjectCategory) -> usize {
    match category {
        RegoObjectCategory::AttackTracks => store.attack_tracks().len(),
        RegoObjectCategory::Controls => store.controls().len(),
        RegoObjectCategory::DefaultConfigInputs => 1,
        RegoObjectCategory::ExceptionPolicies => store.exception_policies().len(),
        RegoObjectCategory::Frameworks => store.frameworks().len(),
        RegoObjectCategory::Rules => store.rules().len(),
    }
}

fn summary(store: &RegoStore) -> JsonValue {
    let counts: serde_json::Map<String, JsonValue> = RegoObjectCategory::ALL
        .into_iter()
        .map(|category| {
            (
                category.as_str().to_string(),
                json!(category_count(store, category)),
            )
        })
        .collect();
    json!({
        "root": store.resolved_source().root,
        "generation": store.generation(),
        "counts": counts,
        "frameworks": store.framework_names(),
        "control_rule_relations": store.control_rule_relations().len(),
        "framework_control_relations": store.framework_control_relations().len(),
    })
}

fn print_summary(store: &RegoStore, report: &JsonValue) {
    println!("Fetched from {}", store.resolved_source().root);
    println!("Generation: {}", store.generation());
    for category in RegoObjectCategory::ALL {
        println!("  {:<24} {}", category.as_str(), category_count(store, category));
    }
    println!(
        "Relations: {} control/rule, {} framework/control",
        store.control_rule_relations().len(),
        store.framework_control_relations().len()
    );
    if let Some(framework) = report.get("framework") {
        println!("\nFramework:\n{}", pretty(framework));
    }
    if let Some(control) = report.get("control") {
        println!("\nControl:\n{}", pretty(control));
    }
}

fn pretty(value: &JsonValue) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
