use std::path::Path;

use anyhow::Result;
use clap::Args;
use regostore_policy_store::resolve_root;
use serde_json::json;

use crate::cli::{load_cli_settings, GlobalSettingsArgs};

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    /// Print as JSON instead of YAML-like text
    #[arg(long)]
    pub json: bool,
}

pub fn cmd_config(args: ConfigArgs, config: Option<&Path>, global: &GlobalSettingsArgs) -> Result<()> {
    let settings = load_cli_settings(config, global)?;
    let source = resolve_root(&settings.coordinates);

    if args.json {
        let report = json!({
            "settings": {
                "coordinates": settings.coordinates,
                "fetch_timeout_secs": settings.fetch_timeout_secs,
            },
            "resolved": source,
            "provenance": settings.provenance,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let coordinates = &settings.coordinates;
    println!("Resolved settings:");
    println!("  base_location:            {}", coordinates.base_location);
    println!("  owner:                    {}", coordinates.owner);
    println!("  repository:               {}", coordinates.repository);
    println!("  path:                     {}", coordinates.path);
    println!("  tag:                      {}", coordinates.tag);
    println!("  branch:                   {}", coordinates.branch);
    println!("  refresh_interval_minutes: {}", coordinates.refresh_interval_minutes);
    println!("  fetch_timeout_secs:       {}", settings.fetch_timeout_secs);
    println!();
    println!("Fetch root: {}", source.root);
    if !source.branch.is_empty() {
        println!("Branch:     {}", source.branch);
    }
    println!("Strip .json extension: {}", source.strip_file_extension);
    println!();
    println!("Provenance:");
    for (key, entry) in &settings.provenance {
        println!("  {:<26} {:?}", key, entry.source);
    }
    Ok(())
}
