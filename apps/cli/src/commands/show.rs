//! `multigrade show`: print one stored version.

use anyhow::Context;
use multigrade_core::{ContentPath, MultigradeConfig, open_store, render_markdown};

pub async fn execute(config: &MultigradeConfig, path: &str, json_output: bool) -> anyhow::Result<()> {
    let path: ContentPath = path.parse()?;
    let store = open_store(&config.store)?;
    let content = store.get(&path).await.with_context(|| format!("loading {path}"))?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&content)?);
    } else {
        println!("Content ID: {}", content.content_id);
        println!("Version: {}", content.version_number);
        if let Some(parent) = content.parent_version_id {
            println!("Previous version: {parent}");
        }
        println!();
        println!("{}", render_markdown(&content.artifact));
    }
    Ok(())
}
