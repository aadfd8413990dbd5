//! `multigrade history`: browse stored lineages for a subject.

use colored::Colorize;
use multigrade_core::content::normalize_segment;
use multigrade_core::{MultigradeConfig, open_store};
use serde_json::json;
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
struct LineageRow {
    #[tabled(rename = "Agent")]
    agent: String,
    #[tabled(rename = "Chapter")]
    chapter: String,
    #[tabled(rename = "Topic")]
    topic: String,
    #[tabled(rename = "Versions")]
    versions: usize,
    #[tabled(rename = "Latest title")]
    title: String,
    #[tabled(rename = "Latest path")]
    path: String,
}

pub async fn execute(
    config: &MultigradeConfig,
    subject: &str,
    topic: Option<&str>,
    json_output: bool,
) -> anyhow::Result<()> {
    let store = open_store(&config.store)?;
    let topic = topic.map(normalize_segment);
    let mut lineages = store.list_lineages(Some(subject)).await?;
    lineages.retain(|lineage| topic.as_ref().is_none_or(|t| &lineage.topic == t));

    let mut rows = Vec::new();
    for lineage in lineages {
        let versions = store.list_versions(&lineage).await?;
        let Some(latest) = store.latest(&lineage).await? else { continue };
        rows.push(LineageRow {
            agent: lineage.agent_kind.label().to_string(),
            chapter: lineage.chapter.clone().unwrap_or_else(|| "-".to_string()),
            topic: lineage.topic.clone(),
            versions: versions.len(),
            title: latest.artifact.body.title().unwrap_or("(unstructured)").to_string(),
            path: latest.path().to_string(),
        });
    }

    if json_output {
        let list: Vec<_> = rows
            .iter()
            .map(|row| {
                json!({
                    "agent": row.agent,
                    "chapter": row.chapter,
                    "topic": row.topic,
                    "versions": row.versions,
                    "title": row.title,
                    "path": row.path,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("{}", format!("No stored content for {subject}.").yellow());
        return Ok(());
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}
