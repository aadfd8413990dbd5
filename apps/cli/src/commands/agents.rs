//! `multigrade agents`: list the fixed set of agents.

use multigrade_core::AgentKind;
use multigrade_core::artifacts::ArtifactSchema;
use serde_json::json;
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
struct AgentRow {
    #[tabled(rename = "ID")]
    id: &'static str,
    #[tabled(rename = "Name")]
    name: &'static str,
    #[tabled(rename = "Required inputs")]
    inputs: String,
}

pub fn execute(json_output: bool) -> anyhow::Result<()> {
    let rows: Vec<AgentRow> = AgentKind::ALL
        .iter()
        .map(|kind| AgentRow {
            id: kind.as_str(),
            name: kind.label(),
            inputs: ArtifactSchema::required_placeholders(*kind).join(", "),
        })
        .collect();

    if json_output {
        let list: Vec<_> = rows
            .iter()
            .map(|row| json!({ "id": row.id, "name": row.name, "required_inputs": row.inputs }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        println!("{}", Table::new(rows).with(Style::rounded()));
    }
    Ok(())
}
