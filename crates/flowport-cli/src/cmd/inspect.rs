use crate::output::{print_json, print_table};
use anyhow::Context;
use flowport_core::config::Config;
use flowport_core::inspect_workflow;
use std::path::Path;

pub fn run(config_path: &Path, input: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    let rows = inspect_workflow(input, &config.schema)
        .with_context(|| format!("failed to inspect {}", input.display()))?;

    if json {
        return print_json(&rows);
    }

    if rows.is_empty() {
        println!("No <{}> elements found.", config.schema.action_tag);
        return Ok(());
    }

    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.id.clone(),
                r.name.clone(),
                r.declared_type.clone(),
                r.parent.clone(),
                match &r.error {
                    Some(e) => format!("error: {e}"),
                    None => r.properties.to_string(),
                },
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "TYPE", "PARENT", "PROPERTIES"], table);
    Ok(())
}
