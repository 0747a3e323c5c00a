use super::print_json;
use crate::IndexCommand;
use anyhow::{bail, Context, Result};
use easysearch::{Document, FieldDescriptor, IndexCoord, SearchHelper};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;

pub async fn run_ping(helper: &SearchHelper) -> Result<()> {
    helper.verify_cluster().await?;
    println!("Cluster '{}' is reachable.", helper.cluster_name());
    Ok(())
}

pub async fn run_mapping_get(
    helper: &SearchHelper,
    coord: &IndexCoord,
    descriptors: bool,
) -> Result<()> {
    if descriptors {
        print_json(&helper.get_field_descriptors(coord).await?)
    } else {
        print_json(&helper.get_mapping(coord).await?)
    }
}

pub async fn run_mapping_all(helper: &SearchHelper) -> Result<()> {
    print_json(&helper.all_mappings().await)
}

pub async fn run_mapping_create(helper: &SearchHelper, coord: &IndexCoord, file: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))?;
    let fields: BTreeMap<String, FieldDescriptor> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a map of field descriptors", file.display()))?;
    helper.create_mapping(coord, &fields).await?;
    println!("Mapping {} submitted with {} fields.", coord, fields.len());
    Ok(())
}

pub async fn run_index(helper: &SearchHelper, cmd: IndexCommand) -> Result<()> {
    match cmd {
        IndexCommand::Create { index } => {
            helper.create_index(&index).await?;
            println!("Created index '{}'.", index);
        }
        IndexCommand::Exists { index } => {
            let exists = helper.exists_index(&index).await?;
            print_json(&json!({ "index": index, "exists": exists }))?;
        }
        IndexCommand::Drop { index } => {
            helper.drop_index(&index).await?;
            println!("Dropped index '{}'.", index);
        }
        IndexCommand::Clear { index } => {
            helper.clear_index(&index).await?;
            println!("Cleared index '{}'.", index);
        }
    }
    Ok(())
}

pub async fn run_bulk(helper: &SearchHelper, coord: &IndexCoord, file: &Path) -> Result<()> {
    let report = helper.bulk_from_file(coord, file).await?;
    print_json(&report)
}

pub async fn run_get(helper: &SearchHelper, coord: &IndexCoord, id: &str) -> Result<()> {
    match helper.get(coord, id).await? {
        Some(doc) => print_json(&doc),
        None => bail!("document {}/{} not found", coord, id),
    }
}

pub async fn run_put(helper: &SearchHelper, coord: &IndexCoord, id: &str, source: &str) -> Result<()> {
    let doc: Document = match serde_json::from_str(source).context("source is not valid JSON")? {
        Value::Object(doc) => doc,
        _ => bail!("source must be a JSON object"),
    };
    helper.index_one(coord, id, &doc).await?;
    println!("Indexed {}/{}.", coord, id);
    Ok(())
}
