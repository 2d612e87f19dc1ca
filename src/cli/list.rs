//! `beekit list` - show vector stores, or one store's files.

use crate::api::types::{ListParams, SortOrder};
use crate::api::PlatformClient;
use crate::config::Config;

pub async fn run_list_command(
    vector_store: Option<String>,
    limit: u32,
    config: &Config,
) -> anyhow::Result<()> {
    config.api.require_key()?;
    let client = PlatformClient::new(&config.api)?;
    let params = ListParams {
        limit: Some(limit),
        order: Some(SortOrder::Desc),
        ..Default::default()
    };

    match vector_store {
        Some(vector_store_id) => {
            let page = client
                .list_vector_store_files(&vector_store_id, &params)
                .await?;
            if page.data.is_empty() {
                println!("  no files in {vector_store_id}");
            }
            for file in &page.data {
                let usage = file
                    .usage_bytes
                    .map(|b| format!("{b} bytes"))
                    .unwrap_or_else(|| "-".to_string());
                println!("  {}  {:<11}  {}", file.id, file.status.as_str(), usage);
            }
            if page.has_more {
                println!("  ...more files; raise --limit to see them");
            }
        }
        None => {
            let page = client.list_vector_stores(&params).await?;
            if page.data.is_empty() {
                println!("  no vector stores");
            }
            for store in &page.data {
                println!(
                    "  {}  {:<11}  {} ({}/{} files embedded)",
                    store.id,
                    store.status.as_str(),
                    store.name,
                    store.file_counts.completed,
                    store.file_counts.total
                );
            }
            if page.has_more {
                println!("  ...more stores; raise --limit to see them");
            }
        }
    }
    Ok(())
}
