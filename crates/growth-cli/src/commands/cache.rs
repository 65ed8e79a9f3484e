//! Artifact cache commands

use anyhow::{Context, Result};
use growth_lib::ArtifactKind;
use tabled::Tabled;

use super::Session;
use crate::output::{format_present, print_info, print_json, print_rows, print_success, OutputFormat};

/// Row for cache file table
#[derive(Tabled)]
struct CacheFileRow {
    #[tabled(rename = "Artifact")]
    artifact: String,
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Present")]
    present: String,
}

/// Show which artifacts are cached, without loading them
pub fn status(session: &Session) -> Result<()> {
    let store = session.store();
    let status = store.status();

    match session.format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => {
            let rows = ArtifactKind::ALL
                .into_iter()
                .map(|kind| CacheFileRow {
                    artifact: kind.key().to_string(),
                    file: kind.file_name().to_string(),
                    present: format_present(store.path_of(kind).exists()),
                })
                .collect();
            println!("Directory: {}", status.directory.display());
            print_rows(rows);

            if let Some(info) = &status.info {
                print_info(&format!(
                    "{} model with classes [{}], saved {}",
                    info.algorithm,
                    info.classes.join(", "),
                    info.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                ));
            } else if !status.complete {
                print_info("Cache incomplete; the next start will train from the dataset");
            }
        }
    }
    Ok(())
}

/// Remove every cached artifact
pub fn clear(session: &Session) -> Result<()> {
    let removed = session
        .store()
        .clear()
        .context("Failed to clear artifact cache")?;

    match session.format {
        OutputFormat::Json => print_json(&serde_json::json!({ "removed": removed }))?,
        OutputFormat::Table => print_success(&format!(
            "Removed {} artifacts from {}",
            removed,
            session.cache_dir.display()
        )),
    }
    Ok(())
}
