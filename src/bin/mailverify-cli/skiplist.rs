use std::sync::Arc;

use anyhow::Result;
use mailverify_lib::{EngineConfig, MemoryStore, MxSkipEntry, MxSkipList};

use crate::args::SkipAction;

pub async fn run(store: Arc<MemoryStore>, config: &EngineConfig, action: SkipAction) -> Result<()> {
    let skip_list = MxSkipList::new(store, config.skip_list.clone());

    match action {
        SkipAction::List { json } => {
            let entries = skip_list.list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("skip list is empty");
            } else {
                for entry in &entries {
                    println!("{}", describe(entry));
                }
            }
        }
        SkipAction::Add { host, note } => {
            let entry = skip_list.add_manual(&host, note).await?;
            println!("added {}", describe(&entry));
        }
        SkipAction::Remove { host } => {
            if skip_list.remove(&host).await? {
                println!("removed {host}");
            } else {
                println!("{host} was not skip-listed");
            }
        }
        SkipAction::Purge => {
            let purged = skip_list.purge_expired().await?;
            println!("{purged} expired entr{} removed", if purged == 1 { "y" } else { "ies" });
        }
    }
    Ok(())
}

fn describe(entry: &MxSkipEntry) -> String {
    let until = match entry.expires_at {
        Some(at) => format!("until {}", at.to_rfc3339()),
        None => "permanent".to_string(),
    };
    let kind = if entry.is_manual { "manual" } else { entry.reason.as_str() };
    let mut line = format!(
        "{:<40} {kind:<18} failures={:<3} {until}",
        entry.host, entry.failure_count
    );
    if let Some(response) = &entry.last_response {
        line.push_str(&format!("  ({response})"));
    }
    line
}
