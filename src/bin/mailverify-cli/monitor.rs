use anyhow::Result;
use mailverify_lib::EngineConfig;
use mailverify_lib::monitor::{BlocklistTarget, DmarcStatus, check_blocklists, check_dmarc};
use mailverify_lib::mx::system_resolver;

use crate::args::MonitorCheck;

/// Run one check; exit code 2 when a problem was found.
pub async fn run(config: &EngineConfig, check: MonitorCheck) -> Result<i32> {
    let resolver = system_resolver(&config.dns)?;

    match check {
        MonitorCheck::Dmarc { domain, json } => {
            let status = check_dmarc(&resolver, &domain).await?;
            let payload = status.payload(&domain);
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "domain": domain,
                        "status": status,
                        "alert": payload,
                    }))?
                );
            } else {
                println!("DMARC {domain}: {}", summary(&status));
                if let Some(mailverify_lib::MonitorPayload::Dmarc { issue_type, message }) = &payload {
                    println!("  issue: {issue_type} :: {message}");
                }
            }
            Ok(if payload.is_some() { 2 } else { 0 })
        }
        MonitorCheck::Blocklist { target, json } => {
            let parsed = BlocklistTarget::parse(&target)?;
            let listed = check_blocklists(&resolver, &parsed, &config.monitor).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "target": parsed.to_string(),
                        "blocklists": listed,
                    }))?
                );
            } else if listed.is_empty() {
                println!("{parsed}: not listed");
            } else {
                println!("{parsed}: listed on {}", listed.join(", "));
            }
            Ok(if listed.is_empty() { 0 } else { 2 })
        }
    }
}

fn summary(status: &DmarcStatus) -> String {
    match status {
        DmarcStatus::Missing => "missing".to_string(),
        DmarcStatus::MultipleRecords { records } => format!("{} records", records.len()),
        DmarcStatus::Invalid { record, .. } => format!("invalid ({record})"),
        DmarcStatus::Monitoring { record } => format!("p=none ({record})"),
        DmarcStatus::Enforced { record, .. } => format!("enforced ({record})"),
    }
}
