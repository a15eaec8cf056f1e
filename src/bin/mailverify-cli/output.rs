use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use mailverify_lib::bulk::render_csv;
use mailverify_lib::{CheckFlags, VerificationResult, VerificationState};

pub fn write_reports(results: &[VerificationResult], format: &str, out: Option<&Path>) -> Result<()> {
    let body = match format {
        "human" => human(results).into_bytes(),
        "json" => {
            let mut json = serde_json::to_vec_pretty(results)?;
            json.push(b'\n');
            json
        }
        "ndjson" => {
            let mut buf = Vec::new();
            for result in results {
                serde_json::to_writer(&mut buf, result)?;
                buf.push(b'\n');
            }
            buf
        }
        "csv" => render_csv(results).context("render csv")?,
        other => bail!("unknown --format '{other}', use: human|json|ndjson|csv"),
    };

    match out {
        Some(path) => {
            std::fs::write(path, body).with_context(|| format!("write {}", path.display()))?;
        }
        None => std::io::stdout().lock().write_all(&body)?,
    }
    Ok(())
}

pub fn any_undeliverable(results: &[VerificationResult]) -> bool {
    results
        .iter()
        .any(|result| result.state == VerificationState::Undeliverable)
}

fn human(results: &[VerificationResult]) -> String {
    let mut out = String::new();
    for result in results {
        let tag = format!("[{}]", result.state.as_str().to_ascii_uppercase());
        out.push_str(&format!(
            "{tag:<15} {} :: {} (score {})\n",
            result.address, result.result, result.score
        ));
        if let Some(suggestion) = &result.did_you_mean {
            out.push_str(&format!("        did you mean: {suggestion}\n"));
        }
        if let Some(host) = &result.mx_host {
            out.push_str(&format!("        mx: {host}\n"));
        }
        if let Some(reply) = &result.smtp_response {
            out.push_str(&format!("        smtp: {reply}\n"));
        }
        let flags = raised_flags(&result.flags);
        if !flags.is_empty() {
            out.push_str(&format!("        flags: {}\n", flags.join(", ")));
        }
    }
    out
}

fn raised_flags(flags: &CheckFlags) -> Vec<&'static str> {
    CheckFlags::NAMES
        .iter()
        .zip(flags.values())
        .filter_map(|(name, set)| set.then_some(*name))
        .collect()
}
