use std::path::Path;

use crate::pipeline::{CheckFlags, VerificationResult};

use super::JobError;

const LEADING: [&str; 5] = ["email", "state", "result", "score", "did_you_mean"];
const TRAILING: [&str; 2] = ["mx_host", "verified_at"];

/// Artifact column names, flags in [`CheckFlags::NAMES`] order.
pub fn artifact_header() -> Vec<&'static str> {
    LEADING
        .iter()
        .chain(CheckFlags::NAMES.iter())
        .chain(TRAILING.iter())
        .copied()
        .collect()
}

/// Render `results` as artifact CSV, header included.
pub fn render_csv(results: &[VerificationResult]) -> Result<Vec<u8>, std::io::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(artifact_header())?;

    for result in results {
        let mut row: Vec<String> = vec![
            result.address.clone(),
            result.state.to_string(),
            result.result.to_string(),
            result.score.to_string(),
            result.did_you_mean.clone().unwrap_or_default(),
        ];
        row.extend(result.flags.values().iter().map(|flag| flag.to_string()));
        row.push(result.mx_host.clone().unwrap_or_default());
        row.push(result.verified_at.to_rfc3339());
        writer.write_record(&row)?;
    }

    writer.into_inner().map_err(|err| err.into_error())
}

/// Write `results` as CSV at `path`, atomically.
///
/// # Errors
///
/// [`JobError::Artifact`] when the directory cannot be created or the file
/// cannot be written or renamed.
pub async fn write_artifact(path: &Path, results: &[VerificationResult]) -> Result<(), JobError> {
    let body = render_csv(results).map_err(|err| JobError::artifact(path, err))?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| JobError::artifact(path, err))?;
    }
    let tmp = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp, body)
        .await
        .map_err(|err| JobError::artifact(path, err))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|err| JobError::artifact(path, err))
}
