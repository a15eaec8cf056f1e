//! Read-only classification lists consumed by the check pipeline.
//!
//! [`ReferenceData::builtin`] ships compact lists; [`ReferenceData::load_dir`]
//! reads one text file per list (one entry per line, `#` comments) and falls
//! back to the built-in list for any file that is absent. An external updater
//! refreshes the data through [`ReferenceHandle::replace`]; verifications
//! already running keep the snapshot they started with.

mod builtin;
mod typo;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

pub use typo::edit_distance;

pub const DISPOSABLE_FILE: &str = "disposable_domains.txt";
pub const FREE_FILE: &str = "free_providers.txt";
pub const ROLE_FILE: &str = "role_accounts.txt";
pub const NO_REPLY_FILE: &str = "no_reply.txt";
pub const GOVERNMENT_FILE: &str = "government_tlds.txt";
/// `typo=correct` per line.
pub const TYPO_FILE: &str = "typo_domains.txt";
pub const PROVIDERS_FILE: &str = "known_providers.txt";
pub const ISP_ESP_FILE: &str = "isp_esp_mx.txt";

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to read reference list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: expected `typo=domain`")]
    TypoLine { path: PathBuf, line: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceData {
    pub disposable: HashSet<String>,
    pub free: HashSet<String>,
    pub role: HashSet<String>,
    pub no_reply: HashSet<String>,
    pub government_suffixes: HashSet<String>,
    pub typos: HashMap<String, String>,
    pub providers: Vec<String>,
    pub isp_esp_mx_suffixes: HashSet<String>,
}

impl ReferenceData {
    pub fn builtin() -> Self {
        Self {
            disposable: owned(builtin::DISPOSABLE_DOMAINS.iter()),
            free: owned(builtin::FREE_PROVIDERS.iter()),
            role: owned(builtin::ROLE_ACCOUNTS.iter()),
            no_reply: owned(builtin::NO_REPLY.iter()),
            government_suffixes: owned(builtin::GOVERNMENT_SUFFIXES.iter()),
            typos: builtin::TYPO_DOMAINS
                .entries()
                .map(|(typo, fix)| ((*typo).to_string(), (*fix).to_string()))
                .collect(),
            providers: builtin::KNOWN_PROVIDERS
                .iter()
                .map(|provider| (*provider).to_string())
                .collect(),
            isp_esp_mx_suffixes: owned(builtin::ISP_ESP_MX_SUFFIXES.iter()),
        }
    }

    /// Load lists from `dir`, keeping the built-in list wherever a file is
    /// missing.
    pub async fn load_dir(dir: &Path) -> Result<Self, ReferenceError> {
        let mut data = Self::builtin();

        if let Some(lines) = read_list(&dir.join(DISPOSABLE_FILE)).await? {
            data.disposable = lines.into_iter().collect();
        }
        if let Some(lines) = read_list(&dir.join(FREE_FILE)).await? {
            data.free = lines.into_iter().collect();
        }
        if let Some(lines) = read_list(&dir.join(ROLE_FILE)).await? {
            data.role = lines.into_iter().collect();
        }
        if let Some(lines) = read_list(&dir.join(NO_REPLY_FILE)).await? {
            data.no_reply = lines.into_iter().collect();
        }
        if let Some(lines) = read_list(&dir.join(GOVERNMENT_FILE)).await? {
            data.government_suffixes = lines
                .into_iter()
                .map(|suffix| suffix.trim_start_matches('.').to_string())
                .collect();
        }
        if let Some(lines) = read_list(&dir.join(PROVIDERS_FILE)).await? {
            data.providers = lines;
        }
        if let Some(lines) = read_list(&dir.join(ISP_ESP_FILE)).await? {
            data.isp_esp_mx_suffixes = lines.into_iter().collect();
        }

        let typo_path = dir.join(TYPO_FILE);
        if let Some(lines) = read_list(&typo_path).await? {
            let mut typos = HashMap::with_capacity(lines.len());
            for (idx, line) in lines.iter().enumerate() {
                let Some((typo, fix)) = line.split_once('=') else {
                    return Err(ReferenceError::TypoLine {
                        path: typo_path,
                        line: idx + 1,
                    });
                };
                typos.insert(typo.trim().to_string(), fix.trim().to_string());
            }
            data.typos = typos;
        }

        debug!(
            dir = %dir.display(),
            disposable = data.disposable.len(),
            free = data.free.len(),
            role = data.role.len(),
            "reference lists loaded"
        );
        Ok(data)
    }

    /// Domain or one of its parents is a throwaway provider.
    pub fn is_disposable(&self, domain: &str) -> bool {
        parents(domain).any(|candidate| self.disposable.contains(candidate))
    }

    pub fn is_free(&self, domain: &str) -> bool {
        self.free.contains(domain)
    }

    /// `local` is compared without its `+tag`.
    pub fn is_role(&self, local: &str) -> bool {
        self.role.contains(&base_local(local))
    }

    pub fn is_no_reply(&self, local: &str) -> bool {
        let base = base_local(local);
        self.no_reply.contains(&base)
            || base.starts_with("noreply")
            || base.starts_with("no-reply")
            || base.starts_with("donotreply")
    }

    pub fn is_government(&self, domain: &str) -> bool {
        parents(domain).any(|candidate| self.government_suffixes.contains(candidate))
    }

    pub fn is_isp_esp_host(&self, mx_host: &str) -> bool {
        parents(mx_host).any(|candidate| self.isp_esp_mx_suffixes.contains(candidate))
    }

    /// Corrected domain for a likely misspelling, if any.
    pub fn suggest_domain(&self, domain: &str) -> Option<String> {
        if let Some(fix) = self.typos.get(domain) {
            return Some(fix.clone());
        }
        if self.free.contains(domain) || self.providers.iter().any(|p| p == domain) {
            return None;
        }
        typo::closest_provider(domain, &self.providers).map(str::to_string)
    }
}

/// Shared, swappable reference data.
#[derive(Debug, Clone)]
pub struct ReferenceHandle {
    inner: Arc<RwLock<Arc<ReferenceData>>>,
}

impl Default for ReferenceHandle {
    fn default() -> Self {
        Self::new(ReferenceData::builtin())
    }
}

impl ReferenceHandle {
    pub fn new(data: ReferenceData) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(data))),
        }
    }

    pub fn snapshot(&self) -> Arc<ReferenceData> {
        self.inner.read().clone()
    }

    /// Swap in fresh lists.
    pub fn replace(&self, data: ReferenceData) {
        *self.inner.write() = Arc::new(data);
    }
}

fn owned<'a>(items: impl Iterator<Item = &'a &'static str>) -> HashSet<String> {
    items.map(|item| (*item).to_string()).collect()
}

fn base_local(local: &str) -> String {
    local
        .split_once('+')
        .map_or(local, |(base, _)| base)
        .to_ascii_lowercase()
}

/// `a.b.example.com`, `b.example.com`, `example.com`, `com`.
fn parents(domain: &str) -> impl Iterator<Item = &str> {
    let domain = domain.trim_end_matches('.');
    std::iter::successors(Some(domain), |current| {
        current.split_once('.').map(|(_, rest)| rest)
    })
    .filter(|candidate| !candidate.is_empty())
}

async fn read_list(path: &Path) -> Result<Option<Vec<String>>, ReferenceError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ReferenceError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    Ok(Some(
        text.lines()
            .map(|line| line.split('#').next().unwrap_or_default().trim())
            .filter(|line| !line.is_empty())
            .map(str::to_ascii_lowercase)
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_classifies_common_cases() {
        let data = ReferenceData::builtin();
        assert!(data.is_disposable("mailinator.com"));
        assert!(data.is_disposable("inbox.mailinator.com"));
        assert!(!data.is_disposable("example.com"));
        assert!(data.is_free("gmail.com"));
        assert!(data.is_role("Support+tickets"));
        assert!(!data.is_role("alice"));
        assert!(data.is_no_reply("no-reply"));
        assert!(data.is_no_reply("noreply-billing"));
        assert!(data.is_government("data.gouv.fr"));
        assert!(data.is_government("nasa.gov"));
        assert!(!data.is_government("gov-example.com"));
        assert!(data.is_isp_esp_host("alt1.aspmx.l.google.com"));
        assert!(!data.is_isp_esp_host("mx.example.com"));
    }

    #[test]
    fn typo_map_wins_over_distance() {
        let data = ReferenceData::builtin();
        assert_eq!(data.suggest_domain("gmial.com").as_deref(), Some("gmail.com"));
        assert_eq!(data.suggest_domain("laposte.fr").as_deref(), Some("laposte.net"));
    }

    #[test]
    fn distance_suggestions_skip_known_domains() {
        let data = ReferenceData::builtin();
        assert_eq!(data.suggest_domain("hotmaill.com").as_deref(), Some("hotmail.com"));
        assert_eq!(data.suggest_domain("gmail.com"), None);
        assert_eq!(data.suggest_domain("mail.com"), None);
        assert_eq!(data.suggest_domain("example.org"), None);
    }

    #[test]
    fn handle_replace_is_visible_to_new_snapshots() {
        let handle = ReferenceHandle::default();
        let before = handle.snapshot();
        let mut data = ReferenceData::builtin();
        data.disposable.insert("fresh-throwaway.io".into());
        handle.replace(data);

        assert!(!before.is_disposable("fresh-throwaway.io"));
        assert!(handle.snapshot().is_disposable("fresh-throwaway.io"));
    }

    #[tokio::test]
    async fn load_dir_overrides_present_files_only() {
        let dir = std::env::temp_dir().join(format!("mailverify-ref-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(
            dir.join(DISPOSABLE_FILE),
            "# custom list\nthrowaway.test\n\nBURNER.test  # inline\n",
        )
        .await
        .unwrap();
        tokio::fs::write(dir.join(TYPO_FILE), "gmal.test=gmail.com\n")
            .await
            .unwrap();

        let data = ReferenceData::load_dir(&dir).await.unwrap();
        assert!(data.is_disposable("throwaway.test"));
        assert!(data.is_disposable("burner.test"));
        assert!(!data.is_disposable("mailinator.com"));
        assert!(data.is_free("gmail.com"), "builtin kept for missing file");
        assert_eq!(data.suggest_domain("gmal.test").as_deref(), Some("gmail.com"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_typo_line_is_reported() {
        let dir = std::env::temp_dir().join(format!("mailverify-ref-bad-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(TYPO_FILE), "gmal.test\n").await.unwrap();

        let err = ReferenceData::load_dir(&dir).await.unwrap_err();
        assert!(matches!(err, ReferenceError::TypoLine { line: 1, .. }), "{err}");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
