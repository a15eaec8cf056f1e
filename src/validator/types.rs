use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    #[default]
    Strict,
    Relaxed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub reasons: Vec<String>,
}

/// Adresse découpée et normalisée, valide ou non.
///
/// `domain` est en minuscules (forme Unicode), `ascii_domain` la forme IDNA
/// utilisée pour le DNS. Les deux sont vides si la conversion échoue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEmail {
    pub original: String,
    pub local: String,
    pub domain: String,
    pub ascii_domain: String,
    pub mode: ValidationMode,
    pub valid: bool,
    pub reasons: Vec<String>,
}

impl NormalizedEmail {
    /// `local@ascii_domain`, the form handed to DNS and SMTP.
    pub fn ascii_address(&self) -> String {
        format!("{}@{}", self.local, self.ascii_domain)
    }

    /// Local part without any `+tag` sub-address, lowercased.
    pub fn base_local(&self) -> String {
        let base = self
            .local
            .split_once('+')
            .map(|(base, _)| base)
            .unwrap_or(&self.local);
        base.to_ascii_lowercase()
    }
}
