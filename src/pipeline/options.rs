use serde::{Deserialize, Serialize};

use super::VerificationState;
use crate::validator::ValidationMode;

/// Verdict for disposable domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisposablePolicy {
    #[default]
    Risky,
    Undeliverable,
}

impl DisposablePolicy {
    pub fn state(self) -> VerificationState {
        match self {
            Self::Risky => VerificationState::Risky,
            Self::Undeliverable => VerificationState::Undeliverable,
        }
    }
}

/// `[pipeline]` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineOptions {
    #[serde(default)]
    pub validation_mode: ValidationMode,
    #[serde(default)]
    pub disposable_policy: DisposablePolicy,
}
