use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    Camera,
    Manual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScanOutcome {
    Pending,
    Matched,
    Rejected,
}

/// One barcode verification round.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScanAttempt {
    pub scanned_value: String,
    pub source: ScanSource,
    pub outcome: ScanOutcome,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanRequest<'a> {
    #[serde(rename = "idLivraison")]
    pub delivery_id: i64,
    #[serde(rename = "idLivreur")]
    pub driver_id: i64,
    #[serde(rename = "codeBarreScanne")]
    pub scanned_code: &'a str,
}

/// The backend answers either with a bare flag or with `{ "valide": bool }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScanVerdict {
    Flag(bool),
    Detailed {
        #[serde(default)]
        valide: Option<bool>,
    },
}

impl ScanVerdict {
    pub fn is_match(&self) -> bool {
        match self {
            ScanVerdict::Flag(ok) => *ok,
            ScanVerdict::Detailed { valide } => valide.unwrap_or(false),
        }
    }
}
