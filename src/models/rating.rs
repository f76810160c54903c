use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAverage {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Evaluation {
    pub id: i64,
    #[serde(rename = "note", default)]
    pub stars: Option<u8>,
    #[serde(rename = "commentaire", default)]
    pub comment: Option<String>,
    #[serde(rename = "clientNom", default)]
    pub client_name: Option<String>,
    #[serde(rename = "dateEvaluation", default)]
    pub evaluated_at: Option<String>,
}

/// Rating profile as the backend returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct RatingProfile {
    #[serde(rename = "moyenne", default)]
    pub average: Option<RawAverage>,
    #[serde(rename = "nombreEvaluations", default)]
    pub total: Option<u32>,
    #[serde(rename = "evaluations", default)]
    pub evaluations: Vec<Evaluation>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RatingComment {
    pub id: i64,
    pub author: String,
    pub stars: u8,
    pub comment: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub total: u32,
    /// Count of evaluations per star value, 1 through 5.
    pub distribution: BTreeMap<u8, u32>,
    pub comments: Vec<RatingComment>,
}

impl From<RatingProfile> for RatingSummary {
    fn from(profile: RatingProfile) -> Self {
        let average = match profile.average {
            Some(RawAverage::Number(value)) => value,
            Some(RawAverage::Text(raw)) => raw.trim().replace(',', ".").parse().unwrap_or(0.0),
            None => 0.0,
        };
        let average = if average.is_finite() { average } else { 0.0 };

        let mut distribution: BTreeMap<u8, u32> = (1..=5).map(|stars| (stars, 0)).collect();
        for evaluation in &profile.evaluations {
            if let Some(count) = evaluation.stars.and_then(|s| distribution.get_mut(&s)) {
                *count += 1;
            }
        }

        let comments = profile
            .evaluations
            .into_iter()
            .map(|evaluation| RatingComment {
                id: evaluation.id,
                author: evaluation
                    .client_name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| "Utilisateur anonyme".to_string()),
                stars: evaluation.stars.unwrap_or(0),
                comment: evaluation.comment.unwrap_or_default(),
                date: evaluation.evaluated_at.unwrap_or_default(),
            })
            .collect();

        Self {
            average,
            total: profile.total.unwrap_or(0),
            distribution,
            comments,
        }
    }
}
