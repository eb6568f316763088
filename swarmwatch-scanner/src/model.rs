use serde::{Deserialize, Deserializer, Serialize};

/// Author used when the platform does not expose one reliably.
pub const UNKNOWN_AUTHOR: &str = "user_unknown";

/// One comment as sent to the scoring service.
///
/// `account_age_days` and `post_volume` are synthetic placeholders; pages don't
/// expose that metadata, but the service expects the fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub author: String,
    pub text: String,
    pub account_age_days: u32,
    pub post_volume: u32,
}

/// Request body for `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub comments: Vec<CommentRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    #[serde(other)]
    Unknown,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Unknown => "UNKNOWN",
        }
    }
}

/// Explicit `null` on the wire reads the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Sub-scores behind `bot_score`. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Breakdown {
    #[serde(deserialize_with = "null_as_default")]
    pub metadata_risk: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub linguistic_risk: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub swarm_risk: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub misinfo_risk: u32,
}

/// Score for a single comment, correlated by `comment_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub comment_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bot_score: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub breakdown: Breakdown,
    #[serde(default, deserialize_with = "null_as_default")]
    pub risk_level: RiskLevel,
    #[serde(default, deserialize_with = "null_as_default")]
    pub flags: Vec<String>,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
}
