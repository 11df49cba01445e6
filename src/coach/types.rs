use serde::{Deserialize, Serialize};

/// What is being sold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductContext {
    pub name: String,
    pub description: String,
    pub key_features: Vec<String>,
    pub target_audience: String,
    /// Page the context was extracted from, if any
    pub source_url: Option<String>,
}

/// Simulated customer the agent role-plays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    pub name: String,
    pub role: String,
    pub company: String,
    pub personality: String,
    pub pain_points: Vec<String>,
    pub objections: Vec<String>,
    /// Spoken language, e.g. "Norwegian"
    pub language: String,
}

/// Post-call score card
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationMetrics {
    /// Overall score, 0-100
    pub overall_score: u8,
    pub rapport: u8,
    pub needs_discovery: u8,
    pub objection_handling: u8,
    pub closing: u8,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub summary: String,
}
