//! Collaborators around a call: product context, personas and scoring
//!
//! The services themselves are remote; only their contracts live here.

mod prompt;
mod services;
mod types;

pub use prompt::build_system_prompt;
pub use services::{evaluate_call, EvaluationService, PersonaService, ProductExtractionService};
pub use types::{EvaluationMetrics, Persona, ProductContext};
