//! Match Evaluation
//!
//! The "is this a good match" judgement behind one trait. The gateway-backed
//! evaluator asks a generative model through prompts; the rule-based
//! evaluator answers deterministically and is used when no model is
//! configured and in tests.

pub mod prompts;
mod rules;

pub use rules::{RuleBasedEvaluator, RuleBasedEvaluatorConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::{request_json, GatewayError, GenerateRequest, TextGenerator};
use crate::model::{CargoOffer, Vehicle};

/// Verdict for LTL consolidation and FTL backhaul candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationVerdict {
    pub is_good_candidate: bool,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub suggestion_description: String,
    #[serde(default)]
    pub potential_benefit: String,
}

/// Verdict for a forward-haul (outbound leg) candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardHaulVerdict {
    pub is_compatible_for_forward_haul: bool,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_feasibility_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_alignment_notes: Option<String>,
}

/// Why a candidate could not be judged
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("evaluator reply did not match the verdict shape")]
    Unusable,
}

/// Judges match candidates
#[async_trait]
pub trait MatchEvaluator: Send + Sync {
    /// Two open offers on the same lane
    async fn evaluate_ltl_pair(
        &self,
        a: &CargoOffer,
        b: &CargoOffer,
    ) -> Result<ConsolidationVerdict, EvaluationError>;

    /// An available truck standing at the offer's origin
    async fn evaluate_backhaul(
        &self,
        vehicle: &Vehicle,
        offer: &CargoOffer,
    ) -> Result<ConsolidationVerdict, EvaluationError>;

    /// A pending offer as the outbound leg towards `intended_destination`
    async fn evaluate_forward_haul(
        &self,
        vehicle: &Vehicle,
        offer: &CargoOffer,
        intended_destination: &str,
    ) -> Result<ForwardHaulVerdict, EvaluationError>;

    fn name(&self) -> &'static str;
}

/// Evaluator that delegates every judgement to a text generator
pub struct GatewayEvaluator<G: TextGenerator> {
    generator: G,
}

impl<G: TextGenerator> GatewayEvaluator<G> {
    pub fn new(generator: G) -> Self {
        GatewayEvaluator { generator }
    }

    async fn ask<T>(&self, prompt: String) -> Result<T, EvaluationError>
    where
        T: serde::de::DeserializeOwned,
    {
        request_json(&self.generator, GenerateRequest::json(prompt))
            .await?
            .ok_or(EvaluationError::Unusable)
    }
}

#[async_trait]
impl<G: TextGenerator> MatchEvaluator for GatewayEvaluator<G> {
    async fn evaluate_ltl_pair(
        &self,
        a: &CargoOffer,
        b: &CargoOffer,
    ) -> Result<ConsolidationVerdict, EvaluationError> {
        self.ask(prompts::ltl_consolidation(a, b)).await
    }

    async fn evaluate_backhaul(
        &self,
        vehicle: &Vehicle,
        offer: &CargoOffer,
    ) -> Result<ConsolidationVerdict, EvaluationError> {
        self.ask(prompts::ftl_backhaul(vehicle, offer)).await
    }

    async fn evaluate_forward_haul(
        &self,
        vehicle: &Vehicle,
        offer: &CargoOffer,
        intended_destination: &str,
    ) -> Result<ForwardHaulVerdict, EvaluationError> {
        self.ask(prompts::forward_haul(vehicle, offer, intended_destination))
            .await
    }

    fn name(&self) -> &'static str {
        "gateway"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::tests::{offer, vehicle};
    use crate::gateway::testing::ScriptedGenerator;
    use crate::gateway::ResponseFormat;
    use crate::model::VehicleType;

    #[tokio::test]
    async fn test_gateway_evaluator_decodes_fenced_verdict() {
        let generator = ScriptedGenerator::new(vec![Ok(concat!(
            "```json\n",
            r#"{"is_good_candidate": true, "reasoning": "same lane", "#,
            r#""suggestion_description": "Consolidate", "potential_benefit": "15%"}"#,
            "\n```"
        )
        .to_string())]);
        let evaluator = GatewayEvaluator::new(generator);

        let a = offer("CGO001", "Santiago", "Valparaíso", "Electrónicos", 500.0, 2.0);
        let b = offer("CGO004", "Santiago", "Valparaíso", "Textiles", 300.0, 1.5);
        let verdict = evaluator.evaluate_ltl_pair(&a, &b).await.unwrap();

        assert!(verdict.is_good_candidate);
        assert_eq!(verdict.potential_benefit, "15%");

        let prompts = evaluator.generator.prompts.lock().unwrap();
        assert_eq!(prompts[0].response_format, ResponseFormat::Json);
    }

    #[tokio::test]
    async fn test_gateway_evaluator_reports_unusable_reply() {
        let generator =
            ScriptedGenerator::new(vec![Ok(r#"{"reasoning": "no flag"}"#.to_string())]);
        let evaluator = GatewayEvaluator::new(generator);

        let v = vehicle("VEH005", VehicleType::FtlTruck, 28000.0, 35.0, "Santiago");
        let o = offer("CGO009", "Santiago", "Antofagasta", "Repuestos Minería", 3000.0, 10.0);
        let result = evaluator.evaluate_forward_haul(&v, &o, "Arica").await;

        assert!(matches!(result, Err(EvaluationError::Unusable)));
    }
}
