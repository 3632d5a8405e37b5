//! Advisory Analyses
//!
//! Single-shot questions to the text-generation service: route
//! optimization, free-text risk scenarios, alert impact and the platform
//! sustainability readings (carbon footprint, eco-routes, backhauls). Unlike
//! planner scans these surface failures to the caller.

use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{OperationError, OperationResult};
use crate::gateway::{request_json, GenerateRequest, TextGenerator};
use crate::model::Alert;

const ROUTE_SHAPE: &str = concat!(
    r#"{"route_name": "string", "summary_description": "string", "#,
    r#""estimated_distance_km": "string", "estimated_duration_hours": "string", "#,
    r#""estimated_fuel_liters": "string", "estimated_savings_fuel_percent": number, "#,
    r#""estimated_time_reduction_hours": number, "key_considerations": ["string"], "#,
    r#""potential_risks_on_route": ["string"], "alternative_route_brief_summary": "string"}"#
);
const RISK_SHAPE: &str = concat!(
    r#"{"risk_level": "Low" | "Medium" | "High", "potential_risks": ["string"], "#,
    r#""mitigation_suggestions": ["string"]}"#
);
const ALERT_SHAPE: &str = r#"{"impact": "string", "suggested_actions": ["string", "string"]}"#;
const CARBON_SHAPE: &str = concat!(
    r#"{"trends_observed": "string", "optimization_impact_summary": "string", "#,
    r#""reduction_strategies": ["string", "string"]}"#
);
const ECO_ROUTE_SHAPE: &str =
    r#"{"sustainability_impact_summary": "string", "operational_efficiency_summary": "string"}"#;
const BACKHAUL_SHAPE: &str = concat!(
    r#"{"co2e_saved_summary": "string", "empty_km_reduced_summary": "string", "#,
    r#""overall_sustainability_contribution": "string"}"#
);

/// Empty return leg, in km, that one backhaul avoids on average
pub const EMPTY_LEG_KM_PER_BACKHAUL: f64 = 280.0;
/// Emissions of a standard truck, in kg CO2e per km
pub const CO2E_PER_KM_KG: f64 = 0.65;

/// Models answer distance and duration as either text or numbers
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<TextOrNumber>::deserialize(deserializer)?.map(|v| match v {
        TextOrNumber::Text(s) => s,
        TextOrNumber::Number(n) => n.to_string(),
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSuggestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_name: Option<String>,
    pub summary_description: String,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub estimated_distance_km: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub estimated_duration_hours: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub estimated_fuel_liters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_savings_fuel_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_reduction_hours: Option<f64>,
    pub key_considerations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_risks_on_route: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_route_brief_summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAnalysis {
    pub risk_level: RiskLevel,
    pub potential_risks: Vec<String>,
    pub mitigation_suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertAnalysis {
    pub impact: String,
    pub suggested_actions: Vec<String>,
}

/// One month of platform emissions against the unoptimized baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyEmissions {
    pub month: String,
    pub actual_co2e_kg: f64,
    pub baseline_co2e_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonFootprintAnalysis {
    pub trends_observed: String,
    pub optimization_impact_summary: String,
    pub reduction_strategies: Vec<String>,
}

/// Route optimization coverage over a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EcoRouteFigures {
    pub total_trips: u32,
    pub eco_optimized_trips: u32,
    pub fuel_saved_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcoRouteAnalysis {
    pub sustainability_impact_summary: String,
    pub operational_efficiency_summary: String,
}

/// Empty running avoided by actioned backhauls
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackhaulFigures {
    pub backhauls: usize,
    pub empty_km_avoided: f64,
    pub co2e_saved_kg: f64,
}

impl BackhaulFigures {
    pub fn from_count(backhauls: usize) -> Self {
        let empty_km_avoided = backhauls as f64 * EMPTY_LEG_KM_PER_BACKHAUL;
        BackhaulFigures {
            backhauls,
            empty_km_avoided,
            co2e_saved_kg: empty_km_avoided * CO2E_PER_KM_KG,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackhaulImpactAnalysis {
    pub co2e_saved_summary: String,
    pub empty_km_reduced_summary: String,
    pub overall_sustainability_contribution: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackhaulImpactReport {
    pub figures: BackhaulFigures,
    pub analysis: BackhaulImpactAnalysis,
}

/// Issues advisory prompts through a text generator
pub struct Advisor {
    generator: Arc<dyn TextGenerator>,
}

impl Advisor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Advisor { generator }
    }

    async fn ask<T: serde::de::DeserializeOwned>(
        &self,
        kind: &str,
        request: GenerateRequest,
    ) -> OperationResult<T> {
        match request_json(&self.generator, request).await {
            Ok(Some(answer)) => {
                info!(kind, "Advisory analysis complete");
                Ok(answer)
            }
            Ok(None) => Err(OperationError::UnusableAnswer),
            Err(e) => {
                warn!(kind, error = %e, "Advisory analysis failed");
                Err(e.into())
            }
        }
    }

    /// Suggest a road route between two places, in low-latency mode
    pub async fn optimize_route(
        &self,
        origin: &str,
        destination: &str,
    ) -> OperationResult<RouteSuggestion> {
        let (origin, destination) = (origin.trim(), destination.trim());
        if origin.is_empty() || destination.is_empty() {
            return Err(OperationError::Validation(
                "Enter both an origin and a destination.".to_string(),
            ));
        }

        let prompt = format!(
            "You are an expert in road freight logistics in Chile. \
             Optimize a route for a cargo truck from {} to {}. \
             Consider distance, estimated travel time, tolls, typical road conditions and \
             security. Also include a route summary, key considerations, potential risks and \
             a brief alternative if relevant. JSON format: {}",
            origin, destination, ROUTE_SHAPE
        );
        self.ask("route", GenerateRequest::json(prompt).fast()).await
    }

    /// Assess a free-text transport risk scenario
    pub async fn analyze_risk(&self, scenario: &str) -> OperationResult<RiskAnalysis> {
        let scenario = scenario.trim();
        if scenario.is_empty() {
            return Err(OperationError::Validation("Describe a risk scenario.".to_string()));
        }

        let prompt = format!(
            "Analyze the following cargo transport risk scenario and provide an assessment. \
             Scenario: \"{}\". JSON format: {}",
            scenario, RISK_SHAPE
        );
        self.ask(
            "risk",
            GenerateRequest::json(prompt)
                .with_system_instruction("You are a logistics risk assessment assistant."),
        )
        .await
    }

    /// Summarize an alert's likely impact and a few actions
    pub async fn analyze_alert(&self, alert: &Alert) -> OperationResult<AlertAnalysis> {
        let prompt = format!(
            "Analyze the following logistics alert: ID={}, Message='{}', Severity={}, \
             Related shipment={}, Timestamp={}. Give a short summary of the potential impact \
             and 2-3 concise, practical suggested actions. \
             Respond strictly in JSON with the following structure: {}",
            alert.id,
            alert.message,
            alert.severity,
            alert.related_shipment_id.as_deref().unwrap_or("N/A"),
            alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
            ALERT_SHAPE
        );
        self.ask("alert", GenerateRequest::json(prompt)).await
    }

    /// Read platform emission trends against the unoptimized baseline
    pub async fn analyze_carbon_footprint(
        &self,
        months: &[MonthlyEmissions],
        total_trips: u32,
    ) -> OperationResult<CarbonFootprintAnalysis> {
        if months.is_empty() {
            return Err(OperationError::Validation(
                "Provide at least one month of emissions data.".to_string(),
            ));
        }
        if let Some(bad) = months
            .iter()
            .find(|m| m.actual_co2e_kg < 0.0 || m.baseline_co2e_kg < 0.0)
        {
            return Err(OperationError::Validation(format!(
                "Emissions for {} must not be negative.",
                bad.month
            )));
        }

        let summary = months
            .iter()
            .map(|m| {
                format!(
                    "{}: {}kg (baseline: {}kg)",
                    m.month, m.actual_co2e_kg, m.baseline_co2e_kg
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        let saved: f64 = months
            .iter()
            .map(|m| m.baseline_co2e_kg - m.actual_co2e_kg)
            .sum();

        let prompt = format!(
            "Analyze the platform's monthly CO2e emissions in kg (actual vs. unoptimized \
             baseline): {}. Total trips in the period: {}. Total impact of optimizations: \
             {:.0} kg CO2e saved. Identify key trends in the emissions, comment on the impact \
             of the optimizations, and suggest 2 concise, actionable strategies to reduce the \
             platform's carbon footprint further. \
             Respond strictly in JSON with the following structure: {}",
            summary, total_trips, saved, CARBON_SHAPE
        );
        self.ask("carbon_footprint", GenerateRequest::json(prompt)).await
    }

    /// Describe what route optimization coverage means for sustainability
    /// and operating efficiency
    pub async fn analyze_eco_routes(
        &self,
        figures: &EcoRouteFigures,
    ) -> OperationResult<EcoRouteAnalysis> {
        if figures.total_trips == 0 || figures.eco_optimized_trips > figures.total_trips {
            return Err(OperationError::Validation(
                "Optimized trips must be a share of a non-zero trip total.".to_string(),
            ));
        }

        let share = (figures.eco_optimized_trips as f64 / figures.total_trips as f64 * 100.0)
            .round();
        let prompt = format!(
            "The platform has optimized {}% of the routes of {} total trips, saving on average \
             {}% fuel per optimized route. Briefly describe the positive impact of these \
             optimizations on environmental sustainability and on operational efficiency \
             (costs, times) at platform level. \
             Respond strictly in JSON with the following structure: {}",
            share, figures.total_trips, figures.fuel_saved_percent, ECO_ROUTE_SHAPE
        );
        self.ask("eco_routes", GenerateRequest::json(prompt)).await
    }

    /// Describe the empty running avoided by actioned backhauls
    pub async fn analyze_backhaul_impact(
        &self,
        figures: BackhaulFigures,
    ) -> OperationResult<BackhaulImpactReport> {
        if figures.backhauls == 0 {
            return Err(OperationError::Validation(
                "No backhauls have been actioned yet.".to_string(),
            ));
        }

        let prompt = format!(
            "The platform facilitated {} loaded return trips (backhauls), avoiding about {:.0} \
             empty km and saving an estimated {:.0} kg of CO2e. Describe the impact of this \
             reduction in empty running on overall sustainability and how it contributes to \
             greener logistics at platform level. \
             Respond strictly in JSON with the following structure: {}",
            figures.backhauls, figures.empty_km_avoided, figures.co2e_saved_kg, BACKHAUL_SHAPE
        );
        let analysis = self
            .ask("backhaul_impact", GenerateRequest::json(prompt))
            .await?;
        Ok(BackhaulImpactReport { figures, analysis })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedGenerator;
    use crate::gateway::GatewayError;
    use crate::model::AlertSeverity;
    use chrono::Utc;

    fn advisor(replies: Vec<Result<String, GatewayError>>) -> (Advisor, Arc<ScriptedGenerator>) {
        let generator = Arc::new(ScriptedGenerator::new(replies));
        (Advisor::new(generator.clone()), generator)
    }

    fn month(month: &str, actual: f64, baseline: f64) -> MonthlyEmissions {
        MonthlyEmissions {
            month: month.to_string(),
            actual_co2e_kg: actual,
            baseline_co2e_kg: baseline,
        }
    }

    #[tokio::test]
    async fn test_route_accepts_numeric_estimates_and_runs_fast() {
        let reply = concat!(
            "```json\n",
            r#"{"route_name": "Ruta 5 Norte", "summary_description": "Direct run north", "#,
            r#""estimated_distance_km": 2060, "estimated_duration_hours": "26", "#,
            r#""key_considerations": ["Fuel at Copiapó"]}"#,
            "\n```"
        );
        let (advisor, generator) = advisor(vec![Ok(reply.to_string())]);

        let route = advisor.optimize_route("Santiago", "Arica").await.unwrap();
        assert_eq!(route.estimated_distance_km.as_deref(), Some("2060"));
        assert_eq!(route.estimated_duration_hours.as_deref(), Some("26"));
        assert!(route.potential_risks_on_route.is_none());

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].fast_mode);
        assert!(prompts[0].prompt.contains("from Santiago to Arica"));
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_call() {
        let (advisor, generator) = advisor(vec![]);

        assert!(matches!(
            advisor.optimize_route("Santiago", " ").await,
            Err(OperationError::Validation(_))
        ));
        assert!(matches!(
            advisor.analyze_risk("").await,
            Err(OperationError::Validation(_))
        ));
        assert!(matches!(
            advisor.analyze_carbon_footprint(&[], 250).await,
            Err(OperationError::Validation(_))
        ));
        assert!(matches!(
            advisor
                .analyze_carbon_footprint(&[month("Ene", -1.0, 6000.0)], 250)
                .await,
            Err(OperationError::Validation(_))
        ));
        let overshoot = EcoRouteFigures {
            total_trips: 10,
            eco_optimized_trips: 11,
            fuel_saved_percent: 12.0,
        };
        assert!(matches!(
            advisor.analyze_eco_routes(&overshoot).await,
            Err(OperationError::Validation(_))
        ));
        assert!(matches!(
            advisor.analyze_backhaul_impact(BackhaulFigures::from_count(0)).await,
            Err(OperationError::Validation(_))
        ));
        assert_eq!(generator.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_risk_failures_surface_to_caller() {
        let (advisor, _) = advisor(vec![
            Ok(r#"{"risk_level": "Extreme", "potential_risks": [], "mitigation_suggestions": []}"#
                .to_string()),
            Err(GatewayError::Http("timeout".to_string())),
            Ok(r#"{"risk_level": "High", "potential_risks": ["Robo"], "mitigation_suggestions": ["Escolta"]}"#
                .to_string()),
        ]);
        let scenario = "Night run through Baquedano";

        let err = advisor.analyze_risk(scenario).await.unwrap_err();
        assert!(matches!(err, OperationError::UnusableAnswer));

        let err = advisor.analyze_risk(scenario).await.unwrap_err();
        assert_eq!(err.user_message(), crate::error::DEFAULT_ERROR_MESSAGE);

        let analysis = advisor.analyze_risk(scenario).await.unwrap();
        assert_eq!(analysis.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_alert_prompt_names_shipment() {
        let (advisor, generator) = advisor(vec![Ok(
            r#"{"impact": "Possible theft", "suggested_actions": ["Call driver", "Notify police"]}"#
                .to_string(),
        )]);
        let alert = Alert {
            id: "ALERT001".to_string(),
            timestamp: Utc::now(),
            message: "Unauthorized door opening".to_string(),
            severity: AlertSeverity::Critical,
            related_shipment_id: Some("SMRTCGO-003".to_string()),
            is_read: false,
        };

        let analysis = advisor.analyze_alert(&alert).await.unwrap();
        assert_eq!(analysis.suggested_actions.len(), 2);
        assert!(generator.prompts.lock().unwrap()[0]
            .prompt
            .contains("Related shipment=SMRTCGO-003"));
    }

    #[tokio::test]
    async fn test_carbon_footprint_reports_savings() {
        let reply = concat!(
            r#"{"trends_observed": "Steady decline", "#,
            r#""optimization_impact_summary": "About 9% below baseline", "#,
            r#""reduction_strategies": ["More backhauls", "Electric vans in Santiago"]}"#
        );
        let (advisor, generator) = advisor(vec![Ok(reply.to_string())]);
        let months = [month("Ene", 5500.0, 6000.0), month("Feb", 5200.0, 5800.0)];

        let analysis = advisor.analyze_carbon_footprint(&months, 250).await.unwrap();
        assert_eq!(analysis.reduction_strategies.len(), 2);

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].prompt.contains("Ene: 5500kg (baseline: 6000kg)"));
        assert!(prompts[0].prompt.contains("1100 kg CO2e saved"));
        assert!(prompts[0].prompt.contains("Total trips in the period: 250"));
    }

    #[tokio::test]
    async fn test_eco_routes_prompt_uses_share() {
        let reply = concat!(
            r#"{"sustainability_impact_summary": "Less diesel burnt", "#,
            r#""operational_efficiency_summary": "Lower fuel bills"}"#
        );
        let (advisor, generator) = advisor(vec![Ok(reply.to_string())]);
        let figures = EcoRouteFigures {
            total_trips: 250,
            eco_optimized_trips: 180,
            fuel_saved_percent: 12.0,
        };

        let analysis = advisor.analyze_eco_routes(&figures).await.unwrap();
        assert_eq!(analysis.operational_efficiency_summary, "Lower fuel bills");
        assert!(generator.prompts.lock().unwrap()[0]
            .prompt
            .contains("optimized 72% of the routes of 250 total trips"));
    }

    #[tokio::test]
    async fn test_backhaul_impact_derives_figures() {
        let reply = concat!(
            r#"{"co2e_saved_summary": "364 kg avoided", "#,
            r#""empty_km_reduced_summary": "560 km", "#,
            r#""overall_sustainability_contribution": "Fewer empty runs"}"#
        );
        let (advisor, generator) = advisor(vec![Ok(reply.to_string()), Ok("{}".to_string())]);

        let report = advisor
            .analyze_backhaul_impact(BackhaulFigures::from_count(2))
            .await
            .unwrap();
        assert_eq!(report.figures.empty_km_avoided, 560.0);
        assert!((report.figures.co2e_saved_kg - 364.0).abs() < 1e-9);
        assert_eq!(report.analysis.empty_km_reduced_summary, "560 km");
        assert!(generator.prompts.lock().unwrap()[0]
            .prompt
            .contains("facilitated 2 loaded return trips"));

        let err = advisor
            .analyze_backhaul_impact(BackhaulFigures::from_count(2))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::UnusableAnswer));
    }
}
