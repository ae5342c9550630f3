//! 推荐工具：generate_recommendations
//!
//! 从目录取最多 50 款手机，按客户偏好打分：基础分 0.5，预算档位一致 +0.3，
//! 主要用途在目标人群中 +0.2，品牌在忠诚列表中 +0.1，上限 1.0。取前 5 名（同分保持目录顺序）。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::memory::Preferences;
use crate::tools::catalog::{Phone, PhoneCatalog, PhoneQuery, MAX_SEARCH_LIMIT};
use crate::tools::schema::parameters_schema;
use crate::tools::{Tool, ToolCategory, ToolOutput};

const TOP_N: usize = 5;

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RecommendationParams {
    /// Customer profile data
    pub customer_profile: Option<Value>,
    /// Budget constraint
    pub budget: Option<f64>,
    /// Current phone for upgrade path
    pub current_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub phone: Phone,
    pub score: f64,
    pub reasons: Vec<String>,
}

pub fn score_phone(phone: &Phone, prefs: &Preferences) -> f64 {
    let mut score = 0.5;
    if prefs.budget_range == Some(phone.price_range) {
        score += 0.3;
    }
    if let Some(primary_use) = &prefs.primary_use {
        if phone.target_audience.contains(primary_use) {
            score += 0.2;
        }
    }
    if prefs.brand_loyalty.contains(&phone.brand) {
        score += 0.1;
    }
    f64::min(1.0, score)
}

pub fn recommendation_reasons(phone: &Phone, prefs: &Preferences) -> Vec<String> {
    let mut reasons = Vec::new();
    if prefs.budget_range == Some(phone.price_range) {
        reasons.push(format!(
            "Perfect fit for your {} budget",
            phone.price_range.as_str()
        ));
    }
    match prefs.primary_use.as_deref() {
        Some("photography") if phone.key_features.iter().any(|f| f == "Pro Camera") => {
            reasons.push("Excellent camera system for photography".to_string());
        }
        Some("gaming") if phone.target_audience.iter().any(|a| a == "gamers") => {
            reasons.push("Optimized for gaming performance".to_string());
        }
        _ => {}
    }
    reasons
}

/// 打分并取前 5 名
pub fn rank_phones(phones: Vec<Phone>, prefs: &Preferences) -> Vec<Recommendation> {
    let mut ranked: Vec<Recommendation> = phones
        .into_iter()
        .map(|phone| Recommendation {
            score: score_phone(&phone, prefs),
            reasons: recommendation_reasons(&phone, prefs),
            phone,
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(TOP_N);
    ranked
}

/// 从 customer_profile.preferences 中解析偏好，缺失或格式不符时用默认值
fn preferences_from(profile: Option<&Value>) -> Preferences {
    profile
        .and_then(|p| p.get("preferences"))
        .and_then(|p| serde_json::from_value(p.clone()).ok())
        .unwrap_or_default()
}

pub struct RecommendationTool {
    catalog: Arc<dyn PhoneCatalog>,
}

impl RecommendationTool {
    pub fn new(catalog: Arc<dyn PhoneCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for RecommendationTool {
    fn name(&self) -> &str {
        "generate_recommendations"
    }

    fn description(&self) -> &str {
        "Generate personalized phone recommendations based on customer profile"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Calculation
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<RecommendationParams>()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, String> {
        let params: RecommendationParams =
            serde_json::from_value(args).map_err(|e| format!("Invalid parameters: {e}"))?;
        let prefs = preferences_from(params.customer_profile.as_ref());

        let query = PhoneQuery {
            limit: Some(MAX_SEARCH_LIMIT),
            ..Default::default()
        };
        let page = self
            .catalog
            .search(&query)
            .await
            .map_err(|e| format!("Failed to fetch phones for recommendations: {e}"))?;
        debug!(candidates = page.phones.len(), "Scoring recommendation candidates");

        let recommendations = rank_phones(page.phones, &prefs);
        Ok(ToolOutput::new(json!({
            "recommendations": recommendations,
            "algorithm": "profile_based_scoring",
            "confidence": 0.85,
        })))
    }
}
