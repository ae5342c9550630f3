//! 客户档案：偏好、购买与互动历史、派生洞察
//!
//! 洞察（persona / 购买可能性）在每次档案更新后由 [`CustomerProfile::refresh_insights`] 重算。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::catalog::PriceRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TechSavviness {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

/// 购物偏好
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Preferences {
    pub budget_range: Option<PriceRange>,
    /// photography / gaming / business / daily_use
    pub primary_use: Option<String>,
    pub brand_loyalty: Vec<String>,
    pub feature_priorities: Vec<String>,
    pub price_sensitivity: Level,
    pub tech_savviness: TechSavviness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    BudgetConscious,
    #[default]
    FeatureSeeker,
    BrandLoyalist,
    EarlyAdopter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStyle {
    Formal,
    #[default]
    Casual,
    Technical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecisionTimeline {
    Immediate,
    #[default]
    Researching,
    LongTerm,
}

/// 派生洞察
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Insights {
    pub persona: Persona,
    /// 0-1
    pub likelihood_to_purchase: f64,
    pub preferred_communication_style: CommunicationStyle,
    pub decision_timeline: DecisionTimeline,
}

impl Default for Insights {
    fn default() -> Self {
        Self {
            persona: Persona::FeatureSeeker,
            likelihood_to_purchase: 0.5,
            preferred_communication_style: CommunicationStyle::Casual,
            decision_timeline: DecisionTimeline::Researching,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub date: DateTime<Utc>,
    pub product: String,
    pub brand: String,
    pub price: f64,
    /// 1-10
    pub satisfaction: u8,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Chat,
    Comparison,
    Scan,
    Purchase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    pub context: Value,
    pub outcome: Option<String>,
}

/// 客户档案
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub purchase_history: Vec<PurchaseRecord>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    #[serde(default)]
    pub insights: Insights,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerProfile {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            preferences: Preferences::default(),
            purchase_history: Vec::new(),
            interactions: Vec::new(),
            insights: Insights::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 重算 persona 与购买可能性。
    ///
    /// persona 按价格敏感度高 -> 品牌忠诚 -> 技术达人 -> 功能追求者 的顺序判定；
    /// 购买可能性 = min(0.95, 0.3 + 0.1 × 24 小时内聊天次数 + 0.2 × 24 小时内对比次数)。
    pub fn refresh_insights(&mut self, now: DateTime<Utc>) {
        let prefs = &self.preferences;
        self.insights.persona = if prefs.price_sensitivity == Level::High {
            Persona::BudgetConscious
        } else if !prefs.brand_loyalty.is_empty() {
            Persona::BrandLoyalist
        } else if prefs.tech_savviness == TechSavviness::Advanced {
            Persona::EarlyAdopter
        } else {
            Persona::FeatureSeeker
        };

        let since = now - Duration::hours(24);
        let recent = self.interactions.iter().filter(|i| i.timestamp > since);
        let (chats, comparisons) = recent.fold((0u32, 0u32), |(c, m), i| match i.kind {
            InteractionKind::Chat => (c + 1, m),
            InteractionKind::Comparison => (c, m + 1),
            _ => (c, m),
        });
        self.insights.likelihood_to_purchase =
            (0.3 + f64::from(chats) * 0.1 + f64::from(comparisons) * 0.2).min(0.95);
    }
}
