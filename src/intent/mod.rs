//! 意图识别
//!
//! `IntentClassifier` 把用户原文 + 客户档案 / 会话记忆映射为离散意图与置信度。
//! 默认实现是关键词匹配的 [`KeywordIntentClassifier`]，可替换为真实模型。

pub mod keyword;

use serde::{Deserialize, Serialize};

use crate::memory::{ConversationMemory, CustomerProfile};

pub use keyword::KeywordIntentClassifier;

/// 意图词表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    ProductInquiry,
    Recommendation,
    Comparison,
    PurchaseIntent,
    TechnicalSupport,
    PriceInquiry,
    GeneralInquiry,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::ProductInquiry => "product_inquiry",
            Self::Recommendation => "recommendation",
            Self::Comparison => "comparison",
            Self::PurchaseIntent => "purchase_intent",
            Self::TechnicalSupport => "technical_support",
            Self::PriceInquiry => "price_inquiry",
            Self::GeneralInquiry => "general_inquiry",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalContext {
    Frustrated,
    Excited,
    Urgent,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// 识别结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub primary: Intent,
    /// 0-1
    pub confidence: f64,
    /// 匹配比例 > 0.2 的其他意图（按声明顺序）
    pub secondary: Vec<Intent>,
    pub emotional_context: EmotionalContext,
    pub urgency: Urgency,
}

/// 识别时可用的上下文
#[derive(Debug, Clone, Default)]
pub struct ClassificationContext {
    pub profile: Option<CustomerProfile>,
    pub memory: Option<ConversationMemory>,
}

/// 意图识别接口；实现不得失败，最差返回 general_inquiry / 0
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, input: &str, ctx: &ClassificationContext) -> IntentAnalysis;
}
