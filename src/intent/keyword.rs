//! 关键词意图识别
//!
//! 每个意图一组触发子串，置信度 = 命中子串数 / 子串总数。意图按声明顺序打分，
//! 只有严格更高的分数才会替换当前最优，因此同分时先声明的意图胜出。

use crate::intent::{
    ClassificationContext, EmotionalContext, Intent, IntentAnalysis, IntentClassifier, Urgency,
};

const INTENT_PATTERNS: &[(Intent, &[&str])] = &[
    (
        Intent::Greeting,
        &["hello", "hi", "hey", "good morning", "good afternoon"],
    ),
    (
        Intent::ProductInquiry,
        &["what is", "tell me about", "specs", "features", "price"],
    ),
    (
        Intent::Recommendation,
        &["recommend", "suggest", "best phone", "which phone", "help me choose"],
    ),
    (
        Intent::Comparison,
        &["compare", "difference", "versus", "vs", "better than"],
    ),
    (
        Intent::PurchaseIntent,
        &["buy", "purchase", "order", "where to buy", "price"],
    ),
    (
        Intent::TechnicalSupport,
        &["how to", "problem", "issue", "not working", "help"],
    ),
    (
        Intent::PriceInquiry,
        &["cost", "price", "expensive", "cheap", "budget"],
    ),
];

/// 按顺序检查，先命中者生效
const EMOTIONAL_INDICATORS: &[(EmotionalContext, &[&str])] = &[
    (
        EmotionalContext::Frustrated,
        &["confused", "frustrated", "complicated", "don't understand"],
    ),
    (
        EmotionalContext::Excited,
        &["awesome", "perfect", "amazing", "love it", "exactly"],
    ),
    (
        EmotionalContext::Urgent,
        &["quickly", "urgent", "asap", "immediately", "need now"],
    ),
];

const HIGH_URGENCY: &[&str] = &[
    "urgent",
    "quickly",
    "asap",
    "immediately",
    "need now",
    "buying today",
];
const MEDIUM_URGENCY: &[&str] = &["recommend", "compare", "buy"];

const SECONDARY_THRESHOLD: f64 = 0.2;
const LIKELY_BUYER_THRESHOLD: f64 = 0.7;
const LIKELY_BUYER_BOOST: f64 = 1.2;
const COMPARISON_CONTEXT_BOOST: f64 = 1.1;
/// 检查最近几条短期记忆
const RECENT_MEMORY_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordIntentClassifier;

impl KeywordIntentClassifier {
    pub fn new() -> Self {
        Self
    }
}

fn match_ratio(input: &str, patterns: &[&str]) -> f64 {
    let hits = patterns.iter().filter(|p| input.contains(*p)).count();
    hits as f64 / patterns.len() as f64
}

fn emotional_context(input: &str) -> EmotionalContext {
    EMOTIONAL_INDICATORS
        .iter()
        .find(|(_, indicators)| indicators.iter().any(|i| input.contains(i)))
        .map(|(emotion, _)| *emotion)
        .unwrap_or(EmotionalContext::Neutral)
}

fn urgency(input: &str) -> Urgency {
    if HIGH_URGENCY.iter().any(|k| input.contains(k)) {
        Urgency::High
    } else if MEDIUM_URGENCY.iter().any(|k| input.contains(k)) {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}

impl IntentClassifier for KeywordIntentClassifier {
    fn classify(&self, input: &str, ctx: &ClassificationContext) -> IntentAnalysis {
        let input = input.to_lowercase();

        let mut primary = Intent::GeneralInquiry;
        let mut confidence = 0.0;
        let mut secondary = Vec::new();

        for (intent, patterns) in INTENT_PATTERNS {
            let ratio = match_ratio(&input, patterns);
            if ratio > confidence {
                confidence = ratio;
                primary = *intent;
            }
            if ratio > SECONDARY_THRESHOLD {
                secondary.push(*intent);
            }
        }

        if let Some(profile) = &ctx.profile {
            if profile.insights.likelihood_to_purchase > LIKELY_BUYER_THRESHOLD
                && matches!(primary, Intent::ProductInquiry | Intent::Comparison)
            {
                confidence = f64::min(1.0, confidence * LIKELY_BUYER_BOOST);
            }
        }

        if let Some(memory) = &ctx.memory {
            if primary == Intent::ProductInquiry
                && memory.recent_has_tag("comparison", RECENT_MEMORY_WINDOW)
            {
                primary = Intent::Comparison;
                confidence = f64::min(1.0, confidence * COMPARISON_CONTEXT_BOOST);
            }
        }

        IntentAnalysis {
            primary,
            confidence,
            secondary,
            emotional_context: emotional_context(&input),
            urgency: urgency(&input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ConversationMemory, CustomerProfile};
    use serde_json::json;

    fn classify(input: &str) -> IntentAnalysis {
        KeywordIntentClassifier.classify(input, &ClassificationContext::default())
    }

    #[test]
    fn test_hello_is_low_confidence_greeting() {
        let analysis = classify("hello");
        assert_eq!(analysis.primary, Intent::Greeting);
        assert!((analysis.confidence - 0.2).abs() < 1e-9);
        assert_eq!(analysis.urgency, Urgency::Low);
        assert_eq!(analysis.emotional_context, EmotionalContext::Neutral);
    }

    #[test]
    fn test_no_match_is_general_inquiry() {
        let analysis = classify("zzz");
        assert_eq!(analysis.primary, Intent::GeneralInquiry);
        assert_eq!(analysis.confidence, 0.0);
        assert!(analysis.secondary.is_empty());
    }

    #[test]
    fn test_tie_goes_to_first_declared() {
        // "price" 同时出现在 product_inquiry / purchase_intent / price_inquiry
        let analysis = classify("price");
        assert_eq!(analysis.primary, Intent::ProductInquiry);
    }

    #[test]
    fn test_secondary_intents_above_threshold() {
        let analysis = classify("what is the price and cost, is it cheap?");
        assert_eq!(analysis.primary, Intent::PriceInquiry);
        // 主意图本身也在列表中，按声明顺序
        assert_eq!(
            analysis.secondary,
            vec![Intent::ProductInquiry, Intent::PriceInquiry]
        );
    }

    #[test]
    fn test_likely_buyer_boost() {
        let mut profile = CustomerProfile::new("c1");
        profile.insights.likelihood_to_purchase = 0.9;
        let ctx = ClassificationContext {
            profile: Some(profile),
            memory: None,
        };
        let analysis = KeywordIntentClassifier.classify("tell me about the specs", &ctx);
        assert_eq!(analysis.primary, Intent::ProductInquiry);
        assert!((analysis.confidence - 0.48).abs() < 1e-9);
    }

    #[test]
    fn test_recent_comparison_overrides_product_inquiry() {
        let mut memory = ConversationMemory::new("s1");
        memory.remember("comparison_result", json!({}), 5, 20);
        let ctx = ClassificationContext {
            profile: None,
            memory: Some(memory),
        };
        let analysis = KeywordIntentClassifier.classify("tell me about the specs", &ctx);
        assert_eq!(analysis.primary, Intent::Comparison);
        assert!((analysis.confidence - 0.44).abs() < 1e-9);
        // 次要意图反映关键词命中，不受记忆改写影响
        assert_eq!(analysis.secondary, vec![Intent::ProductInquiry]);
    }

    #[test]
    fn test_emotion_order_and_urgency() {
        let analysis = classify("I'm confused, this is awesome, need it asap");
        assert_eq!(analysis.emotional_context, EmotionalContext::Frustrated);
        assert_eq!(analysis.urgency, Urgency::High);

        let analysis = classify("can you recommend one");
        assert_eq!(analysis.urgency, Urgency::Medium);
    }

    #[test]
    fn test_urgent_without_other_emotion() {
        let analysis = classify("I need it asap");
        assert_eq!(analysis.emotional_context, EmotionalContext::Urgent);
        assert_eq!(analysis.urgency, Urgency::High);

        // 紧急词之前先命中兴奋词
        let analysis = classify("perfect, ship it immediately");
        assert_eq!(analysis.emotional_context, EmotionalContext::Excited);
    }
}
