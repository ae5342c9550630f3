//! 固定回复池与澄清问题

use rand::seq::SliceRandom;

use crate::intent::{EmotionalContext, Intent};

pub const CLARIFY_RESPONSE: &str = "I want to make sure I understand exactly what you're looking for! Could you help me with a bit more detail?";

const FRUSTRATED_RESPONSE: &str = "I totally understand how overwhelming phone shopping can be! 😊 Don't worry - I'm here to make it super simple and fun. Let's take it one step at a time!";
const EXCITED_RESPONSE: &str = "I love your enthusiasm! 🎉 There are so many amazing phones out there, and I can't wait to help you find the perfect match. Let's dive in!";

const GENERAL_RESPONSES: &[&str] = &[
    "Great question! I'm here to help with anything phone-related. Whether you want recommendations, comparisons, or just want to chat about the latest tech - I'm your guy! 📱✨",
    "I'd love to help you with that! As your personal phone expert, I can assist with recommendations, price comparisons, feature explanations, and more. What specifically interests you?",
    "That's exactly what I'm here for! I'm passionate about helping people navigate the world of mobile phones. Let me know what you'd like to explore! 🚀",
];

const GENERIC_QUESTIONS: &[&str] = &[
    "What type of phone are you most interested in?",
    "Are you looking for a specific brand or open to suggestions?",
    "What's your budget range?",
    "What do you primarily use your phone for?",
];
const CAMERA_QUESTION: &str = "Are you looking for the best camera phone for photography or video?";
const GAMING_QUESTION: &str = "Are you looking for a phone optimized for gaming performance?";

fn greetings(name: Option<&str>) -> Vec<String> {
    let suffix = name.map(|n| format!(" {n}")).unwrap_or_default();
    vec![
        format!("Hey there{suffix}! 👋 I'm Jad, and I'm super excited to help you find the perfect phone! What brings you here today?"),
        format!("Hello{suffix}! 🌟 Welcome back! I'm Jad, your friendly phone expert. Ready to discover some amazing devices?"),
        "Hi there! 😊 I'm Jad, and I absolutely love helping people find their dream phone. What can I help you with today?".to_string(),
    ]
}

/// 直接回复：情绪覆盖优先，否则从意图对应的回复池随机取一条（非问候意图用通用池）
pub fn direct_response(intent: Intent, emotion: EmotionalContext, customer_name: Option<&str>) -> String {
    match emotion {
        EmotionalContext::Frustrated => return FRUSTRATED_RESPONSE.to_string(),
        EmotionalContext::Excited => return EXCITED_RESPONSE.to_string(),
        _ => {}
    }

    let pool: Vec<String> = match intent {
        Intent::Greeting => greetings(customer_name),
        _ => GENERAL_RESPONSES.iter().map(|s| s.to_string()).collect(),
    };
    pool.choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| GENERAL_RESPONSES[0].to_string())
}

/// 澄清问题：原始输入含 camera / gaming 时把对应问题放到最前（gaming 在最前），取前 limit 个。
/// 匹配区分大小写。
pub fn clarifying_questions(input: &str, limit: usize) -> Vec<String> {
    let mut questions: Vec<&str> = GENERIC_QUESTIONS.to_vec();
    if input.contains("camera") {
        questions.insert(0, CAMERA_QUESTION);
    }
    if input.contains("gaming") {
        questions.insert(0, GAMING_QUESTION);
    }
    questions.into_iter().take(limit).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_overrides_pool() {
        assert_eq!(
            direct_response(Intent::Greeting, EmotionalContext::Frustrated, None),
            FRUSTRATED_RESPONSE
        );
        assert_eq!(
            direct_response(Intent::GeneralInquiry, EmotionalContext::Excited, None),
            EXCITED_RESPONSE
        );
    }

    #[test]
    fn test_greeting_from_pool() {
        let response = direct_response(Intent::Greeting, EmotionalContext::Neutral, Some("Ada"));
        assert!(greetings(Some("Ada")).contains(&response));
    }

    #[test]
    fn test_clarifying_questions_prepend_topics() {
        let questions = clarifying_questions("a camera phone for gaming", 3);
        assert_eq!(questions[0], GAMING_QUESTION);
        assert_eq!(questions[1], CAMERA_QUESTION);
        assert_eq!(questions[2], GENERIC_QUESTIONS[0]);

        let questions = clarifying_questions("a Camera phone", 3);
        assert_eq!(questions, GENERIC_QUESTIONS[..3].to_vec());

        let questions = clarifying_questions("hello", 3);
        assert_eq!(questions, GENERIC_QUESTIONS[..3].to_vec());
    }
}
