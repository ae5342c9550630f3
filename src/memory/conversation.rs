//! 会话记忆：对话轮次、短期记忆（按重要度保留）、长期模式
//!
//! 短期记忆只保留重要度最高的 N 条（默认 20），同重要度按插入顺序保留。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// 单条对话轮次
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// 短期记忆条目
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShortTermEntry {
    /// 标签，如 decision_context
    pub key: String,
    pub value: Value,
    pub timestamp: DateTime<Utc>,
    /// 1-10
    pub importance: u8,
}

/// 长期模式：重复出现的行为模式与出现次数
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LongTermPattern {
    pub pattern: String,
    pub frequency: u32,
    pub last_seen: DateTime<Utc>,
    pub context: Map<String, Value>,
}

/// 单个会话的记忆
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationMemory {
    pub session_id: String,
    pub customer_id: Option<String>,
    pub current_intent: String,
    /// 正在讨论的机型 ID
    pub active_phones: Vec<String>,
    pub short_term: Vec<ShortTermEntry>,
    pub long_term: Vec<LongTermPattern>,
}

impl ConversationMemory {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            customer_id: None,
            current_intent: "greeting".to_string(),
            active_phones: Vec::new(),
            short_term: Vec::new(),
            long_term: Vec::new(),
        }
    }

    /// 追加短期记忆后按重要度降序稳定排序，截断到 capacity
    pub fn remember(&mut self, key: impl Into<String>, value: Value, importance: u8, capacity: usize) {
        self.short_term.push(ShortTermEntry {
            key: key.into(),
            value,
            timestamp: Utc::now(),
            importance: importance.clamp(1, 10),
        });
        self.short_term.sort_by(|a, b| b.importance.cmp(&a.importance));
        self.short_term.truncate(capacity);
    }

    /// 已有模式则频次 +1 并合并上下文，否则以频次 1 新增
    pub fn promote(&mut self, pattern: &str, context: Map<String, Value>) {
        let now = Utc::now();
        match self.long_term.iter_mut().find(|p| p.pattern == pattern) {
            Some(existing) => {
                existing.frequency += 1;
                existing.last_seen = now;
                existing.context.extend(context);
            }
            None => self.long_term.push(LongTermPattern {
                pattern: pattern.to_string(),
                frequency: 1,
                last_seen: now,
                context,
            }),
        }
    }

    /// 最后 n 条短期记忆中是否有 key 含指定标签的条目
    pub fn recent_has_tag(&self, tag: &str, n: usize) -> bool {
        self.short_term
            .iter()
            .rev()
            .take(n)
            .any(|entry| entry.key.contains(tag))
    }

    /// 与查询词相关的短期记忆值（任一词出现在值的 JSON 文本中），按重要度降序
    pub fn relevant(&self, query: &str, limit: usize) -> Vec<Value> {
        let words: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if words.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<&ShortTermEntry> = self
            .short_term
            .iter()
            .filter(|entry| {
                let text = entry.value.to_string().to_lowercase();
                words.iter().any(|w| text.contains(w.as_str()))
            })
            .collect();
        hits.sort_by(|a, b| b.importance.cmp(&a.importance));
        hits.into_iter().take(limit).map(|e| e.value.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_term_keeps_most_important() {
        let mut memory = ConversationMemory::new("s1");
        for i in 0..25u8 {
            memory.remember(format!("k{i}"), json!(i), (i % 10) + 1, 20);
        }
        assert_eq!(memory.short_term.len(), 20);
        assert!(memory.short_term.iter().all(|e| e.importance >= 3));
        assert_eq!(memory.short_term[0].importance, 10);
    }

    #[test]
    fn test_promote_increments_frequency() {
        let mut memory = ConversationMemory::new("s1");
        let mut ctx = Map::new();
        ctx.insert("brand".into(), json!("Apple"));
        memory.promote("asks_about_camera", ctx);
        let mut ctx = Map::new();
        ctx.insert("budget".into(), json!("mid"));
        memory.promote("asks_about_camera", ctx);

        assert_eq!(memory.long_term.len(), 1);
        assert_eq!(memory.long_term[0].frequency, 2);
        assert_eq!(memory.long_term[0].context.len(), 2);
    }

    #[test]
    fn test_recent_tag_looks_at_tail_only() {
        let mut memory = ConversationMemory::new("s1");
        memory.remember("comparison_view", json!("pixel vs iphone"), 9, 20);
        for i in 0..3 {
            memory.remember("decision_context", json!(i), 8, 20);
        }
        assert!(!memory.recent_has_tag("comparison", 3));

        memory.remember("comparison_view", json!("galaxy vs pixel"), 2, 20);
        assert!(memory.recent_has_tag("comparison", 3));
    }

    #[test]
    fn test_relevant_matches_any_word() {
        let mut memory = ConversationMemory::new("s1");
        memory.remember("a", json!({"input": "camera phone"}), 3, 20);
        memory.remember("b", json!({"input": "gaming phone"}), 7, 20);
        memory.remember("c", json!({"input": "battery"}), 9, 20);

        let hits = memory.relevant("best GAMING camera", 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], json!({"input": "gaming phone"}));
    }
}
