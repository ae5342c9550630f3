//! 记忆存储
//!
//! 由引擎实例持有，按客户 ID 保存档案、按会话 ID 保存会话记忆与对话历史。
//! 配置了快照文件时，构造时加载、每次变更后尽力重写（失败只记录 warn）。

use std::collections::HashMap;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::memory::persistence::{MemorySnapshot, SnapshotFile};
use crate::memory::{
    ConversationMemory, ConversationTurn, CustomerProfile, Interaction, InteractionKind,
};

/// 默认短期记忆容量
pub const DEFAULT_SHORT_TERM_CAPACITY: usize = 20;

pub struct MemoryStore {
    capacity: usize,
    profiles: RwLock<HashMap<String, CustomerProfile>>,
    conversations: RwLock<HashMap<String, ConversationMemory>>,
    histories: RwLock<HashMap<String, Vec<ConversationTurn>>>,
    snapshot: Option<SnapshotFile>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_SHORT_TERM_CAPACITY)
    }
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            profiles: RwLock::new(HashMap::new()),
            conversations: RwLock::new(HashMap::new()),
            histories: RwLock::new(HashMap::new()),
            snapshot: None,
        }
    }

    /// 带快照文件的存储；快照损坏时从空存储开始
    pub fn with_snapshot(capacity: usize, file: SnapshotFile) -> Self {
        let loaded = match file.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %file.path().display(), error = %e, "Failed to load memory snapshot, starting empty");
                MemorySnapshot::default()
            }
        };
        debug!(
            profiles = loaded.profiles.len(),
            conversations = loaded.conversations.len(),
            "Memory snapshot loaded"
        );
        Self {
            capacity: capacity.max(1),
            profiles: RwLock::new(loaded.profiles),
            conversations: RwLock::new(loaded.conversations),
            histories: RwLock::new(loaded.histories),
            snapshot: Some(file),
        }
    }

    pub fn short_term_capacity(&self) -> usize {
        self.capacity
    }

    pub async fn get_customer_profile(&self, customer_id: &str) -> Option<CustomerProfile> {
        self.profiles.read().await.get(customer_id).cloned()
    }

    /// 修改（不存在则新建）客户档案，刷新 updated_at 并重算洞察
    pub async fn update_customer_profile<F>(&self, customer_id: &str, update: F) -> CustomerProfile
    where
        F: FnOnce(&mut CustomerProfile),
    {
        let profile = {
            let mut profiles = self.profiles.write().await;
            let profile = profiles
                .entry(customer_id.to_string())
                .or_insert_with(|| CustomerProfile::new(customer_id));
            update(profile);
            let now = Utc::now();
            profile.updated_at = now;
            profile.refresh_insights(now);
            profile.clone()
        };
        self.persist().await;
        profile
    }

    /// 追加一次互动并重算洞察
    pub async fn record_interaction(
        &self,
        customer_id: &str,
        kind: InteractionKind,
        context: Value,
        outcome: Option<String>,
    ) -> CustomerProfile {
        self.update_customer_profile(customer_id, |profile| {
            profile.interactions.push(Interaction {
                timestamp: Utc::now(),
                kind,
                context,
                outcome,
            });
        })
        .await
    }

    /// 获取会话记忆，不存在时创建
    pub async fn get_conversation_memory(&self, session_id: &str) -> ConversationMemory {
        if let Some(memory) = self.conversations.read().await.get(session_id) {
            return memory.clone();
        }
        self.conversations
            .write()
            .await
            .entry(session_id.to_string())
            .or_insert_with(|| ConversationMemory::new(session_id))
            .clone()
    }

    pub async fn add_to_short_term(
        &self,
        session_id: &str,
        key: impl Into<String>,
        value: Value,
        importance: u8,
    ) {
        {
            let mut conversations = self.conversations.write().await;
            conversations
                .entry(session_id.to_string())
                .or_insert_with(|| ConversationMemory::new(session_id))
                .remember(key, value, importance, self.capacity);
        }
        self.persist().await;
    }

    pub async fn promote_to_long_term(
        &self,
        session_id: &str,
        pattern: &str,
        context: Map<String, Value>,
    ) {
        {
            let mut conversations = self.conversations.write().await;
            conversations
                .entry(session_id.to_string())
                .or_insert_with(|| ConversationMemory::new(session_id))
                .promote(pattern, context);
        }
        self.persist().await;
    }

    pub async fn relevant_memories(&self, session_id: &str, query: &str, limit: usize) -> Vec<Value> {
        self.conversations
            .read()
            .await
            .get(session_id)
            .map(|memory| memory.relevant(query, limit))
            .unwrap_or_default()
    }

    /// 记录当前意图（与关联客户）
    pub async fn set_current_intent(
        &self,
        session_id: &str,
        intent: &str,
        customer_id: Option<&str>,
    ) {
        let mut conversations = self.conversations.write().await;
        let memory = conversations
            .entry(session_id.to_string())
            .or_insert_with(|| ConversationMemory::new(session_id));
        memory.current_intent = intent.to_string();
        if let Some(id) = customer_id {
            memory.customer_id = Some(id.to_string());
        }
    }

    /// 追加对话轮次
    pub async fn update_conversation(&self, session_id: &str, turns: Vec<ConversationTurn>) {
        if turns.is_empty() {
            return;
        }
        self.histories
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .extend(turns);
        self.persist().await;
    }

    /// 最近 limit 条对话轮次（时间正序）
    pub async fn conversation_history(&self, session_id: &str, limit: usize) -> Vec<ConversationTurn> {
        let histories = self.histories.read().await;
        match histories.get(session_id) {
            Some(turns) => {
                let start = turns.len().saturating_sub(limit);
                turns[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    async fn persist(&self) {
        let Some(file) = &self.snapshot else {
            return;
        };
        let _guard = file.lock().await;
        let snapshot = MemorySnapshot {
            profiles: self.profiles.read().await.clone(),
            conversations: self.conversations.read().await.clone(),
            histories: self.histories.read().await.clone(),
        };
        if let Err(e) = file.save(&snapshot).await {
            warn!(path = %file.path().display(), error = %format!("{e:#}"), "Failed to write memory snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Level, Persona};
    use serde_json::json;

    #[tokio::test]
    async fn test_conversation_memory_created_lazily() {
        let store = MemoryStore::default();
        let memory = store.get_conversation_memory("s1").await;
        assert_eq!(memory.session_id, "s1");
        assert!(memory.short_term.is_empty());
    }

    #[tokio::test]
    async fn test_short_term_bounded_by_capacity() {
        let store = MemoryStore::new(3);
        for i in 0..5u8 {
            store.add_to_short_term("s1", "k", json!(i), i + 1).await;
        }
        let memory = store.get_conversation_memory("s1").await;
        let importances: Vec<u8> = memory.short_term.iter().map(|e| e.importance).collect();
        assert_eq!(importances, vec![5, 4, 3]);
    }

    #[tokio::test]
    async fn test_update_profile_recomputes_insights() {
        let store = MemoryStore::default();
        let profile = store
            .update_customer_profile("c1", |p| p.preferences.price_sensitivity = Level::High)
            .await;
        assert_eq!(profile.insights.persona, Persona::BudgetConscious);

        let profile = store
            .record_interaction("c1", InteractionKind::Comparison, json!({}), None)
            .await;
        assert!((profile.insights.likelihood_to_purchase - 0.5).abs() < 1e-9);
        assert_eq!(
            store.get_customer_profile("c1").await.map(|p| p.interactions.len()),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_history_returns_tail() {
        let store = MemoryStore::default();
        store
            .update_conversation(
                "s1",
                vec![
                    ConversationTurn::user("one"),
                    ConversationTurn::assistant("two"),
                    ConversationTurn::user("three"),
                ],
            )
            .await;
        let tail = store.conversation_history("s1", 2).await;
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[1].content, "three");
    }

    #[tokio::test]
    async fn test_snapshot_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");

        let store = MemoryStore::with_snapshot(20, SnapshotFile::new(&path));
        store
            .update_customer_profile("c1", |p| p.first_name = Some("Ada".into()))
            .await;
        store
            .add_to_short_term("s1", "decision_context", json!({"input": "hi"}), 8)
            .await;
        drop(store);

        let reopened = MemoryStore::with_snapshot(20, SnapshotFile::new(&path));
        let profile = reopened.get_customer_profile("c1").await.unwrap();
        assert_eq!(profile.first_name.as_deref(), Some("Ada"));
        assert_eq!(reopened.get_conversation_memory("s1").await.short_term.len(), 1);
    }

    #[tokio::test]
    async fn test_promote_increments_frequency_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");

        let store = MemoryStore::with_snapshot(20, SnapshotFile::new(&path));
        let mut first = Map::new();
        first.insert("brand".into(), json!("Google"));
        store.promote_to_long_term("s1", "prefers_pixel", first).await;
        let mut second = Map::new();
        second.insert("budget".into(), json!("mid"));
        store.promote_to_long_term("s1", "prefers_pixel", second).await;
        store.promote_to_long_term("s1", "asks_about_camera", Map::new()).await;

        let memory = store.get_conversation_memory("s1").await;
        assert_eq!(memory.long_term.len(), 2);
        assert_eq!(memory.long_term[0].frequency, 2);
        assert_eq!(memory.long_term[0].context["budget"], "mid");
        drop(store);

        let reopened = MemoryStore::with_snapshot(20, SnapshotFile::new(&path));
        let memory = reopened.get_conversation_memory("s1").await;
        assert_eq!(memory.long_term[0].pattern, "prefers_pixel");
        assert_eq!(memory.long_term[0].frequency, 2);
        assert_eq!(memory.long_term[0].context.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_leave_latest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let store = std::sync::Arc::new(MemoryStore::with_snapshot(20, SnapshotFile::new(&path)));

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .add_to_short_term(&format!("s{i}"), "decision_context", json!(i), 5)
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        drop(store);

        let reopened = MemoryStore::with_snapshot(20, SnapshotFile::new(&path));
        for i in 0..50 {
            let memory = reopened.get_conversation_memory(&format!("s{i}")).await;
            assert_eq!(memory.short_term.len(), 1, "session s{i} missing");
        }
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "not json").unwrap();

        let store = MemoryStore::with_snapshot(20, SnapshotFile::new(&path));
        assert!(store.get_customer_profile("c1").await.is_none());
    }
}
