//! 记忆快照持久化
//!
//! 将客户档案与会话记忆写入单个 JSON 文件，启动时可选加载。
//! 写入走 tokio::fs，避免在 async 上下文中阻塞；写者通过文件锁串行。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{Mutex, MutexGuard};

use crate::memory::{ConversationMemory, ConversationTurn, CustomerProfile};

/// 快照内容
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySnapshot {
    pub profiles: HashMap<String, CustomerProfile>,
    pub conversations: HashMap<String, ConversationMemory>,
    pub histories: HashMap<String, Vec<ConversationTurn>>,
}

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl SnapshotFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 持锁期间组装并写入快照，后写者不会被先组装的旧快照覆盖
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 文件不存在时返回空快照；只在构造存储时调用一次
    pub fn load(&self) -> anyhow::Result<MemorySnapshot> {
        if !self.path.exists() {
            return Ok(MemorySnapshot::default());
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// 父目录不存在时自动创建
    pub async fn save(&self, snapshot: &MemorySnapshot) -> anyhow::Result<()> {
        let data = serde_json::to_string_pretty(snapshot)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&self.path, data)
            .await
            .with_context(|| format!("write {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("none.json"));
        let snapshot = file.load().unwrap();
        assert!(snapshot.profiles.is_empty());
        assert!(snapshot.conversations.is_empty());
    }

    #[tokio::test]
    async fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("nested/memory.json"));

        let mut snapshot = MemorySnapshot::default();
        snapshot
            .profiles
            .insert("c1".into(), CustomerProfile::new("c1"));
        snapshot
            .conversations
            .insert("s1".into(), ConversationMemory::new("s1"));
        file.save(&snapshot).await.unwrap();

        let loaded = file.load().unwrap();
        assert!(loaded.profiles.contains_key("c1"));
        assert_eq!(loaded.conversations["s1"].current_intent, "greeting");
    }
}
