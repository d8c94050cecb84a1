use crate::error::NoticeError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Watchers on this path are notified when the shard server list changes.
pub const SHARD_SERVER_PATH: &str = "/shard/server";
/// Watchers on this path are notified when the segment list changes.
pub const SHARD_CHUNK_PATH: &str = "/shard/chunk";
/// Watchers on this path are notified when the discovered DfsServer peer set changes.
pub const SHARD_DFS_PATH: &str = "/shard/dfs";

/// Abstracts the ZooKeeper-style ephemeral-registration + change-notification
/// service the original wired to `go-zookeeper/zk`. A real deployment plugs
/// in a ZooKeeper or etcd client behind this trait; `InMemoryNotice` is the
/// in-process double used by tests and small deployments.
#[async_trait]
pub trait Notice: Send + Sync {
    /// Returns the data currently stored at `path`.
    async fn get_data(&self, path: &str) -> Result<Vec<u8>, NoticeError>;

    /// Returns the names of `path`'s children.
    async fn get_children(&self, path: &str) -> Result<Vec<String>, NoticeError>;

    /// Subscribes to data changes at `path`. The current value (if any) is
    /// delivered immediately, then every subsequent write.
    fn watch_data(&self, path: &str) -> mpsc::Receiver<Vec<u8>>;

    /// Subscribes to child-list changes at `path`. The current snapshot is
    /// delivered immediately, then every subsequent add/remove.
    fn watch_children(&self, path: &str) -> mpsc::Receiver<Vec<String>>;

    /// Creates an ephemeral sequence node under `prefix`'s parent, storing
    /// `data`, and returns its full path.
    async fn register(&self, prefix: &str, data: Vec<u8>) -> Result<String, NoticeError>;

    /// Removes a previously registered node.
    async fn unregister(&self, path: &str) -> Result<(), NoticeError>;
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
        None => "/".to_string(),
    }
}

#[derive(Default)]
struct Inner {
    data: HashMap<String, Vec<u8>>,
    data_watchers: HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>,
    children: HashMap<String, Vec<String>>,
    children_watchers: HashMap<String, Vec<mpsc::Sender<Vec<String>>>>,
    seq: u64,
}

/// In-process `Notice` double. Not durable across restarts; intended for
/// tests and single-process deployments that don't need real coordination.
pub struct InMemoryNotice {
    inner: Mutex<Inner>,
}

impl InMemoryNotice {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    /// Test/ops hook: sets `path`'s data and fires every live watcher.
    pub fn set_data(&self, path: &str, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.data.insert(path.to_string(), data.clone());
        if let Some(watchers) = inner.data_watchers.get_mut(path) {
            watchers.retain(|w| w.try_send(data.clone()).is_ok());
        }
    }

    /// Test/ops hook: adds `name` as a child of `parent` and fires watchers.
    pub fn add_child(&self, parent: &str, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        let children = inner.children.entry(parent.to_string()).or_default();
        if !children.iter().any(|c| c == name) {
            children.push(name.to_string());
        }
        let snapshot = children.clone();
        if let Some(watchers) = inner.children_watchers.get_mut(parent) {
            watchers.retain(|w| w.try_send(snapshot.clone()).is_ok());
        }
    }

    /// Test/ops hook: removes `name` from `parent`'s children and fires watchers.
    pub fn remove_child(&self, parent: &str, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(children) = inner.children.get_mut(parent) {
            children.retain(|c| c != name);
            let snapshot = children.clone();
            if let Some(watchers) = inner.children_watchers.get_mut(parent) {
                watchers.retain(|w| w.try_send(snapshot.clone()).is_ok());
            }
        }
    }
}

impl Default for InMemoryNotice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notice for InMemoryNotice {
    async fn get_data(&self, path: &str) -> Result<Vec<u8>, NoticeError> {
        self.inner
            .lock()
            .unwrap()
            .data
            .get(path)
            .cloned()
            .ok_or_else(|| NoticeError::NotFound(path.to_string()))
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>, NoticeError> {
        Ok(self.inner.lock().unwrap().children.get(path).cloned().unwrap_or_default())
    }

    fn watch_data(&self, path: &str) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(16);
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.data.get(path) {
            let _ = tx.try_send(existing.clone());
        }
        inner.data_watchers.entry(path.to_string()).or_default().push(tx);
        rx
    }

    fn watch_children(&self, path: &str) -> mpsc::Receiver<Vec<String>> {
        let (tx, rx) = mpsc::channel(16);
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.children.get(path) {
            let _ = tx.try_send(existing.clone());
        }
        inner.children_watchers.entry(path.to_string()).or_default().push(tx);
        rx
    }

    async fn register(&self, prefix: &str, data: Vec<u8>) -> Result<String, NoticeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.seq += 1;
        let node = format!("{prefix}{:010}", inner.seq);
        inner.data.insert(node.clone(), data);

        let parent = parent_of(&node);
        let children = inner.children.entry(parent.clone()).or_default();
        children.push(node.clone());
        let snapshot = children.clone();
        if let Some(watchers) = inner.children_watchers.get_mut(&parent) {
            watchers.retain(|w| w.try_send(snapshot.clone()).is_ok());
        }

        Ok(node)
    }

    async fn unregister(&self, path: &str) -> Result<(), NoticeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.data.remove(path);

        let parent = parent_of(path);
        if let Some(children) = inner.children.get_mut(&parent) {
            children.retain(|c| c != path);
            let snapshot = children.clone();
            if let Some(watchers) = inner.children_watchers.get_mut(&parent) {
                watchers.retain(|w| w.try_send(snapshot.clone()).is_ok());
            }
        }
        Ok(())
    }
}
