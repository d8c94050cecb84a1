use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dfs_fileop::FoundFile;
use tokio::sync::oneshot;

use crate::error::TransferError;

/// Value coalesced by a [`Shield`]. One variant per shielded operation's
/// result shape -- `Stat`/`Exist` share `Found`, `GetByMd5`/`ExistByMd5`
/// share `Md5`.
#[derive(Debug, Clone)]
pub enum ShieldOutcome {
    Found(Option<FoundFile>),
    Md5(String),
}

enum Role<V> {
    Leader,
    Follower(oneshot::Receiver<V>),
}

/// Request coalescing for idempotent reads (`SPEC_FULL.md` §5): concurrent
/// callers sharing a key collapse into one execution of the underlying
/// function. The first caller for a key becomes its leader and runs the
/// future to completion; later callers for the same key suspend on a oneshot
/// channel until the leader's result arrives, bounded by a per-call timeout.
pub struct Shield<V> {
    waiters: Mutex<HashMap<String, Vec<oneshot::Sender<V>>>>,
}

impl<V> Shield<V>
where
    V: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            waiters: Mutex::new(HashMap::new()),
        }
    }

    pub async fn coalesce<F>(&self, key: String, timeout: Duration, f: F) -> Result<V, TransferError>
    where
        F: std::future::Future<Output = V> + Send + 'static,
    {
        let role = {
            let mut waiters = self.waiters.lock().unwrap();
            if let Some(list) = waiters.get_mut(&key) {
                let (tx, rx) = oneshot::channel();
                list.push(tx);
                Role::Follower(rx)
            } else {
                waiters.insert(key.clone(), Vec::new());
                Role::Leader
            }
        };

        match role {
            Role::Leader => {
                let result = f.await;
                let listeners = self.waiters.lock().unwrap().remove(&key).unwrap_or_default();
                for tx in listeners {
                    let _ = tx.send(result.clone());
                }
                Ok(result)
            }
            Role::Follower(rx) => match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(_)) => Err(TransferError::Internal("shield leader dropped before sending a result".into())),
                Err(_) => Err(TransferError::ShieldTimeout),
            },
        }
    }
}

impl<V> Default for Shield<V>
where
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Reconstitutes a shielded leader's error for a follower. `TransferError`
/// isn't `Clone`, so only the `FileNotFound` classification -- the one thing
/// callers branch on -- survives the fan-out; everything else collapses to a
/// generic internal error.
pub fn unwrap_shielded(err: Arc<TransferError>) -> TransferError {
    if err.is_not_found() {
        dfs_fileop::FileOpError::not_found().into()
    } else {
        TransferError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_for_the_same_key_run_the_function_once() {
        let shield = Arc::new(Shield::<i32>::new());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let shield = shield.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                shield
                    .coalesce("k".to_string(), Duration::from_secs(1), async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        42
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_each_run_independently() {
        let shield = Shield::<i32>::new();
        let a = shield.coalesce("a".to_string(), Duration::from_secs(1), async { 1 }).await.unwrap();
        let b = shield.coalesce("b".to_string(), Duration::from_secs(1), async { 2 }).await.unwrap();
        assert_eq!((a, b), (1, 2));
    }

    #[tokio::test]
    async fn a_follower_gives_up_after_its_own_timeout() {
        let shield = Arc::new(Shield::<i32>::new());
        let leader_shield = shield.clone();
        let leader = tokio::spawn(async move {
            leader_shield
                .coalesce("slow".to_string(), Duration::from_secs(5), async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    1
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let follower = shield.coalesce("slow".to_string(), Duration::from_millis(20), async { 2 }).await;
        assert!(matches!(follower, Err(TransferError::ShieldTimeout)));
        leader.await.unwrap().unwrap();
    }
}
