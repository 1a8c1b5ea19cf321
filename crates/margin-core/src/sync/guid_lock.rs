//! Per-guid serialization of the read–decide–write sequence

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::NoteGuid;

/// One async lock per note guid
///
/// Two reconciliations of the same guid never interleave; different guids
/// proceed in parallel. Entries are dropped once nobody holds or waits on them.
#[derive(Default)]
pub struct GuidLocks {
    locks: Mutex<HashMap<NoteGuid, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one reconciliation
pub struct GuidGuard<'a> {
    owner: &'a GuidLocks,
    guid: NoteGuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl GuidLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, guid: NoteGuid) -> GuidGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(guid).or_default())
        };
        let guard = lock.lock_owned().await;
        GuidGuard {
            owner: self,
            guid,
            guard: Some(guard),
        }
    }

    fn release(&self, guid: &NoteGuid) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The map holds one reference; anything above that is a waiter.
        if locks
            .get(guid)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(guid);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for GuidGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.owner.release(&self.guid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_same_guid_is_serialized() {
        let locks = Arc::new(GuidLocks::new());
        let guid = NoteGuid::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            tasks.spawn(async move {
                let _guard = locks.lock(guid).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            });
        }
        while tasks.join_next().await.is_some() {}

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_different_guids_do_not_block() {
        let locks = GuidLocks::new();
        let _a = locks.lock(NoteGuid::new()).await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.lock(NoteGuid::new()))
            .await
            .expect("second guid should not wait");
        assert_eq!(locks.tracked(), 2);
    }
}
