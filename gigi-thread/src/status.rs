//! Status transitions (spec §4.5): "paused ⇆ active (exclusive, taken by
//! the agent runtime at turn start/end); any → stopped (explicit 'done');
//! any → archived (explicit); stopped → paused (reopen). Deletion is
//! permitted only from archived." `paused ⇆ active` belongs to
//! `gigi_agent::TurnRuntime`, not this module; everything here is the
//! operator-facing surface.

use gigi_store::{Store, StoreError, ThreadStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("cannot reopen a thread in {0:?} status; only stopped threads can be reopened")]
    NotStopped(ThreadStatus),
}

pub async fn stop(store: &Store, thread_id: &str) -> Result<(), StoreError> {
    store.update_thread_status(thread_id, ThreadStatus::Stopped).await
}

pub async fn archive(store: &Store, thread_id: &str) -> Result<(), StoreError> {
    store.update_thread_status(thread_id, ThreadStatus::Archived).await
}

/// `stopped → paused` only; any other starting status is rejected here
/// rather than left to `Store::update_thread_status`, which allows any
/// transition (the enforcement of "stopped only" is a thread-service
/// concern, not a storage invariant).
pub async fn reopen(store: &Store, thread_id: &str) -> Result<(), StatusError> {
    let thread = store.get_thread(thread_id).await?;
    if thread.status != ThreadStatus::Stopped {
        return Err(StatusError::NotStopped(thread.status));
    }
    store.update_thread_status(thread_id, ThreadStatus::Paused).await?;
    Ok(())
}

/// `Store::delete_thread` already enforces archived-only; this wrapper
/// exists so callers go through the thread-service surface uniformly.
pub async fn delete(store: &Store, thread_id: &str) -> Result<(), StoreError> {
    store.delete_thread(thread_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reopen_requires_stopped() {
        let store = Store::in_memory().unwrap();
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        let err = reopen(&store, &thread_id).await.unwrap_err();
        assert!(matches!(err, StatusError::NotStopped(ThreadStatus::Paused)));

        stop(&store, &thread_id).await.unwrap();
        reopen(&store, &thread_id).await.unwrap();
        let thread = store.get_thread(&thread_id).await.unwrap();
        assert_eq!(thread.status, ThreadStatus::Paused);
    }

    #[tokio::test]
    async fn delete_requires_archived() {
        let store = Store::in_memory().unwrap();
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        assert!(delete(&store, &thread_id).await.is_err());
        archive(&store, &thread_id).await.unwrap();
        delete(&store, &thread_id).await.unwrap();
    }
}
