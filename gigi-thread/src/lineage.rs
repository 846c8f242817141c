//! Lineage queries (spec §4.5): "returns {parent, children, fork_point}.
//! Children are discovered by inverse lookup."

use gigi_store::{Store, StoreError, Thread};

pub struct Lineage {
    pub parent: Option<Thread>,
    pub children: Vec<Thread>,
    pub fork_point_seq: Option<i64>,
}

pub async fn lineage(store: &Store, thread_id: &str) -> Result<Lineage, StoreError> {
    let thread = store.get_thread(thread_id).await?;
    let parent = match &thread.parent_id {
        Some(parent_id) => Some(store.get_thread(parent_id).await?),
        None => None,
    };
    let children = store.list_children(thread_id).await?;
    Ok(Lineage { parent, children, fork_point_seq: thread.fork_point_seq })
}
