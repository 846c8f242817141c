//! Search service surface (spec §4.5: "Minimum query length is 2
//! characters"). The scan itself lives in `gigi_store::Store::search`; this
//! module owns the query-length gate the Store has no reason to know about.

use gigi_store::{SearchHit, Store, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query too short: minimum 2 characters")]
    QueryTooShort,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub async fn search(store: &Store, query: &str, limit: i64) -> Result<Vec<SearchHit>, SearchError> {
    let trimmed = query.trim();
    if trimmed.chars().count() < 2 {
        return Err(SearchError::QueryTooShort);
    }
    Ok(store.search(trimmed, limit).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_short_queries() {
        let store = Store::in_memory().unwrap();
        let err = search(&store, "a", 10).await.unwrap_err();
        assert!(matches!(err, SearchError::QueryTooShort));
    }

    #[tokio::test]
    async fn finds_matching_topic() {
        let store = Store::in_memory().unwrap();
        store.create_thread("web", "deploy pipeline fix", None, None).await.unwrap();
        let hits = search(&store, "deploy", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
