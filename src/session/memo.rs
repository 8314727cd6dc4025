use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Error;
use crate::storage::{Storage, keys};

/// Persisted set of identity tokens the backend has already accepted.
///
/// Lives in storage rather than memory so a restart does not force a fresh
/// verification round-trip. Cleared together with the token pair.
pub(crate) struct VerificationMemo {
    storage: Arc<dyn Storage>,
}

impl VerificationMemo {
    pub(crate) fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub(crate) fn contains(&self, identity_token: &str) -> bool {
        self.load().contains(identity_token)
    }

    pub(crate) fn insert(&self, identity_token: &str) -> Result<(), Error> {
        let mut tokens = self.load();
        if tokens.insert(identity_token.to_owned()) {
            let json = serde_json::to_string(&tokens).map_err(|e| Error::Storage(e.to_string()))?;
            self.storage.set(keys::VERIFIED_TOKENS, &json)?;
        }
        Ok(())
    }

    fn load(&self) -> BTreeSet<String> {
        let raw = match self.storage.get(keys::VERIFIED_TOKENS) {
            Ok(Some(raw)) => raw,
            Ok(None) => return BTreeSet::new(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read verification memo");
                return BTreeSet::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding unreadable verification memo");
            BTreeSet::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn insert_and_contains() {
        let memo = VerificationMemo::new(Arc::new(MemoryStorage::new()));
        assert!(!memo.contains("a"));
        memo.insert("a").unwrap();
        memo.insert("a").unwrap();
        memo.insert("b").unwrap();
        assert!(memo.contains("a"));
        assert!(memo.contains("b"));
    }

    #[test]
    fn corrupt_memo_reads_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(keys::VERIFIED_TOKENS, "{").unwrap();
        let memo = VerificationMemo::new(storage);
        assert!(!memo.contains("a"));
        memo.insert("a").unwrap();
        assert!(memo.contains("a"));
    }
}
