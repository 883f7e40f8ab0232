use std::sync::{Arc, Mutex};

use crate::index::LexicalIndex;

/// Lazily built, wholesale-replaced lexical index handle.
///
/// Single-writer guard: readers share the frozen index, one builder at a
/// time fills an empty slot. Concurrent callers racing an empty slot do
/// redundant but idempotent work; whichever build lands first wins.
#[derive(Default)]
pub struct LexicalHolder {
    current: Mutex<Option<Arc<LexicalIndex>>>,
}

impl LexicalHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current index, if one has been built.
    pub fn get(&self) -> Option<Arc<LexicalIndex>> {
        self.lock().clone()
    }

    /// Return the shared frozen index, building it with `make` if absent.
    pub fn get_or_build<F>(&self, make: F) -> anyhow::Result<Arc<LexicalIndex>>
    where
        F: FnOnce() -> anyhow::Result<LexicalIndex>,
    {
        let mut slot = self.lock();
        if let Some(index) = slot.as_ref() {
            return Ok(index.clone());
        }
        let built = Arc::new(make()?);
        *slot = Some(built.clone());
        Ok(built)
    }

    /// Drop the current index; the next query rebuilds from a fresh
    /// corpus snapshot.
    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<LexicalIndex>>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_once_and_reuses() {
        let holder = LexicalHolder::new();
        assert!(holder.get().is_none());

        let mut builds = 0;
        let first = holder
            .get_or_build(|| {
                builds += 1;
                LexicalIndex::build(&[])
            })
            .unwrap();
        let second = holder
            .get_or_build(|| {
                builds += 1;
                LexicalIndex::build(&[])
            })
            .unwrap();

        assert_eq!(builds, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn invalidate_forces_a_rebuild() {
        let holder = LexicalHolder::new();
        holder.get_or_build(|| LexicalIndex::build(&[])).unwrap();
        holder.invalidate();
        assert!(holder.get().is_none());
    }
}
