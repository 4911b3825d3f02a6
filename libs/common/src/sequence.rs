use std::sync::atomic::{AtomicI64, Ordering};

/// Hands out strictly increasing integer ids.
///
/// Ids are never reused: `observe` lets callers that insert records with an
/// externally chosen id push the counter past it.
pub struct SequenceGenerator {
    next: AtomicI64,
}

impl SequenceGenerator {
    /// Start handing out ids at `first`.
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }

    /// Start handing out ids strictly above `seed`.
    pub fn starting_after(seed: i64) -> Self {
        Self::starting_at(seed.saturating_add(1))
    }

    /// Next id, or `None` once the counter reached `i64::MAX`.
    ///
    /// `i64::MAX` itself is never handed out, so an `observe` of the largest
    /// id exhausts the generator instead of wrapping it.
    pub fn generate(&self) -> Option<i64> {
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .ok()
    }

    /// Make sure `id` will never be returned by `generate`.
    pub fn observe(&self, id: i64) {
        self.next.fetch_max(id.saturating_add(1), Ordering::Relaxed);
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}
