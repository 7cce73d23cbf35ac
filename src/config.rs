use crate::size_class::{BATCH, MAX_BLOCK};

/// Default shift applied to the cumulative heap size when computing the
/// proportional part of a growth request (`heap_size >> 4`, a sixteenth).
pub const POOL_CONFIG_DEFAULT_GROWTH_SHIFT: u32 = 4;

/// Largest batch a refill will ask for. A batch of the biggest class,
/// doubled for growth plus the heap term, still fits in `usize`.
pub const POOL_CONFIG_MAX_BATCH: usize = usize::MAX / (4 * MAX_BLOCK);

/// Tuning knobs for a [`crate::PoolAllocator`].
///
/// The size-class geometry is fixed at compile time (see
/// [`crate::size_class`]); only the refill policy is configurable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of blocks a refill asks for. The pool may hand out fewer when
    /// its region only fits part of a batch. Clamped to
    /// `1..=`[`POOL_CONFIG_MAX_BATCH`].
    pub batch: usize,
    /// Every growth request adds `round_up(heap_size >> growth_shift)` bytes
    /// on top of twice the immediate need, so growth scales with the amount
    /// of memory the pool already serves.
    pub growth_shift: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            batch: BATCH,
            growth_shift: POOL_CONFIG_DEFAULT_GROWTH_SHIFT,
        }
    }
}

impl PoolConfig {
    /// Batch size actually used by refills.
    #[inline]
    pub(crate) fn effective_batch(&self) -> usize {
        self.batch.clamp(1, POOL_CONFIG_MAX_BATCH)
    }

    /// Proportional growth term for a pool that has obtained `heap_size` bytes so far.
    #[inline]
    pub(crate) fn growth_term(&self, heap_size: usize) -> usize {
        heap_size
            .checked_shr(self.growth_shift)
            .map_or(0, crate::size_class::round_up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_batch_constant() {
        let config = PoolConfig::default();
        assert_eq!(config.batch, 20);
        assert_eq!(config.growth_shift, 4);
    }

    #[test]
    fn zero_batch_is_clamped() {
        let config = PoolConfig { batch: 0, ..PoolConfig::default() };
        assert_eq!(config.effective_batch(), 1);
    }

    #[test]
    fn huge_batch_is_clamped() {
        let config = PoolConfig { batch: (1 << 61) + 1, ..PoolConfig::default() };
        assert_eq!(config.effective_batch(), POOL_CONFIG_MAX_BATCH);

        let total = MAX_BLOCK.checked_mul(config.effective_batch()).unwrap();
        assert!(total.checked_mul(2).and_then(|t| t.checked_add(config.growth_term(usize::MAX))).is_some());
    }

    #[test]
    fn growth_term_is_aligned_sixteenth() {
        let config = PoolConfig::default();
        assert_eq!(config.growth_term(0), 0);
        assert_eq!(config.growth_term(320), 24);
        assert_eq!(config.growth_term(2560), 160);
    }

    #[test]
    fn oversized_shift_disables_growth_term() {
        let config = PoolConfig { growth_shift: 200, ..PoolConfig::default() };
        assert_eq!(config.growth_term(usize::MAX), 0);
    }
}
