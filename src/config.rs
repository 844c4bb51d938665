//! Protection Levels

use bitflags::bitflags;

pub const MIN_CAPACITY: usize = 10;
pub const MAX_CAPACITY: usize = 100_000;
pub const GROWTH_FACTOR: usize = 2;

bitflags! {
    /// Which verifier checks are active for a stack.
    ///
    /// Guards and poison values are written regardless, so flipping a check
    /// never changes the memory layout, only what `check` looks at.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Checks: u32 {
        const CANARY  = 1 << 0;
        const HASH    = 1 << 1;
        const POISON  = 1 << 2;
        const POINTER = 1 << 3;
    }
}

/// How guard words are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GuardMode {
    /// The same constant for every stack
    Fixed = 0,
    /// Derived from a per-stack random token and the buffer address
    Keyed = 1,
}

impl GuardMode {
    pub fn from_u8(b: u8) -> Option<GuardMode> {
        match b {
            0 => Some(GuardMode::Fixed),
            1 => Some(GuardMode::Keyed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Config {
    pub checks: Checks,
    /// A `GuardMode` kept as its raw byte. The config lives inside the
    /// guarded structure, where any byte value may turn up.
    pub(crate) guard: u8,
    pub min_capacity: usize,
    pub max_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config { checks: Checks::all(),
                 guard: GuardMode::Keyed as u8,
                 min_capacity: MIN_CAPACITY,
                 max_capacity: MAX_CAPACITY }
    }
}

impl Config {
    pub fn with_checks(mut self, checks: Checks) -> Self {
        self.checks = checks;
        self
    }

    pub fn with_guard(mut self, guard: GuardMode) -> Self {
        self.guard = guard as u8;
        self
    }

    /// `None` if the stored mode byte has been overwritten with garbage.
    pub fn guard(&self) -> Option<GuardMode> {
        GuardMode::from_u8(self.guard)
    }

    pub fn with_min_capacity(mut self, min_capacity: usize) -> Self {
        self.min_capacity = min_capacity;
        self
    }

    pub fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.min_capacity > 0
            && self.min_capacity <= self.max_capacity
            && self.guard().is_some()
    }

    /// Capacity to grow to when `capacity` slots are full, `None` when the
    /// limit has been reached.
    pub fn grow_target(&self, capacity: usize) -> Option<usize> {
        let target = capacity.saturating_mul(GROWTH_FACTOR)
                             .max(self.min_capacity)
                             .min(self.max_capacity);
        (target > capacity).then_some(target)
    }

    /// Capacity to shrink to after a pop left `size` of `capacity` slots in
    /// use, `None` if the stack should stay as it is.
    pub fn shrink_target(&self, size: usize, capacity: usize) -> Option<usize> {
        let quarter = capacity / (2 * GROWTH_FACTOR);
        if size < quarter && capacity > self.min_capacity {
            Some((capacity / GROWTH_FACTOR).max(self.min_capacity))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert!(cfg.is_valid());
        assert_eq!(cfg.checks, Checks::all());
        assert_eq!(cfg.guard(), Some(GuardMode::Keyed));
    }

    #[test]
    fn guard_mode_bytes() {
        assert_eq!(GuardMode::from_u8(0), Some(GuardMode::Fixed));
        assert_eq!(GuardMode::from_u8(1), Some(GuardMode::Keyed));
        assert_eq!(GuardMode::from_u8(2), None);
        assert_eq!(GuardMode::from_u8(0xff), None);
        let cfg = Config::default().with_guard(GuardMode::Fixed);
        assert_eq!(cfg.guard(), Some(GuardMode::Fixed));
    }

    #[test]
    fn invalid_configs() {
        assert!(!Config::default().with_min_capacity(0).is_valid());
        assert!(!Config::default().with_min_capacity(20)
                                  .with_max_capacity(10)
                                  .is_valid());
    }

    #[test]
    fn growth() {
        let cfg = Config::default();
        assert_eq!(cfg.grow_target(10), Some(20));
        assert_eq!(cfg.grow_target(1), Some(10));
        assert_eq!(cfg.grow_target(0), Some(10));
        let cfg = cfg.with_max_capacity(30);
        assert_eq!(cfg.grow_target(20), Some(30));
        assert_eq!(cfg.grow_target(30), None);
    }

    #[test]
    fn shrinking() {
        let cfg = Config::default();
        assert_eq!(cfg.shrink_target(4, 20), Some(10));
        assert_eq!(cfg.shrink_target(5, 20), None);
        assert_eq!(cfg.shrink_target(0, 10), None);
        assert_eq!(cfg.shrink_target(1, 11), Some(10));
        assert_eq!(cfg.shrink_target(100, 1280), Some(640));
    }
}
