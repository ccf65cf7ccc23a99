//! Level, score and chain bonus bookkeeping.
//!
//! Destroying `n` blocks at once is worth `n * (level + chain_bonus)`. The chain
//! bonus is 0 for blocks destroyed by a direct match and grows by one per
//! gravity-driven chain reaction, up to [`SCOREBONUS_MAX`].

pub const MAX_LEVEL: u32 = 10;
pub const SCOREBONUS_MAX: u32 = 4;
/// Fall delay at level 1, in ms.
pub const FALL_DELAY_INITIAL: u64 = 355;
/// How much faster pieces fall per level, in ms.
pub const DELAY_DECREASE: u64 = 31;

/// Blocks to destroy at level `n` (index `n - 1`) before advancing to `n + 1`.
const TO_NEXT_LEVEL: [i64; MAX_LEVEL as usize] = [40, 60, 80, 90, 100, 110, 120, 130, 140, i64::MAX];

/// What one destruction event did to the progress counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Award {
    pub points: u32,
    pub levels_gained: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub level: u32,
    pub score: u32,
    pub chain_bonus: u32,
    /// Blocks left to destroy before the next level; level-up once it goes negative.
    pub countdown: i64,
    /// Blocks currently on the field (pieces spawned minus blocks destroyed).
    pub live_blocks: u32,
    pub fall_delay_ms: u64,
    /// Last level on which a destroyer piece spawned (0 = none yet).
    pub destroyer_level: u32,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    pub fn new() -> Self {
        Self {
            level: 1,
            score: 0,
            chain_bonus: 0,
            countdown: threshold(1),
            live_blocks: 0,
            fall_delay_ms: FALL_DELAY_INITIAL,
            destroyer_level: 0,
        }
    }

    /// Scores `count` destroyed blocks and advances levels as the countdown runs out.
    pub fn apply_destruction(&mut self, count: u32) -> Award {
        let points = count * (self.level + self.chain_bonus);
        self.score = self.score.saturating_add(points);
        self.countdown -= i64::from(count);
        self.live_blocks = self.live_blocks.saturating_sub(count);

        let mut levels_gained = 0;
        while self.countdown < 0 && self.level < MAX_LEVEL {
            self.level += 1;
            self.fall_delay_ms = self.fall_delay_ms.saturating_sub(DELAY_DECREASE);
            self.countdown = self.countdown.saturating_add(threshold(self.level));
            levels_gained += 1;
            log::info!("level up: {} (fall delay {} ms)", self.level, self.fall_delay_ms);
        }
        Award {
            points,
            levels_gained,
        }
    }

    /// A new piece starts falling: chain reactions start over.
    pub fn reset_chain(&mut self) {
        self.chain_bonus = 0;
    }

    /// A gravity pass settled; the next destruction counts as a chain step.
    pub fn bump_chain(&mut self) {
        self.chain_bonus = (self.chain_bonus + 1).min(SCOREBONUS_MAX);
    }
}

/// Blocks needed to leave `level`; level 10 is never left.
fn threshold(level: u32) -> i64 {
    TO_NEXT_LEVEL[(level.clamp(1, MAX_LEVEL) - 1) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_progress() {
        let p = Progress::new();
        assert_eq!(p.level, 1);
        assert_eq!(p.score, 0);
        assert_eq!(p.countdown, 40);
        assert_eq!(p.fall_delay_ms, 355);
    }

    #[test]
    fn test_score_uses_level_plus_chain_bonus() {
        let mut p = Progress::new();
        p.live_blocks = 20;
        assert_eq!(p.apply_destruction(3).points, 3);
        p.bump_chain();
        p.bump_chain();
        let before = p.score;
        assert_eq!(p.apply_destruction(4).points, 12);
        assert_eq!(p.score, before + 12);
        assert_eq!(p.live_blocks, 13);
        assert_eq!(p.countdown, 33);
    }

    #[test]
    fn test_repeated_calls_apply_once_each() {
        let mut p = Progress::new();
        p.apply_destruction(3);
        p.apply_destruction(3);
        assert_eq!(p.score, 6);
        assert_eq!(p.countdown, 34);
    }

    #[test]
    fn test_chain_bonus_caps_and_resets() {
        let mut p = Progress::new();
        for _ in 0..10 {
            p.bump_chain();
        }
        assert_eq!(p.chain_bonus, SCOREBONUS_MAX);
        p.reset_chain();
        assert_eq!(p.chain_bonus, 0);
    }

    #[test]
    fn test_level_up_when_countdown_goes_negative() {
        let mut p = Progress::new();
        assert_eq!(p.apply_destruction(40).levels_gained, 0);
        assert_eq!(p.level, 1);
        assert_eq!(p.countdown, 0);

        let award = p.apply_destruction(1);
        assert_eq!(award.levels_gained, 1);
        assert_eq!(p.level, 2);
        assert_eq!(p.fall_delay_ms, 355 - 31);
        assert_eq!(p.countdown, 59);
    }

    #[test]
    fn test_big_clear_can_skip_levels() {
        let mut p = Progress::new();
        let award = p.apply_destruction(150);
        assert_eq!(award.levels_gained, 2);
        assert_eq!(p.level, 3);
        assert_eq!(p.countdown, 40 + 60 + 80 - 150);
    }

    #[test]
    fn test_fall_delay_positive_through_level_ten() {
        let mut p = Progress::new();
        for _ in 0..200 {
            p.apply_destruction(50);
        }
        assert_eq!(p.level, MAX_LEVEL);
        assert_eq!(p.fall_delay_ms, 355 - 9 * 31);
        assert!(p.fall_delay_ms > 0);
    }
}
