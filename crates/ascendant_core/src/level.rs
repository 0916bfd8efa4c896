//! crates/ascendant_core/src/level.rs
//!
//! The level curve: pure functions mapping accumulated XP to levels and back.

/// XP scale factor of the curve. Level `L` begins at `(L - 1)^2 * XP_SCALE`.
pub const XP_SCALE: u64 = 50;

/// Upper bound on accumulated XP. Larger values are clamped by the store, which
/// keeps every signed XP delta representable as `i64`.
pub const MAX_XP: u64 = 1_000_000_000_000;

/// Returns the level reached with `xp` accumulated experience.
///
/// `floor(sqrt(xp / 50)) + 1`, computed without floating point.
pub fn level_for_xp(xp: u64) -> u32 {
    isqrt(xp / XP_SCALE) as u32 + 1
}

/// Returns the XP value at which `level_for_xp` first returns `level`.
pub fn xp_threshold_for_level(level: u32) -> u64 {
    let steps = u64::from(level.saturating_sub(1));
    steps.saturating_mul(steps).saturating_mul(XP_SCALE)
}

/// XP still missing before the next level is reached.
pub fn xp_to_next_level(xp: u64) -> u64 {
    xp_threshold_for_level(level_for_xp(xp).saturating_add(1)).saturating_sub(xp)
}

/// Progress within the current level as `(xp earned into the level, level span)`.
pub fn level_progress(xp: u64) -> (u64, u64) {
    let level = level_for_xp(xp);
    let floor = xp_threshold_for_level(level);
    let ceiling = xp_threshold_for_level(level.saturating_add(1));
    (xp.saturating_sub(floor), ceiling.saturating_sub(floor))
}

/// The rank title shown for a level.
pub fn title_for_level(level: u32) -> &'static str {
    match level {
        0..=4 => "E-Rank Hunter",
        5..=9 => "D-Rank Hunter",
        10..=14 => "C-Rank Hunter",
        15..=19 => "B-Rank Hunter",
        20..=29 => "A-Rank Hunter",
        _ => "S-Rank Hunter",
    }
}

/// Largest `k` with `k * k <= n`.
fn isqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    // Float estimate, then correct the rounding error in either direction.
    let mut k = (n as f64).sqrt() as u64;
    while k.checked_mul(k).map_or(true, |sq| sq > n) {
        k -= 1;
    }
    while (k + 1).checked_mul(k + 1).map_or(false, |sq| sq <= n) {
        k += 1;
    }
    k
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn level_one_at_zero_xp() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(49), 1);
        assert_eq!(level_for_xp(50), 2);
        assert_eq!(level_for_xp(199), 2);
        assert_eq!(level_for_xp(200), 3);
    }

    #[test]
    fn thresholds_match_curve() {
        assert_eq!(xp_threshold_for_level(1), 0);
        assert_eq!(xp_threshold_for_level(2), 50);
        assert_eq!(xp_threshold_for_level(3), 200);
        assert_eq!(xp_threshold_for_level(11), 5000);
        for level in 1..200 {
            assert_eq!(level_for_xp(xp_threshold_for_level(level)), level);
            assert_eq!(level_for_xp(xp_threshold_for_level(level + 1) - 1), level);
        }
    }

    #[test]
    fn next_level_and_progress() {
        assert_eq!(xp_to_next_level(0), 50);
        assert_eq!(xp_to_next_level(120), 80);
        assert_eq!(level_progress(120), (70, 150));
    }

    #[test]
    fn titles_follow_rank_bands() {
        assert_eq!(title_for_level(1), "E-Rank Hunter");
        assert_eq!(title_for_level(5), "D-Rank Hunter");
        assert_eq!(title_for_level(14), "C-Rank Hunter");
        assert_eq!(title_for_level(30), "S-Rank Hunter");
    }

    #[test]
    fn isqrt_handles_large_values() {
        assert_eq!(isqrt(u64::MAX), u32::MAX as u64);
        assert_eq!(isqrt(99), 9);
        assert_eq!(isqrt(100), 10);
    }

    #[test]
    fn extreme_xp_saturates_instead_of_overflowing() {
        let level = level_for_xp(u64::MAX);
        assert!(xp_threshold_for_level(level) <= u64::MAX);
        assert_eq!(xp_threshold_for_level(u32::MAX), u64::MAX);
        assert_eq!(xp_to_next_level(u64::MAX), 0);
        let (into, span) = level_progress(u64::MAX);
        assert!(into <= span);
        assert!(level_for_xp(MAX_XP) < level);
    }

    proptest! {
        #[test]
        fn level_is_monotonic(a in 0u64..10_000_000, b in 0u64..10_000_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(level_for_xp(lo) >= 1);
            prop_assert!(level_for_xp(lo) <= level_for_xp(hi));
        }

        #[test]
        fn threshold_never_exceeds_xp(xp in 0u64..10_000_000) {
            prop_assert!(xp_threshold_for_level(level_for_xp(xp)) <= xp);
            prop_assert!(xp < xp_threshold_for_level(level_for_xp(xp) + 1));
        }

        #[test]
        fn curve_is_total_over_u64(xp in any::<u64>()) {
            let level = level_for_xp(xp);
            prop_assert!(level >= 1);
            prop_assert!(xp_threshold_for_level(level) <= xp);
            let _ = xp_to_next_level(xp);
            let _ = level_progress(xp);
        }
    }
}
