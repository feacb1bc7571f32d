//! # Sieve: Modular Impossibility Test for (A, B) Pairs
//!
//! A pair survives iff for every sieve prime p,
//! (A^x mod p + B^y mod p) mod p is a z-th power residue mod p. Failing a
//! single prime proves A^x + B^y ≠ C^z for every integer C, so survivors are
//! the only pairs that need exact verification.
//!
//! Two evaluation strategies share the same tables and must agree exactly:
//!
//! - **Scalar** (`survives`): one pair, primes in table order, first miss
//!   returns.
//! - **Batch** (`filter_lanes`): eight contiguous B values against one A,
//!   tracked in an 8-bit alive mask. Each prime touches only lanes still
//!   alive and reads them from the prime-major B table, so every lane fetch
//!   is contiguous. The batch returns as soon as the mask is empty.
//!
//! The gcd prefilter lives here too: `coprime_lanes` builds the initial alive
//! mask so pairs with a common factor never reach the residue test.

use crate::precompute::ResidueTables;
use crate::{NUM_SIEVE_PRIMES, SIEVE_PRIMES};

/// B values evaluated per batch call.
pub const LANES: u64 = 8;

/// Binary (Stein) greatest common divisor. gcd(a, 0) = a, gcd(0, b) = b.
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    if a == 0 {
        return b;
    }
    if b == 0 {
        return a;
    }
    let shift = (a | b).trailing_zeros();
    a >>= a.trailing_zeros();
    loop {
        b >>= b.trailing_zeros();
        if a > b {
            std::mem::swap(&mut a, &mut b);
        }
        b -= a;
        if b == 0 {
            break;
        }
    }
    a << shift
}

/// Scalar survival test for a single pair. Requires A ≤ A_max, B ≤ B_max.
#[inline]
pub fn survives(tables: &ResidueTables, a: u64, b: u64) -> bool {
    let ax = tables.ax_row(a);
    for i in 0..NUM_SIEVE_PRIMES {
        let p = SIEVE_PRIMES[i] as u32;
        let mut sum = ax[i] as u32 + tables.by_row(i)[b as usize] as u32;
        if sum >= p {
            sum -= p;
        }
        if !tables.mask(i).contains(sum) {
            return false;
        }
    }
    true
}

/// Batch survival test for B in [b_start, b_start + 8).
///
/// Bit `l` of `alive` marks lane B = b_start + l as a candidate on entry;
/// bit `l` of the result is set iff that lane was alive and survives every
/// prime. Lanes past `B_max` are always cleared.
#[inline]
pub fn filter_lanes(tables: &ResidueTables, a: u64, b_start: u64, mut alive: u8) -> u8 {
    let b_max = tables.b_max();
    if b_start > b_max {
        return 0;
    }
    let in_range = b_max - b_start + 1;
    if in_range < LANES {
        alive &= (1u8 << in_range) - 1;
    }

    let ax = tables.ax_row(a);
    let base = b_start as usize;
    for i in 0..NUM_SIEVE_PRIMES {
        if alive == 0 {
            break;
        }
        let p = SIEVE_PRIMES[i] as u32;
        let mask = tables.mask(i);
        let by = &tables.by_row(i)[base..];
        let mut pending = alive;
        while pending != 0 {
            let lane = pending.trailing_zeros();
            pending &= pending - 1;
            let mut sum = ax[i] as u32 + by[lane as usize] as u32;
            if sum >= p {
                sum -= p;
            }
            if !mask.contains(sum) {
                alive &= !(1u8 << lane);
            }
        }
    }
    alive
}

/// All eight lanes alive on entry.
#[inline]
pub fn survivors8(tables: &ResidueTables, a: u64, b_start: u64) -> u8 {
    filter_lanes(tables, a, b_start, u8::MAX)
}

/// Lanes of [b_start, b_start + 8) ∩ [.., b_max] with gcd(A, B) = 1.
#[inline]
pub fn coprime_lanes(a: u64, b_start: u64, b_max: u64) -> u8 {
    let mut lanes = 0u8;
    for l in 0..LANES {
        let b = b_start + l;
        if b > b_max {
            break;
        }
        if gcd(a, b) == 1 {
            lanes |= 1 << l;
        }
    }
    lanes
}

/// Count coprime sieve survivors in [a_start, a_end] × [b_start, b_end].
pub fn count_survivors(
    tables: &ResidueTables,
    a_start: u64,
    a_end: u64,
    b_start: u64,
    b_end: u64,
) -> u64 {
    let mut count = 0;
    for a in a_start..=a_end {
        for b in b_start..=b_end {
            if gcd(a, b) == 1 && survives(tables, a, b) {
                count += 1;
            }
        }
    }
    count
}

/// Every coprime sieve survivor in [1, A_max] × [1, B_max], row-major.
/// The gcd test runs before the residue test.
pub fn survivor_pairs(tables: &ResidueTables) -> Vec<(u64, u64)> {
    let mut pairs = Vec::new();
    for a in 1..=tables.a_max() {
        for b in 1..=tables.b_max() {
            if gcd(a, b) > 1 {
                continue;
            }
            if survives(tables, a, b) {
                pairs.push((a, b));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    //! # Sieve Tests
    //!
    //! - **gcd**: known table from the self-validation suite plus edge cases
    //!   with zero and powers of two (the shift path of Stein's algorithm).
    //! - **Scalar vs batch**: exhaustive agreement over small rectangles, at
    //!   every lane offset, including partial final batches.
    //! - **Lane masks**: lanes past B_max never survive, dead lanes on entry
    //!   stay dead.
    //! - **Soundness**: pairs that really satisfy A^x + B^y = C^z are never
    //!   eliminated.

    use super::*;
    use crate::precompute::{pow_mod, ResidueTables};
    use crate::Signature;

    // ── GCD ─────────────────────────────────────────────────────────

    #[test]
    fn gcd_known_values() {
        let cases = [(12, 8, 4), (17, 13, 1), (100, 25, 25), (0, 5, 5), (7, 0, 7), (1, 1, 1)];
        for (a, b, expected) in cases {
            assert_eq!(gcd(a, b), expected, "gcd({}, {})", a, b);
        }
    }

    #[test]
    fn gcd_zero_and_powers_of_two() {
        assert_eq!(gcd(0, 0), 0);
        assert_eq!(gcd(1 << 40, 1 << 12), 1 << 12);
        assert_eq!(gcd(96, 64), 32);
        assert_eq!(gcd(u64::MAX, u64::MAX), u64::MAX);
        assert_eq!(gcd(2 * 3 * 5 * 7, 3 * 7 * 11), 21);
    }

    /// Cross-check against the Euclidean algorithm.
    #[test]
    fn gcd_matches_euclid() {
        fn euclid(mut a: u64, mut b: u64) -> u64 {
            while b != 0 {
                let t = b;
                b = a % b;
                a = t;
            }
            a
        }
        for a in 0..200u64 {
            for b in 0..200u64 {
                assert_eq!(gcd(a, b), euclid(a, b), "gcd({}, {})", a, b);
            }
        }
    }

    // ── Scalar vs Batch ─────────────────────────────────────────────

    #[test]
    fn batch_agrees_with_scalar_everywhere() {
        for sig in [Signature::new(3, 3, 3), Signature::new(3, 4, 5), Signature::new(5, 7, 4)] {
            let t = ResidueTables::build(sig, 60, 61).unwrap();
            for a in 0..=60u64 {
                // every alignment of the 8-lane window
                for b_start in 0..=61u64 {
                    let mask = survivors8(&t, a, b_start);
                    for l in 0..LANES {
                        let b = b_start + l;
                        let expected = b <= 61 && survives(&t, a, b);
                        assert_eq!(
                            mask & (1 << l) != 0,
                            expected,
                            "sig={} A={} B={}",
                            sig,
                            a,
                            b
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn lanes_past_b_max_are_dead() {
        let t = ResidueTables::build(Signature::new(3, 3, 3), 10, 10).unwrap();
        // B = 8, 9, 10 in range; lanes 3..8 are past B_max
        let mask = survivors8(&t, 1, 8);
        assert_eq!(mask & 0b1111_1000, 0);
        assert_eq!(survivors8(&t, 1, 11), 0);
    }

    #[test]
    fn dead_lanes_stay_dead() {
        let t = ResidueTables::build(Signature::new(3, 4, 5), 40, 40).unwrap();
        for a in 1..=40u64 {
            let full = survivors8(&t, a, 1);
            let partial = filter_lanes(&t, a, 1, 0b0101_0101);
            assert_eq!(partial, full & 0b0101_0101);
            assert_eq!(filter_lanes(&t, a, 1, 0), 0);
        }
    }

    #[test]
    fn coprime_lanes_match_gcd() {
        let lanes = coprime_lanes(6, 1, 100);
        // B = 1..=8: coprime to 6 are 1, 5, 7
        assert_eq!(lanes, 0b0101_0001);
        assert_eq!(coprime_lanes(6, 5, 6), 0b01);
    }

    // ── Soundness ───────────────────────────────────────────────────

    /// Pairs from known equations are never eliminated.
    #[test]
    fn true_equations_survive() {
        // 2^6 + 2^6 = 128 = 2^7
        let t = ResidueTables::build(Signature::new(6, 6, 7), 4, 4).unwrap();
        assert!(survives(&t, 2, 2));
        // 3^3 + 6^3 = 27 + 216 = 243 = 3^5
        let t = ResidueTables::build(Signature::new(3, 3, 5), 10, 10).unwrap();
        assert!(survives(&t, 3, 6));
        assert!(survivors8(&t, 3, 6) & 1 == 1);
        // 7^3 + 7^4 = 343 + 2401 = 2744 = 14^3
        let t = ResidueTables::build(Signature::new(3, 4, 3), 10, 10).unwrap();
        assert!(survives(&t, 7, 7));
    }

    /// Eliminated pairs really fail mod the offending prime.
    #[test]
    fn eliminations_are_justified() {
        let sig = Signature::new(3, 4, 5);
        let t = ResidueTables::build(sig, 30, 30).unwrap();
        for a in 1..=30u64 {
            for b in 1..=30u64 {
                if survives(&t, a, b) {
                    continue;
                }
                let witnessed = SIEVE_PRIMES.iter().any(|&p| {
                    let p = p as u64;
                    let s = (pow_mod(a, 3, p) + pow_mod(b, 4, p)) % p;
                    !(0..p).any(|c| pow_mod(c, 5, p) == s)
                });
                assert!(witnessed, "A={} B={} eliminated without a witness prime", a, b);
            }
        }
    }

    // ── Counting & Export ───────────────────────────────────────────

    #[test]
    fn count_matches_exported_pairs() {
        let t = ResidueTables::build(Signature::new(3, 4, 5), 100, 100).unwrap();
        let pairs = survivor_pairs(&t);
        assert_eq!(pairs.len() as u64, count_survivors(&t, 1, 100, 1, 100));
        assert!(pairs.iter().all(|&(a, b)| gcd(a, b) == 1));
    }
}
