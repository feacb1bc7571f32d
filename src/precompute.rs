//! # Precompute: Residue Masks and Modular Power Tables
//!
//! Builds the read-only data the sieve consults in its hot loop. Everything
//! here is a pure function of (x, y, z, A_max, B_max) and is computed once per
//! run before any worker starts.
//!
//! ## Residue Masks
//!
//! For each sieve prime p, the mask holds the image of r ↦ r^z mod p over
//! Z/pZ, i.e. every residue a z-th power can take mod p. If A^x + B^y = C^z
//! then (A^x + B^y) mod p must be in that image, so a single miss proves the
//! pair impossible. Masks are 128-bit sets; the largest prime is 71.
//!
//! ## Power Tables
//!
//! | Table | Layout | Access pattern |
//! |-------|--------|----------------|
//! | `ax_mod` | A-major: `[A][prime]` | one A fixed, sweep all primes |
//! | `by_mod` | prime-major: `[prime][B]` | one prime fixed, sweep 8 contiguous B |
//!
//! Both tables are filled from per-prime cycles: r^e mod p depends only on
//! r mod p, so each prime needs p exponentiations, not A_max + 1.
//!
//! ## Memory
//!
//! 20 · (A_max + 1) + 20 · (B_max + 1) bytes. Allocation goes through
//! `try_reserve_exact`; failure is reported as an error, never an abort.

use anyhow::{anyhow, Result};

use crate::{Signature, NUM_SIEVE_PRIMES, SIEVE_PRIMES};

/// Modular exponentiation: base^exp mod modulus.
/// Uses u128 intermediates to avoid overflow for moduli up to ~2^63.
pub fn pow_mod(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    if modulus == 1 {
        return 0;
    }
    let mut result: u64 = 1;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            result = (result as u128 * base as u128 % modulus as u128) as u64;
        }
        exp >>= 1;
        base = (base as u128 * base as u128 % modulus as u128) as u64;
    }
    result
}

/// Set of residues in [0, 128), stored as one `u128`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResidueMask(u128);

impl ResidueMask {
    pub const EMPTY: ResidueMask = ResidueMask(0);

    /// The z-th power residues mod p: { r^z mod p : r in [0, p) }.
    pub fn of_powers(p: u32, z: u32) -> Self {
        debug_assert!(p >= 2 && p < 128, "residue mask holds primes below 128");
        let mut mask = ResidueMask::EMPTY;
        for r in 0..p {
            mask.insert(pow_mod(r as u64, z as u64, p as u64) as u32);
        }
        mask
    }

    pub fn from_residues(residues: &[u32]) -> Self {
        let mut mask = ResidueMask::EMPTY;
        for &r in residues {
            mask.insert(r);
        }
        mask
    }

    #[inline]
    pub fn contains(&self, residue: u32) -> bool {
        residue < 128 && (self.0 >> residue) & 1 == 1
    }

    #[inline]
    pub fn insert(&mut self, residue: u32) {
        debug_assert!(residue < 128);
        self.0 |= 1u128 << residue;
    }

    pub fn len(&self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u128 {
        self.0
    }

    /// Residues in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let tz = bits.trailing_zeros();
            bits &= bits - 1;
            Some(tz)
        })
    }
}

/// Convert an inclusive upper bound into a table length.
fn table_len(max: u64, what: &str) -> Result<usize> {
    usize::try_from(max)
        .ok()
        .and_then(|m| m.checked_add(1))
        .ok_or_else(|| anyhow!("failed to allocate {} table: bound {} exceeds address space", what, max))
}

/// e-th powers of every residue mod p, indexed by residue.
fn power_cycle(p: u8, e: u32) -> Vec<u8> {
    (0..p as u64)
        .map(|r| pow_mod(r, e as u64, p as u64) as u8)
        .collect()
}

/// Precomputed residue data for one signature and one search rectangle.
///
/// Immutable after `build`; shared by reference across all workers.
pub struct ResidueTables {
    signature: Signature,
    a_max: u64,
    b_max: u64,
    masks: [ResidueMask; NUM_SIEVE_PRIMES],
    ax_mod: Vec<[u8; NUM_SIEVE_PRIMES]>,
    by_mod: Vec<u8>,
    stride: usize,
}

impl ResidueTables {
    /// Build masks and both power tables for A in [0, a_max], B in [0, b_max].
    pub fn build(signature: Signature, a_max: u64, b_max: u64) -> Result<Self> {
        let a_len = table_len(a_max, "A^x residue")?;
        let stride = table_len(b_max, "B^y residue")?;
        let b_total = stride
            .checked_mul(NUM_SIEVE_PRIMES)
            .ok_or_else(|| anyhow!("failed to allocate B^y residue table: {} entries overflow", stride))?;

        let mut masks = [ResidueMask::EMPTY; NUM_SIEVE_PRIMES];
        for (mask, &p) in masks.iter_mut().zip(SIEVE_PRIMES.iter()) {
            *mask = ResidueMask::of_powers(p as u32, signature.z);
        }

        let mut ax_mod: Vec<[u8; NUM_SIEVE_PRIMES]> = Vec::new();
        ax_mod.try_reserve_exact(a_len).map_err(|e| {
            anyhow!("failed to allocate A^x residue table ({} rows): {}", a_len, e)
        })?;
        let mut by_mod: Vec<u8> = Vec::new();
        by_mod.try_reserve_exact(b_total).map_err(|e| {
            anyhow!("failed to allocate B^y residue table ({} bytes): {}", b_total, e)
        })?;

        let x_cycles: Vec<Vec<u8>> = SIEVE_PRIMES.iter().map(|&p| power_cycle(p, signature.x)).collect();
        for a in 0..a_len {
            let mut row = [0u8; NUM_SIEVE_PRIMES];
            for (i, &p) in SIEVE_PRIMES.iter().enumerate() {
                row[i] = x_cycles[i][a % p as usize];
            }
            ax_mod.push(row);
        }

        for &p in SIEVE_PRIMES.iter() {
            let cycle = power_cycle(p, signature.y);
            by_mod.extend((0..stride).map(|b| cycle[b % p as usize]));
        }

        Ok(ResidueTables {
            signature,
            a_max,
            b_max,
            masks,
            ax_mod,
            by_mod,
            stride,
        })
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    pub fn a_max(&self) -> u64 {
        self.a_max
    }

    pub fn b_max(&self) -> u64 {
        self.b_max
    }

    #[inline]
    pub fn mask(&self, prime_idx: usize) -> ResidueMask {
        self.masks[prime_idx]
    }

    pub fn masks(&self) -> &[ResidueMask; NUM_SIEVE_PRIMES] {
        &self.masks
    }

    /// A^x mod p for every sieve prime. Panics if `a > a_max`.
    #[inline]
    pub fn ax_row(&self, a: u64) -> &[u8; NUM_SIEVE_PRIMES] {
        &self.ax_mod[a as usize]
    }

    /// B^y mod p for all B in [0, b_max], for one prime.
    #[inline]
    pub fn by_row(&self, prime_idx: usize) -> &[u8] {
        let start = prime_idx * self.stride;
        &self.by_mod[start..start + self.stride]
    }

    /// Bytes held by the two power tables.
    pub fn table_bytes(&self) -> usize {
        self.ax_mod.len() * NUM_SIEVE_PRIMES + self.by_mod.len()
    }
}

#[cfg(test)]
mod tests {
    //! Tests for residue masks, modular exponentiation, and the dual-layout
    //! power tables. Mask values are checked against hand-computed power
    //! residue sets; tables are checked entry-by-entry against `pow_mod`.

    use super::*;

    // ── Modular Exponentiation ──────────────────────────────────────

    /// 2^10 mod 1000 = 24, 3^4 mod 7 = 4, 5^3 mod 13 = 8.
    #[test]
    fn pow_mod_known_values() {
        assert_eq!(pow_mod(2, 10, 1000), 24);
        assert_eq!(pow_mod(3, 4, 7), 4);
        assert_eq!(pow_mod(5, 3, 13), 8);
    }

    /// exp = 0 yields 1 for every modulus > 1; bases ≥ modulus reduce first.
    #[test]
    fn pow_mod_edge_cases() {
        assert_eq!(pow_mod(5, 0, 7), 1);
        assert_eq!(pow_mod(0, 0, 7), 1);
        assert_eq!(pow_mod(0, 5, 7), 0);
        assert_eq!(pow_mod(72, 3, 71), 1);
        assert_eq!(pow_mod(10, 3, 7), pow_mod(3, 3, 7));
    }

    // ── Residue Masks ───────────────────────────────────────────────

    /// Cubes mod 7 are {0, 1, 6}.
    #[test]
    fn cubes_mod_7() {
        let mask = ResidueMask::of_powers(7, 3);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 1, 6]);
        assert_eq!(mask, ResidueMask::from_residues(&[0, 1, 6]));
    }

    /// Fifth powers mod 11 are {0, 1, 10}.
    #[test]
    fn fifth_powers_mod_11() {
        let mask = ResidueMask::of_powers(11, 5);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 1, 10]);
    }

    /// 70^3 ≡ -1 ≡ 70 (mod 71): bit 70 lives past the first 64 bits.
    #[test]
    fn mask_holds_residues_above_64() {
        let mask = ResidueMask::of_powers(71, 3);
        assert!(mask.contains(70));
        assert!(mask.bits() >> 64 != 0);
    }

    /// When gcd(z, p-1) = 1 the power map is a bijection and every residue
    /// is attainable.
    #[test]
    fn coprime_exponent_covers_everything() {
        // gcd(3, 10) = 1
        let mask = ResidueMask::of_powers(11, 3);
        assert_eq!(mask.len(), 11);
    }

    /// The mask is exactly the image of the power map for every sieve prime.
    #[test]
    fn mask_is_image_of_power_map() {
        for z in 3..=8u32 {
            for &p in SIEVE_PRIMES.iter() {
                let p = p as u32;
                let mask = ResidueMask::of_powers(p, z);
                for r in 0..p {
                    let attained = (0..p).any(|s| pow_mod(s as u64, z as u64, p as u64) == r as u64);
                    assert_eq!(mask.contains(r), attained, "p={} z={} r={}", p, z, r);
                }
                assert!(!mask.contains(p), "no residue ≥ p");
            }
        }
    }

    #[test]
    fn contains_rejects_out_of_range() {
        let mask = ResidueMask::from_residues(&[0, 127]);
        assert!(mask.contains(127));
        assert!(!mask.contains(128));
        assert!(!mask.contains(500));
    }

    // ── Power Tables ────────────────────────────────────────────────

    /// Every entry of both layouts equals a direct `pow_mod`.
    #[test]
    fn tables_match_direct_pow_mod() {
        let sig = Signature::new(3, 4, 5);
        let t = ResidueTables::build(sig, 150, 90).unwrap();
        for a in 0..=150u64 {
            for (i, &p) in SIEVE_PRIMES.iter().enumerate() {
                assert_eq!(t.ax_row(a)[i] as u64, pow_mod(a, 3, p as u64), "A={} p={}", a, p);
            }
        }
        for (i, &p) in SIEVE_PRIMES.iter().enumerate() {
            let row = t.by_row(i);
            assert_eq!(row.len(), 91);
            for b in 0..=90u64 {
                assert_eq!(row[b as usize] as u64, pow_mod(b, 4, p as u64), "B={} p={}", b, p);
            }
        }
    }

    #[test]
    fn tables_record_shape() {
        let sig = Signature::new(4, 5, 6);
        let t = ResidueTables::build(sig, 10, 20).unwrap();
        assert_eq!(t.signature(), sig);
        assert_eq!(t.a_max(), 10);
        assert_eq!(t.b_max(), 20);
        assert_eq!(t.table_bytes(), 11 * 20 + 21 * 20);
        for (i, &p) in SIEVE_PRIMES.iter().enumerate() {
            assert_eq!(t.mask(i), ResidueMask::of_powers(p as u32, 6));
        }
    }

    /// A bound whose table length overflows is an allocation error, not a panic.
    #[test]
    fn impossible_bounds_fail_cleanly() {
        let sig = Signature::new(3, 3, 3);
        let err = ResidueTables::build(sig, u64::MAX, 10).err().unwrap();
        assert!(err.to_string().contains("failed to allocate"), "{}", err);

        let huge = (usize::MAX / 4) as u64;
        let err = ResidueTables::build(sig, 10, huge).err().unwrap();
        assert!(err.to_string().contains("failed to allocate"), "{}", err);
    }
}
