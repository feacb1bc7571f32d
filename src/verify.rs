//! # Verify: Exact Check of Sieve Survivors
//!
//! Sieve survivors are checked with GMP-backed `rug::Integer` arithmetic so no
//! rounding can turn a near miss into a hit or hide a real one. The procedure:
//!
//! 1. S = A^x + B^y, computed exactly.
//! 2. r = ⌊S^(1/z)⌋ via GMP's integer root.
//! 3. S is a perfect z-th power iff r^z == S.
//! 4. A hit requires 1 ≤ r ≤ C_max; the hit carries gcd(A, gcd(B, C)).
//!
//! `verify_equation` is the independent re-check used by self-tests and the
//! `verify` subcommand. It recomputes both sides at full precision and never
//! consults the sieve or the root extraction above.

use rug::ops::Pow;
use rug::Integer;
use serde::Serialize;

use crate::sieve::gcd;
use crate::Signature;

/// A confirmed power match: A^x + B^y = C^z.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerMatch {
    pub c: u64,
    pub gcd: u64,
}

/// A^x + B^y as an exact integer.
pub fn power_sum(a: u64, b: u64, signature: Signature) -> Integer {
    Integer::from(a).pow(signature.x) + Integer::from(b).pow(signature.y)
}

/// The exact z-th root of `n`, if `n` is a perfect z-th power.
pub fn exact_root(n: &Integer, z: u32) -> Option<Integer> {
    if z == 0 || *n < 0 {
        return None;
    }
    let root = n.clone().root(z);
    if root.clone().pow(z) == *n {
        Some(root)
    } else {
        None
    }
}

/// Check whether A^x + B^y = C^z for some integer C with 1 ≤ C ≤ C_max.
///
/// Returns the root and gcd(A, B, C) on a match. A non-match is a normal
/// negative result.
pub fn check_power_hit(a: u64, b: u64, signature: Signature, c_max: u64) -> Option<PowerMatch> {
    let sum = power_sum(a, b, signature);
    let root = exact_root(&sum, signature.z)?;
    let c = root.to_u64()?;
    if c == 0 || c > c_max {
        return None;
    }
    Some(PowerMatch {
        c,
        gcd: gcd(a, gcd(b, c)),
    })
}

/// Independently verify a claimed solution: A^x + B^y == C^z exactly.
pub fn verify_equation(a: u64, b: u64, c: u64, signature: Signature) -> bool {
    let lhs = power_sum(a, b, signature);
    let rhs = Integer::from(c).pow(signature.z);
    lhs == rhs
}

/// Outcome of re-checking a claimed (A, B, C, x, y, z).
#[derive(Debug, Clone, Serialize)]
pub struct ClaimCheck {
    pub a: u64,
    pub b: u64,
    pub c: u64,
    pub signature: [u32; 3],
    pub holds: bool,
    pub gcd: u64,
    pub primitive: bool,
    /// Decimal digits of A^x + B^y.
    pub digits: u64,
}

/// Full report for the `verify` subcommand.
pub fn check_claim(a: u64, b: u64, c: u64, signature: Signature) -> ClaimCheck {
    let holds = verify_equation(a, b, c, signature);
    let g = gcd(a, gcd(b, c));
    let digits = power_sum(a, b, signature).to_string_radix(10).len() as u64;
    ClaimCheck {
        a,
        b,
        c,
        signature: signature.as_array(),
        holds,
        gcd: g,
        primitive: holds && g == 1,
        digits,
    }
}
