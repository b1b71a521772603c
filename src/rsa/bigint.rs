// RSA Big Integer Operations
// Wrapper around num-bigint for the software provider's RSA arithmetic

use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use rand::thread_rng;

/// RSA Big Integer type alias
pub type RsaBigInt = BigUint;

/// Odd primes below 200, used to discard most candidates before Miller-Rabin
const SMALL_PRIMES: [u32; 45] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191, 193,
    197, 199,
];

/// Create a big integer from u64
pub fn from_u64(n: u64) -> RsaBigInt {
    RsaBigInt::from(n)
}

/// Create a big integer from bytes (big-endian)
pub fn from_bytes(bytes: &[u8]) -> RsaBigInt {
    RsaBigInt::from_bytes_be(bytes)
}

/// Write `n` big-endian into `out`, left-padded with zeros.
/// Returns false if `n` does not fit.
pub fn write_be_padded(n: &RsaBigInt, out: &mut [u8]) -> bool {
    let bytes = n.to_bytes_be();
    let bytes: &[u8] = if n.is_zero() { &[] } else { &bytes };
    if bytes.len() > out.len() {
        return false;
    }
    let start = out.len() - bytes.len();
    out[..start].fill(0);
    out[start..].copy_from_slice(bytes);
    true
}

/// Modular exponentiation: base^exp mod modulus
pub fn mod_pow(base: &RsaBigInt, exp: &RsaBigInt, modulus: &RsaBigInt) -> RsaBigInt {
    if modulus.is_one() {
        return RsaBigInt::zero();
    }
    base.modpow(exp, modulus)
}

/// Extended Euclidean Algorithm over signed integers
/// Returns (gcd, x, y) such that a*x + b*y = gcd
fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());

    while !r.is_zero() {
        let q = &old_r / &r;
        let next_r = &old_r - &q * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &q * &s;
        old_s = std::mem::replace(&mut s, next_s);
        let next_t = &old_t - &q * &t;
        old_t = std::mem::replace(&mut t, next_t);
    }

    (old_r, old_s, old_t)
}

/// Compute modular inverse: a^(-1) mod m
/// Returns None if inverse doesn't exist
pub fn mod_inverse(a: &RsaBigInt, m: &RsaBigInt) -> Option<RsaBigInt> {
    if m.is_zero() {
        return None;
    }
    let a = BigInt::from_biguint(Sign::Plus, a.clone());
    let m = BigInt::from_biguint(Sign::Plus, m.clone());
    let (gcd, x, _) = extended_gcd(&a, &m);

    if !gcd.is_one() {
        return None;
    }

    let mut result = x % &m;
    if result.is_negative() {
        result += &m;
    }
    result.to_biguint()
}

/// Miller-Rabin primality test
/// Returns true if n is probably prime
pub fn is_probable_prime(n: &RsaBigInt, iterations: u32) -> bool {
    let two = RsaBigInt::from(2u8);
    if n < &two {
        return false;
    }
    if n == &two || n == &RsaBigInt::from(3u8) {
        return true;
    }
    if n.is_even() {
        return false;
    }
    for &p in SMALL_PRIMES.iter() {
        let p = RsaBigInt::from(p);
        if n == &p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }

    // Write n-1 as d * 2^s with d odd
    let n_minus_one = n - 1u8;
    let mut d = n_minus_one.clone();
    let mut s = 0u32;
    while d.is_even() {
        d >>= 1;
        s += 1;
    }

    let mut rng = thread_rng();
    let n_minus_two = n - &two;

    'witness: for _ in 0..iterations {
        // Pick random witness a in [2, n-2]
        let a = rng.gen_biguint_range(&two, &n_minus_two);
        let mut x = mod_pow(&a, &d, n);

        if x.is_one() || x == n_minus_one {
            continue;
        }

        for _ in 1..s {
            x = mod_pow(&x, &two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }

        // Composite
        return false;
    }

    true
}

/// Generate a random prime of exactly `bit_length` bits with the top two bits set,
/// so the product of two such primes has exactly twice the bit length
pub fn random_prime(bit_length: u32) -> RsaBigInt {
    let mut rng = thread_rng();
    let top_two = RsaBigInt::from(3u8) << (bit_length - 2);

    loop {
        let mut candidate = rng.gen_biguint(u64::from(bit_length));
        candidate |= &top_two;
        candidate |= RsaBigInt::one();

        if is_probable_prime(&candidate, 20) {
            return candidate;
        }
    }
}

/// Greatest common divisor
pub fn gcd(a: &RsaBigInt, b: &RsaBigInt) -> RsaBigInt {
    a.gcd(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mod_pow() {
        // 3^5 mod 7 = 243 mod 7 = 5
        let result = mod_pow(&from_u64(3), &from_u64(5), &from_u64(7));
        assert_eq!(result, from_u64(5));
    }

    #[test]
    fn test_mod_inverse() {
        // 3 * 5 = 15 ≡ 1 mod 7
        let inv = mod_inverse(&from_u64(3), &from_u64(7)).unwrap();
        assert_eq!(inv, from_u64(5));

        // phi(61 * 53) = 3120
        let inv = mod_inverse(&from_u64(17), &from_u64(3120)).unwrap();
        assert_eq!((from_u64(17) * inv) % from_u64(3120), from_u64(1));
    }

    #[test]
    fn test_mod_inverse_missing() {
        assert!(mod_inverse(&from_u64(6), &from_u64(9)).is_none());
    }

    #[test]
    fn test_is_probable_prime() {
        assert!(is_probable_prime(&from_u64(2), 5));
        assert!(is_probable_prime(&from_u64(3), 5));
        assert!(is_probable_prime(&from_u64(7), 5));
        assert!(is_probable_prime(&from_u64(199), 5));
        assert!(is_probable_prime(&from_u64(1_000_000_007), 5));
        assert!(!is_probable_prime(&from_u64(4), 5));
        assert!(!is_probable_prime(&from_u64(9), 5));
        // Carmichael number
        assert!(!is_probable_prime(&from_u64(561), 5));
    }

    #[test]
    fn test_random_prime_bit_length() {
        let p = random_prime(128);
        assert_eq!(p.bits(), 128);
        assert!(is_probable_prime(&p, 10));
    }

    #[test]
    fn test_write_be_padded() {
        let mut out = [0xFFu8; 4];
        assert!(write_be_padded(&from_u64(0x0102), &mut out));
        assert_eq!(out, [0x00, 0x00, 0x01, 0x02]);

        let mut small = [0u8; 1];
        assert!(!write_be_padded(&from_u64(0x0102), &mut small));
    }
}
