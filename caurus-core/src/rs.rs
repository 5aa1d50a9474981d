//! Reed-Solomon coding over GF(2^8) for the barcode matrix.
//!
//! Field: primitive polynomial 0x11D, generator element 2. Code: systematic,
//! first consecutive root alpha^1 (fcr = 1). The barcode pipeline only
//! encodes; [`correct`] is the errors-only decoder (Berlekamp-Massey, Chien
//! search, Forney) used to demonstrate that a 142-byte codeword survives up
//! to 25 corrupted symbols.

const PRIMITIVE_POLY: u16 = 0x11D;
const FCR: usize = 1;

// ---------------------------------------------------------------------------
// GF(2^8) tables (compile-time)
// ---------------------------------------------------------------------------

const fn build_gf_tables() -> ([u8; 512], [u8; 256]) {
    let mut exp = [0u8; 512];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < 255 {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIMITIVE_POLY;
        }
        i += 1;
    }
    // second copy lets products index without a modulo
    while i < 512 {
        exp[i] = exp[i - 255];
        i += 1;
    }
    (exp, log)
}

const GF_TABLES: ([u8; 512], [u8; 256]) = build_gf_tables();
static GF_EXP: [u8; 512] = GF_TABLES.0;
static GF_LOG: [u8; 256] = GF_TABLES.1;

fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    GF_EXP[GF_LOG[a as usize] as usize + GF_LOG[b as usize] as usize]
}

fn gf_div(a: u8, b: u8) -> u8 {
    debug_assert!(b != 0);
    if a == 0 {
        return 0;
    }
    GF_EXP[GF_LOG[a as usize] as usize + 255 - GF_LOG[b as usize] as usize]
}

/// alpha^i.
fn gf_alpha_pow(i: usize) -> u8 {
    GF_EXP[i % 255]
}

/// x^k for a nonzero field element.
fn gf_pow(x: u8, k: usize) -> u8 {
    if k == 0 {
        return 1;
    }
    if x == 0 {
        return 0;
    }
    GF_EXP[(GF_LOG[x as usize] as usize * k) % 255]
}

/// Evaluate a polynomial with coefficients highest-order first at `x`.
fn poly_eval(poly: &[u8], x: u8) -> u8 {
    let mut acc = 0u8;
    for &coef in poly {
        acc = gf_mul(acc, x) ^ coef;
    }
    acc
}

/// Evaluate a polynomial with coefficients lowest-order first at `x`.
fn poly_eval_ascending(poly: &[u8], x: u8) -> u8 {
    let mut acc = 0u8;
    for &coef in poly.iter().rev() {
        acc = gf_mul(acc, x) ^ coef;
    }
    acc
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Generator polynomial `(x - alpha^fcr) ... (x - alpha^(fcr + nsym - 1))`,
/// coefficients highest-order first (leading coefficient 1).
fn generator_poly(nsym: usize) -> Vec<u8> {
    let mut gen = vec![1u8];
    for i in 0..nsym {
        let root = gf_alpha_pow(i + FCR);
        let mut next = vec![0u8; gen.len() + 1];
        for (j, &g) in gen.iter().enumerate() {
            next[j] ^= g;
            next[j + 1] ^= gf_mul(g, root);
        }
        gen = next;
    }
    gen
}

/// Systematically encode `data`, returning `data || nsym parity symbols`.
pub fn encode(data: &[u8], nsym: usize) -> Vec<u8> {
    let gen = generator_poly(nsym);
    let mut parity = vec![0u8; nsym];
    for &byte in data {
        let factor = byte ^ parity[0];
        parity.remove(0);
        parity.push(0);
        for (p, &g) in parity.iter_mut().zip(gen[1..].iter()) {
            *p ^= gf_mul(g, factor);
        }
    }
    let mut out = Vec::with_capacity(data.len() + nsym);
    out.extend_from_slice(data);
    out.extend_from_slice(&parity);
    out
}

/// Syndromes of `codeword`: evaluations at `alpha^fcr .. alpha^(fcr+nsym-1)`.
/// All zero iff the codeword is valid.
pub fn syndromes(codeword: &[u8], nsym: usize) -> Vec<u8> {
    (0..nsym)
        .map(|i| poly_eval(codeword, gf_alpha_pow(i + FCR)))
        .collect()
}

// ---------------------------------------------------------------------------
// Decoding (errors only)
// ---------------------------------------------------------------------------

/// Correct up to `nsym / 2` symbol errors in place. Returns the number of
/// corrected symbols, or `None` when the word is uncorrectable.
pub fn correct(codeword: &mut [u8], nsym: usize) -> Option<usize> {
    let synd = syndromes(codeword, nsym);
    if synd.iter().all(|&s| s == 0) {
        return Some(0);
    }

    // Berlekamp-Massey: error locator Lambda, coefficients lowest-order
    // first with Lambda[0] = 1.
    let mut lambda = vec![1u8];
    let mut prev = vec![1u8];
    let mut l = 0usize;
    let mut m = 1usize;
    let mut prev_delta = 1u8;
    for n in 0..nsym {
        let mut delta = synd[n];
        for i in 1..=l.min(lambda.len() - 1) {
            delta ^= gf_mul(lambda[i], synd[n - i]);
        }
        if delta == 0 {
            m += 1;
            continue;
        }
        let coef = gf_div(delta, prev_delta);
        if 2 * l <= n {
            let kept = lambda.clone();
            if lambda.len() < prev.len() + m {
                lambda.resize(prev.len() + m, 0);
            }
            for (i, &p) in prev.iter().enumerate() {
                lambda[i + m] ^= gf_mul(coef, p);
            }
            l = n + 1 - l;
            prev = kept;
            prev_delta = delta;
            m = 1;
        } else {
            if lambda.len() < prev.len() + m {
                lambda.resize(prev.len() + m, 0);
            }
            for (i, &p) in prev.iter().enumerate() {
                lambda[i + m] ^= gf_mul(coef, p);
            }
            m += 1;
        }
    }
    while lambda.last() == Some(&0) {
        lambda.pop();
    }
    let errs = lambda.len() - 1;
    if errs == 0 || 2 * errs > nsym {
        return None;
    }

    // Chien search: an error at power j (array index n-1-j) makes
    // Lambda(alpha^-j) vanish.
    let total = codeword.len();
    let mut positions = Vec::with_capacity(errs);
    for j in 0..total {
        let x = gf_alpha_pow(255 - (j % 255));
        if poly_eval_ascending(&lambda, x) == 0 {
            positions.push(total - 1 - j);
        }
    }
    if positions.len() != errs {
        return None;
    }

    // Error evaluator Omega = S(x) * Lambda(x) mod x^nsym (ascending).
    let mut omega = vec![0u8; nsym];
    for (i, &li) in lambda.iter().enumerate() {
        for (j, &sj) in synd.iter().enumerate() {
            if i + j < nsym {
                omega[i + j] ^= gf_mul(li, sj);
            }
        }
    }

    // Forney with fcr = 1: magnitude = Omega(Xj^-1) / Lambda'(Xj^-1).
    for &idx in &positions {
        let power = total - 1 - idx;
        let x_inv = gf_alpha_pow(255 - (power % 255));
        let num = poly_eval_ascending(&omega, x_inv);
        let mut den = 0u8;
        let mut i = 1;
        while i < lambda.len() {
            den ^= gf_mul(lambda[i], gf_pow(x_inv, i - 1));
            i += 2;
        }
        if den == 0 {
            return None;
        }
        codeword[idx] ^= gf_div(num, den);
    }

    if syndromes(codeword, nsym).iter().any(|&s| s != 0) {
        return None;
    }
    Some(errs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
