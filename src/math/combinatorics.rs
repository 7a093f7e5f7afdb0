//! Lazy combinatorial counters.
//!
//! Both iterators are finite and single-pass. To iterate again, construct a
//! new one.

use std::iter::FusedIterator;

/// `k`-subsets of `0..n` as ascending index vectors, in lexicographic order.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    indices: Vec<usize>,
    first: bool,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            first: true,
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.first {
            self.first = false;
            return Some(self.indices.clone());
        }

        let k = self.indices.len();
        // Rightmost position that can still be advanced.
        let Some(i) = (0..k).rev().find(|&i| self.indices[i] != i + self.n - k) else {
            self.done = true;
            return None;
        };
        self.indices[i] += 1;
        for j in (i + 1)..k {
            self.indices[j] = self.indices[j - 1] + 1;
        }
        Some(self.indices.clone())
    }
}

impl FusedIterator for Combinations {}

/// Mixed-radix counter: every digit vector `d` with `d[i] < radices[i]`.
///
/// The last digit is least significant (varies fastest). Zero digits yield a
/// single empty vector; any zero radix yields nothing.
#[derive(Debug, Clone)]
pub struct MixedRadix {
    radices: Vec<usize>,
    digits: Vec<usize>,
    done: bool,
}

impl MixedRadix {
    pub fn new(radices: Vec<usize>) -> Self {
        let done = radices.contains(&0);
        let digits = vec![0; radices.len()];
        Self {
            radices,
            digits,
            done,
        }
    }

    /// Same radix for every digit.
    pub fn uniform(len: usize, radix: usize) -> Self {
        Self::new(vec![radix; len])
    }

    /// Total number of assignments, saturating on overflow.
    pub fn total(radices: &[usize]) -> usize {
        radices.iter().fold(1usize, |acc, &r| acc.saturating_mul(r))
    }
}

impl Iterator for MixedRadix {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let out = self.digits.clone();

        // Increment from the least-significant (last) digit.
        let mut pos = self.digits.len();
        loop {
            if pos == 0 {
                self.done = true;
                break;
            }
            pos -= 1;
            self.digits[pos] += 1;
            if self.digits[pos] < self.radices[pos] {
                break;
            }
            self.digits[pos] = 0;
        }
        Some(out)
    }
}

impl FusedIterator for MixedRadix {}

/// Binomial coefficient `C(n, k)`, saturating on overflow.
pub fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
    }
    usize::try_from(acc).unwrap_or(usize::MAX)
}
