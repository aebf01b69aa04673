use ark_std::rand::Rng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{MeteringError, Result};

/// A bijection ψ on `0..n` together with its inverse.
///
/// Held only by the shuffler for the duration of one shuffle; wiped on drop.
#[derive(Clone, Debug, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Permutation {
    forward: Vec<usize>,
    inverse: Vec<usize>,
}

impl Permutation {
    /// Uniformly random permutation (Fisher–Yates).
    pub fn random<R: Rng>(size: usize, rng: &mut R) -> Self {
        let mut forward: Vec<usize> = (0..size).collect();
        for i in (1..size).rev() {
            let j = rng.gen_range(0..=i);
            forward.swap(i, j);
        }
        Self::with_inverse(forward)
    }

    /// Build from an explicit mapping `i -> forward[i]`, rejecting non-bijections.
    pub fn from_mapping(forward: Vec<usize>) -> Result<Self> {
        let size = forward.len();
        let mut seen = vec![false; size];
        for &target in &forward {
            if target >= size || seen[target] {
                return Err(MeteringError::InvalidPermutation { size });
            }
            seen[target] = true;
        }
        Ok(Self::with_inverse(forward))
    }

    fn with_inverse(forward: Vec<usize>) -> Self {
        let mut inverse = vec![0usize; forward.len()];
        for (i, &target) in forward.iter().enumerate() {
            inverse[target] = i;
        }
        Self { forward, inverse }
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// ψ(i)
    pub fn image(&self, index: usize) -> usize {
        self.forward[index]
    }

    /// ψ⁻¹(j)
    pub fn preimage(&self, index: usize) -> usize {
        self.inverse[index]
    }

    /// Moves `items[i]` to position ψ(i).
    pub fn apply<T: Clone>(&self, items: &[T]) -> Result<Vec<T>> {
        if items.len() != self.len() {
            return Err(MeteringError::length_mismatch(
                "permutation input",
                self.len(),
                items.len(),
            ));
        }
        Ok(self
            .inverse
            .iter()
            .map(|&source| items[source].clone())
            .collect())
    }
}

/// Uniformly random permutation of `0..size`.
pub fn gen_permutation<R: Rng>(size: usize, rng: &mut R) -> Permutation {
    Permutation::random(size, rng)
}
