//! Deterministic distributions for unit tests of stochastic components.

#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::cast_precision_loss
)]

use std::cell::Cell;

use rand::distributions::Distribution;

/// This distribution produces values between 0 and `N - 1` by requesting the `next_u32` from the
/// random number generator and applying `mod N` operation on it.
///
/// This is meant for testing, e.g., together with `rand::rngs::mock::StepRng` it can produce
/// predictable values that can be used in unit tests.
pub struct WrappingEchoDistribution<T> {
    size: T,
}

impl<T> WrappingEchoDistribution<T> {
    /// Constructs a new distribution generating values between 0 and `size - 1`.
    pub fn new(size: T) -> Self {
        Self { size }
    }
}

impl<T> Distribution<T> for WrappingEchoDistribution<T>
where
    T: std::convert::TryFrom<u32> + std::ops::Rem<T, Output = T> + Copy,
    <T as std::convert::TryFrom<u32>>::Error: std::fmt::Debug,
{
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> T {
        T::try_from(rng.next_u32()).unwrap() % self.size
    }
}

/// A wrapper over a distribution generating integer values that casts them to floats.
pub struct ToFloatDistribution<D>(D);

impl<D> ToFloatDistribution<D> {
    /// Constructs a float distribution from an integer one.
    pub fn new(dist: D) -> Self {
        Self(dist)
    }
}

impl<D> Distribution<f64> for ToFloatDistribution<D>
where
    D: Distribution<u64>,
{
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.0.sample(rng) as f64
    }
}

/// Ignores the random number generator and cycles through a fixed list of values.
///
/// Useful to script service times: the `n`-th sample is `values[n % values.len()]`.
///
/// ```
/// # use rand::distributions::Distribution;
/// # use testing::SequenceDistribution;
/// let dist = SequenceDistribution::new(vec![1.0, 2.5]);
/// let mut rng = rand::thread_rng();
/// let samples: Vec<f64> = (0..3).map(|_| dist.sample(&mut rng)).collect();
/// assert_eq!(samples, vec![1.0, 2.5, 1.0]);
/// ```
pub struct SequenceDistribution<T> {
    values: Vec<T>,
    position: Cell<usize>,
}

impl<T> SequenceDistribution<T> {
    /// Constructs a distribution cycling through `values`.
    ///
    /// # Panics
    ///
    /// Panics if `values` is empty.
    pub fn new(values: Vec<T>) -> Self {
        assert!(!values.is_empty(), "sequence must not be empty");
        Self {
            values,
            position: Cell::new(0),
        }
    }
}

impl<T: Copy> Distribution<T> for SequenceDistribution<T> {
    fn sample<R: rand::Rng + ?Sized>(&self, _: &mut R) -> T {
        let position = self.position.get();
        self.position.set(position + 1);
        self.values[position % self.values.len()]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_echo_to_float() {
        let dist = ToFloatDistribution::new(WrappingEchoDistribution::new(3_u64));
        let mut rng = StepRng::new(0, 1);
        let samples: Vec<f64> = (0..5).map(|_| dist.sample(&mut rng)).collect();
        assert_eq!(samples, vec![0.0, 1.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn test_sequence() {
        let dist = SequenceDistribution::new(vec![3_u32]);
        let mut rng = StepRng::new(0, 1);
        assert_eq!(dist.sample(&mut rng), 3);
        assert_eq!(dist.sample(&mut rng), 3);
    }
}
