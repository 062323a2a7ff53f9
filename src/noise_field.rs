//! Seeded 2D noise sampled per tile.
//!
//! Wraps `noise::Perlin` with a seed-derived sub-lattice offset so that tile
//! coordinates never land on lattice points (where Perlin is always zero), and
//! remaps output into `[0, 1]`. A hash-based white noise is provided for
//! decisions that must not be spatially coherent.

use noise::{NoiseFn, Perlin};

use crate::seeds::{mix32, Seed};

/// Default sampling frequency in cycles per tile.
pub const DEFAULT_FREQUENCY: f64 = 0.09;

/// Deterministic noise source keyed by a [`Seed`].
#[derive(Clone)]
pub struct NoiseGenerator {
    seed: Seed,
    perlin: Perlin,
    frequency: f64,
    offset: [f64; 2],
}

impl NoiseGenerator {
    pub fn new(seed: Seed) -> Self {
        Self::with_frequency(seed, DEFAULT_FREQUENCY)
    }

    pub fn with_frequency(seed: Seed, frequency: f64) -> Self {
        let s = seed.value();
        // Offsets in (0, 64) with a non-integer fraction so samples avoid lattice points
        let ox = (mix32(s ^ 0x51ed_270b) % 64_000) as f64 / 1000.0 + 0.371;
        let oy = (mix32(s ^ 0xa3c5_9ac3) % 64_000) as f64 / 1000.0 + 0.619;
        Self {
            seed,
            perlin: Perlin::new(mix32(s)),
            frequency,
            offset: [ox, oy],
        }
    }

    pub fn seed(&self) -> Seed {
        self.seed
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Coherent noise at tile (x, y), in `[0, 1]`.
    pub fn generate_at(&self, x: f64, y: f64) -> f64 {
        let raw = self.sample(x, y, self.frequency);
        ((raw + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Multi-octave coherent noise in `[0, 1]`.
    ///
    /// Each octave doubles the frequency and scales amplitude by `persistence`;
    /// the sum is normalised by the total amplitude.
    pub fn fbm_at(&self, x: f64, y: f64, octaves: usize, persistence: f64) -> f64 {
        let octaves = octaves.max(1);
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut max_amplitude = 0.0;
        let mut frequency = self.frequency;

        for octave in 0..octaves {
            // Shift each octave so they do not share lattice alignment
            let shift = octave as f64 * 17.31;
            total += self.sample(x + shift, y - shift, frequency) * amplitude;
            max_amplitude += amplitude;
            amplitude *= persistence;
            frequency *= 2.0;
        }

        ((total / max_amplitude + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Spatially incoherent value in `[0, 1)` for an integer tile.
    pub fn white_at(&self, x: usize, y: usize) -> f64 {
        let h = mix32(
            (x as u32).wrapping_mul(0x8da6_b343)
                ^ (y as u32).wrapping_mul(0xd816_3841)
                ^ mix32(self.seed.value()),
        );
        h as f64 / (u32::MAX as f64 + 1.0)
    }

    fn sample(&self, x: f64, y: f64, frequency: f64) -> f64 {
        self.perlin.get([
            x * frequency + self.offset[0],
            y * frequency + self.offset[1],
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(gen: &NoiseGenerator, n: usize) -> Vec<f64> {
        (0..n * n)
            .map(|i| gen.generate_at((i % n) as f64, (i / n) as f64))
            .collect()
    }

    fn correlation(a: &[f64], b: &[f64]) -> f64 {
        let n = a.len() as f64;
        let ma = a.iter().sum::<f64>() / n;
        let mb = b.iter().sum::<f64>() / n;
        let cov: f64 = a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum();
        let va: f64 = a.iter().map(|x| (x - ma).powi(2)).sum();
        let vb: f64 = b.iter().map(|y| (y - mb).powi(2)).sum();
        cov / (va.sqrt() * vb.sqrt())
    }

    #[test]
    fn test_same_seed_same_values() {
        let a = NoiseGenerator::new(Seed::from_number(42).unwrap());
        let b = NoiseGenerator::new(Seed::from_number(42).unwrap());
        for y in 0..20 {
            for x in 0..20 {
                assert_eq!(a.generate_at(x as f64, y as f64), b.generate_at(x as f64, y as f64));
                assert_eq!(a.white_at(x, y), b.white_at(x, y));
            }
        }
    }

    #[test]
    fn test_values_in_unit_range() {
        let gen = NoiseGenerator::new(Seed::from_number(7).unwrap());
        for y in 0..50 {
            for x in 0..50 {
                let v = gen.generate_at(x as f64, y as f64);
                assert!((0.0..=1.0).contains(&v), "out of range at ({}, {}): {}", x, y, v);
                let f = gen.fbm_at(x as f64, y as f64, 5, 0.5);
                assert!((0.0..=1.0).contains(&f));
                let w = gen.white_at(x, y);
                assert!((0.0..1.0).contains(&w));
            }
        }
    }

    #[test]
    fn test_not_flat_on_integer_grid() {
        let gen = NoiseGenerator::new(Seed::from_number(11).unwrap());
        let values = grid(&gen, 30);
        let distinct = values
            .iter()
            .filter(|v| (**v - 0.5).abs() > 1e-6)
            .count();
        assert!(distinct > values.len() / 2, "noise collapsed to lattice zeros");
    }

    #[test]
    fn test_different_seeds_not_linearly_related() {
        let a = NoiseGenerator::new(Seed::from_number(1001).unwrap());
        let b = NoiseGenerator::new(Seed::from_number(1002).unwrap());
        let va = grid(&a, 100);
        let vb = grid(&b, 100);

        let corr = correlation(&va, &vb);
        assert!(corr.abs() < 0.5, "noise fields correlated: {}", corr);

        let differing = va
            .iter()
            .zip(&vb)
            .filter(|(x, y)| (*x - *y).abs() > 0.01)
            .count();
        assert!(differing as f64 > va.len() as f64 * 0.8, "only {} samples differ", differing);
    }

    #[test]
    fn test_white_noise_uncorrelated_with_neighbours() {
        let gen = NoiseGenerator::new(Seed::from_number(5).unwrap());
        let a: Vec<f64> = (0..2000).map(|i| gen.white_at(i % 40, i / 40)).collect();
        let b: Vec<f64> = (0..2000).map(|i| gen.white_at(i % 40 + 1, i / 40)).collect();
        assert!(correlation(&a, &b).abs() < 0.1);
    }
}
