//! Square Gaussian splat kernel.

/// Precomputed `(2r+1) x (2r+1)` Gaussian weight grid with peak 1 at the
/// center. The peak is deliberately not sum-normalized; per-pixel
/// normalization happens in the renderer's numerator/denominator pass.
pub struct GaussianKernel {
    radius: i64,
    size: usize,
    weights: Vec<f32>,
}

impl GaussianKernel {
    /// Kernel for a pixel-space sigma. Radius is `max(6, ceil(3 sigma))`
    /// so even sub-pixel sigmas splat a visible footprint.
    ///
    /// Sigma is floored to a small positive value; zero or NaN would
    /// otherwise place a NaN at the kernel center.
    pub fn new(sigma_px: f64) -> Self {
        let sigma_px = sigma_px.max(1e-3);
        let radius = (3.0 * sigma_px).ceil().max(6.0) as i64;
        let size = (2 * radius + 1) as usize;
        let inv_two_sigma_sq = 1.0 / (2.0 * sigma_px * sigma_px);

        let mut weights = vec![0.0f32; size * size];
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let d2 = (dx * dx + dy * dy) as f64;
                let w = (-d2 * inv_two_sigma_sq).exp() as f32;
                weights[((dy + radius) as usize) * size + (dx + radius) as usize] = w;
            }
        }

        Self {
            radius,
            size,
            weights,
        }
    }

    pub fn radius(&self) -> i64 {
        self.radius
    }

    /// Weight at offset (dx, dy) from the kernel center.
    pub fn weight(&self, dx: i64, dy: i64) -> f32 {
        debug_assert!(dx.abs() <= self.radius && dy.abs() <= self.radius);
        self.weights[((dy + self.radius) as usize) * self.size + (dx + self.radius) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_radius() {
        assert_eq!(GaussianKernel::new(0.5).radius(), 6);
        assert_eq!(GaussianKernel::new(10.0).radius(), 30);
    }

    #[test]
    fn test_peak_and_symmetry() {
        let k = GaussianKernel::new(4.0);
        assert!((k.weight(0, 0) - 1.0).abs() < 1e-6);
        assert_eq!(k.weight(3, -2), k.weight(-3, 2));
        assert_eq!(k.weight(1, 0), k.weight(0, 1));
    }

    #[test]
    fn test_degenerate_sigma_stays_finite() {
        for sigma in [0.0, -1.0, f64::NAN] {
            let k = GaussianKernel::new(sigma);
            assert_eq!(k.radius(), 6);
            assert!((k.weight(0, 0) - 1.0).abs() < 1e-6);
            for dy in -6..=6 {
                for dx in -6..=6 {
                    assert!(k.weight(dx, dy).is_finite());
                }
            }
        }
    }

    #[test]
    fn test_monotone_falloff() {
        let k = GaussianKernel::new(4.0);
        assert!(k.weight(0, 0) > k.weight(2, 0));
        assert!(k.weight(2, 0) > k.weight(8, 0));
        assert!(k.weight(8, 0) > 0.0);
    }
}
