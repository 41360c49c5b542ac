//! Closed-form alpha estimation
//!
//! Solves `(L + λD) α = λ·f` where `L` is the matting Laplacian over 3x3
//! colour windows, `D` marks the pixels the trimap fixes and `f` marks the
//! definite foreground. `L` is never assembled: products with it are
//! evaluated window by window and the system is solved with Jacobi
//! preconditioned conjugate gradients.

use super::{trimap::Trimap, MattingError};
use image::RgbImage;
use tracing::{debug, warn};

/// Pixels per 3x3 window
const WINDOW_AREA: f64 = 9.0;

/// Diagonal entries below this are treated as 1 by the preconditioner
const MIN_DIAGONAL: f64 = 1e-12;

/// Solver parameters for [`ClosedFormMatting`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosedFormMatting {
    /// Colour covariance regularization
    pub epsilon: f64,
    /// Weight of the trimap constraints
    pub lambda: f64,
    pub max_iterations: usize,
    /// Stop once `|r| <= tolerance * |b|`
    pub tolerance: f64,
}

impl Default for ClosedFormMatting {
    fn default() -> Self {
        Self {
            epsilon: 1e-7,
            lambda: 100.0,
            max_iterations: 5000,
            tolerance: 1e-7,
        }
    }
}

/// Estimated opacity per pixel in `[0, 1]`
#[derive(Debug, Clone)]
pub struct AlphaMatte {
    pub data: Vec<f64>,
    pub width: u32,
    pub height: u32,
    pub iterations: usize,
    pub converged: bool,
}

impl AlphaMatte {
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f64 {
        let index = y as usize * self.width as usize + x as usize;
        self.data.get(index).copied().unwrap_or(0.0)
    }
}

impl ClosedFormMatting {
    /// Estimate alpha for `image` constrained by `trimap`
    ///
    /// # Errors
    /// - Image and trimap sizes differ
    /// - Image smaller than a single 3x3 window
    pub fn estimate_alpha(
        &self,
        image: &RgbImage,
        trimap: &Trimap,
    ) -> Result<AlphaMatte, MattingError> {
        let (width, height) = image.dimensions();
        if trimap.dimensions() != (width, height) {
            let (trimap_width, trimap_height) = trimap.dimensions();
            return Err(MattingError::DimensionMismatch {
                image: (width, height),
                trimap: (trimap_width, trimap_height),
            });
        }
        if width < 3 || height < 3 {
            return Err(MattingError::ImageTooSmall { width, height });
        }

        let system = LaplacianSystem::new(image, trimap, self.epsilon, self.lambda);

        let rhs: Vec<f64> = trimap
            .as_raw()
            .iter()
            .map(|&v| if v == super::trimap::FOREGROUND { self.lambda } else { 0.0 })
            .collect();
        let initial: Vec<f64> = trimap.as_raw().iter().map(|&v| f64::from(v) / 255.0).collect();

        let solution = self.conjugate_gradient(&system, &rhs, initial);
        if !solution.converged {
            warn!(
                iterations = solution.iterations,
                residual = solution.residual,
                "Alpha solver stopped before reaching tolerance"
            );
        }
        debug!(
            iterations = solution.iterations,
            residual = solution.residual,
            "Alpha solver finished"
        );

        Ok(AlphaMatte {
            data: solution.x.into_iter().map(|a| a.clamp(0.0, 1.0)).collect(),
            width,
            height,
            iterations: solution.iterations,
            converged: solution.converged,
        })
    }

    fn conjugate_gradient(&self, system: &LaplacianSystem, b: &[f64], mut x: Vec<f64>) -> Solution {
        let n = b.len();
        let inverse_diagonal: Vec<f64> = system
            .diagonal
            .iter()
            .map(|&d| if d < MIN_DIAGONAL { 1.0 } else { 1.0 / d })
            .collect();

        let mut workspace = Workspace::new(n);
        let mut ap = vec![0.0; n];

        system.apply(&x, &mut ap, &mut workspace);
        let mut r: Vec<f64> = b.iter().zip(&ap).map(|(bi, ai)| bi - ai).collect();

        let b_norm = norm(b);
        let threshold = self.tolerance * if b_norm > 0.0 { b_norm } else { 1.0 };

        let mut residual = norm(&r);
        if residual <= threshold {
            return Solution {
                x,
                iterations: 0,
                residual,
                converged: true,
            };
        }

        let mut z: Vec<f64> = r.iter().zip(&inverse_diagonal).map(|(ri, mi)| ri * mi).collect();
        let mut p = z.clone();
        let mut rz = dot(&r, &z);

        for iteration in 1..=self.max_iterations {
            system.apply(&p, &mut ap, &mut workspace);
            let p_ap = dot(&p, &ap);
            if p_ap <= 0.0 || !p_ap.is_finite() {
                return Solution {
                    x,
                    iterations: iteration,
                    residual,
                    converged: false,
                };
            }

            let step = rz / p_ap;
            for ((xi, ri), (pi, api)) in x.iter_mut().zip(r.iter_mut()).zip(p.iter().zip(&ap)) {
                *xi += step * pi;
                *ri -= step * api;
            }

            residual = norm(&r);
            if residual <= threshold {
                return Solution {
                    x,
                    iterations: iteration,
                    residual,
                    converged: true,
                };
            }

            for ((zi, ri), mi) in z.iter_mut().zip(&r).zip(&inverse_diagonal) {
                *zi = ri * mi;
            }
            let rz_next = dot(&r, &z);
            let beta = rz_next / rz;
            rz = rz_next;
            for (pi, zi) in p.iter_mut().zip(&z) {
                *pi = zi + beta * *pi;
            }
        }

        Solution {
            x,
            iterations: self.max_iterations,
            residual,
            converged: false,
        }
    }
}

struct Solution {
    x: Vec<f64>,
    iterations: usize,
    residual: f64,
    converged: bool,
}

/// Colour statistics of one 3x3 window
#[derive(Debug, Clone, Copy)]
struct Window {
    mean: [f64; 3],
    /// `(Σ + ε/9·I)^-1`
    inverse: [[f64; 3]; 3],
}

/// Matrix-free `L + λD`
struct LaplacianSystem {
    width: usize,
    height: usize,
    colors: Vec<[f64; 3]>,
    /// Indexed by window centre; only interior centres are valid
    windows: Vec<Window>,
    /// Number of windows covering each pixel
    coverage: Vec<f64>,
    constrained: Vec<bool>,
    lambda: f64,
    diagonal: Vec<f64>,
}

/// Per-pixel accumulators reused across Laplacian products
struct Workspace {
    sum_a: Vec<[f64; 3]>,
    sum_b: Vec<f64>,
}

impl Workspace {
    fn new(n: usize) -> Self {
        Self {
            sum_a: vec![[0.0; 3]; n],
            sum_b: vec![0.0; n],
        }
    }
}

impl LaplacianSystem {
    fn new(image: &RgbImage, trimap: &Trimap, epsilon: f64, lambda: f64) -> Self {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let colors: Vec<[f64; 3]> = image
            .pixels()
            .map(|p| {
                [
                    f64::from(p.0[0]) / 255.0,
                    f64::from(p.0[1]) / 255.0,
                    f64::from(p.0[2]) / 255.0,
                ]
            })
            .collect();
        let constrained: Vec<bool> = trimap
            .as_raw()
            .iter()
            .map(|&v| v == super::trimap::FOREGROUND || v == super::trimap::BACKGROUND)
            .collect();

        let n = width * height;
        let mut system = Self {
            width,
            height,
            colors,
            windows: vec![
                Window {
                    mean: [0.0; 3],
                    inverse: [[0.0; 3]; 3],
                };
                n
            ],
            coverage: vec![0.0; n],
            constrained,
            lambda,
            diagonal: vec![0.0; n],
        };

        for cy in 1..height - 1 {
            for cx in 1..width - 1 {
                let window = system.window_stats(cx, cy, epsilon);
                let centre = cy * width + cx;
                system.windows[centre] = window;

                for j in window_pixels(cx, cy, width) {
                    system.coverage[j] += 1.0;
                    let d = sub(system.colors[j], window.mean);
                    let q = dot3(d, mat_vec(&window.inverse, d));
                    system.diagonal[j] += 1.0 - (1.0 + q) / WINDOW_AREA;
                }
            }
        }

        for (d, &fixed) in system.diagonal.iter_mut().zip(&system.constrained) {
            if fixed {
                *d += lambda;
            }
        }

        system
    }

    fn window_stats(&self, cx: usize, cy: usize, epsilon: f64) -> Window {
        let mut mean = [0.0; 3];
        let mut second = [[0.0; 3]; 3];
        for j in window_pixels(cx, cy, self.width) {
            let c = self.colors[j];
            for r in 0..3 {
                mean[r] += c[r];
                for s in 0..3 {
                    second[r][s] += c[r] * c[s];
                }
            }
        }

        let mut covariance = [[0.0; 3]; 3];
        for r in 0..3 {
            mean[r] /= WINDOW_AREA;
        }
        for r in 0..3 {
            for s in 0..3 {
                covariance[r][s] = second[r][s] / WINDOW_AREA - mean[r] * mean[s];
            }
            covariance[r][r] += epsilon / WINDOW_AREA;
        }

        Window {
            mean,
            inverse: invert_symmetric(&covariance),
        }
    }

    /// `out = (L + λD) p`
    fn apply(&self, p: &[f64], out: &mut [f64], workspace: &mut Workspace) {
        workspace.sum_a.iter_mut().for_each(|a| *a = [0.0; 3]);
        workspace.sum_b.iter_mut().for_each(|b| *b = 0.0);

        for cy in 1..self.height - 1 {
            for cx in 1..self.width - 1 {
                let window = &self.windows[cy * self.width + cx];

                let mut p_mean = 0.0;
                let mut color_p = [0.0; 3];
                for j in window_pixels(cx, cy, self.width) {
                    let c = self.colors[j];
                    p_mean += p[j];
                    for r in 0..3 {
                        color_p[r] += c[r] * p[j];
                    }
                }
                p_mean /= WINDOW_AREA;

                let mut covariance_p = [0.0; 3];
                for r in 0..3 {
                    covariance_p[r] = color_p[r] / WINDOW_AREA - window.mean[r] * p_mean;
                }
                let a = mat_vec(&window.inverse, covariance_p);
                let b = p_mean - dot3(a, window.mean);

                for j in window_pixels(cx, cy, self.width) {
                    let sum_a = &mut workspace.sum_a[j];
                    for r in 0..3 {
                        sum_a[r] += a[r];
                    }
                    workspace.sum_b[j] += b;
                }
            }
        }

        for (i, value) in out.iter_mut().enumerate() {
            let mut v = self.coverage[i] * p[i]
                - dot3(self.colors[i], workspace.sum_a[i])
                - workspace.sum_b[i];
            if self.constrained[i] {
                v += self.lambda * p[i];
            }
            *value = v;
        }
    }
}

/// Indices of the 3x3 window centred on an interior pixel
fn window_pixels(cx: usize, cy: usize, width: usize) -> impl Iterator<Item = usize> {
    (cy - 1..=cy + 1).flat_map(move |y| (cx - 1..=cx + 1).map(move |x| y * width + x))
}

fn invert_symmetric(m: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let c00 = m[1][1] * m[2][2] - m[1][2] * m[2][1];
    let c01 = m[1][2] * m[2][0] - m[1][0] * m[2][2];
    let c02 = m[1][0] * m[2][1] - m[1][1] * m[2][0];
    let det = m[0][0] * c00 + m[0][1] * c01 + m[0][2] * c02;
    if det.abs() < f64::MIN_POSITIVE {
        return [[0.0; 3]; 3];
    }

    let c11 = m[0][0] * m[2][2] - m[0][2] * m[2][0];
    let c12 = m[0][2] * m[1][0] - m[0][0] * m[1][2];
    let c22 = m[0][0] * m[1][1] - m[0][1] * m[1][0];

    let inv = 1.0 / det;
    [
        [c00 * inv, c01 * inv, c02 * inv],
        [c01 * inv, c11 * inv, c12 * inv],
        [c02 * inv, c12 * inv, c22 * inv],
    ]
}

fn mat_vec(m: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [dot3(m[0], v), dot3(m[1], v), dot3(m[2], v)]
}

fn dot3(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matting::trimap::{BACKGROUND, FOREGROUND, UNKNOWN};
    use image::{GrayImage, Rgb};

    fn trimap_from(raw: Vec<u8>, width: u32, height: u32) -> Trimap {
        // Erode size 1 with thresholds that map 255/0/128 straight through
        let mask = GrayImage::from_raw(width, height, raw).unwrap();
        let options = crate::config::AlphaMattingOptions {
            foreground_threshold: 200,
            background_threshold: 50,
            erode_size: 1,
        };
        Trimap::from_mask(&mask, &options)
    }

    fn random_image(width: u32, height: u32) -> RgbImage {
        let mut state = 0x2545_f491_u32;
        RgbImage::from_fn(width, height, |_, _| {
            let mut next = || {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            };
            Rgb([next(), next(), next()])
        })
    }

    #[test]
    fn test_invert_symmetric() {
        let m = [[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 2.0]];
        let inv = invert_symmetric(&m);
        for r in 0..3 {
            for c in 0..3 {
                let v: f64 = (0..3).map(|k| m[r][k] * inv[k][c]).sum();
                let expected = if r == c { 1.0 } else { 0.0 };
                assert!((v - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_laplacian_annihilates_constants_and_colors() {
        // Rows of L sum to zero and L is zero on affine functions of colour
        let image = random_image(9, 7);
        let trimap = trimap_from(vec![UNKNOWN; 63], 9, 7);
        let system = LaplacianSystem::new(&image, &trimap, 1e-7, 100.0);
        let mut workspace = Workspace::new(63);
        let mut out = vec![0.0; 63];

        system.apply(&vec![1.0; 63], &mut out, &mut workspace);
        assert!(out.iter().all(|v| v.abs() < 1e-6));

        let red: Vec<f64> = system.colors.iter().map(|c| 0.3 + 2.0 * c[0]).collect();
        system.apply(&red, &mut out, &mut workspace);
        assert!(out.iter().all(|v| v.abs() < 1e-4));
    }

    #[test]
    fn test_diagonal_matches_operator() {
        let image = random_image(6, 5);
        let trimap = trimap_from(vec![UNKNOWN; 30], 6, 5);
        let system = LaplacianSystem::new(&image, &trimap, 1e-3, 100.0);
        let mut workspace = Workspace::new(30);
        let mut out = vec![0.0; 30];

        for i in [0, 7, 14, 29] {
            let mut unit = vec![0.0; 30];
            unit[i] = 1.0;
            system.apply(&unit, &mut out, &mut workspace);
            assert!((out[i] - system.diagonal[i]).abs() < 1e-8);
        }
    }

    #[test]
    fn test_two_color_image() {
        // Left half red, right half blue, a column of unknowns between known columns
        let (width, height) = (12, 8);
        let image = RgbImage::from_fn(width, height, |x, _| {
            if x < 6 {
                Rgb([220, 30, 30])
            } else {
                Rgb([30, 30, 220])
            }
        });
        let raw: Vec<u8> = (0..width * height)
            .map(|i| match i % width {
                0..=3 => FOREGROUND,
                8.. => BACKGROUND,
                _ => UNKNOWN,
            })
            .collect();
        let trimap = trimap_from(raw, width, height);

        let matte = ClosedFormMatting::default().estimate_alpha(&image, &trimap).unwrap();
        assert!(matte.iterations > 0);
        assert!(matte.data.iter().all(|a| (0.0..=1.0).contains(a)));
        assert!(matte.get(4, 4) > 0.9);
        assert!(matte.get(7, 4) < 0.1);
        assert!(matte.get(1, 1) > 0.99);
        assert!(matte.get(10, 1) < 0.01);
    }

    #[test]
    fn test_too_small() {
        let image = RgbImage::new(2, 5);
        let trimap = trimap_from(vec![UNKNOWN; 10], 2, 5);
        assert!(matches!(
            ClosedFormMatting::default().estimate_alpha(&image, &trimap),
            Err(MattingError::ImageTooSmall { .. })
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let image = RgbImage::new(4, 4);
        let trimap = trimap_from(vec![UNKNOWN; 20], 5, 4);
        assert!(matches!(
            ClosedFormMatting::default().estimate_alpha(&image, &trimap),
            Err(MattingError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_trimap_helper_passthrough() {
        let trimap = trimap_from(vec![255, 0, 128, 255], 4, 1);
        assert_eq!(trimap.as_raw(), &[FOREGROUND, BACKGROUND, UNKNOWN, FOREGROUND]);
    }
}
