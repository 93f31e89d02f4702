//! Derivative-free minimization with the [Nelder–Mead] simplex method.
//!
//! Cross-validated bandwidth selectors minimize objectives that are cheap to evaluate but have no
//! convenient gradient, which is what Nelder–Mead is good at. The implementation is fully
//! deterministic: the initial simplex is derived from the starting point alone.
//!
//! [Nelder–Mead]: https://en.wikipedia.org/wiki/Nelder%E2%80%93Mead_method

use std::cell::Cell;

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Nelder–Mead minimizer parameters.
#[derive(Debug, Clone, Copy)]
pub struct NelderMead {
    xtol: f64,
    ftol: f64,
    max_iterations: usize,
    max_evaluations: usize,
    step: f64,
}

/// The best point found by [`NelderMead::minimize`].
#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl NelderMead {
    pub const DEFAULT_XTOL: f64 = 1e-3;
    pub const DEFAULT_FTOL: f64 = 1e-4;
    pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

    pub fn new() -> Self {
        Self {
            xtol: Self::DEFAULT_XTOL,
            ftol: Self::DEFAULT_FTOL,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            max_evaluations: Self::DEFAULT_MAX_ITERATIONS,
            step: 0.1,
        }
    }

    /// Sets the offset along each coordinate axis used to build the initial simplex.
    pub fn with_step(self, step: f64) -> Self {
        Self { step, ..self }
    }

    /// Minimizes `f`, starting the search at `x0`.
    ///
    /// `NaN` results of `f` are treated as `+∞`, so the simplex moves away from them.
    ///
    /// # Panics
    ///
    /// Panics if `x0` is empty.
    pub fn minimize<F>(&self, x0: &[f64], mut f: F) -> Minimum
    where
        F: FnMut(&[f64]) -> f64,
    {
        assert!(!x0.is_empty(), "cannot minimize over zero dimensions");

        let n = x0.len();
        let evaluations = Cell::new(0);
        let mut eval = |x: &[f64]| {
            evaluations.set(evaluations.get() + 1);
            let v = f(x);
            if v.is_nan() {
                f64::INFINITY
            } else {
                v
            }
        };

        let mut simplex = Vec::with_capacity(n + 1);
        simplex.push(Vertex::new(x0.to_vec(), &mut eval));
        for k in 0..n {
            let mut x = x0.to_vec();
            x[k] += self.step;
            simplex.push(Vertex::new(x, &mut eval));
        }

        let mut iterations = 0;
        let mut converged = false;
        loop {
            simplex.sort_by(|a, b| a.value.total_cmp(&b.value));

            if self.has_converged(&simplex) {
                converged = true;
                break;
            }
            if iterations >= self.max_iterations || evaluations.get() >= self.max_evaluations {
                break;
            }
            iterations += 1;

            let centroid = centroid(&simplex[..n]);
            let worst = simplex[n].clone();

            let reflected = Vertex::new(
                affine(&centroid, &worst.x, 1.0 + REFLECTION, -REFLECTION),
                &mut eval,
            );

            if reflected.value < simplex[0].value {
                let expanded = Vertex::new(
                    affine(
                        &centroid,
                        &worst.x,
                        1.0 + REFLECTION * EXPANSION,
                        -REFLECTION * EXPANSION,
                    ),
                    &mut eval,
                );
                simplex[n] = if expanded.value < reflected.value {
                    expanded
                } else {
                    reflected
                };
                continue;
            }

            if reflected.value < simplex[n - 1].value {
                simplex[n] = reflected;
                continue;
            }

            let contracted = if reflected.value < worst.value {
                // Outside contraction, towards the reflected point.
                let c = Vertex::new(
                    affine(
                        &centroid,
                        &worst.x,
                        1.0 + CONTRACTION * REFLECTION,
                        -CONTRACTION * REFLECTION,
                    ),
                    &mut eval,
                );
                (c.value <= reflected.value).then_some(c)
            } else {
                // Inside contraction, towards the worst point.
                let c = Vertex::new(
                    affine(&centroid, &worst.x, 1.0 - CONTRACTION, CONTRACTION),
                    &mut eval,
                );
                (c.value < worst.value).then_some(c)
            };

            match contracted {
                Some(c) => simplex[n] = c,
                None => {
                    let best = simplex[0].x.clone();
                    for vertex in &mut simplex[1..] {
                        let x = affine(&best, &vertex.x, 1.0 - SHRINK, SHRINK);
                        *vertex = Vertex::new(x, &mut eval);
                    }
                }
            }
        }

        let best = simplex.swap_remove(0);
        log::trace!(
            "nelder-mead: {iterations} iterations, {} evaluations, converged={converged}, f={}",
            evaluations.get(),
            best.value
        );

        Minimum {
            x: best.x,
            value: best.value,
            iterations,
            converged,
        }
    }

    fn has_converged(&self, sorted: &[Vertex]) -> bool {
        let best = &sorted[0];
        sorted[1..].iter().all(|v| {
            let dx = v
                .x
                .iter()
                .zip(&best.x)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            dx <= self.xtol && (v.value - best.value).abs() <= self.ftol
        })
    }
}

impl Default for NelderMead {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct Vertex {
    x: Vec<f64>,
    value: f64,
}

impl Vertex {
    fn new(x: Vec<f64>, eval: &mut impl FnMut(&[f64]) -> f64) -> Self {
        let value = eval(&x);
        Self { x, value }
    }
}

fn centroid(vertices: &[Vertex]) -> Vec<f64> {
    let mut acc = vec![0.0; vertices[0].x.len()];
    for v in vertices {
        for (acc, x) in acc.iter_mut().zip(&v.x) {
            *acc += x;
        }
    }
    let n = vertices.len() as f64;
    acc.iter_mut().for_each(|a| *a /= n);
    acc
}

/// Computes `a * wa + b * wb` componentwise.
fn affine(a: &[f64], b: &[f64], wa: f64, wb: f64) -> Vec<f64> {
    a.iter().zip(b).map(|(a, b)| a * wa + b * wb).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimizes_quadratic() {
        let min = NelderMead::new().minimize(&[0.0, 0.0], |x| {
            (x[0] - 1.0).powi(2) + 3.0 * (x[1] + 2.0).powi(2)
        });
        assert!(min.converged);
        assert!((min.x[0] - 1.0).abs() < 1e-2, "{:?}", min.x);
        assert!((min.x[1] + 2.0).abs() < 1e-2, "{:?}", min.x);
        assert!(min.value < 1e-3);
    }

    #[test]
    fn minimizes_one_dimensional() {
        let min = NelderMead::new()
            .with_step(0.5)
            .minimize(&[3.0], |x| (x[0] + 0.5).powi(2));
        assert!((min.x[0] + 0.5).abs() < 1e-2, "{:?}", min.x);
    }

    #[test]
    fn avoids_nan_region() {
        let min = NelderMead::new().minimize(&[1.0], |x| {
            if x[0] < 0.5 {
                f64::NAN
            } else {
                (x[0] - 0.75).powi(2)
            }
        });
        assert!(min.value.is_finite());
        assert!(min.x[0] >= 0.5);
    }

    #[test]
    fn deterministic() {
        let f = |x: &[f64]| (x[0] * x[1] - 2.0).powi(2) + (x[0] - x[1]).powi(2);
        let a = NelderMead::new().minimize(&[0.3, 0.7], f);
        let b = NelderMead::new().minimize(&[0.3, 0.7], f);
        assert_eq!(a.x, b.x);
        assert_eq!(a.value, b.value);
    }
}
