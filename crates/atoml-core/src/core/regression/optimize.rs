/// Settings for [`NelderMead`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMead {
    pub max_iterations: usize,
    /// Convergence threshold on the spread of simplex values.
    pub tolerance: f64,
    /// Offset of the initial simplex vertices along each axis.
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-8,
            initial_step: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

impl NelderMead {
    /// Minimises `f` starting from `x0`. Non-finite function values are treated as
    /// infinitely bad.
    pub fn minimize<F>(&self, mut f: F, x0: &[f64]) -> Minimum
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = x0.len();
        let mut eval = |x: &[f64]| {
            let v = f(x);
            if v.is_finite() { v } else { f64::INFINITY }
        };

        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        simplex.push((x0.to_vec(), eval(x0)));
        for i in 0..n {
            let mut vertex = x0.to_vec();
            vertex[i] += self.initial_step;
            let value = eval(&vertex);
            simplex.push((vertex, value));
        }

        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iterations {
            simplex.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            let best = simplex[0].1;
            let worst = simplex[n].1;
            if n == 0 || (worst - best).abs() <= self.tolerance {
                converged = true;
                break;
            }
            iterations += 1;

            let centroid: Vec<f64> = (0..n)
                .map(|d| simplex[..n].iter().map(|(v, _)| v[d]).sum::<f64>() / n as f64)
                .collect();
            let towards = |coef: f64, from: &[f64]| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(from)
                    .map(|(c, w)| c + coef * (c - w))
                    .collect()
            };

            let reflected = towards(REFLECTION, &simplex[n].0);
            let f_reflected = eval(&reflected);

            if f_reflected < best {
                let expanded = towards(EXPANSION, &simplex[n].0);
                let f_expanded = eval(&expanded);
                simplex[n] = if f_expanded < f_reflected {
                    (expanded, f_expanded)
                } else {
                    (reflected, f_reflected)
                };
            } else if f_reflected < simplex[n - 1].1 {
                simplex[n] = (reflected, f_reflected);
            } else {
                let (contracted, f_contracted) = if f_reflected < worst {
                    let c = towards(CONTRACTION, &simplex[n].0);
                    let v = eval(&c);
                    (c, v)
                } else {
                    let c = towards(-CONTRACTION, &simplex[n].0);
                    let v = eval(&c);
                    (c, v)
                };
                if f_contracted < worst.min(f_reflected) {
                    simplex[n] = (contracted, f_contracted);
                } else {
                    let anchor = simplex[0].0.clone();
                    for (vertex, value) in simplex.iter_mut().skip(1) {
                        for (x, a) in vertex.iter_mut().zip(&anchor) {
                            *x = a + SHRINK * (*x - a);
                        }
                        *value = eval(&vertex[..]);
                    }
                }
            }
        }

        simplex.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        let (point, value) = simplex.swap_remove(0);
        Minimum {
            point,
            value,
            iterations,
            converged,
        }
    }

    /// Minimises over strictly positive parameters by searching in log space.
    ///
    /// Every parameter is clamped to at least `lower_bound` before `f` sees it, and the
    /// returned point is in the original space.
    pub fn minimize_positive<F>(&self, mut f: F, x0: &[f64], lower_bound: f64) -> Minimum
    where
        F: FnMut(&[f64]) -> f64,
    {
        let to_positive =
            |y: &[f64]| -> Vec<f64> { y.iter().map(|v| v.exp().max(lower_bound)).collect() };
        let start: Vec<f64> = x0.iter().map(|v| v.max(lower_bound).ln()).collect();
        let mut result = self.minimize(|y| f(&to_positive(y)), &start);
        result.point = to_positive(&result.point);
        result
    }
}
