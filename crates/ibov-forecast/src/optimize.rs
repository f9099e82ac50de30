//! Derivative-free minimization (Nelder–Mead simplex).
//!
//! The search is fully deterministic: the initial simplex is built from fixed
//! per-coordinate steps and ties are broken by vertex order.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadOptions {
    /// Offset applied to each coordinate to build the initial simplex.
    pub initial_step: f64,
    pub max_iterations: usize,
    /// Stop once the spread of objective values across the simplex is below this.
    pub f_tolerance: f64,
    /// Stop once every vertex is within this distance of the best vertex.
    pub x_tolerance: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            initial_step: 0.1,
            max_iterations: 1_000,
            f_tolerance: 1e-10,
            x_tolerance: 1e-8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimize `objective` starting from `start`.
///
/// Non-finite objective values are treated as `+inf`, which lets callers
/// express hard constraints by returning `f64::INFINITY`.
pub fn nelder_mead<F>(objective: F, start: &[f64], options: NelderMeadOptions) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let eval = |x: &[f64]| {
        let value = objective(x);
        if value.is_finite() {
            value
        } else {
            f64::INFINITY
        }
    };

    let dim = start.len();
    if dim == 0 {
        return Minimum {
            x: Vec::new(),
            value: eval(start),
            iterations: 0,
            converged: true,
        };
    }

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dim + 1);
    simplex.push((start.to_vec(), eval(start)));
    for axis in 0..dim {
        let mut vertex = start.to_vec();
        vertex[axis] += options.initial_step;
        let value = eval(&vertex);
        simplex.push((vertex, value));
    }

    let mut iterations = 0;
    let mut converged = false;
    while iterations < options.max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        if has_converged(&simplex, options) {
            converged = true;
            break;
        }
        iterations += 1;

        let worst = dim;
        let centroid = centroid(&simplex[..worst]);
        let reflected = along(&centroid, &simplex[worst].0, -REFLECTION);
        let reflected_value = eval(&reflected);

        if reflected_value < simplex[0].1 {
            let expanded = along(&centroid, &simplex[worst].0, -EXPANSION);
            let expanded_value = eval(&expanded);
            simplex[worst] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }

        if reflected_value < simplex[worst - 1].1 {
            simplex[worst] = (reflected, reflected_value);
            continue;
        }

        let (contracted, contracted_value) = if reflected_value < simplex[worst].1 {
            let outside = along(&centroid, &simplex[worst].0, -CONTRACTION);
            let value = eval(&outside);
            (outside, value)
        } else {
            let inside = along(&centroid, &simplex[worst].0, CONTRACTION);
            let value = eval(&inside);
            (inside, value)
        };

        if contracted_value < reflected_value.min(simplex[worst].1) {
            simplex[worst] = (contracted, contracted_value);
            continue;
        }

        let best = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            let shrunk: Vec<f64> = best
                .iter()
                .zip(&vertex.0)
                .map(|(b, v)| b + SHRINK * (v - b))
                .collect();
            let value = eval(&shrunk);
            *vertex = (shrunk, value);
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (x, value) = simplex.swap_remove(0);
    Minimum {
        x,
        value,
        iterations,
        converged,
    }
}

fn has_converged(simplex: &[(Vec<f64>, f64)], options: NelderMeadOptions) -> bool {
    let best = &simplex[0];
    let Some(worst) = simplex.last() else {
        return true;
    };
    if !worst.1.is_finite() {
        return false;
    }
    let f_spread = (worst.1 - best.1).abs();
    let x_spread = simplex
        .iter()
        .flat_map(|vertex| vertex.0.iter().zip(&best.0).map(|(v, b)| (v - b).abs()))
        .fold(0.0_f64, f64::max);
    f_spread <= options.f_tolerance && x_spread <= options.x_tolerance
}

fn centroid(vertices: &[(Vec<f64>, f64)]) -> Vec<f64> {
    let dim = vertices[0].0.len();
    let mut center = vec![0.0; dim];
    for (vertex, _) in vertices {
        for (c, v) in center.iter_mut().zip(vertex) {
            *c += v;
        }
    }
    let count = vertices.len() as f64;
    center.iter_mut().for_each(|c| *c /= count);
    center
}

/// `centroid + t * (point - centroid)`.
fn along(centroid: &[f64], point: &[f64], t: f64) -> Vec<f64> {
    centroid
        .iter()
        .zip(point)
        .map(|(c, p)| c + t * (p - c))
        .collect()
}
