//! Weight-vector helpers shared by the strategies and the oracles.

/// Tolerance for the simplex invariant.
pub const SIMPLEX_TOLERANCE: f64 = 1e-9;

pub fn uniform(k: usize) -> Vec<f64> {
    vec![1.0 / k as f64; k]
}

pub fn dot(w: &[f64], x: &[f64]) -> f64 {
    w.iter().zip(x).map(|(a, b)| a * b).sum()
}

/// All components non-negative and summing to one, within tolerance.
pub fn is_on_simplex(w: &[f64]) -> bool {
    let sum: f64 = w.iter().sum();
    w.iter().all(|&v| v >= -SIMPLEX_TOLERANCE) && (sum - 1.0).abs() <= SIMPLEX_TOLERANCE
}

/// Index of the smallest value, lowest index on ties.
pub fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v < values[best] {
            best = i;
        }
    }
    best
}

/// Index of the largest value, lowest index on ties.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// `exp(-eta * losses)` normalized, shifted by the minimum for stability.
///
/// `eta = 0` gives exactly uniform weights; `eta = +inf` puts all mass on the
/// lowest-index minimizer.
pub fn exponential_weights(losses: &[f64], eta: f64) -> Vec<f64> {
    let k = losses.len();
    if eta.is_infinite() {
        let mut w = vec![0.0; k];
        w[argmin(losses)] = 1.0;
        return w;
    }
    let min = losses.iter().copied().fold(f64::INFINITY, f64::min);
    let raw: Vec<f64> = losses.iter().map(|l| (-eta * (l - min)).exp()).collect();
    normalize(raw)
}

/// Scale non-negative values to sum to one; all-zero input becomes uniform.
pub fn normalize(mut values: Vec<f64>) -> Vec<f64> {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        for v in values.iter_mut() {
            *v /= sum;
        }
        values
    } else {
        uniform(values.len())
    }
}

/// Euclidean projection onto the probability simplex.
///
/// Sort-based algorithm of Duchi, Shalev-Shwartz, Singer & Chandra (2008).
pub fn project_simplex(v: &[f64]) -> Vec<f64> {
    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (j, &u) in sorted.iter().enumerate() {
        cumulative += u;
        let candidate = (cumulative - 1.0) / (j + 1) as f64;
        if u - candidate > 0.0 {
            theta = candidate;
        }
    }
    v.iter().map(|&x| (x - theta).max(0.0)).collect()
}

/// Euclidean projection onto the centered ball of the given radius.
pub fn project_ball(v: &[f64], radius: f64) -> Vec<f64> {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm <= radius {
        v.to_vec()
    } else {
        v.iter().map(|x| x * radius / norm).collect()
    }
}
