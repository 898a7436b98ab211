//! Best expert sequence with a bounded number of switches.
//!
//! Dynamic program over (round, switches used, current expert):
//! `D[t][s][k] = ℓ[t][k] + min(D[t-1][s][k], min_{j≠k} D[t-1][s-1][j])`,
//! with `D[0][0][k] = ℓ[0][k]` and every other `D[0][s][k]` infinite. The
//! inner minimum over `j ≠ k` uses the best and second-best entries of the
//! previous layer, so each round costs `O(m K)`.
//!
//! Ties prefer staying over switching, then the lowest expert index, then the
//! fewest switches. With `m = 0` the program only ever stays, and its totals
//! are the per-expert column sums, so it reproduces the best-expert oracle.

use mixlab_core::domain::weights::argmin;

#[derive(Debug, Clone, PartialEq)]
pub struct ShiftingPath {
    pub experts: Vec<usize>,
    pub switches: usize,
    pub total_loss: f64,
    /// Best total with at most `s` switches, for `s = 0..=min(max_switches, T - 1)`.
    /// Any larger budget achieves the last entry.
    pub switch_curve: Vec<f64>,
}

/// `table[t][k]` is expert k's loss at round t; the table must be non-empty.
pub fn best_shifting(table: &[Vec<f64>], max_switches: usize) -> ShiftingPath {
    let rounds = table.len();
    let experts = table.first().map(Vec::len).unwrap_or(0);
    if rounds == 0 || experts == 0 {
        return ShiftingPath {
            experts: Vec::new(),
            switches: 0,
            total_loss: 0.0,
            switch_curve: vec![0.0],
        };
    }
    // More than T - 1 switches can never be used.
    let layers = max_switches.min(rounds - 1) + 1;

    let idx = |t: usize, s: usize, k: usize| (t * layers + s) * experts + k;
    // `None` = stayed on k; `Some(j)` = switched in from j.
    let mut from: Vec<Option<usize>> = vec![None; rounds * layers * experts];

    let mut prev = vec![vec![f64::INFINITY; experts]; layers];
    prev[0].clone_from(&table[0]);

    for t in 1..rounds {
        let mut next = vec![vec![f64::INFINITY; experts]; layers];
        for s in 0..layers {
            let switch_in = (s > 0).then(|| best_two(&prev[s - 1]));
            for k in 0..experts {
                let stay = prev[s][k];
                let switch = switch_in.map(|((b1, v1), (b2, v2))| {
                    if k != b1 {
                        (b1, v1)
                    } else {
                        (b2, v2)
                    }
                });
                let (value, source) = match switch {
                    Some((j, v)) if v < stay => (v, Some(j)),
                    _ => (stay, None),
                };
                next[s][k] = value + table[t][k];
                from[idx(t, s, k)] = source;
            }
        }
        prev = next;
    }

    // Fewest switches first, then lowest expert index.
    let mut end = (0, argmin(&prev[0]));
    let mut best = prev[0][end.1];
    let mut switch_curve = Vec::with_capacity(layers);
    for (s, layer) in prev.iter().enumerate() {
        let k = argmin(layer);
        if layer[k] < best {
            best = layer[k];
            end = (s, k);
        }
        switch_curve.push(best);
    }

    let (mut s, mut k) = end;
    let mut path = vec![0; rounds];
    for t in (0..rounds).rev() {
        path[t] = k;
        if t > 0 {
            if let Some(j) = from[idx(t, s, k)] {
                s -= 1;
                k = j;
            }
        }
    }
    let switches = path.windows(2).filter(|w| w[0] != w[1]).count();

    ShiftingPath {
        experts: path,
        switches,
        total_loss: best,
        switch_curve,
    }
}

/// Lowest and second-lowest entries `(index, value)`, lowest index on ties.
/// With a single expert both are the same entry; it is only ever compared
/// against itself, where the infinite second value blocks the switch.
fn best_two(values: &[f64]) -> ((usize, f64), (usize, f64)) {
    let mut first = (0, values[0]);
    let mut second = (usize::MAX, f64::INFINITY);
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v < first.1 {
            second = first;
            first = (i, v);
        } else if v < second.1 {
            second = (i, v);
        }
    }
    if second.0 == usize::MAX {
        second = (first.0, f64::INFINITY);
    }
    (first, second)
}
