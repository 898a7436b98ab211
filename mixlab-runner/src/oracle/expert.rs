//! Best single expert in hindsight.

/// Cumulative loss of each expert, summed in round order.
pub fn column_totals(table: &[Vec<f64>]) -> Vec<f64> {
    let experts = table.first().map(Vec::len).unwrap_or(0);
    let mut totals = vec![0.0; experts];
    for row in table {
        for (total, l) in totals.iter_mut().zip(row) {
            *total += l;
        }
    }
    totals
}
