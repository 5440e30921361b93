use super::SelectionError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrelationKind {
    Pearson,
    Spearman,
    Kendall,
}

impl CorrelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationKind::Pearson => "pearson",
            CorrelationKind::Spearman => "spearman",
            CorrelationKind::Kendall => "kendall",
        }
    }
}

impl fmt::Display for CorrelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorrelationKind {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pearson" => Ok(CorrelationKind::Pearson),
            "spearman" => Ok(CorrelationKind::Spearman),
            "kendall" => Ok(CorrelationKind::Kendall),
            _ => Err(SelectionError::UnknownName {
                kind: "correlation",
                value: s.to_string(),
            }),
        }
    }
}

/// Pearson correlation; zero when either input has no variance.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let ma = a[..n].iter().sum::<f64>() / n as f64;
    let mb = b[..n].iter().sum::<f64>() / n as f64;
    let (mut cov, mut va, mut vb) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        cov += (x - ma) * (y - mb);
        va += (x - ma).powi(2);
        vb += (y - mb).powi(2);
    }
    if va <= 0.0 || vb <= 0.0 {
        0.0
    } else {
        cov / (va * vb).sqrt()
    }
}

/// One-based ranks; tied values share the average of their ranks.
pub fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| {
        values[i]
            .partial_cmp(&values[j])
            .unwrap_or(Ordering::Equal)
    });
    let mut out = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let average = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            out[idx] = average;
        }
        start = end;
    }
    out
}

pub fn spearman(a: &[f64], b: &[f64]) -> f64 {
    pearson(&ranks(a), &ranks(b))
}

/// Kendall tau-b, which corrects for ties in either input.
pub fn kendall(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    let (mut concordant, mut discordant) = (0i64, 0i64);
    let (mut ties_a, mut ties_b) = (0i64, 0i64);
    for i in 0..n {
        for j in i + 1..n {
            let da = a[i].partial_cmp(&a[j]).unwrap_or(Ordering::Equal);
            let db = b[i].partial_cmp(&b[j]).unwrap_or(Ordering::Equal);
            match (da, db) {
                (Ordering::Equal, Ordering::Equal) => {}
                (Ordering::Equal, _) => ties_a += 1,
                (_, Ordering::Equal) => ties_b += 1,
                _ if da == db => concordant += 1,
                _ => discordant += 1,
            }
        }
    }
    let n0 = (concordant + discordant + ties_a) as f64;
    let n1 = (concordant + discordant + ties_b) as f64;
    if n0 == 0.0 || n1 == 0.0 {
        0.0
    } else {
        (concordant - discordant) as f64 / (n0 * n1).sqrt()
    }
}

pub fn correlation(kind: CorrelationKind, a: &[f64], b: &[f64]) -> f64 {
    match kind {
        CorrelationKind::Pearson => pearson(a, b),
        CorrelationKind::Spearman => spearman(a, b),
        CorrelationKind::Kendall => kendall(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pearson_detects_linear_relationships() {
        let a = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&a, &[2.0, 4.0, 6.0, 8.0]) - 1.0).abs() < 1e-12);
        assert!((pearson(&a, &[8.0, 6.0, 4.0, 2.0]) + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&a, &[1.0, 1.0, 1.0, 1.0]), 0.0);
    }

    #[test]
    fn ranks_average_ties() {
        assert_eq!(ranks(&[10.0, 20.0, 10.0, 30.0]), vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn spearman_is_one_for_monotone_data() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b: Vec<f64> = a.iter().map(|v: &f64| v.exp()).collect();
        assert!((spearman(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn kendall_tau_b_handles_ties() {
        let a = [1.0, 2.0, 3.0, 4.0];
        assert!((kendall(&a, &[1.0, 2.0, 3.0, 4.0]) - 1.0).abs() < 1e-12);
        assert!((kendall(&a, &[4.0, 3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
        // One tie in b: 5 concordant, 0 discordant, 1 tie only in b.
        let tau = kendall(&a, &[1.0, 1.0, 2.0, 3.0]);
        assert!((tau - 5.0 / (6.0f64 * 5.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Kendall".parse::<CorrelationKind>(), Ok(CorrelationKind::Kendall));
        assert!("cosine".parse::<CorrelationKind>().is_err());
    }
}
