//! Kernel support vector classifier with probability estimates.
//!
//! - RBF kernel over sparse TF-IDF rows
//! - C-SVM dual solved by SMO (maximal violating pair working set)
//! - One-vs-one machines for more than two classes
//! - Balanced per-class penalties: `C_k = C * n / (classes * n_k)`
//! - Platt sigmoid per machine, fitted on its training decision values
//! - Pairwise coupling of the sigmoid outputs into one distribution

use crate::features::SparseVector;
use serde::{Deserialize, Serialize};

const TAU: f64 = 1e-12;
const MIN_PROB: f64 = 1e-7;

/// Kernel width selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gamma {
    /// `1 / (n_features * var(X))`, computed over the dense training matrix
    Scale,
    Value(f64),
}

/// Solver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmConfig {
    /// Penalty for margin violations before class balancing
    pub c: f64,
    pub gamma: Gamma,
    /// Stop when the maximal KKT violation drops below this
    pub tolerance: f64,
    pub max_iter: usize,
    pub balanced: bool,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            c: 10.0,
            gamma: Gamma::Scale,
            tolerance: 1e-3,
            max_iter: 1_000_000,
            balanced: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Sigmoid {
    a: f64,
    b: f64,
}

impl Sigmoid {
    /// P(positive class | decision value)
    fn predict(&self, decision: f64) -> f64 {
        let f = decision * self.a + self.b;
        if f >= 0.0 {
            (-f).exp() / (1.0 + (-f).exp())
        } else {
            1.0 / (1.0 + f.exp())
        }
    }
}

/// One binary machine separating `positive` (+1) from `negative` (-1)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinaryMachine {
    positive: usize,
    negative: usize,
    /// (training row, alpha * y) for every support vector
    coefficients: Vec<(usize, f64)>,
    rho: f64,
    sigmoid: Sigmoid,
}

impl BinaryMachine {
    fn decision(&self, kernel_row: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .map(|&(s, coef)| coef * kernel_row[s])
            .sum::<f64>()
            - self.rho
    }
}

/// Trained multi-class SVM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmClassifier {
    num_classes: usize,
    gamma: f64,
    vectors: Vec<SparseVector>,
    machines: Vec<BinaryMachine>,
}

impl SvmClassifier {
    /// Fit on rows with class indices in `0..num_classes`. Every class must
    /// have at least one row and `num_classes >= 2`.
    pub fn fit(
        config: &SvmConfig,
        rows: &[SparseVector],
        labels: &[usize],
        num_classes: usize,
        num_features: usize,
    ) -> Self {
        debug_assert_eq!(rows.len(), labels.len());
        let n = rows.len();

        let gamma = match config.gamma {
            Gamma::Value(g) => g,
            Gamma::Scale => scale_gamma(rows, num_features),
        };

        let class_penalty = class_penalties(config, labels, num_classes);

        let norms: Vec<f64> = rows.iter().map(|r| dot(r, r)).collect();
        let kernel: Vec<Vec<f64>> = (0..n)
            .map(|a| {
                (0..n)
                    .map(|b| rbf(gamma, &rows[a], norms[a], &rows[b], norms[b]))
                    .collect()
            })
            .collect();

        let mut machines = Vec::with_capacity(num_classes * (num_classes - 1) / 2);
        for positive in 0..num_classes {
            for negative in positive + 1..num_classes {
                machines.push(train_pair(
                    config,
                    &kernel,
                    labels,
                    &class_penalty,
                    positive,
                    negative,
                ));
            }
        }

        Self {
            num_classes,
            gamma,
            vectors: rows.to_vec(),
            machines,
        }
    }

    /// Class probabilities for one row, indexed by class
    pub fn predict_proba(&self, row: &SparseVector) -> Vec<f64> {
        let norm = dot(row, row);
        let kernel_row: Vec<f64> = self
            .vectors
            .iter()
            .map(|v| rbf(self.gamma, v, dot(v, v), row, norm))
            .collect();

        let k = self.num_classes;
        let mut pairwise = vec![vec![0.0f64; k]; k];
        for machine in &self.machines {
            let p = machine
                .sigmoid
                .predict(machine.decision(&kernel_row))
                .clamp(MIN_PROB, 1.0 - MIN_PROB);
            pairwise[machine.positive][machine.negative] = p;
            pairwise[machine.negative][machine.positive] = 1.0 - p;
        }

        if k == 2 {
            return vec![pairwise[0][1], pairwise[1][0]];
        }
        couple_pairwise(&pairwise)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Check the internal indices of a deserialized model
    pub fn check(&self) -> Result<(), String> {
        let k = self.num_classes;
        if k < 2 {
            return Err(format!("{} classes", k));
        }
        if self.machines.len() != k * (k - 1) / 2 {
            return Err(format!("{} binary machines for {} classes", self.machines.len(), k));
        }

        for machine in &self.machines {
            if machine.positive >= k || machine.negative >= k {
                return Err(format!(
                    "machine {} vs {} is outside {} classes",
                    machine.positive, machine.negative, k
                ));
            }
            let rows = self.vectors.len();
            if let Some(&(s, _)) = machine.coefficients.iter().find(|(s, _)| *s >= rows) {
                return Err(format!("support vector {} out of {} rows", s, rows));
            }
        }
        Ok(())
    }

    pub fn num_support_vectors(&self) -> usize {
        let mut used = vec![false; self.vectors.len()];
        for machine in &self.machines {
            for &(s, _) in &machine.coefficients {
                used[s] = true;
            }
        }
        used.into_iter().filter(|u| *u).count()
    }
}

/// Upper bound on the dual variables of each class: `C`, or with
/// balancing `C * n / (k * n_class)` so every class carries equal weight.
fn class_penalties(config: &SvmConfig, labels: &[usize], num_classes: usize) -> Vec<f64> {
    let mut class_counts = vec![0usize; num_classes];
    for &label in labels {
        class_counts[label] += 1;
    }

    let n = labels.len() as f64;
    class_counts
        .iter()
        .map(|&count| {
            if config.balanced && count > 0 {
                config.c * n / (num_classes as f64 * count as f64)
            } else {
                config.c
            }
        })
        .collect()
}

fn train_pair(
    config: &SvmConfig,
    kernel: &[Vec<f64>],
    labels: &[usize],
    class_penalty: &[f64],
    positive: usize,
    negative: usize,
) -> BinaryMachine {
    let members: Vec<usize> = (0..labels.len())
        .filter(|&s| labels[s] == positive || labels[s] == negative)
        .collect();
    let y: Vec<f64> = members
        .iter()
        .map(|&s| if labels[s] == positive { 1.0 } else { -1.0 })
        .collect();
    let bounds: Vec<f64> = members.iter().map(|&s| class_penalty[labels[s]]).collect();

    let q = |a: usize, b: usize| y[a] * y[b] * kernel[members[a]][members[b]];
    let solution = solve_dual(q, &y, &bounds, config.tolerance, config.max_iter);
    if !solution.converged {
        log::warn!(
            "SVM solver hit max_iter ({}) for classes {} vs {}",
            config.max_iter,
            positive,
            negative
        );
    }

    let coefficients: Vec<(usize, f64)> = members
        .iter()
        .zip(solution.alpha.iter().zip(&y))
        .filter(|(_, (alpha, _))| **alpha > 0.0)
        .map(|(&s, (alpha, yy))| (s, alpha * yy))
        .collect();

    let decisions: Vec<f64> = members
        .iter()
        .map(|&t| {
            coefficients
                .iter()
                .map(|&(s, coef)| coef * kernel[s][t])
                .sum::<f64>()
                - solution.rho
        })
        .collect();
    let sigmoid = fit_sigmoid(&decisions, &y);

    BinaryMachine {
        positive,
        negative,
        coefficients,
        rho: solution.rho,
        sigmoid,
    }
}

struct DualSolution {
    alpha: Vec<f64>,
    rho: f64,
    converged: bool,
}

/// SMO for `min ½ aᵀQa - eᵀa` s.t. `yᵀa = 0`, `0 <= a_t <= bounds[t]`
fn solve_dual(
    q: impl Fn(usize, usize) -> f64,
    y: &[f64],
    bounds: &[f64],
    tolerance: f64,
    max_iter: usize,
) -> DualSolution {
    let l = y.len();
    let mut alpha = vec![0.0f64; l];
    let mut grad = vec![-1.0f64; l];
    let mut converged = false;

    for _ in 0..max_iter {
        let mut g_max = f64::NEG_INFINITY;
        let mut g_min = f64::INFINITY;
        let mut pick_i = None;
        let mut pick_j = None;

        for t in 0..l {
            let v = -y[t] * grad[t];
            let (in_up, in_low) = if y[t] > 0.0 {
                (alpha[t] < bounds[t], alpha[t] > 0.0)
            } else {
                (alpha[t] > 0.0, alpha[t] < bounds[t])
            };
            if in_up && v >= g_max {
                g_max = v;
                pick_i = Some(t);
            }
            if in_low && v <= g_min {
                g_min = v;
                pick_j = Some(t);
            }
        }

        let (i, j) = match (pick_i, pick_j) {
            (Some(i), Some(j)) if g_max - g_min >= tolerance => (i, j),
            _ => {
                converged = true;
                break;
            }
        };

        let (old_i, old_j) = (alpha[i], alpha[j]);
        let (ci, cj) = (bounds[i], bounds[j]);
        let (qii, qjj, qij) = (q(i, i), q(j, j), q(i, j));

        if y[i] != y[j] {
            let mut quad = qii + qjj + 2.0 * qij;
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;

            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > ci - cj {
                if alpha[i] > ci {
                    alpha[i] = ci;
                    alpha[j] = ci - diff;
                }
            } else if alpha[j] > cj {
                alpha[j] = cj;
                alpha[i] = cj + diff;
            }
        } else {
            let mut quad = qii + qjj - 2.0 * qij;
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;

            if sum > ci {
                if alpha[i] > ci {
                    alpha[i] = ci;
                    alpha[j] = sum - ci;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > cj {
                if alpha[j] > cj {
                    alpha[j] = cj;
                    alpha[i] = sum - cj;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        let (di, dj) = (alpha[i] - old_i, alpha[j] - old_j);
        for (t, g) in grad.iter_mut().enumerate() {
            *g += q(t, i) * di + q(t, j) * dj;
        }
    }

    // rho: average y*G over free vectors, else midpoint of the feasible range
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    let mut free_sum = 0.0;
    let mut free_count = 0usize;
    for t in 0..l {
        let yg = y[t] * grad[t];
        if alpha[t] >= bounds[t] {
            if y[t] < 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else if alpha[t] <= 0.0 {
            if y[t] > 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else {
            free_count += 1;
            free_sum += yg;
        }
    }
    let rho = if free_count > 0 {
        free_sum / free_count as f64
    } else if upper.is_finite() && lower.is_finite() {
        (upper + lower) / 2.0
    } else if upper.is_finite() {
        upper
    } else if lower.is_finite() {
        lower
    } else {
        0.0
    };

    DualSolution {
        alpha,
        rho,
        converged,
    }
}

/// Platt scaling with Newton steps and backtracking line search.
/// Targets are smoothed by class priors so separable data stays finite.
fn fit_sigmoid(decisions: &[f64], y: &[f64]) -> Sigmoid {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    let prior1 = y.iter().filter(|v| **v > 0.0).count() as f64;
    let prior0 = y.len() as f64 - prior1;
    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = y
        .iter()
        .map(|v| if *v > 0.0 { hi_target } else { lo_target })
        .collect();

    let objective = |a: f64, b: f64| -> f64 {
        decisions
            .iter()
            .zip(&targets)
            .map(|(d, t)| {
                let f = d * a + b;
                if f >= 0.0 {
                    t * f + (1.0 + (-f).exp()).ln()
                } else {
                    (t - 1.0) * f + (1.0 + f.exp()).ln()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    for _ in 0..MAX_ITER {
        let (mut h11, mut h22, mut h21) = (SIGMA, SIGMA, 0.0);
        let (mut g1, mut g2) = (0.0, 0.0);
        for (d, t) in decisions.iter().zip(&targets) {
            let f = d * a + b;
            let (p, q) = if f >= 0.0 {
                ((-f).exp() / (1.0 + (-f).exp()), 1.0 / (1.0 + (-f).exp()))
            } else {
                (1.0 / (1.0 + f.exp()), f.exp() / (1.0 + f.exp()))
            };
            let d2 = p * q;
            h11 += d * d * d2;
            h22 += d2;
            h21 += d * d2;
            let d1 = t - p;
            g1 += d * d1;
            g2 += d1;
        }

        if g1.abs() < EPS && g2.abs() < EPS {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let (new_a, new_b) = (a + step * da, b + step * db);
            let new_f = objective(new_a, new_b);
            if new_f < fval + 1e-4 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }

        if step < MIN_STEP {
            log::debug!("Platt line search stalled");
            break;
        }
    }

    Sigmoid { a, b }
}

/// Combine pairwise estimates `r[i][j] ≈ P(i | i or j)` into class
/// probabilities by minimizing `Σ (r_ji p_i - r_ij p_j)²`.
fn couple_pairwise(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    let max_iter = 100.max(k);
    let eps = 0.005 / k as f64;

    let mut q = vec![vec![0.0f64; k]; k];
    for t in 0..k {
        for j in 0..k {
            if j == t {
                continue;
            }
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let mut p = vec![1.0 / k as f64; k];
    let mut qp = vec![0.0f64; k];

    for _ in 0..max_iter {
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            pqp += p[t] * qp[t];
        }

        let max_error = qp
            .iter()
            .map(|v| (v - pqp).abs())
            .fold(0.0f64, f64::max);
        if max_error < eps {
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[t][t];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
    }

    p
}

fn scale_gamma(rows: &[SparseVector], num_features: usize) -> f64 {
    let cells = (rows.len() * num_features) as f64;
    if cells == 0.0 {
        return 1.0;
    }
    let sum: f64 = rows.iter().flat_map(|r| r.iter().map(|(_, v)| *v)).sum();
    let sum_sq: f64 = rows.iter().map(|r| dot(r, r)).sum();
    let mean = sum / cells;
    let var = sum_sq / cells - mean * mean;
    if var > 0.0 {
        1.0 / (num_features as f64 * var)
    } else {
        1.0
    }
}

fn dot(a: &SparseVector, b: &SparseVector) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut sum = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

fn rbf(gamma: f64, a: &SparseVector, norm_a: f64, b: &SparseVector, norm_b: f64) -> f64 {
    let dist = (norm_a + norm_b - 2.0 * dot(a, b)).max(0.0);
    (-gamma * dist).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn onehot(idx: usize) -> SparseVector {
        vec![(idx, 1.0)]
    }

    #[test]
    fn test_dot_merges_sparse_indices() {
        let a = vec![(0, 1.0), (2, 2.0), (5, 1.0)];
        let b = vec![(2, 3.0), (4, 1.0), (5, 2.0)];
        assert_eq!(dot(&a, &b), 8.0);
    }

    #[test]
    fn test_two_point_problem_has_unit_margin() {
        let k = (-2.0f64).exp();
        let kernel = vec![vec![1.0, k], vec![k, 1.0]];
        let y = vec![1.0, -1.0];
        let q = |a: usize, b: usize| y[a] * y[b] * kernel[a][b];

        let solution = solve_dual(q, &y, &[10.0, 10.0], 1e-6, 1000);
        assert!(solution.converged);
        assert!(solution.rho.abs() < 1e-9);

        let expected = 1.0 / (1.0 - k);
        assert!((solution.alpha[0] - expected).abs() < 1e-9);
        assert!((solution.alpha[1] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_sigmoid_orders_decisions() {
        let decisions = vec![1.2, 1.0, -1.0, -1.3];
        let y = vec![1.0, 1.0, -1.0, -1.0];
        let sigmoid = fit_sigmoid(&decisions, &y);

        assert!(sigmoid.predict(1.0) > 0.5);
        assert!(sigmoid.predict(-1.0) < 0.5);
        assert!(sigmoid.predict(1.0) < 1.0);
    }

    #[test]
    fn test_coupling_sums_to_one() {
        let r = vec![
            vec![0.0, 0.75, 0.75],
            vec![0.25, 0.0, 0.5],
            vec![0.25, 0.5, 0.0],
        ];
        let p = couple_pairwise(&r);

        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!((p[0] - 0.6).abs() < 0.01);
        assert!((p[1] - p[2]).abs() < 0.01);
    }

    fn unit(x: f64, y: f64) -> SparseVector {
        let norm = x.hypot(y);
        [(0, x / norm), (1, y / norm)]
            .into_iter()
            .filter(|&(_, v)| v != 0.0)
            .collect()
    }

    /// Ten majority rows fanning out from axis 0, one minority row on axis 1
    fn skewed_rows() -> (Vec<SparseVector>, Vec<usize>) {
        let mut rows: Vec<SparseVector> = (0..10).map(|i| unit(1.0, 0.1 * i as f64)).collect();
        rows.push(unit(0.0, 1.0));
        let mut labels = vec![0; 10];
        labels.push(1);
        (rows, labels)
    }

    fn minority_decision(balanced: bool) -> f64 {
        let (rows, labels) = skewed_rows();
        let config = SvmConfig {
            c: 0.1,
            gamma: Gamma::Value(1.0),
            balanced,
            ..SvmConfig::default()
        };
        let model = SvmClassifier::fit(&config, &rows, &labels, 2, 2);

        let row = &rows[10];
        let norm = dot(row, row);
        let kernel_row: Vec<f64> = model
            .vectors
            .iter()
            .map(|v| rbf(model.gamma, v, dot(v, v), row, norm))
            .collect();
        model.machines[0].decision(&kernel_row)
    }

    #[test]
    fn test_balanced_penalties_weight_minority() {
        let labels = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let balanced = SvmConfig {
            c: 1.0,
            ..SvmConfig::default()
        };
        let plain = SvmConfig {
            balanced: false,
            ..balanced.clone()
        };

        let penalties = class_penalties(&balanced, &labels, 2);
        assert!((penalties[0] - 0.55).abs() < 1e-12);
        assert!((penalties[1] - 5.5).abs() < 1e-12);
        assert_eq!(class_penalties(&plain, &labels, 2), vec![1.0, 1.0]);
    }

    #[test]
    fn test_balancing_keeps_minority_row_on_its_side() {
        // positive decision = majority class
        assert!(minority_decision(false) > 0.0);
        assert!(minority_decision(true) < 0.0);
    }

    #[test]
    fn test_fit_separates_three_classes() {
        let rows = vec![
            onehot(0),
            vec![(0, 0.8), (1, 0.6)],
            onehot(2),
            vec![(2, 0.8), (3, 0.6)],
            onehot(4),
            vec![(4, 0.6), (5, 0.8)],
        ];
        let labels = vec![0, 0, 1, 1, 2, 2];
        let model = SvmClassifier::fit(&SvmConfig::default(), &rows, &labels, 3, 6);

        for (row, &label) in rows.iter().zip(&labels) {
            let proba = model.predict_proba(row);
            let best = proba
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap();
            assert_eq!(best, label);
            assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        }
        assert!(model.num_support_vectors() > 0);
    }
}
