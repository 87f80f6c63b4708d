//! # Quadratic Programming
//!
//! $$
//! \min_{\mathbf w}\ \tfrac12\,\mathbf w^\top Q\,\mathbf w
//! \quad\text{s.t.}\quad A\mathbf w = \mathbf b,\ \ \mathbf l \le \mathbf w \le \mathbf u
//! $$
//!
//! Primal active-set solver over box constraints with a dense KKT solve per
//! working set. Sized for portfolio problems: a handful of assets and one or
//! two equality rows. Upper bounds may be infinite.

use crate::error::QuantError;
use crate::error::Result;

const BOUND_TOL: f64 = 1e-10;
const MULTIPLIER_TOL: f64 = 1e-8;
const PIVOT_TOL: f64 = 1e-12;

/// One convex QP instance. `q` is the symmetric Hessian, `a`/`b` the equality
/// rows, `lower`/`upper` the per-variable box.
pub struct QpProblem<'a> {
  pub q: &'a [Vec<f64>],
  pub a: &'a [Vec<f64>],
  pub b: &'a [f64],
  pub lower: &'a [f64],
  pub upper: &'a [f64],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bound {
  Lower,
  Upper,
}

/// Dot product.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
  a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Matrix-vector multiplication.
pub fn mat_vec_mul(mat: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
  mat.iter().map(|row| dot(row, v)).collect()
}

/// Gauss-Jordan solve with partial pivoting; `None` when the system is
/// singular at working precision.
fn solve_dense(mut m: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
  let n = m.len();
  for col in 0..n {
    let mut max_row = col;
    let mut max_val = m[col][col].abs();
    for row in (col + 1)..n {
      if m[row][col].abs() > max_val {
        max_val = m[row][col].abs();
        max_row = row;
      }
    }
    if max_val < PIVOT_TOL {
      return None;
    }
    m.swap(col, max_row);
    rhs.swap(col, max_row);

    let pivot = m[col][col];
    for j in 0..n {
      m[col][j] /= pivot;
    }
    rhs[col] /= pivot;

    for row in 0..n {
      if row == col {
        continue;
      }
      let factor = m[row][col];
      if factor == 0.0 {
        continue;
      }
      for j in 0..n {
        m[row][j] -= factor * m[col][j];
      }
      rhs[row] -= factor * rhs[col];
    }
  }
  Some(rhs)
}

/// Solve the QP from a feasible starting point `x0`.
///
/// The working set starts empty; each round solves the equality-constrained
/// subproblem with the currently bound variables fixed, then either takes a
/// ratio step onto the nearest blocking bound or releases the bound with the
/// most negative multiplier. Terminates when no bound multiplier is negative.
pub fn solve(problem: &QpProblem<'_>, x0: Vec<f64>) -> Result<Vec<f64>> {
  let n = x0.len();
  let m = problem.a.len();
  if problem.q.len() != n || problem.lower.len() != n || problem.upper.len() != n || problem.b.len() != m {
    return Err(QuantError::invalid_input("qp dimensions disagree"));
  }

  let mut x = x0;
  let mut active: Vec<Option<Bound>> = vec![None; n];
  let max_rounds = 50 + 10 * n;

  for _ in 0..max_rounds {
    let free: Vec<usize> = (0..n).filter(|i| active[*i].is_none()).collect();
    let nf = free.len();

    // KKT system over the free variables; bound variables enter the rhs.
    let size = nf + m;
    let mut kkt = vec![vec![0.0; size]; size];
    let mut rhs = vec![0.0; size];
    for (ri, &i) in free.iter().enumerate() {
      for (ci, &j) in free.iter().enumerate() {
        kkt[ri][ci] = problem.q[i][j];
      }
      for k in 0..m {
        kkt[ri][nf + k] = -problem.a[k][i];
      }
      let mut bound_load = 0.0;
      for j in 0..n {
        if active[j].is_some() {
          bound_load += problem.q[i][j] * x[j];
        }
      }
      rhs[ri] = -bound_load;
    }
    for k in 0..m {
      for (ci, &j) in free.iter().enumerate() {
        kkt[nf + k][ci] = problem.a[k][j];
      }
      let mut bound_load = 0.0;
      for j in 0..n {
        if active[j].is_some() {
          bound_load += problem.a[k][j] * x[j];
        }
      }
      rhs[nf + k] = problem.b[k] - bound_load;
    }

    let solution = solve_dense(kkt, rhs)
      .ok_or_else(|| QuantError::infeasible("degenerate constraint system"))?;

    let mut y = x.clone();
    for (ri, &i) in free.iter().enumerate() {
      y[i] = solution[ri];
    }
    let lambda = &solution[nf..];

    let in_box = free
      .iter()
      .all(|&i| y[i] >= problem.lower[i] - BOUND_TOL && y[i] <= problem.upper[i] + BOUND_TOL);

    if in_box {
      for &i in &free {
        x[i] = y[i].clamp(problem.lower[i], problem.upper[i]);
      }

      // Optimality check on the working set: release the bound whose
      // multiplier has the wrong sign, preferring the worst violation.
      let gradient = mat_vec_mul(problem.q, &x);
      let mut worst: Option<(usize, f64)> = None;
      for i in 0..n {
        if let Some(bound) = active[i] {
          let mut at_lambda = 0.0;
          for k in 0..m {
            at_lambda += problem.a[k][i] * lambda[k];
          }
          let mu = gradient[i] - at_lambda;
          let score = match bound {
            Bound::Lower => mu,
            Bound::Upper => -mu,
          };
          if score < -MULTIPLIER_TOL && worst.map_or(true, |(_, s)| score < s) {
            worst = Some((i, score));
          }
        }
      }
      match worst {
        Some((i, _)) => {
          active[i] = None;
          continue;
        }
        None => return Ok(x),
      }
    }

    // Ratio step toward y up to the first blocking bound.
    let mut alpha = 1.0;
    let mut blocking: Option<(usize, Bound)> = None;
    for &i in &free {
      let direction = y[i] - x[i];
      if direction < -BOUND_TOL && y[i] < problem.lower[i] {
        let step = (x[i] - problem.lower[i]) / (x[i] - y[i]);
        if step < alpha {
          alpha = step;
          blocking = Some((i, Bound::Lower));
        }
      } else if direction > BOUND_TOL && y[i] > problem.upper[i] {
        let step = (problem.upper[i] - x[i]) / (y[i] - x[i]);
        if step < alpha {
          alpha = step;
          blocking = Some((i, Bound::Upper));
        }
      }
    }

    match blocking {
      Some((i, bound)) => {
        for &j in &free {
          x[j] += alpha * (y[j] - x[j]);
        }
        x[i] = match bound {
          Bound::Lower => problem.lower[i],
          Bound::Upper => problem.upper[i],
        };
        active[i] = Some(bound);
      }
      None => {
        // The subproblem solution escaped the box but no bound blocks the
        // path; numerical degeneracy.
        return Err(QuantError::infeasible("unbounded ratio step"));
      }
    }
  }

  Err(QuantError::infeasible("active-set iteration limit reached"))
}
