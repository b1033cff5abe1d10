// Chameleon: Taming the transient while reconfiguring BGP
// Copyright (C) 2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Reusable big-M encodings for conditional MILP constraints, shared by the deterministic and
//! stochastic schedulers.

use good_lp::{constraint, IntoAffineExpression, SolverModel, Variable};

/// Disjunctive big-M ordering: either `a + d <= b` (indicator `x == 1`) or `b + d <= a`
/// (`x == 0`), used for mutex and temporal-precedence pairs. `x` must be a binary decision
/// variable.
pub fn c_disjunctive_order(
    problem: &mut impl SolverModel,
    x: Variable,
    a: impl IntoAffineExpression + Clone,
    b: impl IntoAffineExpression + Clone,
    d_ab: impl IntoAffineExpression + Clone,
    d_ba: impl IntoAffineExpression + Clone,
    big_m: f64,
) {
    problem.add_constraint(constraint!(
        a.clone().into_expression() + d_ab.into_expression() - b.clone().into_expression()
            <= big_m * (1 - x)
    ));
    problem.add_constraint(constraint!(
        b.into_expression() + d_ba.into_expression() - a.into_expression() <= big_m * x
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use good_lp::{
        solvers::coin_cbc::coin_cbc as create_solver, variable, Expression, ProblemVariables,
        SolverModel,
    };

    #[test]
    fn forces_one_strict_ordering_minimizing_the_later_start() {
        let mut problem = ProblemVariables::new();
        let a = problem.add(variable().min(0).max(100));
        let b = problem.add(variable().min(0).max(100));
        let x = problem.add(variable().binary());
        let objective: Expression = Expression::from(a) + Expression::from(b);
        let mut model = create_solver(problem.minimise(objective));
        model.set_parameter("logLevel", "0");
        c_disjunctive_order(&mut model, x, a, b, 3.0, 4.0, 1000.0);
        let solution = model.solve().unwrap();
        let (va, vb) = (solution.value(a), solution.value(b));
        assert!(va + 3.0 <= vb + 1e-6 || vb + 4.0 <= va + 1e-6);
    }
}
