//! Solver-neutral integer programs, lowered to `good_lp` on every solve.
use std::fmt;

use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    variable,
};
use thiserror::Error;

/// `microlp` bounds every integer variable by `i32::MAX` instead of
/// reporting an unbounded program.
const INTEGER_CAP: f64 = i32::MAX as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(usize);

impl VariableId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Integer in `{0, 1}`.
    Binary,
    /// Integer in `[0, ∞)`.
    NonNegativeInteger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSense {
    LessEqual,
    Equal,
    GreaterEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationSense {
    Maximize,
    Minimize,
}

/// `constant + Σ coefficient·variable`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpression {
    constant: f64,
    terms: Vec<(f64, VariableId)>,
}

impl LinearExpression {
    pub fn new(constant: f64) -> Self {
        Self {
            constant,
            terms: Vec::new(),
        }
    }

    pub fn from_variable(variable: VariableId) -> Self {
        let mut expr = Self::new(0.0);
        expr.add_term(1.0, variable);
        expr
    }

    pub fn add_term(&mut self, coefficient: f64, variable: VariableId) {
        self.terms.push((coefficient, variable));
    }

    pub fn add_constant(&mut self, constant: f64) {
        self.constant += constant;
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn terms(&self) -> &[(f64, VariableId)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn evaluate(&self, assignment: &Assignment) -> f64 {
        self.terms
            .iter()
            .fold(self.constant, |acc, &(coefficient, variable)| {
                acc + coefficient * assignment.value(variable)
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct LinearConstraint {
    expr: LinearExpression,
    sense: ConstraintSense,
    rhs: f64,
}

#[derive(Debug, Clone)]
struct VariableDecl {
    name: String,
    kind: VariableKind,
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("variable {0:?} does not belong to this program")]
    UnknownVariable(VariableId),
    #[error("solver failure: {0}")]
    Backend(String),
}

/// Solved values, indexed by [`VariableId`].
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    values: Vec<f64>,
    objective: Option<f64>,
}

impl Assignment {
    pub fn value(&self, variable: VariableId) -> f64 {
        self.values.get(variable.0).copied().unwrap_or(0.0)
    }

    /// Value of a binary variable, rounded.
    pub fn is_set(&self, variable: VariableId) -> bool {
        self.value(variable) > 0.5
    }

    pub fn integer(&self, variable: VariableId) -> i64 {
        self.value(variable).round() as i64
    }

    /// Objective value at this point, `None` for a pure feasibility program.
    pub fn objective(&self) -> Option<f64> {
        self.objective
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Optimal(Assignment),
    Infeasible,
    Unbounded,
}

#[derive(Debug, Clone, Default)]
pub struct IntegerProgram {
    variables: Vec<VariableDecl>,
    constraints: Vec<Option<LinearConstraint>>,
    objective: Option<(LinearExpression, OptimizationSense)>,
}

impl IntegerProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, name: impl Into<String>, kind: VariableKind) -> VariableId {
        self.variables.push(VariableDecl {
            name: name.into(),
            kind,
        });
        VariableId(self.variables.len() - 1)
    }

    /// Number of constraints currently in force.
    pub fn constraint_count(&self) -> usize {
        self.constraints.iter().flatten().count()
    }

    pub fn add_constraint(
        &mut self,
        expr: LinearExpression,
        sense: ConstraintSense,
        rhs: f64,
    ) -> Result<ConstraintId, SolverError> {
        self.check(&expr)?;
        self.constraints
            .push(Some(LinearConstraint { expr, sense, rhs }));
        Ok(ConstraintId(self.constraints.len() - 1))
    }

    /// Returns false if the constraint was already removed.
    pub fn remove_constraint(&mut self, id: ConstraintId) -> bool {
        self.constraints
            .get_mut(id.0)
            .and_then(Option::take)
            .is_some()
    }

    pub fn set_objective(
        &mut self,
        expr: LinearExpression,
        sense: OptimizationSense,
    ) -> Result<(), SolverError> {
        self.check(&expr)?;
        self.objective = Some((expr, sense));
        Ok(())
    }

    fn check(&self, expr: &LinearExpression) -> Result<(), SolverError> {
        match expr
            .terms
            .iter()
            .find(|(_, variable)| variable.0 >= self.variables.len())
        {
            Some(&(_, variable)) => Err(SolverError::UnknownVariable(variable)),
            None => Ok(()),
        }
    }

    /// Solves the program with the `microlp` branch-and-bound backend.
    /// Infeasible and unbounded programs are outcomes, not errors.
    pub fn solve(&self) -> Result<SolveOutcome, SolverError> {
        let mut problem = ProblemVariables::new();
        let lowered: Vec<Variable> = self
            .variables
            .iter()
            .map(|decl| {
                let definition = match decl.kind {
                    VariableKind::Binary => variable().binary(),
                    VariableKind::NonNegativeInteger => variable().integer().min(0),
                };
                problem.add(definition.name(decl.name.clone()))
            })
            .collect();

        let lower = |expr: &LinearExpression| -> Expression {
            let mut lowered_expr = Expression::from_other_affine(expr.constant);
            for &(coefficient, variable) in &expr.terms {
                lowered_expr += coefficient * lowered[variable.0];
            }
            lowered_expr
        };

        let unsolved = match &self.objective {
            Some((expr, OptimizationSense::Maximize)) => problem.maximise(lower(expr)),
            Some((expr, OptimizationSense::Minimize)) => problem.minimise(lower(expr)),
            None => problem.minimise(Expression::from_other_affine(0.0)),
        };
        let mut model = unsolved.using(good_lp::microlp);
        for item in self.constraints.iter().flatten() {
            let lhs = lower(&item.expr);
            let lowered_constraint = match item.sense {
                ConstraintSense::LessEqual => constraint::leq(lhs, item.rhs),
                ConstraintSense::Equal => constraint::eq(lhs, item.rhs),
                ConstraintSense::GreaterEqual => constraint::geq(lhs, item.rhs),
            };
            model = model.with(lowered_constraint);
        }

        match model.solve() {
            Ok(solution) => {
                let mut assignment = Assignment {
                    values: lowered.iter().map(|&v| solution.value(v)).collect(),
                    objective: None,
                };
                if self.hits_integer_cap(&assignment) {
                    return Ok(SolveOutcome::Unbounded);
                }
                assignment.objective = self
                    .objective
                    .as_ref()
                    .map(|(expr, _)| expr.evaluate(&assignment));
                Ok(SolveOutcome::Optimal(assignment))
            }
            Err(ResolutionError::Infeasible) => Ok(SolveOutcome::Infeasible),
            Err(ResolutionError::Unbounded) => Ok(SolveOutcome::Unbounded),
            Err(other) => Err(SolverError::Backend(other.to_string())),
        }
    }
}

impl IntegerProgram {
    /// True if an integer variable that improves the objective was pushed
    /// to the backend's bound.
    fn hits_integer_cap(&self, assignment: &Assignment) -> bool {
        let Some((expr, sense)) = &self.objective else {
            return false;
        };
        expr.terms.iter().any(|&(coefficient, variable)| {
            let improving = match sense {
                OptimizationSense::Maximize => coefficient > 0.0,
                OptimizationSense::Minimize => coefficient < 0.0,
            };
            improving
                && self.variables[variable.0].kind == VariableKind::NonNegativeInteger
                && assignment.value(variable) >= INTEGER_CAP - 0.5
        })
    }
}

impl fmt::Display for IntegerProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_expr = |f: &mut fmt::Formatter<'_>, expr: &LinearExpression| -> fmt::Result {
            for (i, &(coefficient, variable)) in expr.terms.iter().enumerate() {
                let sign = if coefficient < 0.0 { "-" } else if i > 0 { "+" } else { "" };
                write!(f, "{sign}{} {} ", coefficient.abs(), self.variables[variable.0].name)?;
            }
            if expr.constant != 0.0 || expr.terms.is_empty() {
                write!(f, "{:+} ", expr.constant)?;
            }
            Ok(())
        };

        match &self.objective {
            Some((expr, sense)) => {
                write!(f, "{sense:?} ")?;
                write_expr(f, expr)?;
                writeln!(f)?;
            }
            None => writeln!(f, "Feasibility")?,
        }
        for item in self.constraints.iter().flatten() {
            write_expr(f, &item.expr)?;
            let op = match item.sense {
                ConstraintSense::LessEqual => "<=",
                ConstraintSense::Equal => "=",
                ConstraintSense::GreaterEqual => ">=",
            };
            writeln!(f, "{op} {}", item.rhs)?;
        }
        Ok(())
    }
}
