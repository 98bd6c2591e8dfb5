use anyhow::{anyhow, Result};
use logging_timer::time;

pub const MAX_ARITY: usize = 16;

/// Bit used for a variable value inside a joint state: 0 for true, 1 for false.
pub fn bit_of(value: bool) -> usize {
    if value {
        0
    } else {
        1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Incidence {
    pub factor: usize,
    pub position: usize,
}

/// The incidences of a variable other than one excluded factor node, split by the
/// bit of the variable that violates them. Entries index `Variable::factors`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cavity {
    pub unsat_by_zero: Vec<usize>,
    pub unsat_by_one: Vec<usize>,
}

impl Cavity {
    pub fn group(&self, bit: usize) -> &[usize] {
        if bit == 0 {
            &self.unsat_by_zero
        } else {
            &self.unsat_by_one
        }
    }

    pub fn count(&self, bit: usize) -> usize {
        self.group(bit).len()
    }

    pub fn len(&self) -> usize {
        self.unsat_by_zero.len() + self.unsat_by_one.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variable {
    pub factors: Vec<Incidence>,
    // cavities[h] excludes factors[h]
    pub cavities: Vec<Cavity>,
}

impl Variable {
    pub fn degree(&self) -> usize {
        self.factors.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorNode {
    pub variables: Vec<usize>,
    pub links: Vec<i8>,
    // slots[w] is the index of this factor node in the incidence list of variables[w]
    pub slots: Vec<usize>,
    pub unsat_combination: usize,
    pub free_positions: Vec<usize>,
}

impl FactorNode {
    pub fn arity(&self) -> usize {
        self.variables.len()
    }

    pub fn unsat_bit(&self, position: usize) -> usize {
        (self.unsat_combination >> position) & 1
    }

    pub fn literal(&self, position: usize) -> i32 {
        self.links[position] as i32 * (self.variables[position] as i32 + 1)
    }

    pub fn is_violated_by(&self, assignment: &[bool]) -> bool {
        self.variables
            .iter()
            .enumerate()
            .all(|(w, &var)| bit_of(assignment[var]) == self.unsat_bit(w))
    }

    pub fn is_free(&self, position: usize) -> bool {
        self.free_positions.contains(&position)
    }
}

/// Bipartite graph of variables and K-ary factor nodes (clauses).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorGraph {
    arity: usize,
    variables: Vec<Variable>,
    factors: Vec<FactorNode>,
}

impl FactorGraph {
    /// Builds the graph from DIMACS style literals: `v` and `-v` refer to variable `v - 1`.
    #[time]
    pub fn from_clauses(num_variables: usize, arity: usize, clauses: &[Vec<i32>]) -> Result<Self> {
        if arity == 0 || arity > MAX_ARITY {
            return Err(anyhow!(
                "Invalid clause arity. Expected 1..={}, Actual: {}",
                MAX_ARITY,
                arity
            ));
        }

        let mut variables = vec![Variable::default(); num_variables];
        let mut factors = Vec::with_capacity(clauses.len());
        for (idx, clause) in clauses.iter().enumerate() {
            if clause.len() != arity {
                return Err(anyhow!(
                    "Clause '{}' has {} literals, expected {}",
                    idx,
                    clause.len(),
                    arity
                ));
            }
            let mut factor = FactorNode {
                variables: Vec::with_capacity(arity),
                links: Vec::with_capacity(arity),
                slots: Vec::with_capacity(arity),
                unsat_combination: 0,
                free_positions: (0..arity).collect(),
            };
            for (w, &literal) in clause.iter().enumerate() {
                let var = literal.unsigned_abs() as usize;
                if var == 0 || var > num_variables {
                    return Err(anyhow!(
                        "Clause '{}' refers to variable {} outside 1..={}",
                        idx,
                        literal,
                        num_variables
                    ));
                }
                let var = var - 1;
                if factor.variables.contains(&var) {
                    return Err(anyhow!("Clause '{}' repeats variable {}", idx, var + 1));
                }
                let link: i8 = if literal > 0 { 1 } else { -1 };
                if link == 1 {
                    factor.unsat_combination |= 1 << w;
                }
                factor.variables.push(var);
                factor.links.push(link);
                factor.slots.push(variables[var].factors.len());
                variables[var].factors.push(Incidence {
                    factor: idx,
                    position: w,
                });
            }
            factors.push(factor);
        }

        for variable in variables.iter_mut() {
            variable.cavities = (0..variable.degree())
                .map(|excluded| {
                    let mut cavity = Cavity::default();
                    for (other, inc) in variable.factors.iter().enumerate() {
                        if other == excluded {
                            continue;
                        }
                        match factors[inc.factor].unsat_bit(inc.position) {
                            0 => cavity.unsat_by_zero.push(other),
                            _ => cavity.unsat_by_one.push(other),
                        }
                    }
                    cavity
                })
                .collect();
        }

        Ok(Self {
            arity,
            variables,
            factors,
        })
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn num_states(&self) -> usize {
        1 << self.arity
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_factors(&self) -> usize {
        self.factors.len()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, idx: usize) -> &Variable {
        &self.variables[idx]
    }

    pub fn factors(&self) -> &[FactorNode] {
        &self.factors
    }

    pub fn factor(&self, idx: usize) -> &FactorNode {
        &self.factors[idx]
    }

    pub fn max_degree(&self) -> usize {
        self.variables.iter().map(Variable::degree).max().unwrap_or(0)
    }

    pub fn mean_degree(&self) -> f64 {
        if self.variables.is_empty() {
            0.0
        } else {
            (self.arity * self.factors.len()) as f64 / self.variables.len() as f64
        }
    }

    pub fn to_clauses(&self) -> Vec<Vec<i32>> {
        self.factors
            .iter()
            .map(|f| (0..f.arity()).map(|w| f.literal(w)).collect())
            .collect()
    }

    pub fn count_unsatisfied(&self, assignment: &[bool]) -> Result<usize> {
        if assignment.len() != self.variables.len() {
            return Err(anyhow!(
                "Invalid number of variables. Expected: {}, Actual: {}",
                self.variables.len(),
                assignment.len()
            ));
        }
        Ok(self
            .factors
            .iter()
            .filter(|f| f.is_violated_by(assignment))
            .count())
    }

    /// Removes `var` from the free positions of every incident factor node.
    pub fn release_variable(&mut self, var: usize) {
        for inc in self.variables[var].factors.iter() {
            let free = &mut self.factors[inc.factor].free_positions;
            if let Some(idx) = free.iter().position(|&w| w == inc.position) {
                free.swap_remove(idx);
            }
        }
    }

    pub fn num_free_positions(&self) -> usize {
        self.factors.iter().map(|f| f.free_positions.len()).sum()
    }
}
