use crate::graph::{FactorGraph, MAX_ARITY};
use anyhow::{anyhow, Result};
use logging_timer::time;
use rand::{
    distributions::{Distribution, Uniform},
    rngs::{SmallRng, StdRng},
    Rng, SeedableRng,
};
use serde::{
    de::{self, SeqAccess, Visitor},
    ser::SerializeSeq,
    Deserialize, Deserializer, Serialize, Serializer,
};

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct InstanceParams {
    pub num_variables: usize,
    pub num_clauses: usize,
    pub arity: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Assignment {
    #[serde(with = "bool_vec_as_u8")]
    pub variables: Vec<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Instance {
    pub seed: [u8; 32],
    pub params: InstanceParams,
    pub clauses: Vec<Vec<i32>>,
}

impl Instance {
    /// Uniform random K-SAT: every clause draws K distinct variables, each with a
    /// positive literal with probability 1/2.
    #[time]
    pub fn generate(seed: &[u8; 32], params: &InstanceParams) -> Result<Self> {
        if params.arity == 0 || params.arity > MAX_ARITY {
            return Err(anyhow!(
                "Invalid clause arity. Expected 1..={}, Actual: {}",
                MAX_ARITY,
                params.arity
            ));
        }
        if params.arity > params.num_variables {
            return Err(anyhow!(
                "Cannot draw {} distinct variables out of {}",
                params.arity,
                params.num_variables
            ));
        }

        let mut rng = SmallRng::from_seed(StdRng::from_seed(seed.clone()).gen());
        let var_distr = Uniform::new(0, params.num_variables);

        let mut clauses = Vec::with_capacity(params.num_clauses);
        for _ in 0..params.num_clauses {
            let mut clause: Vec<i32> = Vec::with_capacity(params.arity);
            while clause.len() < params.arity {
                let var = var_distr.sample(&mut rng) as i32 + 1;
                // redraw on collision
                if clause.iter().any(|&literal| literal.abs() == var) {
                    continue;
                }
                if rng.gen::<f64>() < 0.5 {
                    clause.push(var);
                } else {
                    clause.push(-var);
                }
            }
            clauses.push(clause);
        }

        Ok(Self {
            seed: seed.clone(),
            params: params.clone(),
            clauses,
        })
    }

    pub fn from_clauses(num_variables: usize, arity: usize, clauses: Vec<Vec<i32>>) -> Self {
        Self {
            seed: [0u8; 32],
            params: InstanceParams {
                num_variables,
                num_clauses: clauses.len(),
                arity,
            },
            clauses,
        }
    }

    pub fn factor_graph(&self) -> Result<FactorGraph> {
        FactorGraph::from_clauses(self.params.num_variables, self.params.arity, &self.clauses)
    }

    pub fn count_unsatisfied(&self, assignment: &Assignment) -> Result<usize> {
        if assignment.variables.len() != self.params.num_variables {
            return Err(anyhow!(
                "Invalid number of variables. Expected: {}, Actual: {}",
                self.params.num_variables,
                assignment.variables.len()
            ));
        }

        Ok(self
            .clauses
            .iter()
            .filter(|clause| {
                !clause.iter().any(|&literal| {
                    let var_idx = literal.abs() as usize - 1;
                    let var_value = assignment.variables[var_idx];
                    (literal > 0 && var_value) || (literal < 0 && !var_value)
                })
            })
            .count())
    }
}

mod bool_vec_as_u8 {
    use super::*;
    use std::fmt;

    pub fn serialize<S>(data: &Vec<bool>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(data.len()))?;
        for &value in data {
            seq.serialize_element(&(if value { 1 } else { 0 }))?;
        }
        seq.end()
    }

    struct BoolVecVisitor;

    impl<'de> Visitor<'de> for BoolVecVisitor {
        type Value = Vec<bool>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence of booleans or integers 0/1")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut vec = Vec::new();
            while let Some(value) = seq.next_element::<serde_json::Value>()? {
                match value {
                    serde_json::Value::Number(n) if n.as_u64() == Some(1) => vec.push(true),
                    serde_json::Value::Number(n) if n.as_u64() == Some(0) => vec.push(false),
                    serde_json::Value::Bool(b) => vec.push(b),
                    _ => return Err(de::Error::custom("expected 0, 1, true, or false")),
                }
            }
            Ok(vec)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(BoolVecVisitor)
    }
}
