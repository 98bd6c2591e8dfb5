use cda_instances::*;
use cda_utils::u8s_from_u64;

fn random_instance(n: usize, m: usize, k: usize, seed: u64) -> Instance {
    Instance::generate(
        &u8s_from_u64(seed),
        &InstanceParams {
            num_variables: n,
            num_clauses: m,
            arity: k,
        },
    )
    .unwrap()
}

#[test]
fn test_generate_is_deterministic() {
    let a = random_instance(50, 200, 3, 7);
    let b = random_instance(50, 200, 3, 7);
    let c = random_instance(50, 200, 3, 8);
    assert_eq!(a, b);
    assert_ne!(a.clauses, c.clauses);
}

#[test]
fn test_generate_rejects_arity_above_variables() {
    let result = Instance::generate(
        &u8s_from_u64(1),
        &InstanceParams {
            num_variables: 2,
            num_clauses: 1,
            arity: 3,
        },
    );
    assert!(result.is_err());
}

#[test]
fn test_factor_nodes_have_distinct_variables() {
    let graph = random_instance(10, 100, 4, 3).factor_graph().unwrap();
    assert_eq!(graph.num_factors(), 100);
    for factor in graph.factors() {
        assert_eq!(factor.arity(), 4);
        let mut vars = factor.variables.clone();
        vars.sort();
        vars.dedup();
        assert_eq!(vars.len(), 4);
        assert_eq!(factor.free_positions.len(), 4);
    }
}

#[test]
fn test_incidence_and_slots_are_consistent() {
    let graph = random_instance(30, 90, 3, 11).factor_graph().unwrap();
    for (a, factor) in graph.factors().iter().enumerate() {
        for (w, (&var, &slot)) in factor.variables.iter().zip(&factor.slots).enumerate() {
            assert_eq!(
                graph.variable(var).factors[slot],
                Incidence {
                    factor: a,
                    position: w
                }
            );
            let expected_bit = if factor.links[w] == 1 { 1 } else { 0 };
            assert_eq!(factor.unsat_bit(w), expected_bit);
        }
    }
    let total: usize = graph.variables().iter().map(Variable::degree).sum();
    assert_eq!(total, 3 * 90);
    assert!((graph.mean_degree() - 9.0).abs() < 1e-12);
}

#[test]
fn test_cavities_exclude_one_incidence() {
    let graph = random_instance(20, 80, 3, 5).factor_graph().unwrap();
    for variable in graph.variables() {
        assert_eq!(variable.cavities.len(), variable.degree());
        for (h, cavity) in variable.cavities.iter().enumerate() {
            assert_eq!(cavity.len(), variable.degree() - 1);
            for bit in 0..2 {
                for &other in cavity.group(bit) {
                    assert_ne!(other, h);
                    let inc = variable.factors[other];
                    assert_eq!(graph.factor(inc.factor).unsat_bit(inc.position), bit);
                }
            }
        }
    }
}

#[test]
fn test_count_unsatisfied_matches_literal_evaluation() {
    let instance = random_instance(12, 60, 3, 21);
    let graph = instance.factor_graph().unwrap();
    for pattern in [0u32, 0xfff, 0x5a5, 0x3c3] {
        let variables: Vec<bool> = (0..12).map(|i| (pattern >> i) & 1 == 1).collect();
        let assignment = Assignment {
            variables: variables.clone(),
        };
        assert_eq!(
            graph.count_unsatisfied(&variables).unwrap(),
            instance.count_unsatisfied(&assignment).unwrap()
        );
    }
    assert!(graph.count_unsatisfied(&[true; 3]).is_err());
}

#[test]
fn test_release_variable_shrinks_free_positions() {
    let mut graph = random_instance(8, 30, 3, 2).factor_graph().unwrap();
    let degree = graph.variable(0).degree();
    let before = graph.num_free_positions();
    graph.release_variable(0);
    assert_eq!(graph.num_free_positions(), before - degree);
    for inc in graph.variable(0).factors.clone() {
        assert!(!graph.factor(inc.factor).is_free(inc.position));
    }
    graph.release_variable(0);
    assert_eq!(graph.num_free_positions(), before - degree);
}

#[test]
fn test_from_clauses_rejects_malformed_clauses() {
    assert!(FactorGraph::from_clauses(3, 2, &[vec![1, 1]]).is_err());
    assert!(FactorGraph::from_clauses(3, 2, &[vec![1, 4]]).is_err());
    assert!(FactorGraph::from_clauses(3, 2, &[vec![1, 2, 3]]).is_err());
    assert!(FactorGraph::from_clauses(3, 2, &[vec![0, 2]]).is_err());
    let graph = FactorGraph::from_clauses(3, 2, &[vec![1, -3]]).unwrap();
    assert_eq!(graph.factor(0).unsat_combination, 0b01);
    assert_eq!(graph.to_clauses(), vec![vec![1, -3]]);
}
