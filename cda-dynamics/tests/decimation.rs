use cda_dynamics::{decimation::most_biased, *};
use cda_instances::{Instance, InstanceParams};
use cda_utils::u8s_from_u64;

#[test]
fn test_most_biased_prefers_first_on_ties() {
    let pi = [0.5, 0.8, 0.2, 0.9, 0.1];
    let fixed = [None, None, None, Some(true), None];
    assert_eq!(most_biased(&pi, &fixed), Some(4));
    let pi = [0.3, 0.7, 0.5];
    assert_eq!(most_biased(&pi, &[None, None, None]), Some(0));
    assert_eq!(most_biased(&pi, &[Some(false), Some(true), Some(true)]), None);
}

#[test]
fn test_decimation_fixes_every_variable() {
    let instance = Instance::generate(
        &u8s_from_u64(1),
        &InstanceParams {
            num_variables: 20,
            num_clauses: 60,
            arity: 3,
        },
    )
    .unwrap();
    let graph = instance.factor_graph().unwrap();
    let table = FmsRateTable::new(graph.max_degree() + 1, 3, 0.3);
    let m = graph.num_factors();
    let mut dynamics = GraphDynamics::new(graph, FmsRates::new(table));
    let mut heun = Heun::new(IntegratorConfig {
        max_step: Some(m as f64),
        ..Default::default()
    });

    let mut rounds = Vec::new();
    let report = decimate(
        &mut dynamics,
        &mut heun,
        &DecimationParams {
            steps_per_round: 3,
            p0: 0.5,
        },
        &mut |summary| {
            rounds.push(summary.clone());
            Ok(())
        },
    )
    .unwrap();

    assert_eq!(rounds.len(), 20);
    let mut fixed: Vec<usize> = rounds.iter().map(|r| r.variable).collect();
    fixed.sort();
    assert_eq!(fixed, (0..20).collect::<Vec<_>>());
    for round in rounds.iter() {
        assert_eq!(report.assignment.variables[round.variable], round.value);
        assert!(round.accepted_steps <= 3);
    }
    assert_eq!(dynamics.graph().num_free_positions(), 0);
    assert_eq!(report.assignment.variables.len(), 20);
    assert_eq!(
        report.residual_energy,
        instance.count_unsatisfied(&report.assignment).unwrap()
    );
    assert!((report.energy - report.residual_energy as f64).abs() < 1e-9);
    assert_eq!(
        report.accepted_steps,
        rounds.iter().map(|r| r.accepted_steps).sum::<usize>()
    );
}
