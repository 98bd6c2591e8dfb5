use cda_dynamics::{state::uniform_product_joint, *};
use cda_instances::{FactorGraph, Instance, InstanceParams};
use cda_utils::u8s_from_u64;
use ndarray::Array2;

fn graph(n: usize, m: usize, k: usize, seed: u64) -> FactorGraph {
    Instance::generate(
        &u8s_from_u64(seed),
        &InstanceParams {
            num_variables: n,
            num_clauses: m,
            arity: k,
        },
    )
    .unwrap()
    .factor_graph()
    .unwrap()
}

fn fms_dynamics(graph: FactorGraph, eta: f64) -> GraphDynamics<FmsRates> {
    let table = FmsRateTable::new(graph.max_degree() + 1, graph.arity(), eta);
    GraphDynamics::new(graph, FmsRates::new(table))
}

fn assert_normalised(joint: &Array2<f64>) {
    for row in joint.rows() {
        assert!(row.iter().all(|&p| p >= 0.0));
        assert!((row.sum() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_derivative_conserves_probability() {
    let graph = graph(30, 90, 3, 4);
    let pi: Vec<f64> = (0..30).map(|v| 0.2 + 0.02 * v as f64).collect();
    let joint = state::product_joint(&graph, &pi);
    let mut dynamics = fms_dynamics(graph, 0.3);
    let mut out = Array2::zeros(joint.dim());
    dynamics.derivative(joint.view(), out.view_mut()).unwrap();
    for row in out.rows() {
        assert!(row.sum().abs() < 1e-12);
    }
    assert!(out.iter().any(|&d| d != 0.0));
}

#[test]
fn test_derivative_rejects_bad_shape() {
    let mut dynamics = fms_dynamics(graph(10, 10, 3, 1), 0.1);
    let joint = Array2::from_elem((3, 8), 0.125);
    let mut out = Array2::zeros((3, 8));
    assert!(dynamics.derivative(joint.view(), out.view_mut()).is_err());
}

#[test]
fn test_fms_small_instance_scenario() {
    let graph = graph(10, 10, 3, 1);
    let m = graph.num_factors();
    let mut joint = uniform_product_joint(&graph, 0.5);
    let mut dynamics = fms_dynamics(graph, 0.1);
    let mut heun = Heun::new(IntegratorConfig {
        tolerance: 1e-2,
        max_step: Some(m as f64),
        ..Default::default()
    });

    let mut series: Vec<(f64, f64)> = Vec::new();
    let summary = heun
        .integrate(&mut dynamics, &mut joint, 1.0, &mut |t, e| {
            series.push((t, e));
            Ok(())
        })
        .unwrap();

    assert!(summary.accepted >= 1);
    assert!(summary.time >= 1.0 || summary.energy < 1e-6);
    assert_eq!(series.len(), summary.accepted + 1);
    assert!(series.windows(2).all(|w| w[0].0 <= w[1].0));
    assert!((series[0].1 - 10.0 / 8.0 / 10.0).abs() < 1e-12);
    assert!(summary.energy <= series[0].1);
    assert!(series.iter().all(|&(_, e)| e >= 0.0));
    assert_normalised(&joint);
}

#[test]
fn test_walksat_run_lowers_energy() {
    let graph = graph(40, 120, 3, 9);
    let rates = WalkSatRates::new(3, 0.5, graph.max_degree(), graph.mean_degree());
    let m = graph.num_factors();
    let mut joint = uniform_product_joint(&graph, 0.5);
    let mut dynamics = GraphDynamics::new(graph, rates);
    let mut heun = Heun::new(IntegratorConfig {
        max_step: Some(m as f64),
        ..Default::default()
    });
    let initial = dynamics.energy(joint.view());
    let summary = heun
        .integrate(&mut dynamics, &mut joint, 0.5, &mut |_, _| Ok(()))
        .unwrap();
    assert!(summary.accepted >= 1);
    assert!(summary.energy < initial);
    assert_normalised(&joint);
}

#[test]
fn test_rejected_attempts_leave_state_untouched() {
    let graph = graph(20, 60, 3, 2);
    let mut joint = uniform_product_joint(&graph, 0.5);
    let mut dynamics = fms_dynamics(graph, 0.2);
    let mut heun = Heun::new(IntegratorConfig {
        tolerance: 1e-9,
        initial_step: 1.0,
        ..Default::default()
    });
    let before = joint.clone();
    let outcome = heun.attempt(&mut dynamics, &mut joint).unwrap();
    assert_ne!(outcome, StepOutcome::Accepted);
    assert_eq!(joint, before);
    assert_eq!(heun.time(), 0.0);
    assert!(heun.step_size() < 1.0);
}

#[test]
fn test_advance_accepts_one_step() {
    let graph = graph(20, 60, 3, 3);
    let mut joint = uniform_product_joint(&graph, 0.5);
    let mut dynamics = fms_dynamics(graph, 0.2);
    let mut heun = Heun::new(IntegratorConfig::default());
    heun.advance(&mut dynamics, &mut joint).unwrap();
    assert_eq!(heun.accepted(), 1);
    assert_eq!(heun.stage(), Stage::Accept);
    assert!(heun.time() > 0.0);
    assert_normalised(&joint);
}

#[test]
fn test_config_from_json() {
    let config: IntegratorConfig =
        serde_json::from_str(r#"{"tolerance": 0.001, "max_step": 4.0}"#).unwrap();
    assert_eq!(config.tolerance, 0.001);
    assert_eq!(config.max_step, Some(4.0));
    assert_eq!(config.min_step, IntegratorConfig::default().min_step);
}

#[test]
fn test_oversized_initial_step_is_halved_below_min_step() {
    let graph = graph(20, 60, 3, 6);
    let pi: Vec<f64> = (0..20).map(|v| 0.1 + 0.04 * v as f64).collect();
    let mut joint = state::product_joint(&graph, &pi);
    let mut dynamics = fms_dynamics(graph, 0.2);
    let mut heun = Heun::new(IntegratorConfig {
        initial_step: 1e6,
        min_step: 1e3,
        ..Default::default()
    });

    heun.advance(&mut dynamics, &mut joint).unwrap();

    assert_eq!(heun.accepted(), 1);
    assert!(heun.min_step() < 1e3);
    assert!(heun.time() > 0.0 && heun.time() < 1e3);
    assert_normalised(&joint);
}
