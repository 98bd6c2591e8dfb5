use cda_dynamics::{
    poisson::{max_cavity_size, poisson_pmf, poisson_survival},
    rates::{fms_rate, walksat_greedy_weight, walksat_rate},
    FmsRateTable, FmsRates, PassSummary, RateModel, WalkSatRates,
};

#[test]
fn test_fms_rate_downhill_is_e0_over_k() {
    for e0 in 0..6 {
        for e1 in 0..=e0 {
            assert_eq!(fms_rate(e0, e1, 3, 0.2), e0 as f64 / 3.0);
        }
    }
}

#[test]
fn test_fms_rate_non_increasing_uphill() {
    let eta = 0.37;
    for e0 in 1..5 {
        let mut last = fms_rate(e0, e0, 4, eta);
        for e1 in e0 + 1..e0 + 6 {
            let rate = fms_rate(e0, e1, 4, eta);
            assert!(rate <= last);
            assert!((rate - e0 as f64 / 4.0 * eta.powi((e1 - e0) as i32)).abs() < 1e-15);
            last = rate;
        }
    }
}

#[test]
fn test_fms_table_falls_back_outside_range() {
    let table = FmsRateTable::new(3, 3, 0.5);
    assert_eq!(table.max_count(), 3);
    assert_eq!(table.get(2, 3), fms_rate(2, 3, 3, 0.5));
    assert_eq!(table.get(7, 9), fms_rate(7, 9, 3, 0.5));
}

#[test]
fn test_fms_rates_scale_with_energy() {
    let mut rates = FmsRates::new(FmsRateTable::new(4, 3, 0.5));
    rates.prepare(&PassSummary {
        energy_density: 0.25,
        unsat_fraction: 0.1,
    });
    assert!((rates.rate(3, 1, 5) - 4.0).abs() < 1e-12);
    rates.prepare(&PassSummary::default());
    assert!(rates.rate(1, 0, 5).is_finite());
}

#[test]
fn test_walksat_rate_zero_without_violated_clause() {
    assert_eq!(walksat_rate(0, 0.7, 3, 0.4, 0.1), 0.0);
    let mut rates = WalkSatRates::new(3, 0.4, 10, 4.2);
    rates.prepare(&PassSummary {
        energy_density: 0.2,
        unsat_fraction: 0.05,
    });
    for degree in 0..=10 {
        assert_eq!(rates.rate(0, 2, degree), 0.0);
    }
}

#[test]
fn test_walksat_greedy_weight() {
    // every neighbour ties: uniform choice among K
    for k in 1..6 {
        assert!((walksat_greedy_weight(k, 1.0, 0.0) - 1.0 / k as f64).abs() < 1e-15);
    }
    // every neighbour strictly worse: always chosen
    assert!((walksat_greedy_weight(4, 0.0, 1.0) - 1.0).abs() < 1e-15);
    // K = 2: tie / 2 + above
    assert!((walksat_greedy_weight(2, 0.3, 0.5) - 0.65).abs() < 1e-15);
}

#[test]
fn test_walksat_rates_use_poisson_tables() {
    let mut rates = WalkSatRates::new(3, 0.5, 8, 6.0);
    rates.refresh(0.25);
    for s in 0..=8 {
        assert!((rates.pmf()[s] - poisson_pmf(s, 4.5)).abs() < 1e-15);
        assert!((rates.survival()[s] - poisson_survival(s, 4.5)).abs() < 1e-15);
        let expected = walksat_greedy_weight(3, rates.pmf()[s], rates.survival()[s]);
        assert!((rates.greedy_weight(s) - expected).abs() < 1e-15);
    }
    rates.prepare(&PassSummary {
        energy_density: 0.5,
        unsat_fraction: 0.25,
    });
    let expected = walksat_rate(2, rates.greedy_weight(3), 3, 0.5, 0.5);
    assert!((rates.rate(2, 1, 5) - expected).abs() < 1e-12);
}

#[test]
fn test_poisson_helpers() {
    let total: f64 = (0..60).map(|k| poisson_pmf(k, 3.0)).sum();
    assert!((total - 1.0).abs() < 1e-12);
    assert_eq!(poisson_pmf(0, 0.0), 1.0);
    assert_eq!(poisson_survival(0, 0.0), 0.0);
    let g = max_cavity_size(6.0, 1e-4);
    assert!(poisson_survival(g, 6.0) <= 1e-4);
    assert!(poisson_survival(g - 1, 6.0) > 1e-4);
}
