//! Phase-transition behavior of SIR epidemics on Erdős–Rényi networks:
//! with mean degree ⟨k⟩ and removal rate α = 1, outbreaks sweeping β
//! across the critical value 1/⟨k⟩ switch from dying out immediately to
//! reaching a macroscopic fraction of the population.

use epinet::prelude::*;

const POPULATION: usize = 1000;
const MEAN_DEGREE: f64 = 8.0;
const ALPHA: f64 = 1.0;
const INITIAL_INFECTED_FRACTION: f64 = 0.01;

fn mean_final_removed(beta: f64, replications: usize, base_seed: u64) -> f64 {
    let points = ParameterPoint::beta_sweep(
        POPULATION,
        MEAN_DEGREE,
        ALPHA,
        INITIAL_INFECTED_FRACTION,
        &[beta],
    );
    let spec = SweepSpec::new(points.clone(), replications)
        .with_base_seed(base_seed)
        .with_workers(4);
    let results = run_sweep(&spec).unwrap();
    assert!(results.is_complete());
    assert_eq!(results.records.len(), replications);
    results.aggregate(&points)[0].mean_final_removed
}

#[test]
fn subcritical_outbreaks_die_out() {
    // Far below the threshold 1/<k> = 0.125 the outbreak never leaves
    // the initial seeds' neighborhood.
    for beta in [0.02, 0.0625] {
        let removed = mean_final_removed(beta, 5, 2024);
        assert!(
            removed < 0.05 * POPULATION as f64,
            "beta={beta}: mean final removed {removed} should be near zero"
        );
    }
}

#[test]
fn supercritical_outbreaks_are_macroscopic() {
    for (beta, floor) in [(0.3, 0.25), (0.6, 0.4)] {
        let removed = mean_final_removed(beta, 5, 2024);
        assert!(
            removed > floor * POPULATION as f64,
            "beta={beta}: mean final removed {removed} should be macroscopic"
        );
    }
}

#[test]
fn transition_is_sharp_across_the_threshold() {
    let below = mean_final_removed(0.05, 5, 7);
    let above = mean_final_removed(0.4, 5, 7);
    assert!(
        above > 10.0 * below,
        "final size should jump across the threshold: below={below}, above={above}"
    );
}
