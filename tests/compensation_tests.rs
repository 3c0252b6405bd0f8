use leveling_adjust::compensation::{compensate, compensate_batch, CompensationJob, NetworkCompensator};
use leveling_adjust::data::{simulate_traverse, TraverseSimulation};
use leveling_adjust::domain::{
    CalculationResults, ChiSquareTest, CompensationConfig, LevelingConfig, PointRow, Traverse, WeightModel,
};
use leveling_adjust::reduction::reduce;
use leveling_adjust::LevelingError;

fn reduced_loop(seed: u64, noise_mm_per_sqrt_km: f64) -> (CalculationResults, Vec<f64>, Vec<f64>) {
    let sim = simulate_traverse(&TraverseSimulation {
        seed,
        point_count: 12,
        close_loop: true,
        noise_mm_per_sqrt_km,
        ..TraverseSimulation::default()
    })
    .unwrap();
    let r = reduce(&sim.traverse, &LevelingConfig::default()).unwrap();
    let d = r.observation_distances().unwrap();
    (r, d, sim.true_altitudes_m)
}

#[test]
fn exactly_determined_network_reports_not_applicable() {
    let t = Traverse::new(100.0)
        .with_row(PointRow::single("P0", Some(1.5), None, None))
        .with_row(PointRow::single("P1", Some(1.6), Some(1.0), Some(100.0)))
        .with_row(PointRow::single("P2", Some(1.4), Some(1.0), Some(100.0)))
        .with_row(PointRow::single("P3", Some(1.7), Some(1.0), Some(100.0)))
        .with_row(PointRow::single("P4", Some(1.3), Some(1.0), Some(100.0)))
        .with_row(PointRow::single("P5", None, Some(1.0), Some(100.0)))
        .with_known_final(102.503);
    let r = reduce(&t, &LevelingConfig::default()).unwrap();
    let c = compensate(&r, &[100.0; 5], &CompensationConfig::default()).unwrap();

    assert_eq!(c.statistics.degrees_of_freedom, 0);
    assert_eq!(c.statistics.sigma0_hat, None);
    assert_eq!(c.statistics.unit_weight_valid, None);
    assert_eq!(c.statistics.chi_square, ChiSquareTest::NotApplicable);
    assert_eq!(c.adjusted_altitudes.len(), 6);

    let json = serde_json::to_value(&c).unwrap();
    assert_eq!(json["statistics"]["chi_square"]["status"], "not_applicable");
    assert!(json["statistics"]["sigma0_hat"].is_null());
}

#[test]
fn dimension_and_distance_errors_carry_counts() {
    let (r, d, _) = reduced_loop(1, 1.0);
    let config = CompensationConfig::default();

    let err = compensate(&r, &d[..d.len() - 1], &config).unwrap_err();
    assert_eq!(
        err,
        LevelingError::DimensionMismatch {
            what: "distances",
            expected: 12,
            actual: 11
        }
    );

    let mut bad = d.clone();
    bad[4] = -3.0;
    let err = compensate(&r, &bad, &config).unwrap_err();
    assert!(matches!(err, LevelingError::InvalidDistance { index: 4, distance_m, .. } if distance_m == -3.0));
}

#[test]
fn unobserved_points_are_rejected() {
    let t = Traverse::new(10.0)
        .with_row(PointRow::single("A", Some(1.2), None, None))
        .with_row(PointRow::single("B", Some(1.3), Some(1.0), Some(50.0)))
        .with_row(PointRow::single("A", None, Some(1.5), Some(50.0)));
    let r = reduce(&t, &LevelingConfig::default()).unwrap();
    let config = CompensationConfig::default();
    assert_eq!(compensate(&r, &[50.0, 50.0], &config).unwrap().statistics.degrees_of_freedom, 1);

    // One unobserved point: as many unknowns as observations, but no
    // observation ties C to the datum.
    let mut singular = r.clone();
    let mut extra = singular.altitudes[1].clone();
    extra.point_id = "C".to_string();
    singular.altitudes.push(extra.clone());
    let err = compensate(&singular, &[50.0, 50.0], &config).unwrap_err();
    assert!(matches!(
        err,
        LevelingError::SingularNetwork {
            observations: 2,
            unknowns: 2,
            ..
        }
    ));

    // Two unobserved points: more unknowns than observations.
    let mut under = singular;
    extra.point_id = "D".to_string();
    under.altitudes.push(extra);
    let err = compensate(&under, &[50.0, 50.0], &config).unwrap_err();
    assert_eq!(
        err,
        LevelingError::UnderdeterminedNetwork {
            observations: 2,
            unknowns: 3
        }
    );
    assert!(err.to_string().contains("2 observation(s) for 3 unknown(s)"));
}

#[test]
fn compensation_is_deterministic() {
    let (r, d, _) = reduced_loop(11, 1.5);
    let config = CompensationConfig::default();
    let a = compensate(&r, &d, &config).unwrap();
    let b = compensate(&r, &d, &config).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn adjusted_loop_closes_exactly() {
    let (r, d, _) = reduced_loop(5, 2.0);
    let c = compensate(&r, &d, &CompensationConfig::default()).unwrap();

    // Adjusted observations l + v sum to zero around the loop.
    let observed: f64 = r.valid_height_differences().map(|hd| hd.corrected_delta_m).sum();
    let residuals: f64 = c.residuals_mm.iter().sum::<f64>() / 1000.0;
    assert!((observed + residuals).abs() < 1e-9);

    // And every residual is the misclosure share of its leg.
    let total: f64 = d.iter().sum();
    for (v, di) in c.residuals_mm.iter().zip(&d) {
        assert!((v + observed * 1000.0 * di / total).abs() < 1e-6);
    }
    assert!(c.statistics.sigma0_hat.unwrap() >= 0.0);
}

#[test]
fn chi_square_accepts_correctly_weighted_noise() {
    let runs = 200;
    let mut passed = 0;
    let mut variance_sum = 0.0;
    for seed in 0..runs {
        let (r, d, _) = reduced_loop(1000 + seed, 1.0);
        let c = compensate(&r, &d, &CompensationConfig::default()).unwrap();
        if c.statistics.unit_weight_valid == Some(true) {
            passed += 1;
        }
        variance_sum += c.statistics.sigma0_hat.unwrap().powi(2);
    }
    let rate = passed as f64 / runs as f64;
    assert!(rate > 0.85, "pass rate {rate}");
    let mean_variance = variance_sum / runs as f64;
    assert!((0.6..1.4).contains(&mean_variance), "mean variance {mean_variance}");
}

#[test]
fn variance_weights_are_supported() {
    let (r, d, truth) = reduced_loop(3, 1.0);
    let config = CompensationConfig {
        weight_model: WeightModel::Variance {
            instrumental_mm: 0.3,
            kilometric_mm: 1.0,
        },
        ..CompensationConfig::default()
    };
    let c = compensate(&r, &d, &config).unwrap();
    for (p, t) in c.adjusted_altitudes.iter().zip(&truth) {
        assert!((p.adjusted_altitude_m - t).abs() < 0.01, "{p:?} vs {t}");
    }
}

#[test]
fn batch_runs_in_input_order() {
    let inputs: Vec<(CalculationResults, Vec<f64>, Vec<f64>)> = (0..8).map(|s| reduced_loop(s, 1.0)).collect();
    let jobs: Vec<CompensationJob<'_>> = inputs.iter().map(|(r, d, _)| CompensationJob::new(r, d)).collect();
    let compensator = NetworkCompensator::new(CompensationConfig::default()).unwrap();
    let out = compensate_batch(&compensator, &jobs);
    for ((r, d, _), res) in inputs.iter().zip(&out) {
        assert_eq!(res.as_ref().unwrap(), &compensator.compensate(r, d).unwrap());
    }
}
