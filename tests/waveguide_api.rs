use scm_dispersion::{ElasticLayer, ScmError, SolverOptions, Waveguide, WaveguideState};

fn unit_layer() -> ElasticLayer {
    ElasticLayer::new(1.0, 1.0, 1.0, 1.0, "name").unwrap()
}

#[test]
fn single_layer_evaluation_doubles_dimension() {
    let mut waveguide = Waveguide::new();
    waveguide.add_layer(ElasticLayer::new(6350.0, 3100.0, 2700.0, 10e-3, "AL").unwrap());
    waveguide.build(16).unwrap();

    let result = waveguide.evaluate(1.0).unwrap();
    assert_eq!(result.wavenumbers.len(), 64);
    assert_eq!(result.eigenvectors.shape(), (64, 64));
}

#[test]
fn dimension_grows_with_layers_and_points() {
    for (layers, n) in [(1, 4), (2, 5), (3, 3)] {
        let mut waveguide = Waveguide::with_layers((0..layers).map(|_| unit_layer()));
        waveguide.build(n).unwrap();
        let dim = layers * 2 * n;
        assert_eq!(waveguide.system().unwrap().dim(), dim);
        for m in waveguide.system().unwrap().kinematic.iter() {
            assert_eq!(m.shape(), (dim, dim));
        }
    }
}

#[test]
fn evaluation_requires_a_current_build() {
    let mut waveguide = Waveguide::with_layers([unit_layer()]);
    assert!(matches!(waveguide.evaluate(1.0), Err(ScmError::State(_))));

    waveguide.build(4).unwrap();
    waveguide.add_layer(unit_layer());
    assert_eq!(waveguide.state(), WaveguideState::HasLayers);
    assert!(matches!(
        waveguide.evaluate_with(-1.0, &SolverOptions::default()),
        Err(ScmError::State(_))
    ));
}

#[test]
fn build_errors_follow_the_taxonomy() {
    assert!(matches!(Waveguide::new().build(8), Err(ScmError::State(_))));

    let mut waveguide = Waveguide::with_layers([unit_layer()]);
    assert!(matches!(
        waveguide.build(0),
        Err(ScmError::Validation { field: "n", .. })
    ));
}

#[test]
fn non_positive_frequency_is_rejected_after_build() {
    let mut waveguide = Waveguide::with_layers([ElasticLayer::new(6350.0, 3100.0, 2700.0, 1e-3, "AL").unwrap()]);
    waveguide.build(6).unwrap();
    for f in [0.0, -10.0, f64::INFINITY] {
        assert!(matches!(
            waveguide.evaluate(f),
            Err(ScmError::Validation { field: "f", .. })
        ));
    }
}

#[test]
fn validation_messages_name_field_and_value() {
    let err = ElasticLayer::new(0.0, 1.0, 1.0, 1.0, "bad").unwrap_err();
    assert_eq!(err.to_string(), "'cl' must be positive; got 0 instead.");
}
