use super::*;
use approx::assert_relative_eq;

#[rstest]
fn fit_partitions_the_measurements(
    detector: DetectorGeometry,
    seed: TrackParameters,
    elements: Vec<TrajectoryElement>,
    fitter: ChiSquareFitter,
    propagator: StraightLine,
) {
    init_logger();

    let mut traj = Trajectory::new(seed, elements.clone(), &fitter, &propagator, &detector);
    println!("{traj}");

    // Before any fit, everything is available but there are no results.
    assert_eq!(traj.status(), FitStatus::Unfit);
    assert_eq!(traj.trajectory_elements(), elements.as_slice());
    assert_eq!(traj.measurements().len(), 5);
    assert!(traj.fitted_trajectory_elements().is_empty());
    assert!(traj.fitted_measurements().is_empty());
    assert!(traj.outliers().is_empty());
    assert_eq!(traj.chi_square(), 0.0);
    assert_eq!(traj.ndf(), 0);
    assert!(traj.summary().is_none());

    let summary = traj.fit().unwrap();
    println!("{traj}");

    assert_eq!(traj.status(), FitStatus::Succeeded);
    assert_eq!(traj.summary(), Some(&summary));
    assert_eq!(summary.iterations, 1);

    // Order and content of the elements is unchanged by the fit.
    assert_eq!(traj.trajectory_elements().len(), elements.len());
    for (fitted, input) in traj.trajectory_elements().iter().zip(&elements) {
        assert_eq!(fitted.kind(), input.kind());
    }

    // Measurements are partitioned between fitted measurements and outliers.
    let fitted_msr = traj.fitted_measurements();
    let outliers = traj.outliers();
    assert_eq!(fitted_msr.len(), 4);
    assert_eq!(outliers.len(), 1);
    assert_eq!(fitted_msr.len() + outliers.len(), traj.measurements().len());
    assert_eq!(outliers[0].location(), ReferenceLocation::Surface(DetElementId(5)));
    assert!(outliers[0].fitted_state().is_some(), "outlier should keep its evaluated state");

    // Fitted elements include the material surface but not the unevaluated perigee point.
    let fitted = traj.fitted_trajectory_elements();
    assert_eq!(fitted.len(), 5);
    assert!(fitted.iter().any(|e| !e.is_measurement()));
    assert!(traj.trajectory_elements()[0].fit().is_none());
    for element in &fitted {
        let state = element.fitted_state().unwrap();
        assert_eq!(*state.parameters.reference(), element.location());
    }

    // Chi square is the sum of the contributions of the fitted elements only.
    let sum: f64 = fitted.iter().filter_map(|e| e.chi2()).sum();
    assert_relative_eq!(traj.chi_square(), sum, epsilon = 1e-12);
    assert_relative_eq!(traj.chi_square(), 0.25 + 1.0 + 0.0 + 1.0, epsilon = 1e-9);

    // Four pixel hits of two constraints each, minus five helix parameters.
    assert_eq!(traj.ndf(), 3);
    assert_eq!(summary.fitted_elements, 5);
    assert_eq!(summary.fitted_measurements, 4);
    assert_eq!(summary.outliers, 1);
    assert_relative_eq!(summary.reduced_chi2().unwrap(), 0.75, epsilon = 1e-9);
}

#[rstest]
fn refit_is_deterministic(
    detector: DetectorGeometry,
    seed: TrackParameters,
    elements: Vec<TrajectoryElement>,
    fitter: ChiSquareFitter,
    propagator: StraightLine,
) {
    init_logger();

    let mut traj = Trajectory::new(seed, elements, &fitter, &propagator, &detector);

    let first = traj.fit().unwrap();
    let first_elements = traj.trajectory_elements().to_vec();

    let second = traj.fit().unwrap();
    assert_eq!(first, second);
    assert_eq!(traj.trajectory_elements(), first_elements.as_slice());
    assert_eq!(traj.outliers().len(), 1);
}

#[rstest]
fn unreachable_measurement_is_an_outlier(detector: DetectorGeometry, seed: TrackParameters) {
    init_logger();

    let fitter = ChiSquareFitter::new(FitConfig::builder().min_measurements(2).build());
    let propagator = StraightLine::blocking(&[3]);

    let mut traj = Trajectory::new(
        seed,
        vec![strip(1, 0.1), strip(2, 0.0), strip(3, -0.1)],
        &fitter,
        &propagator,
        &detector,
    );

    let summary = traj.fit().unwrap();

    let fitted: Vec<_> = traj
        .fitted_measurements()
        .iter()
        .map(|e| e.location())
        .collect();
    assert_eq!(
        fitted,
        vec![
            ReferenceLocation::Surface(DetElementId(1)),
            ReferenceLocation::Surface(DetElementId(2))
        ]
    );

    let outliers = traj.outliers();
    assert_eq!(outliers.len(), 1);
    assert_eq!(outliers[0].location(), ReferenceLocation::Surface(DetElementId(3)));
    assert!(outliers[0].fitted_state().is_none());
    assert!(outliers[0].chi2().is_none());

    assert_relative_eq!(summary.chi2, 1.0, epsilon = 1e-9);
    // Two strips cannot constrain five parameters.
    assert_eq!(summary.ndf, 0);
    assert_eq!(summary.p_value(), None);
}

#[rstest]
fn assembled_trajectory(
    detector: DetectorGeometry,
    seed: TrackParameters,
    elements: Vec<TrajectoryElement>,
    fitter: ChiSquareFitter,
    propagator: StraightLine,
) {
    init_logger();

    let mut traj = Trajectory::empty();
    assert!(traj.reference_parameters().is_none());
    assert!(traj.fitting_algorithm().is_none());

    traj.set_reference_parameters(seed);
    for element in elements.iter().copied() {
        traj.push_element(element);
    }
    traj.bind(&fitter, &propagator, &detector);
    assert_eq!(traj.reference_parameters(), Some(&seed));
    assert_eq!(traj.trajectory_elements(), elements.as_slice());

    traj.fit().unwrap();
    assert_eq!(traj.outliers().len(), 1);

    // Changing the inputs invalidates the previous results.
    traj.push_element(pixel(7, 0.0));
    assert_eq!(traj.status(), FitStatus::Unfit);
    assert!(traj.trajectory_elements().iter().all(|e| e.fit().is_none()));
    assert_eq!(traj.chi_square(), 0.0);

    let summary = traj.fit().unwrap();
    assert_eq!(summary.fitted_measurements, 5);
    assert_eq!(summary.ndf, 5);
}

#[rstest]
fn construction_discards_previous_results(
    detector: DetectorGeometry,
    seed: TrackParameters,
    elements: Vec<TrajectoryElement>,
    fitter: ChiSquareFitter,
    propagator: StraightLine,
) {
    let mut traj = Trajectory::new(seed, elements, &fitter, &propagator, &detector);
    traj.fit().unwrap();

    let reused = Trajectory::new(
        seed,
        traj.trajectory_elements().to_vec(),
        &fitter,
        &propagator,
        &detector,
    );
    assert_eq!(reused.status(), FitStatus::Unfit);
    assert!(reused.fitted_trajectory_elements().is_empty());
    assert!(reused.outliers().is_empty());
}

#[rstest]
fn clones_share_collaborators(
    detector: DetectorGeometry,
    seed: TrackParameters,
    elements: Vec<TrajectoryElement>,
    fitter: ChiSquareFitter,
    propagator: StraightLine,
) {
    let traj = Trajectory::new(seed, elements, &fitter, &propagator, &detector);
    let mut clone = traj.clone();

    assert!(std::ptr::addr_eq(
        traj.fitting_algorithm().unwrap(),
        clone.fitting_algorithm().unwrap()
    ));
    assert!(std::ptr::addr_eq(
        traj.propagation_method().unwrap(),
        clone.propagation_method().unwrap()
    ));
    assert!(std::ptr::addr_eq(
        traj.geometry().unwrap(),
        clone.geometry().unwrap()
    ));

    // Fitting the clone leaves the original untouched.
    clone.fit().unwrap();
    assert_eq!(clone.status(), FitStatus::Succeeded);
    assert_eq!(traj.status(), FitStatus::Unfit);
    assert!(traj.fitted_measurements().is_empty());

    let repr = format!("{traj:?}");
    assert!(repr.contains("ChiSquareFitter"), "{repr}");
    assert!(repr.contains("StraightLine"), "{repr}");
    assert!(repr.contains("DetectorGeometry"), "{repr}");
}
