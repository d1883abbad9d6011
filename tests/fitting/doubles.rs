//! Collaborators used to exercise the trajectory without real track numerics.

use helixfit::linalg::Matrix5;
use helixfit::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Moves the parameters onto the target surface unchanged, as a straight track along z would.
#[derive(Debug, Default)]
pub struct StraightLine {
    /// Surfaces this propagator never reaches
    pub blocked: Vec<DetElementId>,
}

impl StraightLine {
    pub fn blocking(blocked: &[u64]) -> Self {
        Self {
            blocked: blocked.iter().copied().map(DetElementId).collect(),
        }
    }
}

impl PropagationMethod for StraightLine {
    fn propagate(
        &self,
        params: &TrackParameters,
        target: &Surface,
    ) -> Result<Propagated, PropagationError> {
        if self.blocked.contains(&target.id) {
            return Err(PropagationError::NoIntersection { target: target.id });
        }
        let parameters = TrackParameters::new(
            *params.parameters(),
            *params.covariance(),
            ReferenceLocation::Surface(target.id),
        )
        .map_err(|e| PropagationError::NonPhysicalPath {
            details: e.to_string(),
        })?;
        Ok(Propagated {
            parameters,
            jacobian: Matrix5::identity(),
            path_length: target.origin.z,
        })
    }
}

/// Single pass fit: each measurement contributes the squared pull of its u coordinate against
/// the predicted d0, and is rejected per the configured outlier criteria.
#[derive(Debug)]
pub struct ChiSquareFitter {
    pub config: FitConfig,
}

impl ChiSquareFitter {
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }
}

impl FittingAlgorithm for ChiSquareFitter {
    fn fit(
        &self,
        reference: &TrackParameters,
        elements: &[TrajectoryElement],
        propagation: &dyn PropagationMethod,
        geometry: &dyn Geometry,
    ) -> Result<FitOutcome, FitError> {
        let mut outcome = FitOutcome::with_capacity(elements.len());
        let mut accepted = 0;

        for element in elements {
            let fit = match element.kind() {
                ElementKind::Measurement(msr) => {
                    match propagation.propagate_to(reference, msr.element, geometry) {
                        Ok(propagated) => {
                            let pull = (msr.position[0] - propagated.parameters.d0())
                                / msr.covariance[(0, 0)].sqrt();
                            let state = FittedState::new(propagated.parameters, pull.powi(2));
                            if self.config.outlier.is_outlier(state.chi2, msr.constraints()) {
                                Some(ElementFit::Outlier(Some(state)))
                            } else {
                                accepted += 1;
                                Some(ElementFit::Fitted(state))
                            }
                        }
                        Err(PropagationError::NoIntersection { .. }) => {
                            Some(ElementFit::Outlier(None))
                        }
                        Err(source) => return Err(FitError::Propagation { source }),
                    }
                }
                ElementKind::Virtual { location } => match location.element() {
                    Some(id) => propagation
                        .propagate_to(reference, id, geometry)
                        .ok()
                        .map(|propagated| {
                            ElementFit::Fitted(FittedState::new(propagated.parameters, 0.0))
                        }),
                    None => None,
                },
            };
            outcome.push(fit);
        }

        if accepted == 0 {
            return Err(FitError::SingularSystem {
                details: "no accepted measurement".to_string(),
            });
        }
        if accepted < self.config.min_measurements {
            return Err(FitError::TooFewMeasurements {
                need: self.config.min_measurements,
                found: accepted,
            });
        }

        outcome.iterations = 1;
        Ok(outcome)
    }
}

/// Never converges, iterating until the budget of its configuration is exhausted.
#[derive(Debug, Default)]
pub struct Stalled {
    pub config: FitConfig,
}

impl FittingAlgorithm for Stalled {
    fn fit(
        &self,
        _reference: &TrackParameters,
        _elements: &[TrajectoryElement],
        _propagation: &dyn PropagationMethod,
        _geometry: &dyn Geometry,
    ) -> Result<FitOutcome, FitError> {
        let mut iterations = 0;
        loop {
            self.config.check_iterations(iterations)?;
            iterations += 1;
        }
    }
}

/// Fails every other call, starting with the second one.
#[derive(Debug)]
pub struct Flaky {
    pub inner: ChiSquareFitter,
    pub calls: AtomicUsize,
}

impl Flaky {
    pub fn new(inner: ChiSquareFitter) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FittingAlgorithm for Flaky {
    fn fit(
        &self,
        reference: &TrackParameters,
        elements: &[TrajectoryElement],
        propagation: &dyn PropagationMethod,
        geometry: &dyn Geometry,
    ) -> Result<FitOutcome, FitError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
            return Err(FitError::NonConvergence { iterations: 0 });
        }
        self.inner.fit(reference, elements, propagation, geometry)
    }
}

/// How a [`Malformed`] fitter breaks the fit contract.
#[derive(Copy, Clone, Debug)]
pub enum Malformation {
    /// Drops the classification of the last element
    Truncated,
    /// Leaves the first measurement unclassified
    UnclassifiedMeasurement,
    /// Marks the first virtual element as an outlier
    VirtualOutlier,
    /// Reports a negative chi square on the first fitted element
    NegativeChi2,
    /// Reports the first fitted state at the reference location of the seed
    WrongLocation,
}

/// Runs a valid fit and then corrupts its outcome.
#[derive(Debug)]
pub struct Malformed {
    pub inner: ChiSquareFitter,
    pub malformation: Malformation,
}

impl FittingAlgorithm for Malformed {
    fn fit(
        &self,
        reference: &TrackParameters,
        elements: &[TrajectoryElement],
        propagation: &dyn PropagationMethod,
        geometry: &dyn Geometry,
    ) -> Result<FitOutcome, FitError> {
        let mut outcome = self.inner.fit(reference, elements, propagation, geometry)?;

        let first_fitted = outcome
            .elements
            .iter()
            .position(|fit| matches!(fit, Some(ElementFit::Fitted(_))))
            .unwrap();

        match self.malformation {
            Malformation::Truncated => {
                outcome.elements.pop();
            }
            Malformation::UnclassifiedMeasurement => {
                let idx = elements.iter().position(|e| e.is_measurement()).unwrap();
                outcome.elements[idx] = None;
            }
            Malformation::VirtualOutlier => {
                let idx = elements.iter().position(|e| !e.is_measurement()).unwrap();
                outcome.elements[idx] = Some(ElementFit::Outlier(None));
            }
            Malformation::NegativeChi2 => {
                if let Some(ElementFit::Fitted(state)) = &mut outcome.elements[first_fitted] {
                    state.chi2 = -1.0;
                }
            }
            Malformation::WrongLocation => {
                if let Some(ElementFit::Fitted(state)) = &mut outcome.elements[first_fitted] {
                    state.parameters = *reference;
                }
            }
        }

        Ok(outcome)
    }
}
