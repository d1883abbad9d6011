/*
    Helixfit, charged particle track fitting
    Copyright (C) 2024-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::fit::{FitError, FitFailure, FitOutcome, FitSummary, FittingAlgorithm};
use crate::geometry::Geometry;
use crate::propagators::PropagationMethod;
use crate::track::{ElementFit, FittedState, TrackParameters, TrajectoryElement, TRACK_PARAM_DIM};
use snafu::prelude::*;
use std::fmt;

mod batch;
pub use batch::fit_batch;

/// The three strategies a trajectory needs to be fit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CollaboratorKind {
    FittingAlgorithm,
    PropagationMethod,
    Geometry,
}

impl fmt::Display for CollaboratorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::FittingAlgorithm => write!(f, "fitting algorithm"),
            Self::PropagationMethod => write!(f, "propagation method"),
            Self::Geometry => write!(f, "geometry service"),
        }
    }
}

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TrajectoryError {
    #[snafu(display("no {kind} bound to the trajectory"))]
    MissingCollaborator { kind: CollaboratorKind },
    #[snafu(display("no reference parameters to seed the fit"))]
    MissingReference,
    #[snafu(display("trajectory has no elements to fit"))]
    EmptyTrajectory,
    #[snafu(display("{source}"))]
    Fit { source: FitError },
    #[snafu(display("fitting algorithm returned an invalid outcome: {reason}"))]
    InvalidOutcome { reason: String },
}

impl TrajectoryError {
    /// Whether the trajectory was not ready to be fit, as opposed to a fit that failed.
    pub fn is_precondition(&self) -> bool {
        self.failure() == FitFailure::Precondition
    }

    pub fn failure(&self) -> FitFailure {
        match self {
            Self::MissingCollaborator { .. } | Self::MissingReference | Self::EmptyTrajectory => {
                FitFailure::Precondition
            }
            Self::Fit { source } => source.failure(),
            Self::InvalidOutcome { .. } => FitFailure::InvalidOutcome,
        }
    }
}

/// Where a trajectory stands in its fit lifecycle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FitStatus {
    /// Not fit since construction or since its inputs last changed
    #[default]
    Unfit,
    Succeeded,
    /// The last fit failed, the trajectory may be fit again
    Failed(FitFailure),
}

impl FitStatus {
    pub fn is_success(&self) -> bool {
        *self == Self::Succeeded
    }
}

impl fmt::Display for FitStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unfit => write!(f, "unfit"),
            Self::Succeeded => write!(f, "fit succeeded"),
            Self::Failed(reason) => write!(f, "fit failed ({reason})"),
        }
    }
}

/// A trajectory hypothesis for a single particle, and the entry point of a track fit.
///
/// The trajectory owns its reference parameters and its ordered elements. It only borrows its
/// fitting algorithm, propagation method and geometry service: these are shared strategy objects
/// which must outlive the trajectory, as enforced by the `'a` lifetime. Cloning a trajectory
/// duplicates its data and shares the same collaborators.
///
/// # Lifecycle
/// A trajectory starts [`FitStatus::Unfit`]. Calling [`Trajectory::fit`] delegates to the
/// fitting algorithm and moves it to [`FitStatus::Succeeded`] or [`FitStatus::Failed`]. Fitting
/// again recomputes everything from the same inputs and overwrites the previous results. Until a
/// fit succeeds, the post-fit queries return empty sequences and a zero chi square and NDF.
///
/// A trajectory is fit synchronously by a single caller. Independent trajectories may be fit in
/// parallel, refer to [`fit_batch`].
#[derive(Clone, Default)]
pub struct Trajectory<'a> {
    reference: Option<TrackParameters>,
    elements: Vec<TrajectoryElement>,
    fitter: Option<&'a dyn FittingAlgorithm>,
    propagation: Option<&'a dyn PropagationMethod>,
    geometry: Option<&'a dyn Geometry>,
    status: FitStatus,
    summary: Option<FitSummary>,
}

impl<'a> Trajectory<'a> {
    /// An empty trajectory, to be assembled before fitting.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A trajectory ready to be fit. The elements must be ordered along the path of the particle
    /// and are never reordered.
    pub fn new(
        reference: TrackParameters,
        elements: Vec<TrajectoryElement>,
        fitter: &'a dyn FittingAlgorithm,
        propagation: &'a dyn PropagationMethod,
        geometry: &'a dyn Geometry,
    ) -> Self {
        let mut me = Self {
            reference: Some(reference),
            elements,
            fitter: Some(fitter),
            propagation: Some(propagation),
            geometry: Some(geometry),
            status: FitStatus::Unfit,
            summary: None,
        };
        me.reset();
        me
    }

    /// Same as [`Trajectory::new`] but from optional collaborators, failing if any of them is missing.
    pub fn try_new(
        reference: TrackParameters,
        elements: Vec<TrajectoryElement>,
        fitter: Option<&'a dyn FittingAlgorithm>,
        propagation: Option<&'a dyn PropagationMethod>,
        geometry: Option<&'a dyn Geometry>,
    ) -> Result<Self, TrajectoryError> {
        let fitter = fitter.context(MissingCollaboratorSnafu {
            kind: CollaboratorKind::FittingAlgorithm,
        })?;
        let propagation = propagation.context(MissingCollaboratorSnafu {
            kind: CollaboratorKind::PropagationMethod,
        })?;
        let geometry = geometry.context(MissingCollaboratorSnafu {
            kind: CollaboratorKind::Geometry,
        })?;
        Ok(Self::new(reference, elements, fitter, propagation, geometry))
    }

    /// Binds the collaborators used by the next fit.
    pub fn bind(
        &mut self,
        fitter: &'a dyn FittingAlgorithm,
        propagation: &'a dyn PropagationMethod,
        geometry: &'a dyn Geometry,
    ) {
        self.fitter = Some(fitter);
        self.propagation = Some(propagation);
        self.geometry = Some(geometry);
        self.reset();
    }

    pub fn set_reference_parameters(&mut self, reference: TrackParameters) {
        self.reference = Some(reference);
        self.reset();
    }

    /// Appends an element at the end of the trajectory.
    pub fn push_element(&mut self, element: TrajectoryElement) {
        self.elements.push(element);
        self.reset();
    }

    pub fn reference_parameters(&self) -> Option<&TrackParameters> {
        self.reference.as_ref()
    }

    /// All the elements, in the order they were provided.
    pub fn trajectory_elements(&self) -> &[TrajectoryElement] {
        &self.elements
    }

    /// The measurement elements, in order.
    pub fn measurements(&self) -> Vec<&TrajectoryElement> {
        self.elements.iter().filter(|e| e.is_measurement()).collect()
    }

    pub fn fitting_algorithm(&self) -> Option<&'a dyn FittingAlgorithm> {
        self.fitter
    }

    pub fn propagation_method(&self) -> Option<&'a dyn PropagationMethod> {
        self.propagation
    }

    pub fn geometry(&self) -> Option<&'a dyn Geometry> {
        self.geometry
    }

    pub fn status(&self) -> FitStatus {
        self.status
    }

    /// Fits this trajectory with the bound fitting algorithm.
    ///
    /// On success, every element classified by the algorithm carries its fitted state, and the
    /// global statistics are returned. On failure, no element carries a fitted state. Missing
    /// collaborators, reference parameters or elements are reported as precondition errors,
    /// algorithm failures as [`TrajectoryError::Fit`].
    pub fn fit(&mut self) -> Result<FitSummary, TrajectoryError> {
        self.reset();
        match self.try_fit() {
            Ok(summary) => {
                info!("{summary}");
                self.status = FitStatus::Succeeded;
                self.summary = Some(summary);
                Ok(summary)
            }
            Err(e) => {
                warn!("trajectory fit failed: {e}");
                self.reset();
                self.status = FitStatus::Failed(e.failure());
                Err(e)
            }
        }
    }

    fn try_fit(&mut self) -> Result<FitSummary, TrajectoryError> {
        let fitter = self.fitter.context(MissingCollaboratorSnafu {
            kind: CollaboratorKind::FittingAlgorithm,
        })?;
        let propagation = self.propagation.context(MissingCollaboratorSnafu {
            kind: CollaboratorKind::PropagationMethod,
        })?;
        let geometry = self.geometry.context(MissingCollaboratorSnafu {
            kind: CollaboratorKind::Geometry,
        })?;
        let reference = self.reference.context(MissingReferenceSnafu)?;
        ensure!(!self.elements.is_empty(), EmptyTrajectorySnafu);

        info!(
            "Fitting {} elements ({} measurements) with {} using {} and {}",
            self.elements.len(),
            self.elements.iter().filter(|e| e.is_measurement()).count(),
            fitter.name(),
            propagation.name(),
            geometry.name()
        );
        debug!("Reference {reference}");

        let outcome = fitter
            .fit(&reference, &self.elements, propagation, geometry)
            .context(FitSnafu)?;

        let summary = self.validate(&outcome)?;

        for (element, fit) in self.elements.iter_mut().zip(outcome.elements) {
            element.set_fit(fit);
        }

        Ok(summary)
    }

    /// Checks the outcome against the fit contract and computes the global statistics, without
    /// touching the elements.
    fn validate(&self, outcome: &FitOutcome) -> Result<FitSummary, TrajectoryError> {
        ensure!(
            outcome.elements.len() == self.elements.len(),
            InvalidOutcomeSnafu {
                reason: format!(
                    "{} classifications for {} elements",
                    outcome.elements.len(),
                    self.elements.len()
                )
            }
        );

        let mut summary = FitSummary {
            iterations: outcome.iterations,
            ..Default::default()
        };
        let mut constraints = 0_u32;

        for (idx, (element, fit)) in self.elements.iter().zip(&outcome.elements).enumerate() {
            match fit {
                None => {
                    ensure!(
                        !element.is_measurement(),
                        InvalidOutcomeSnafu {
                            reason: format!("measurement #{idx} was not classified")
                        }
                    );
                    debug!("#{idx} {element}: not evaluated");
                }
                Some(ElementFit::Fitted(state)) => {
                    check_state(idx, element, state)?;
                    summary.chi2 += state.chi2;
                    summary.fitted_elements += 1;
                    if element.is_measurement() {
                        summary.fitted_measurements += 1;
                        constraints += element.constraints();
                    }
                    debug!("#{idx} {element}: fitted with χ² = {:.3}", state.chi2);
                }
                Some(ElementFit::Outlier(state)) => {
                    ensure!(
                        element.is_measurement(),
                        InvalidOutcomeSnafu {
                            reason: format!("virtual element #{idx} marked as outlier")
                        }
                    );
                    if let Some(state) = state {
                        check_state(idx, element, state)?;
                    }
                    summary.outliers += 1;
                    debug!("#{idx} {element}: outlier");
                }
            }
        }

        summary.ndf = constraints.saturating_sub(TRACK_PARAM_DIM as u32);
        Ok(summary)
    }

    /// Clears all fit results.
    fn reset(&mut self) {
        for element in &mut self.elements {
            element.clear_fit();
        }
        self.status = FitStatus::Unfit;
        self.summary = None;
    }

    /// Elements used in the last successful fit, measurements and virtual points alike.
    pub fn fitted_trajectory_elements(&self) -> Vec<&TrajectoryElement> {
        self.elements.iter().filter(|e| e.is_fitted()).collect()
    }

    /// Measurements used in the last successful fit.
    pub fn fitted_measurements(&self) -> Vec<&TrajectoryElement> {
        self.elements
            .iter()
            .filter(|e| e.is_measurement() && e.is_fitted())
            .collect()
    }

    /// Measurements rejected by the last successful fit.
    pub fn outliers(&self) -> Vec<&TrajectoryElement> {
        self.elements.iter().filter(|e| e.is_outlier()).collect()
    }

    /// Chi square of the last successful fit, zero otherwise.
    pub fn chi_square(&self) -> f64 {
        self.summary.map_or(0.0, |s| s.chi2)
    }

    /// Degrees of freedom of the last successful fit, zero otherwise.
    pub fn ndf(&self) -> u32 {
        self.summary.map_or(0, |s| s.ndf)
    }

    pub fn summary(&self) -> Option<&FitSummary> {
        self.summary.as_ref()
    }
}

fn check_state(
    idx: usize,
    element: &TrajectoryElement,
    state: &FittedState,
) -> Result<(), TrajectoryError> {
    ensure!(
        state.chi2.is_finite() && state.chi2 >= 0.0,
        InvalidOutcomeSnafu {
            reason: format!("element #{idx} has a chi square of {}", state.chi2)
        }
    );
    ensure!(
        *state.parameters.reference() == element.location(),
        InvalidOutcomeSnafu {
            reason: format!(
                "element #{idx} at {} was fitted at {}",
                element.location(),
                state.parameters.reference()
            )
        }
    );
    Ok(())
}

impl fmt::Debug for Trajectory<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Trajectory")
            .field("reference", &self.reference)
            .field("elements", &self.elements)
            .field("fitter", &self.fitter.map(|c| c.name()))
            .field("propagation", &self.propagation.map(|c| c.name()))
            .field("geometry", &self.geometry.map(|c| c.name()))
            .field("status", &self.status)
            .field("summary", &self.summary)
            .finish()
    }
}

impl fmt::Display for Trajectory<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Trajectory of {} elements ({} measurements), {}",
            self.elements.len(),
            self.elements.iter().filter(|e| e.is_measurement()).count(),
            self.status
        )?;
        if let Some(summary) = &self.summary {
            write!(f, ": {summary}")?;
        }
        Ok(())
    }
}
