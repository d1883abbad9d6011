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

use crate::geometry::{Geometry, GeometryError};
use crate::propagators::{PropagationError, PropagationMethod};
use crate::track::{ElementFit, TrackParameters, TrajectoryElement};
use snafu::prelude::*;
use std::fmt;

mod conf;
pub use conf::{FitConfig, OutlierCriteria};
mod summary;
pub use summary::FitSummary;

/// Failures a fitting algorithm may report. All of these are expected outcomes of a fit that the
/// caller may recover from, e.g. by retrying with another seed or dropping the candidate.
#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum FitError {
    #[snafu(display("fit did not converge in {iterations} iterations"))]
    NonConvergence { iterations: usize },
    #[snafu(display("singular system: {details}"))]
    SingularSystem { details: String },
    #[snafu(display("at least {need} measurements required but only {found} usable"))]
    TooFewMeasurements { need: usize, found: usize },
    #[snafu(display("fit aborted by propagation: {source}"))]
    Propagation { source: PropagationError },
    #[snafu(display("fit aborted by geometry: {source}"))]
    GeometryLookup { source: GeometryError },
}

impl FitError {
    /// The reason of the failure, as reported in the status of a trajectory.
    pub fn failure(&self) -> FitFailure {
        match self {
            Self::NonConvergence { .. } => FitFailure::NonConvergence,
            Self::SingularSystem { .. } | Self::TooFewMeasurements { .. } => {
                FitFailure::SingularSystem
            }
            Self::Propagation { .. } | Self::GeometryLookup { .. } => FitFailure::Collaborator,
        }
    }
}

/// Why a fit failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FitFailure {
    /// The trajectory was not ready to be fit (missing collaborator, reference or elements)
    Precondition,
    /// The fitting algorithm exceeded its iteration budget
    NonConvergence,
    /// Degenerate or insufficient constraints
    SingularSystem,
    /// A propagation or geometry failure aborted the fit
    Collaborator,
    /// The fitting algorithm returned a result that breaks the fit contract
    InvalidOutcome,
}

impl fmt::Display for FitFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let reason = match self {
            Self::Precondition => "precondition violation",
            Self::NonConvergence => "non convergence",
            Self::SingularSystem => "singular system",
            Self::Collaborator => "collaborator failure",
            Self::InvalidOutcome => "invalid outcome",
        };
        write!(f, "{reason}")
    }
}

/// What a fitting algorithm hands back: one optional classification per input element, in the
/// order of the input elements.
///
/// Every measurement must be classified as fitted or outlier. Virtual elements may be left
/// unclassified (`None`) but may not be outliers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitOutcome {
    pub elements: Vec<Option<ElementFit>>,
    /// Number of iterations used by the algorithm
    pub iterations: usize,
}

impl FitOutcome {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
            iterations: 0,
        }
    }

    pub fn push(&mut self, fit: Option<ElementFit>) {
        self.elements.push(fit);
    }
}

/// Estimates the track parameters at each element of a trajectory.
///
/// The algorithm receives the reference parameters as a seed, the ordered elements, and the
/// propagation and geometry services to move between elements. Propagation and geometry failures
/// on single elements are the algorithm's to handle: it may classify the element as an outlier or
/// abort the whole fit.
///
/// Implementations are shared between all the trajectories of a reconstruction job and must be
/// safe to use from several threads at once. A bound on the fit time must be enforced by the
/// algorithm itself, e.g. through [`FitConfig::max_iterations`].
pub trait FittingAlgorithm: Send + Sync {
    fn fit(
        &self,
        reference: &TrackParameters,
        elements: &[TrajectoryElement],
        propagation: &dyn PropagationMethod,
        geometry: &dyn Geometry,
    ) -> Result<FitOutcome, FitError>;

    /// Name of this fitting algorithm, for diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
