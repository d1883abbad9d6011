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

use crate::geometry::{Geometry, GeometryError, Surface};
use crate::linalg::Matrix5;
use crate::track::{DetElementId, TrackParameters};
use snafu::prelude::*;
use std::fmt;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PropagationError {
    #[snafu(display("trajectory does not intersect surface {target}"))]
    NoIntersection { target: DetElementId },
    #[snafu(display("non physical path: {details}"))]
    NonPhysicalPath { details: String },
    #[snafu(display("could not resolve the propagation target: {source}"))]
    GeometryResolution { source: GeometryError },
}

/// The result of a propagation step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Propagated {
    /// Track parameters on the target surface
    pub parameters: TrackParameters,
    /// Jacobian of the transport, d(target parameters) / d(initial parameters)
    pub jacobian: Matrix5<f64>,
    /// Signed path length from the initial location to the target (mm)
    pub path_length: f64,
}

impl fmt::Display for Propagated {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} after {:.3} mm", self.parameters, self.path_length)
    }
}

/// Transports track parameters and their covariance from their reference location to a surface.
///
/// Implementations are shared between all the trajectories of a reconstruction job and must be
/// safe to use from several threads at once.
pub trait PropagationMethod: Send + Sync {
    /// Propagates the parameters onto the target surface.
    ///
    /// Fails with [`PropagationError::NoIntersection`] if the trajectory never reaches the surface,
    /// and with [`PropagationError::NonPhysicalPath`] if the transport is not defined (e.g. a loop
    /// of a low momentum track).
    fn propagate(
        &self,
        params: &TrackParameters,
        target: &Surface,
    ) -> Result<Propagated, PropagationError>;

    /// Resolves the detector element through the geometry and propagates onto its surface.
    fn propagate_to(
        &self,
        params: &TrackParameters,
        target: DetElementId,
        geometry: &dyn Geometry,
    ) -> Result<Propagated, PropagationError> {
        let surface = geometry
            .resolve(target)
            .context(GeometryResolutionSnafu)?;
        self.propagate(params, &surface)
    }

    /// Name of this propagation method, for diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
