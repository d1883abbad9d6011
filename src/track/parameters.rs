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

use super::{ReferenceLocation, TRACK_PARAM_DIM};
use crate::io::ConfigRepr;
use crate::linalg::{Matrix5, Vector5};
use approx::relative_eq;
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use std::convert::TryFrom;
use std::fmt;

/// Helix parameters, ordered as (omega, tan lambda, phi0, d0, z0).
pub type HelixVector = Vector5<f64>;
/// Covariance of the helix parameters.
pub type HelixCovariance = Matrix5<f64>;

/// Maximum relative difference between symmetric covariance entries.
const SYMMETRY_TOL: f64 = 1e-9;
/// Smallest eigenvalue tolerated, relative to the Frobenius norm of the covariance.
const PSD_TOL: f64 = 1e-12;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ParametersError {
    #[snafu(display("track parameters or covariance contain a non finite value"))]
    NonFinite,
    #[snafu(display("covariance is not symmetric at ({row}, {col})"))]
    AsymmetricCovariance { row: usize, col: usize },
    #[snafu(display("covariance is not positive semi-definite (eigenvalue {eigenvalue:e})"))]
    NotPositiveSemiDefinite { eigenvalue: f64 },
}

/// A parameterization of a trajectory at one location.
///
/// The parameter vector, its covariance and the location at which both are valid always travel
/// together. Instances are immutable: propagation and fitting produce new instances.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrackParametersRepr", into = "TrackParametersRepr")]
pub struct TrackParameters {
    parameters: HelixVector,
    covariance: HelixCovariance,
    reference: ReferenceLocation,
}

impl TrackParameters {
    /// Builds new track parameters, checking that the covariance is symmetric positive semi-definite.
    ///
    /// The stored covariance is the symmetric part of the provided one.
    pub fn new(
        parameters: HelixVector,
        covariance: HelixCovariance,
        reference: ReferenceLocation,
    ) -> Result<Self, ParametersError> {
        ensure!(
            parameters.iter().chain(covariance.iter()).all(|x| x.is_finite()),
            NonFiniteSnafu
        );

        // Asymmetries below the scale of the whole matrix are rounding noise
        let epsilon = SYMMETRY_TOL * covariance.norm();
        for row in 0..TRACK_PARAM_DIM {
            for col in (row + 1)..TRACK_PARAM_DIM {
                ensure!(
                    relative_eq!(
                        covariance[(row, col)],
                        covariance[(col, row)],
                        epsilon = epsilon,
                        max_relative = SYMMETRY_TOL
                    ),
                    AsymmetricCovarianceSnafu { row, col }
                );
            }
        }

        let covariance = (covariance + covariance.transpose()) * 0.5;
        let eigenvalue = covariance.symmetric_eigenvalues().min();
        ensure!(
            eigenvalue >= -PSD_TOL * covariance.norm(),
            NotPositiveSemiDefiniteSnafu { eigenvalue }
        );

        Ok(Self {
            parameters,
            covariance,
            reference,
        })
    }

    /// Track parameters with a diagonal covariance built from the provided standard deviations.
    pub fn with_sigmas(
        parameters: HelixVector,
        sigmas: [f64; TRACK_PARAM_DIM],
        reference: ReferenceLocation,
    ) -> Result<Self, ParametersError> {
        let variances = HelixVector::from_iterator(sigmas.iter().map(|s| s.powi(2)));
        Self::new(
            parameters,
            HelixCovariance::from_diagonal(&variances),
            reference,
        )
    }

    pub fn parameters(&self) -> &HelixVector {
        &self.parameters
    }

    pub fn covariance(&self) -> &HelixCovariance {
        &self.covariance
    }

    pub fn reference(&self) -> &ReferenceLocation {
        &self.reference
    }

    /// Signed curvature (1/mm)
    pub fn omega(&self) -> f64 {
        self.parameters[0]
    }

    /// Tangent of the dip angle
    pub fn tan_lambda(&self) -> f64 {
        self.parameters[1]
    }

    /// Azimuthal angle of the momentum at the point of closest approach (rad)
    pub fn phi0(&self) -> f64 {
        self.parameters[2]
    }

    /// Signed transverse impact parameter (mm)
    pub fn d0(&self) -> f64 {
        self.parameters[3]
    }

    /// Longitudinal impact parameter (mm)
    pub fn z0(&self) -> f64 {
        self.parameters[4]
    }

    /// Standard deviation of the i-th parameter, `None` past the last parameter.
    pub fn sigma(&self, i: usize) -> Option<f64> {
        self.covariance.get((i, i)).map(|var| var.sqrt())
    }
}

impl fmt::Display for TrackParameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sigmas = self.covariance.diagonal().map(f64::sqrt);
        write!(
            f,
            "helix @ {}: omega = {:.6e} ± {:.1e}, tanλ = {:.6} ± {:.1e}, φ0 = {:.6} ± {:.1e}, d0 = {:.4} ± {:.1e}, z0 = {:.4} ± {:.1e}",
            self.reference,
            self.omega(),
            sigmas[0],
            self.tan_lambda(),
            sigmas[1],
            self.phi0(),
            sigmas[2],
            self.d0(),
            sigmas[3],
            self.z0(),
            sigmas[4]
        )
    }
}

impl ConfigRepr for TrackParameters {}

/// Serialized form, validated on the way in.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
struct TrackParametersRepr {
    parameters: HelixVector,
    covariance: HelixCovariance,
    reference: ReferenceLocation,
}

impl TryFrom<TrackParametersRepr> for TrackParameters {
    type Error = ParametersError;

    fn try_from(repr: TrackParametersRepr) -> Result<Self, Self::Error> {
        Self::new(repr.parameters, repr.covariance, repr.reference)
    }
}

impl From<TrackParameters> for TrackParametersRepr {
    fn from(params: TrackParameters) -> Self {
        Self {
            parameters: params.parameters,
            covariance: params.covariance,
            reference: params.reference,
        }
    }
}
