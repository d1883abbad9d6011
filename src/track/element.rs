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

use super::{DetElementId, ReferenceLocation, TrackParameters};
use crate::linalg::{Matrix2, Vector2};
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Number of local coordinates measured by a sensor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementKind {
    /// Strip sensor, only the local `u` coordinate is measured
    Strip,
    /// Pixel sensor, both local coordinates are measured
    Pixel,
}

impl MeasurementKind {
    /// Number of constraints this measurement adds to a fit.
    pub fn constraints(&self) -> u32 {
        match self {
            Self::Strip => 1,
            Self::Pixel => 2,
        }
    }
}

/// A detector hit, expressed in the local frame of its detector element.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalMeasurement {
    pub element: DetElementId,
    /// Local (u, v) position on the surface (mm). For strips, `v` is ignored.
    pub position: Vector2<f64>,
    /// Local covariance of the position (mm^2)
    pub covariance: Matrix2<f64>,
    pub kind: MeasurementKind,
}

impl LocalMeasurement {
    pub fn pixel(element: DetElementId, position: Vector2<f64>, covariance: Matrix2<f64>) -> Self {
        Self {
            element,
            position,
            covariance,
            kind: MeasurementKind::Pixel,
        }
    }

    /// A strip measurement of `u` with the provided resolution (mm).
    pub fn strip(element: DetElementId, u: f64, sigma_u: f64) -> Self {
        Self {
            element,
            position: Vector2::new(u, 0.0),
            covariance: Matrix2::new(sigma_u.powi(2), 0.0, 0.0, 0.0),
            kind: MeasurementKind::Strip,
        }
    }

    pub fn constraints(&self) -> u32 {
        self.kind.constraints()
    }
}

/// What a trajectory element stands for.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ElementKind {
    /// A real detector measurement
    Measurement(LocalMeasurement),
    /// A processed or virtual point, e.g. a material surface without a hit
    Virtual { location: ReferenceLocation },
}

/// The fitted state at one element.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FittedState {
    pub parameters: TrackParameters,
    /// Chi square contribution of this element
    pub chi2: f64,
}

impl FittedState {
    pub fn new(parameters: TrackParameters, chi2: f64) -> Self {
        Self { parameters, chi2 }
    }
}

/// Post-fit classification of an element.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ElementFit {
    /// Used in the fit
    Fitted(FittedState),
    /// Excluded from the fit. The state is available if the element could be evaluated, and its
    /// chi square is then the rejected increment.
    Outlier(Option<FittedState>),
}

/// One point along a trajectory.
///
/// The fit slot is only ever written by the [`Trajectory`](crate::Trajectory) owning this element.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TrajectoryElement {
    kind: ElementKind,
    fit: Option<ElementFit>,
}

impl TrajectoryElement {
    pub fn measurement(msr: LocalMeasurement) -> Self {
        Self {
            kind: ElementKind::Measurement(msr),
            fit: None,
        }
    }

    pub fn virtual_at(location: ReferenceLocation) -> Self {
        Self {
            kind: ElementKind::Virtual { location },
            fit: None,
        }
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn is_measurement(&self) -> bool {
        matches!(self.kind, ElementKind::Measurement(_))
    }

    /// Returns the measurement of this element, if any.
    pub fn local_measurement(&self) -> Option<&LocalMeasurement> {
        match &self.kind {
            ElementKind::Measurement(msr) => Some(msr),
            ElementKind::Virtual { .. } => None,
        }
    }

    /// Location of this element: the surface of the hit, or the virtual location.
    pub fn location(&self) -> ReferenceLocation {
        match &self.kind {
            ElementKind::Measurement(msr) => ReferenceLocation::Surface(msr.element),
            ElementKind::Virtual { location } => *location,
        }
    }

    /// Number of constraints this element may add to a fit.
    pub fn constraints(&self) -> u32 {
        self.local_measurement().map_or(0, |msr| msr.constraints())
    }

    pub fn fit(&self) -> Option<&ElementFit> {
        self.fit.as_ref()
    }

    /// The fitted state, whether this element was used in the fit or rejected.
    pub fn fitted_state(&self) -> Option<&FittedState> {
        match &self.fit {
            Some(ElementFit::Fitted(state)) => Some(state),
            Some(ElementFit::Outlier(state)) => state.as_ref(),
            None => None,
        }
    }

    /// Whether this element was used in the last successful fit.
    pub fn is_fitted(&self) -> bool {
        matches!(self.fit, Some(ElementFit::Fitted(_)))
    }

    pub fn is_outlier(&self) -> bool {
        matches!(self.fit, Some(ElementFit::Outlier(_)))
    }

    /// Chi square contribution if this element was used in the fit.
    pub fn chi2(&self) -> Option<f64> {
        match &self.fit {
            Some(ElementFit::Fitted(state)) => Some(state.chi2),
            _ => None,
        }
    }

    pub(crate) fn set_fit(&mut self, fit: Option<ElementFit>) {
        self.fit = fit;
    }

    pub(crate) fn clear_fit(&mut self) {
        self.fit = None;
    }
}

impl fmt::Display for TrajectoryElement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ElementKind::Measurement(msr) => write!(
                f,
                "{:?} hit on {} at ({:.4}, {:.4}) mm",
                msr.kind, msr.element, msr.position.x, msr.position.y
            )?,
            ElementKind::Virtual { location } => write!(f, "virtual point at {location}")?,
        }
        match &self.fit {
            Some(ElementFit::Fitted(state)) => write!(f, " [fitted, χ² = {:.3}]", state.chi2),
            Some(ElementFit::Outlier(_)) => write!(f, " [outlier]"),
            None => Ok(()),
        }
    }
}
