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

use crate::linalg::Vector3;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

mod element;
pub use element::{
    ElementFit, ElementKind, FittedState, LocalMeasurement, MeasurementKind, TrajectoryElement,
};
mod parameters;
pub use parameters::{HelixCovariance, HelixVector, ParametersError, TrackParameters};

/// Number of helix parameters estimated by a fit.
pub const TRACK_PARAM_DIM: usize = 5;

/// Identity of a detector element (sensor, wafer, ...) as known by the geometry service.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetElementId(pub u64);

impl fmt::Display for DetElementId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for DetElementId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// The location at which track parameters are valid.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ReferenceLocation {
    /// A point in the global frame, e.g. the perigee reference point (mm)
    Point(Vector3<f64>),
    /// The surface of a detector element
    Surface(DetElementId),
}

impl ReferenceLocation {
    /// The origin of the global frame, the usual perigee reference point.
    pub fn origin() -> Self {
        Self::Point(Vector3::zeros())
    }

    /// Returns the detector element if this location is a surface.
    pub fn element(&self) -> Option<DetElementId> {
        match self {
            Self::Surface(id) => Some(*id),
            Self::Point(_) => None,
        }
    }
}

impl fmt::Display for ReferenceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Point(p) => write!(f, "point ({:.3}, {:.3}, {:.3}) mm", p.x, p.y, p.z),
            Self::Surface(id) => write!(f, "surface {id}"),
        }
    }
}
