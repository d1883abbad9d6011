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

use crate::linalg::{Vector2, Vector3};
use crate::track::DetElementId;
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use std::fmt;

mod detector;
pub use detector::DetectorGeometry;

/// Tolerance on the norm and orthogonality of the surface axes.
const AXIS_TOL: f64 = 1e-9;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GeometryError {
    #[snafu(display("detector element {id} is not part of the geometry"))]
    UnknownElement { id: DetElementId },
    #[snafu(display("detector element {id} is defined twice"))]
    DuplicateElement { id: DetElementId },
    #[snafu(display("surface of {id} is invalid: {reason}"))]
    InvalidSurface { id: DetElementId, reason: &'static str },
}

/// Resolves detector elements to their surface and material.
///
/// Implementations are shared between all the trajectories of a reconstruction job and must be
/// safe to use from several threads at once.
pub trait Geometry: Send + Sync {
    /// Returns the surface of the requested detector element.
    fn resolve(&self, id: DetElementId) -> Result<Surface, GeometryError>;

    /// Whether this detector element is described by this geometry.
    fn contains(&self, id: DetElementId) -> bool {
        self.resolve(id).is_ok()
    }

    /// Name of this geometry service, for diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Material crossed when traversing a surface.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub thickness_mm: f64,
    pub radiation_length_mm: f64,
}

impl Material {
    /// Traversed thickness in units of radiation length, at normal incidence.
    pub fn x_over_x0(&self) -> f64 {
        self.thickness_mm / self.radiation_length_mm
    }

    /// 300 um of silicon.
    pub fn silicon_300um() -> Self {
        Self {
            thickness_mm: 0.3,
            radiation_length_mm: 93.7,
        }
    }
}

/// A planar detector surface.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub id: DetElementId,
    /// Center of the surface in the global frame (mm)
    pub origin: Vector3<f64>,
    /// Unit normal of the surface
    pub normal: Vector3<f64>,
    /// First local axis, measured by strip sensors
    pub u_axis: Vector3<f64>,
    pub material: Material,
}

impl Surface {
    pub fn plane(
        id: DetElementId,
        origin: Vector3<f64>,
        normal: Vector3<f64>,
        u_axis: Vector3<f64>,
        material: Material,
    ) -> Result<Self, GeometryError> {
        let surface = Self {
            id,
            origin,
            normal,
            u_axis,
            material,
        };
        surface.validate()?;
        Ok(surface)
    }

    /// Second local axis, completing (u, v, normal) into a right handed frame.
    pub fn v_axis(&self) -> Vector3<f64> {
        self.normal.cross(&self.u_axis)
    }

    /// Projects a global point onto the local (u, v) frame of this surface.
    pub fn to_local(&self, point: &Vector3<f64>) -> Vector2<f64> {
        let delta = point - self.origin;
        Vector2::new(delta.dot(&self.u_axis), delta.dot(&self.v_axis()))
    }

    pub fn to_global(&self, local: &Vector2<f64>) -> Vector3<f64> {
        self.origin + self.u_axis * local.x + self.v_axis() * local.y
    }

    /// Signed distance of a global point to the plane, along the normal.
    pub fn distance(&self, point: &Vector3<f64>) -> f64 {
        (point - self.origin).dot(&self.normal)
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        let id = self.id;
        ensure!(
            self.origin.iter().all(|x| x.is_finite()),
            InvalidSurfaceSnafu {
                id,
                reason: "origin is not finite"
            }
        );
        ensure!(
            (self.normal.norm() - 1.0).abs() < AXIS_TOL,
            InvalidSurfaceSnafu {
                id,
                reason: "normal is not a unit vector"
            }
        );
        ensure!(
            (self.u_axis.norm() - 1.0).abs() < AXIS_TOL,
            InvalidSurfaceSnafu {
                id,
                reason: "u axis is not a unit vector"
            }
        );
        ensure!(
            self.normal.dot(&self.u_axis).abs() < AXIS_TOL,
            InvalidSurfaceSnafu {
                id,
                reason: "u axis is not in the plane"
            }
        );
        ensure!(
            self.material.thickness_mm >= 0.0 && self.material.radiation_length_mm > 0.0,
            InvalidSurfaceSnafu {
                id,
                reason: "material is not physical"
            }
        );
        Ok(())
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "plane {} at ({:.3}, {:.3}, {:.3}) mm, x/X0 = {:.4}",
            self.id,
            self.origin.x,
            self.origin.y,
            self.origin.z,
            self.material.x_over_x0()
        )
    }
}
