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

use super::{DuplicateElementSnafu, Geometry, GeometryError, Surface, UnknownElementSnafu};
use crate::io::ConfigRepr;
use crate::track::DetElementId;
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;

/// An in-memory detector description: a lookup table from detector element to its surface.
///
/// Serialized as the list of its surfaces, e.g. in YAML:
///
/// ```yaml
/// - id: 1
///   origin: [30.0, 0.0, 0.0]
///   normal: [1.0, 0.0, 0.0]
///   u_axis: [0.0, 1.0, 0.0]
///   material: { thickness_mm: 0.3, radiation_length_mm: 93.7 }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Surface>", into = "Vec<Surface>")]
pub struct DetectorGeometry {
    surfaces: BTreeMap<DetElementId, Surface>,
}

impl DetectorGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a surface to this geometry, refusing invalid surfaces and duplicated identifiers.
    pub fn add(&mut self, surface: Surface) -> Result<(), GeometryError> {
        surface.validate()?;
        ensure!(
            !self.surfaces.contains_key(&surface.id),
            DuplicateElementSnafu { id: surface.id }
        );
        self.surfaces.insert(surface.id, surface);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn surfaces(&self) -> impl Iterator<Item = &Surface> {
        self.surfaces.values()
    }
}

impl Geometry for DetectorGeometry {
    fn resolve(&self, id: DetElementId) -> Result<Surface, GeometryError> {
        self.surfaces
            .get(&id)
            .copied()
            .context(UnknownElementSnafu { id })
    }

    fn contains(&self, id: DetElementId) -> bool {
        self.surfaces.contains_key(&id)
    }
}

impl TryFrom<Vec<Surface>> for DetectorGeometry {
    type Error = GeometryError;

    fn try_from(surfaces: Vec<Surface>) -> Result<Self, Self::Error> {
        let mut geo = Self::new();
        for surface in surfaces {
            geo.add(surface)?;
        }
        Ok(geo)
    }
}

impl From<DetectorGeometry> for Vec<Surface> {
    fn from(geo: DetectorGeometry) -> Self {
        geo.surfaces.into_values().collect()
    }
}

impl ConfigRepr for DetectorGeometry {}

impl fmt::Display for DetectorGeometry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Detector geometry with {} surfaces", self.len())?;
        for surface in self.surfaces() {
            writeln!(f, "\t{surface}")?;
        }
        Ok(())
    }
}
