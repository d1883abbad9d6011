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

/*! # helixfit

Track parameter estimation for charged particles: a [`Trajectory`] owns the reference
[`TrackParameters`] and the ordered [`TrajectoryElement`]s of one track candidate, and
delegates the fit to three pluggable collaborators:

- a [`FittingAlgorithm`] (e.g. a Kalman filter or a global least squares fit),
- a [`PropagationMethod`] (e.g. a Runge-Kutta integrator or an analytic helix swimmer),
- a [`Geometry`] service resolving detector elements to surfaces and materials.

The crate only defines the orchestration and the contracts; concrete numerics live in the collaborators.
*/

/// Track parameters, reference locations and the elements of a trajectory.
pub mod track;

/// Detector geometry contract and a simple in-memory detector description.
pub mod geometry;

/// Propagation contract used by fitting algorithms to move between surfaces.
pub mod propagators;

/// Fitting algorithm contract, fit configuration, outlier criteria and fit statistics.
pub mod fit;

/// The trajectory orchestrator.
pub mod trajectory;

/// Configuration loading.
pub mod io;

#[macro_use]
extern crate log;
extern crate nalgebra as na;

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

/// Re-export some useful things
pub use self::fit::{FitConfig, FitError, FitSummary, FittingAlgorithm};
pub use self::geometry::Geometry;
pub use self::propagators::PropagationMethod;
pub use self::track::{TrackParameters, TrajectoryElement};
pub use self::trajectory::{FitStatus, Trajectory, TrajectoryError};

pub mod prelude {
    pub use crate::fit::*;
    pub use crate::geometry::*;
    pub use crate::io::{ConfigError, ConfigRepr};
    pub use crate::propagators::*;
    pub use crate::track::*;
    pub use crate::trajectory::*;
}
