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

use super::{Trajectory, TrajectoryError};
use crate::fit::FitSummary;
use rayon::prelude::*;

/// Fits independent trajectories in parallel, one rayon task per trajectory.
///
/// The results are returned in the order of the trajectories. Each trajectory keeps its own fit
/// results, exactly as if [`Trajectory::fit`] had been called on it.
pub fn fit_batch(
    trajectories: &mut [Trajectory<'_>],
) -> Vec<Result<FitSummary, TrajectoryError>> {
    info!("Fitting {} trajectories", trajectories.len());

    let results = trajectories
        .par_iter_mut()
        .map(|traj| traj.fit())
        .collect::<Vec<_>>();

    let failed = results.iter().filter(|rslt| rslt.is_err()).count();
    if failed > 0 {
        warn!("{failed} of {} trajectory fits failed", results.len());
    } else {
        info!("All {} trajectory fits succeeded", results.len());
    }

    results
}
