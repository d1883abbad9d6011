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

use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::fmt;

/// Global statistics of a successful fit.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FitSummary {
    /// Sum of the chi square contributions of the elements used in the fit
    pub chi2: f64,
    /// Constraints of the accepted measurements minus the number of fitted parameters
    pub ndf: u32,
    /// Number of elements used in the fit, measurements and virtual points
    pub fitted_elements: usize,
    pub fitted_measurements: usize,
    pub outliers: usize,
    pub iterations: usize,
}

impl FitSummary {
    /// Chi square per degree of freedom, if there is at least one degree of freedom.
    pub fn reduced_chi2(&self) -> Option<f64> {
        if self.ndf == 0 {
            None
        } else {
            Some(self.chi2 / f64::from(self.ndf))
        }
    }

    /// Probability of a chi square at least as large as this one, for this number of degrees of freedom.
    pub fn p_value(&self) -> Option<f64> {
        if self.ndf == 0 {
            return None;
        }
        ChiSquared::new(f64::from(self.ndf))
            .ok()
            .map(|dist| dist.sf(self.chi2))
    }
}

impl fmt::Display for FitSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "χ²/ndf = {:.3}/{} with {} fitted measurements and {} outliers after {} iterations",
            self.chi2, self.ndf, self.fitted_measurements, self.outliers, self.iterations
        )?;
        if let Some(p) = self.p_value() {
            write!(f, " (p = {p:.3e})")?;
        }
        Ok(())
    }
}
