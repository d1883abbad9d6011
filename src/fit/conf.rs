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

use super::FitError;
use crate::io::{ConfigError, ConfigRepr, InvalidConfigSnafu};
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::fmt;
use typed_builder::TypedBuilder;

/// Defines when a measurement is rejected from a fit, based on its chi square increment.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OutlierCriteria {
    /// Reject measurements whose chi square increment is greater than the provided value.
    Chi2Increment { max: f64 },
    /// Reject measurements whose chi square increment has a probability below the provided value,
    /// with as many degrees of freedom as the measurement has constraints.
    Probability { min: f64 },
    /// Accept all measurements
    None,
}

impl Default for OutlierCriteria {
    /// A chi square increment of 25 is a 5 sigma cut on a single constraint.
    fn default() -> Self {
        Self::Chi2Increment { max: 25.0 }
    }
}

impl OutlierCriteria {
    /// Whether a measurement with `constraints` constraints and this chi square increment is an outlier.
    pub fn is_outlier(&self, chi2_increment: f64, constraints: u32) -> bool {
        match *self {
            Self::Chi2Increment { max } => chi2_increment > max,
            Self::Probability { min } => match ChiSquared::new(f64::from(constraints)) {
                Ok(dist) => dist.sf(chi2_increment) < min,
                Err(_) => false,
            },
            Self::None => false,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Chi2Increment { max } => ensure!(
                max.is_finite() && max > 0.0,
                InvalidConfigSnafu {
                    msg: format!("chi square increment cut must be positive, got {max}")
                }
            ),
            Self::Probability { min } => ensure!(
                (0.0..=1.0).contains(&min),
                InvalidConfigSnafu {
                    msg: format!("probability cut must be within [0, 1], got {min}")
                }
            ),
            Self::None => {}
        }
        Ok(())
    }
}

impl fmt::Display for OutlierCriteria {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Chi2Increment { max } => write!(f, "Δχ² > {max}"),
            Self::Probability { min } => write!(f, "P(Δχ²) < {min:e}"),
            Self::None => write!(f, "none"),
        }
    }
}

impl ConfigRepr for OutlierCriteria {}

/// Configuration shared by fitting algorithm implementations. The trajectory does not interpret it.
#[derive(Copy, Clone, Debug, PartialEq, TypedBuilder, Serialize, Deserialize)]
#[builder(doc)]
#[serde(default)]
pub struct FitConfig {
    /// Maximum number of iterations before the fit is declared as not converging
    #[builder(default = 10)]
    pub max_iterations: usize,
    /// Iterations stop once the norm of the parameter correction is below this value
    #[builder(default = 1e-3)]
    pub convergence_tol: f64,
    #[builder(default)]
    pub outlier: OutlierCriteria,
    /// Minimum number of accepted measurements for a fit to be attempted
    #[builder(default = 3)]
    pub min_measurements: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            self.max_iterations > 0,
            InvalidConfigSnafu {
                msg: "at least one iteration is required"
            }
        );
        ensure!(
            self.convergence_tol.is_finite() && self.convergence_tol > 0.0,
            InvalidConfigSnafu {
                msg: format!(
                    "convergence tolerance must be positive, got {}",
                    self.convergence_tol
                )
            }
        );
        self.outlier.validate()
    }

    /// Whether a parameter correction of this norm means the fit converged.
    pub fn converged(&self, correction_norm: f64) -> bool {
        correction_norm < self.convergence_tol
    }

    /// Returns a non convergence error once `iterations` reached the iteration budget.
    pub fn check_iterations(&self, iterations: usize) -> Result<(), FitError> {
        if iterations >= self.max_iterations {
            warn!(
                "fit reached its budget of {} iterations without converging",
                self.max_iterations
            );
            Err(FitError::NonConvergence { iterations })
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for FitConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Fit with at least {} measurements until |dx| < {:.2e} or {} iterations, rejecting outliers with {}",
            self.min_measurements, self.convergence_tol, self.max_iterations, self.outlier
        )
    }
}

impl ConfigRepr for FitConfig {}
