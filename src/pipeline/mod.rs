//! Pipeline stages for turning a fetched article into a published site.
//!
//! Each submodule implements the work of one stage; sequencing, status
//! writes and failure handling live in [`crate::controller`].
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ convert ──▶ manifest ──▶ build ──▶ publish
//! (XML)     (project)   (template,   (site)    (bucket)
//!                        downloads)
//! ```
//!
//! 1. [`fetch`]   : resolve where the article XML lands and whether it did
//! 2. [`manifest`]: amend the generated project manifest before the build
//! 3. [`publish`] : walk the site output and upload every file, best effort
//!
//! Every helper takes the workspace root explicitly. Nothing here reads or
//! changes the process working directory, so jobs can run side by side.

pub mod fetch;
pub mod manifest;
pub mod publish;

use std::fmt;

/// Position of a job in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Validating,
    Downloading,
    Converting,
    Building,
    Uploading,
    Finalizing,
    Succeeded,
    Failed,
}

impl Stage {
    /// Sum of all stage weights.
    pub const TOTAL_WEIGHT: u32 = 25;

    /// Relative work completed on entering the stage.
    ///
    /// Based on observed averages: downloading and building dominate.
    pub fn weight(self) -> u32 {
        match self {
            Stage::Validating => 0,
            Stage::Downloading => 2,
            Stage::Converting => 8,
            Stage::Building => 10,
            Stage::Uploading => 20,
            Stage::Finalizing => 24,
            Stage::Succeeded => Self::TOTAL_WEIGHT,
            // Failure reports no progress; keep whatever was reached.
            Stage::Failed => 0,
        }
    }

    /// `weight / TOTAL_WEIGHT`, in `[0, 1]`.
    pub fn progress(self) -> f64 {
        f64::from(self.weight()) / f64::from(Self::TOTAL_WEIGHT)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validating => "validating",
            Stage::Downloading => "downloading",
            Stage::Converting => "converting",
            Stage::Building => "building",
            Stage::Uploading => "uploading",
            Stage::Finalizing => "finalizing",
            Stage::Succeeded => "succeeded",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}
