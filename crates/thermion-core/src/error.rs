// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of ThermION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use thiserror::Error;

/// Kind of cycle guarded by the single-flight lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    Decision,
    Calibration,
}

impl std::fmt::Display for CycleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decision => write!(f, "decision"),
            Self::Calibration => write!(f, "calibration"),
        }
    }
}

/// Reasons a cycle was skipped. The scheduler logs these and retries on the next tick.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Price data unavailable from {source_name}: {reason}")]
    PriceUnavailable { source_name: String, reason: String },

    #[error("Failed to read state of {load} from {source_name}: {reason}")]
    DeviceRead {
        load: String,
        source_name: String,
        reason: String,
    },

    #[error("A {kind} cycle is already running")]
    AlreadyRunning { kind: CycleKind },
}

pub type CycleResult<T> = std::result::Result<T, CycleError>;
