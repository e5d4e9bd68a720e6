//! Upload session states and the transitions allowed between them.

use crate::error::{Result, UploadError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an upload session is in its lifecycle.
///
/// ```text
/// Idle -> Presigning -> Transferring -> Confirming -> Completed
///              \              \              \
///               +--------------+--------------+--> Cancelled | Failed
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    /// Created, nothing sent yet
    #[default]
    Idle,
    /// Asking the backend for presigned URL(s)
    Presigning,
    /// Sending bytes straight to storage
    Transferring,
    /// Telling the backend the bytes are in place
    Confirming,
    Completed,
    Cancelled,
    Failed,
}

impl UploadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Idle => "idle",
            UploadState::Presigning => "presigning",
            UploadState::Transferring => "transferring",
            UploadState::Confirming => "confirming",
            UploadState::Completed => "completed",
            UploadState::Cancelled => "cancelled",
            UploadState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Completed | UploadState::Cancelled | UploadState::Failed
        )
    }

    /// States in which the session talks to the backend or storage.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            UploadState::Presigning | UploadState::Transferring | UploadState::Confirming
        )
    }

    pub fn can_transition_to(&self, to: UploadState) -> bool {
        use UploadState::*;
        match (self, to) {
            (Idle, Presigning) => true,
            (Presigning, Transferring) => true,
            (Transferring, Confirming) => true,
            (Confirming, Completed) => true,

            (Presigning | Transferring | Confirming, Cancelled | Failed) => true,

            // Terminal states are absorbing; everything else skips a step.
            _ => false,
        }
    }

    /// The state after moving to `to`, or an error if the move is not allowed.
    pub fn transition(self, to: UploadState) -> Result<UploadState> {
        if !self.can_transition_to(to) {
            return Err(UploadError::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: if self.is_terminal() {
                    format!("{} is a terminal state", self.as_str())
                } else {
                    format!("Cannot transition from {} to {}", self.as_str(), to.as_str())
                },
            });
        }
        Ok(to)
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
