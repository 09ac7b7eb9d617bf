// src/exit.rs
//! Process exit codes for `ckharvest`.
//!
//! Scripts that drive long harvests key off these to decide whether to resume.

use std::process::Termination;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum HarvestExit {
    /// Command completed. Per-repository failures still count as success.
    Success = 0,
    /// Generic error (unreadable inputs, invalid config, ledger IO).
    Error = 1,
    /// The analysis tool cannot be run; nothing was attempted.
    ToolUnavailable = 2,
    /// Stopped by Ctrl-C; unrecorded repositories stay queued.
    Interrupted = 130,
}

impl HarvestExit {
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Lets `main` return the code directly.
impl Termination for HarvestExit {
    fn report(self) -> std::process::ExitCode {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        std::process::ExitCode::from(self.code() as u8)
    }
}
