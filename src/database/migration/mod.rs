//! Schema migrations
//!
//! A migration is a flat record: the version it starts from, the version it
//! reaches, the function that performs it, and how (if at all) it recovers.
//! [`Migrations`] holds the full chain and hands out the part of it a store at
//! a given version still needs.
//!
//! ```text
//! v1 ──step──▶ v2 ──step──▶ v3 ── ... ──▶ v13
//!              ▲
//!              └── path(2) starts here and runs to the end
//! ```
//!
//! The chain must be contiguous: every step starts where the previous one
//! ended. [`Migrations::new`] checks that once, at construction.

mod runner;
mod steps;

pub use runner::{run_path, AppliedStep};
pub use steps::{catalog_steps, LICENSE_TOKEN_KEY};

pub use crate::database::core::MigrationPathError;

use crate::database::core::{StoreHandle, StoreResult};
use crate::database::external::{CredentialCryptor, SettingsStore};

/// Everything a step may touch while it runs
pub struct MigrationContext<'a> {
    pub handle: &'a dyn StoreHandle,
    pub cryptor: &'a dyn CredentialCryptor,
    pub settings: &'a dyn SettingsStore,
}

/// The body of a step or of its recovery
pub type StepFn = fn(&MigrationContext<'_>) -> StoreResult<()>;

/// What a step does when `apply` fails with a recoverable error
#[derive(Clone, Copy)]
pub enum Recovery {
    /// Any failure aborts the open sequence
    Fatal,
    /// Rebuild the affected table, keeping what maps cleanly onto the new shape
    Rebuild(StepFn),
}

/// One transformation from `from` to `to`
#[derive(Clone, Copy)]
pub struct MigrationStep {
    from: u32,
    to: u32,
    description: &'static str,
    apply: StepFn,
    recovery: Recovery,
}

impl MigrationStep {
    pub const fn new(from: u32, to: u32, description: &'static str, apply: StepFn) -> Self {
        Self {
            from,
            to,
            description,
            apply,
            recovery: Recovery::Fatal,
        }
    }

    pub const fn with_recovery(mut self, recover: StepFn) -> Self {
        self.recovery = Recovery::Rebuild(recover);
        self
    }

    pub fn from_version(&self) -> u32 {
        self.from
    }

    pub fn to_version(&self) -> u32 {
        self.to
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self.recovery, Recovery::Rebuild(_))
    }

    pub fn apply(&self, ctx: &MigrationContext<'_>) -> StoreResult<()> {
        (self.apply)(ctx)
    }

    /// Run the recovery, if the step declares one
    pub fn recover(&self, ctx: &MigrationContext<'_>) -> Option<StoreResult<()>> {
        match self.recovery {
            Recovery::Fatal => None,
            Recovery::Rebuild(recover) => Some(recover(ctx)),
        }
    }
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationStep")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("description", &self.description)
            .field("recoverable", &self.is_recoverable())
            .finish()
    }
}

/// The full, contiguous migration chain
#[derive(Debug, Clone)]
pub struct Migrations {
    steps: Vec<MigrationStep>,
}

impl Migrations {
    /// Build a chain, rejecting gaps, overlaps and steps that go backwards
    pub fn new(steps: Vec<MigrationStep>) -> Result<Self, MigrationPathError> {
        if steps.is_empty() {
            return Err(MigrationPathError::Empty);
        }
        for step in &steps {
            if step.to <= step.from {
                return Err(MigrationPathError::NotAscending {
                    from: step.from,
                    to: step.to,
                });
            }
        }
        for pair in steps.windows(2) {
            if pair[1].from != pair[0].to {
                return Err(MigrationPathError::Gap {
                    ended: pair[0].to,
                    next: pair[1].from,
                });
            }
        }
        Ok(Self { steps })
    }

    /// The chain every catalog store follows
    pub fn catalog() -> Self {
        // Contiguity of this list is covered by tests.
        Self {
            steps: catalog_steps(),
        }
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Version the first step starts from
    pub fn first_version(&self) -> u32 {
        self.steps.first().map_or(0, |s| s.from)
    }

    /// Version the last step reaches
    pub fn latest_version(&self) -> u32 {
        self.steps.last().map_or(0, |s| s.to)
    }

    /// Steps a store at `start` still needs, in order.
    ///
    /// Empty when `start` is at or past the end of the chain. A `start` that
    /// is inside the chain's range but is not any step's starting version (or
    /// is before the first step) is rejected.
    pub fn path(&self, start: u32) -> Result<&[MigrationStep], MigrationPathError> {
        if start >= self.latest_version() {
            return Ok(&[]);
        }
        match self.steps.iter().position(|s| s.from == start) {
            Some(idx) => Ok(&self.steps[idx..]),
            None => Err(MigrationPathError::NoStepFrom { version: start }),
        }
    }
}
