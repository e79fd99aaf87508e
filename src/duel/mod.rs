//! Duel layer: the multi-round controller coordinating two judges with
//! asymmetric strictness, refinement, and early exit.

mod runner;

pub use runner::{
    DuelConfig, DuelLoop, DuelOutcome, DuelState, HedgePolicy, RoundResolution,
};
