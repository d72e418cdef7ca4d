//! Planning pipeline: assembling solver input (C4) and projecting solver
//! output into the persisted `ActionSchedule` (C7). Sits between the
//! collaborator traits (`tariff`, `forecast`, `observation`) and the solver
//! on one side, and the schedule store / orchestrator on the other.

pub mod assembler;
pub mod projection;

pub use assembler::{assemble, LiveState};
pub use projection::project;
