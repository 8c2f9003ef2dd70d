//! RPC command handlers.
//!
//! Each submodule implements the commands for one domain.

pub mod control;
pub mod distribution;
pub mod holders;
pub mod ledger;
pub mod oracle;
pub mod status;
