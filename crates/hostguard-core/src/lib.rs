pub mod config;
pub mod directive;
pub mod error;
pub mod escalation;
pub mod firewall;
pub mod guard;
pub mod interrupt;
pub mod io;
pub mod material;
pub mod mutator;
pub mod orchestrator;
pub mod outcome;
pub mod params;
pub mod profile;
pub mod runlog;
pub mod system;

pub use error::{HostguardError, Result};
