//! Library surface behind the `pbm` binary, split out so integration
//! tests (`tests/scenario_f.rs`) can drive the coordinator directly
//! instead of shelling out to the compiled binary.

pub mod cancel;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod pacer;
