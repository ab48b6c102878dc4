// Training-run use case on top of the session driver

pub mod runner;

pub use runner::SimulationRunner;
