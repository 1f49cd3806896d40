pub mod engine;
pub mod report;
pub mod runner;


pub use engine::*;
pub use report::*;
pub use runner::*;
