pub mod progress;
pub mod proof;
pub mod scan;
