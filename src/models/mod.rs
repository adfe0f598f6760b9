pub mod plan;
pub mod progress;
pub mod token;
pub mod user;
pub mod verification;
pub mod water;
