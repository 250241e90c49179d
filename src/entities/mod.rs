//! Entity type definitions

pub mod component;
pub mod feature;
pub mod hazard;
pub mod mate;
pub mod quote;
pub mod requirement;
pub mod safety;
pub mod stackup;
pub mod supplier;
pub mod test;

pub use requirement::Requirement;
pub use test::Test;
