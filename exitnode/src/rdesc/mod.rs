pub mod rule;
pub mod wrand;

pub use rule::{Act, Rule};
pub use wrand::{Wrand, WrandItem};
