pub mod alternatives;
pub mod replacement;

pub use alternatives::AlternativeTracker;
pub use replacement::{FinderOutcome, ReplacementFinder};
