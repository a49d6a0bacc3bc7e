pub mod declaration;
pub mod invariants;
pub mod validation;

pub use invariants::Invariant;
