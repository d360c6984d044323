// codepair-common: shared types and wire protocol for the Codepair workspace

pub mod language;
pub mod protocol;
pub mod types;
