// domainrisk-core/src/repositories/mod.rs

pub mod sqlite;

pub use sqlite::{BatchRepository, CommercialRepository, EvaluationRepository, MarkRepository};
