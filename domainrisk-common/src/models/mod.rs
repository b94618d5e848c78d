// domainrisk-common/src/models/mod.rs

pub mod batch;
pub mod commercial;
pub mod evaluation;
pub mod mark;
pub mod scoring;

pub use batch::{BatchDomain, BatchRequest, CsvBatch, DomainBatch, RequestStatus};
pub use commercial::CommercialSale;
pub use evaluation::Evaluation;
pub use mark::{Mark, PopularMark};
pub use scoring::{OverallResult, Recommendation, TrademarkResult, TrademarkType, ViceResult};
