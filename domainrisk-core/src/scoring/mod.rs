// domainrisk-core/src/scoring/mod.rs

pub mod dictionary;
pub mod fanciful;
pub mod overall;
pub mod popular;
pub mod trademark;
pub mod vice;

pub use fanciful::FancifulDecider;
pub use overall::combine_recommendation;
pub use popular::{is_popular_token, set_popular_tokens};
pub use trademark::{load_seeds, TrademarkScorer};
pub use vice::ViceScorer;
