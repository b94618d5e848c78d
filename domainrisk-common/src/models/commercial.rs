// domainrisk-common/src/models/commercial.rs

use serde::{Deserialize, Serialize};

/// Historical high-value sale used as evidence of legitimate commercial
/// use. `prefix` holds the first three characters of the normalized SLD
/// and `length` its character count, both for candidate pre-filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommercialSale {
    pub id: i64,
    pub sld: String,
    pub normalized: String,
    pub prefix: String,
    pub length: i64,
    pub price: f64,
}
