mod amount;
mod msg_hash;

pub use crate::amount::{format_units, format_units_with, DEFAULT_MAX_FRACTION_DIGITS};
pub use crate::msg_hash::{MessageHash, ParseMessageHashError};
