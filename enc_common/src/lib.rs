mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{MoneyConversionError, Paise, INR_CURRENCY_CODE, INR_CURRENCY_CODE_LOWER};
pub use secret::Secret;
