mod hmac;

pub use hmac::{HmacMiddlewareFactory, SIGNATURE_HEADER};
