//! Helpers for setting up test databases. Only compiled for tests or with the `test_utils` feature.
pub mod prepare_env;
