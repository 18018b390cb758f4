use std::{
    fmt,
    fmt::{Debug, Display},
};

/// A wrapper that keeps credentials out of debug output and logs.
///
/// The server config carries several values that must never leak into a log line, most notably the gateway key
/// secret and the webhook signing secret. Wrapping them means a stray `{:?}` on a config struct prints `****`
/// rather than the credential; the only way to get at the inner value is an explicit call to [`Secret::reveal`],
/// which is easy to audit for.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn secrets_are_redacted_in_formatting() {
        let secret = Secret::new("rzp_live_key_secret".to_string());
        assert_eq!(format!("{secret}"), "****");
        assert_eq!(format!("{secret:?}"), "****");
        assert_eq!(secret.reveal(), "rzp_live_key_secret");
    }
}
