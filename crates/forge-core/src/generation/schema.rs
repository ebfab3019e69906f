//! Schema boundary for parsed model output.
//!
//! A parsed `serde_json::Value` is never handed to callers directly: it goes
//! through an [`OutputSchema`] that either produces fully typed data or a
//! diagnostic string describing the first violation.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// A validator that turns untrusted JSON into typed output.
pub trait OutputSchema: Send + Sync {
    type Output: Send;

    /// Name used in failure reports and logs.
    fn name(&self) -> &str;

    /// Validate `value`, returning the typed output or a diagnostic.
    fn check(&self, value: Value) -> Result<Self::Output, String>;
}

/// Semantic checks that run after a successful deserialize.
pub trait Validate {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Schema backed by a `Deserialize` type plus its [`Validate`] rules.
pub struct Typed<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Typed<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }
}

impl<T> OutputSchema for Typed<T>
where
    T: DeserializeOwned + Validate + Send,
{
    type Output = T;

    fn name(&self) -> &str {
        self.name
    }

    fn check(&self, value: Value) -> Result<T, String> {
        let parsed: T = serde_json::from_value(value).map_err(|e| e.to_string())?;
        parsed.validate()?;
        Ok(parsed)
    }
}
