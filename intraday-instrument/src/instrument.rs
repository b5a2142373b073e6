use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::borrow::Borrow;

/// Unique `SmolStr` identifier of an instrument (eg/ "RELIANCE.NS", "^NSEI").
///
/// Every instrument is processed by its own independent pipeline keyed by this identifier.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Deserialize, Serialize, Display,
)]
pub struct InstrumentId(pub SmolStr);

impl InstrumentId {
    pub fn new<S>(id: S) -> Self
    where
        S: Into<SmolStr>,
    {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for InstrumentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for InstrumentId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<SmolStr> for InstrumentId {
    fn from(value: SmolStr) -> Self {
        Self(value)
    }
}

impl Borrow<str> for InstrumentId {
    fn borrow(&self) -> &str {
        self.0.borrow()
    }
}

impl AsRef<str> for InstrumentId {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_id_de_from_plain_string() {
        let id: InstrumentId = serde_json::from_str(r#""RELIANCE.NS""#).unwrap();
        assert_eq!(id, InstrumentId::from("RELIANCE.NS"));
        assert_eq!(id.to_string(), "RELIANCE.NS");
    }
}
