use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Trims and lower-cases `raw`, then returns its SHA-256 digest as lowercase hex.
///
/// Returns `None` when nothing is left after trimming, so blank identifiers never
/// turn into the hash of an empty string.
pub fn normalize_and_hash(raw: &str) -> Option<String> {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    Some(format!("{:x}", hasher.finalize()))
}

/// Customer identifiers attached to a conversion event, keyed by the remote
/// platform's identifier kind (`em`, `ph`, `client_user_agent`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserData(BTreeMap<String, Value>);

impl UserData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a normalized, hashed identifier. Blank or missing values are dropped.
    pub fn hashed(mut self, kind: &str, raw: Option<&str>) -> Self {
        if let Some(hash) = raw.and_then(normalize_and_hash) {
            self.0.insert(kind.to_string(), Value::String(hash));
        }
        self
    }

    /// Adds a value that the platform expects in clear text (user agent, client ip,
    /// browser cookie ids). Empty strings are dropped.
    pub fn raw(mut self, kind: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        let blank = match &value {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        };
        if !blank {
            self.0.insert(kind.to_string(), value);
        }
        self
    }

    pub fn get(&self, kind: &str) -> Option<&Value> {
        self.0.get(kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<serde_json::Map<String, Value>> for UserData {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        map.into_iter().fold(Self::new(), |data, (k, v)| data.raw(&k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha256("a@b.com")
    const EMAIL_HASH: &str = "fb98d44ad7501a959f3f4f4a3f004fe2d9e581ea6207e218c4b02c08a4d75adf";

    #[test]
    fn test_normalize_then_hash() {
        assert_eq!(normalize_and_hash("a@b.com").as_deref(), Some(EMAIL_HASH));
        assert_eq!(normalize_and_hash("  A@B.COM \n").as_deref(), Some(EMAIL_HASH));
    }

    #[test]
    fn test_blank_identifier_has_no_hash() {
        assert!(normalize_and_hash("").is_none());
        assert!(normalize_and_hash("   \t").is_none());
    }

    #[test]
    fn test_user_data_skips_blank_identifiers() {
        let data = UserData::new()
            .hashed("em", Some("  "))
            .hashed("ph", None)
            .raw("client_user_agent", "");

        assert!(data.is_empty());
    }

    #[test]
    fn test_user_data_serializes_as_flat_map() {
        let data = UserData::new()
            .hashed("em", Some("a@b.com"))
            .raw("client_ip_address", "10.0.0.1");

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["em"], EMAIL_HASH);
        assert_eq!(json["client_ip_address"], "10.0.0.1");
        assert_eq!(data.len(), 2);
    }
}
