use std::collections::BTreeMap;

use url::form_urlencoded;

use crate::crypto_utils::HmacSignature;
use crate::error::AppResult;

/// Gateway parameters kept sorted by name, which is the order the
/// gateway signs them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VnpParams(BTreeMap<String, String>);

impl VnpParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        self.0.retain(|k, v| keep(k, v));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `key=value` pairs joined by `&`, names in byte order, both sides
    /// form-urlencoded (space becomes `+`). This exact string is what gets
    /// signed and what goes on the wire.
    pub fn canonicalize(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Hex HMAC-SHA512 of the canonical string.
    pub fn sign(&self, secret: &str) -> AppResult<String> {
        HmacSignature::sign_hex(self.canonicalize().as_bytes(), secret.as_bytes())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VnpParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
