use std::fmt::{self, Write};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{CacheContents, CacheError};

/// A stable, collision-resistant key derived from a structured parameter set.
///
/// Equality and hashing only consider the fingerprint. The canonical input it
/// was built from is retained as human-readable metadata for debugging.
#[derive(Debug, Clone, Eq)]
pub struct CacheKey {
    metadata: Arc<str>,
    hash: [u8; 32],
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_path())
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl std::hash::Hash for CacheKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl CacheKey {
    /// Derives a [`CacheKey`] from a serializable parameter set.
    ///
    /// Parameter maps are written in canonical form, with keys sorted at
    /// every nesting depth, so semantically equal sets produce equal keys no
    /// matter the order in which they were assembled.
    pub fn from_params<P: Serialize>(params: &P) -> CacheContents<Self> {
        let mut builder = CacheKeyBuilder::new();
        builder.write_params(params)?;
        Ok(builder.build())
    }

    /// Returns the human-readable canonical input that forms the basis of
    /// this [`CacheKey`].
    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    /// Returns the relative path for this cache key.
    ///
    /// The relative path is the sha-256 fingerprint hex-formatted like so:
    /// `aa/bbccdd/eeff...`
    pub fn cache_path(&self) -> String {
        let mut path = format!("{:02x}/", self.hash[0]);
        for b in &self.hash[1..4] {
            path.write_fmt(format_args!("{b:02x}")).unwrap();
        }
        path.push('/');
        for b in &self.hash[4..] {
            path.write_fmt(format_args!("{b:02x}")).unwrap();
        }
        path
    }

    #[cfg(test)]
    pub(crate) fn for_testing(key: impl AsRef<str>) -> Self {
        let mut builder = CacheKeyBuilder::new();
        builder.write_str(key.as_ref()).unwrap();
        builder.build()
    }
}

/// A builder for [`CacheKey`]s.
///
/// This builder implements the [`Write`](std::fmt::Write) trait, and the
/// intention of it is to accept human readable, but most importantly
/// **stable**, input. This input is then being hashed to form the
/// [`CacheKey`], and is kept alongside it to help debugging.
#[derive(Debug, Default)]
pub struct CacheKeyBuilder {
    metadata: String,
}

impl CacheKeyBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes the canonical form of `params` into the [`CacheKey`].
    pub fn write_params<P: Serialize>(&mut self, params: &P) -> CacheContents<()> {
        let value = serde_json::to_value(params)
            .map_err(|e| CacheError::MalformedKey(e.to_string()))?;
        write_canonical(&mut self.metadata, &value);
        Ok(())
    }

    /// Finalize the [`CacheKey`].
    pub fn build(self) -> CacheKey {
        let hash = Sha256::digest(&self.metadata);
        let hash = <[u8; 32]>::try_from(hash).expect("sha256 outputs 32 bytes");

        CacheKey {
            metadata: self.metadata.into(),
            hash,
        }
    }
}

impl fmt::Write for CacheKeyBuilder {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.metadata.write_str(s)
    }
}

/// Writes `value` as JSON with object keys sorted at every nesting depth.
fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by_key(|(key, _)| key.as_str());

            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(out, value);
            }
            out.push('}');
        }
        Value::Array(values) => {
            out.push('[');
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, value);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Serialize;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_canonical_params() {
        let key = CacheKey::from_params(&json!({ "op": "sum", "a": 2, "b": 3 })).unwrap();

        assert_eq!(key.metadata(), r#"{"a":2,"b":3,"op":"sum"}"#);
        assert_eq!(
            key.cache_path(),
            "45/d17c17/2d40c55552b511e2324a2813a10cabaf20db1f08b7c1ef1d4be4d18b"
        );
    }

    #[test]
    fn test_field_order_is_irrelevant() {
        #[derive(Serialize)]
        struct Forward {
            op: &'static str,
            page: u32,
        }

        #[derive(Serialize)]
        struct Backward {
            page: u32,
            op: &'static str,
        }

        let forward = CacheKey::from_params(&Forward { op: "render", page: 7 }).unwrap();
        let backward = CacheKey::from_params(&Backward { page: 7, op: "render" }).unwrap();

        assert_eq!(forward, backward);
        assert_eq!(forward.metadata(), backward.metadata());
    }

    #[test]
    fn test_nested_params() {
        let a = CacheKey::from_params(&json!({
            "outer": { "x": 1, "y": [1, 2, 3] },
            "flag": true,
        }))
        .unwrap();
        let b = CacheKey::from_params(&json!({
            "flag": true,
            "outer": { "y": [1, 2, 3], "x": 1 },
        }))
        .unwrap();

        assert_eq!(a, b);

        // array order is significant
        let c = CacheKey::from_params(&json!({
            "flag": true,
            "outer": { "y": [3, 2, 1], "x": 1 },
        }))
        .unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_distinct_params_diverge() {
        let a = CacheKey::from_params(&json!({ "op": "sum", "a": 2, "b": 3 })).unwrap();
        let b = CacheKey::from_params(&json!({ "op": "sum", "a": 2, "b": 4 })).unwrap();

        assert_ne!(a, b);
        assert_ne!(a.cache_path(), b.cache_path());
    }

    #[test]
    fn test_malformed_params() {
        let mut params = HashMap::new();
        params.insert((1u32, 2u32), "not serializable as a json key");

        let err = CacheKey::from_params(&params).unwrap_err();
        assert!(matches!(err, CacheError::MalformedKey(_)));
    }

    #[test]
    fn test_builder_discriminator() {
        let params = json!({ "op": "render" });

        let plain = CacheKey::from_params(&params).unwrap();

        let mut builder = CacheKeyBuilder::new();
        builder.write_params(&params).unwrap();
        builder.write_str("\nlayout: wide\n").unwrap();
        let discriminated = builder.build();

        assert_ne!(plain, discriminated);
    }
}
