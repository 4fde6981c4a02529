//! Runtime and collection configuration.

use crate::errors::StoreError;

/// Distance function used for the vector space.
#[derive(Clone, Copy, Debug)]
pub enum DistanceKind {
    /// Cosine distance (recommended for most embeddings).
    Cosine,
    /// Dot product (useful for normalized vectors).
    Dot,
    /// Euclidean distance (L2).
    Euclid,
}

impl DistanceKind {
    /// Parses a distance name from configuration.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" | "dotproduct" => Ok(Self::Dot),
            "euclid" | "euclidean" | "l2" => Ok(Self::Euclid),
            other => Err(StoreError::Config(format!("unknown distance: {other}"))),
        }
    }
}

/// Describes the vector space of the collection.
#[derive(Clone, Debug)]
pub struct VectorSpace {
    /// Dimensionality of vectors.
    pub size: usize,
    /// Distance function.
    pub distance: DistanceKind,
}

/// Configuration for the experiment collection.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Qdrant endpoint, e.g. `http://localhost:6334` (gRPC port for the Rust client).
    pub url: String,
    /// Optional API key for Qdrant Cloud.
    pub api_key: Option<String>,
    /// Target collection name.
    pub collection: String,
    /// Distance function (Cosine by default).
    pub distance: DistanceKind,
    /// Upsert batch size (typical range: 128..512).
    pub upsert_batch: usize,
    /// Store vectors on disk instead of RAM.
    pub on_disk: bool,
}

impl StoreConfig {
    /// Creates a sane default config for a given collection name and Qdrant endpoint.
    pub fn new_default(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            collection: collection.into(),
            distance: DistanceKind::Cosine,
            upsert_batch: 256,
            on_disk: false,
        }
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.url.trim().is_empty() {
            return Err(StoreError::Config("url is empty".into()));
        }
        if self.collection.trim().is_empty() {
            return Err(StoreError::Config("collection is empty".into()));
        }
        if self.upsert_batch == 0 {
            return Err(StoreError::Config("upsert_batch must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_parsing() {
        assert!(matches!(
            DistanceKind::parse("Cosine"),
            Ok(DistanceKind::Cosine)
        ));
        assert!(matches!(DistanceKind::parse("l2"), Ok(DistanceKind::Euclid)));
        assert!(DistanceKind::parse("hamming").is_err());
    }

    #[test]
    fn validate_rejects_empty_collection() {
        let mut cfg = StoreConfig::new_default("http://localhost:6334", "exp");
        cfg.collection = "".into();
        assert!(cfg.validate().is_err());
    }
}
