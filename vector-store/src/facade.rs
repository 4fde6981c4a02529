//! Thin adapter around `qdrant-client` to isolate API usage.
//!
//! This facade concentrates all Qdrant interactions behind a minimal API,
//! hiding away the verbose builder pattern and keeping the rest of the
//! harness decoupled from `qdrant-client`.

use crate::config::{DistanceKind, StoreConfig, VectorSpace};
use crate::errors::StoreError;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QValue, VectorParamsBuilder,
};
use tracing::{debug, info, warn};

/// A facade over the Qdrant client to keep the rest of the code clean and stable.
pub struct QdrantFacade {
    pub(crate) client: Qdrant,
    pub(crate) collection: String,
    distance: DistanceKind,
    on_disk: bool,
}

impl QdrantFacade {
    /// Creates a new facade from the given configuration.
    ///
    /// Uses the modern builder-based API of `qdrant-client` and supports
    /// optional API key authentication.
    pub fn new(cfg: &StoreConfig) -> Result<Self, StoreError> {
        cfg.validate()?;

        let mut builder = Qdrant::from_url(&cfg.url);
        if let Some(key) = &cfg.api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| StoreError::Qdrant(e.to_string()))?;

        Ok(Self {
            client,
            collection: cfg.collection.clone(),
            distance: cfg.distance,
            on_disk: cfg.on_disk,
        })
    }

    /// Ensures that the collection exists in Qdrant.
    ///
    /// - If the collection already exists → no-op.
    /// - If missing → creates it with the given vector space configuration.
    pub async fn ensure_collection(&self, space: &VectorSpace) -> Result<(), StoreError> {
        info!(
            "Ensuring collection '{}' with size={} distance={:?}",
            self.collection, space.size, self.distance
        );

        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| StoreError::Qdrant(e.to_string()))?;
        if exists {
            debug!("Collection '{}' already exists", self.collection);
            return Ok(());
        }

        let vectors_cfg = VectorParamsBuilder::new(space.size as u64, self.qdrant_distance())
            .on_disk(self.on_disk);
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(vectors_cfg),
            )
            .await
            .map_err(|e| StoreError::Qdrant(e.to_string()))?;

        info!("Collection '{}' created successfully", self.collection);
        Ok(())
    }

    /// Drops the collection if present, then recreates it.
    ///
    /// Experiment runs start from a clean collection so stale points from a
    /// previous configuration cannot leak into retrieval results.
    pub async fn recreate_collection(&self, space: &VectorSpace) -> Result<(), StoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| StoreError::Qdrant(e.to_string()))?;
        if exists {
            warn!("Dropping existing collection '{}'", self.collection);
            self.client
                .delete_collection(&self.collection)
                .await
                .map_err(|e| StoreError::Qdrant(e.to_string()))?;
        }
        self.ensure_collection(space).await
    }

    /// Upserts (inserts or updates) a batch of points and waits for persistence.
    ///
    /// Returns the number of points sent.
    pub async fn upsert_points(&self, points: Vec<PointStruct>) -> Result<u64, StoreError> {
        if points.is_empty() {
            debug!("No points provided for upsert");
            return Ok(0);
        }

        let n = points.len() as u64;
        debug!(
            "Upserting {} points into collection '{}'",
            n, self.collection
        );

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| StoreError::Qdrant(e.to_string()))?;

        Ok(n)
    }

    /// Performs a similarity search in Qdrant.
    ///
    /// Returns `(score, payload)` tuples sorted by descending score. When
    /// `score_threshold` is set, candidates below it are filtered server-side.
    pub async fn search(
        &self,
        vector: Vec<f32>,
        top_k: u64,
        score_threshold: Option<f32>,
    ) -> Result<Vec<(f32, serde_json::Value)>, StoreError> {
        debug!(
            "Searching in '{}' with top_k={} threshold={:?}",
            self.collection, top_k, score_threshold
        );

        let mut builder = SearchPointsBuilder::new(&self.collection, vector, top_k)
            .with_payload(true)
            .with_vectors(false);
        if let Some(t) = score_threshold {
            builder = builder.score_threshold(t);
        }

        let res = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| StoreError::Qdrant(e.to_string()))?;

        let mut out = Vec::with_capacity(res.result.len());
        for r in res.result.into_iter() {
            let score = r.score;
            let payload_json = qpayload_to_json(r.payload);
            out.push((score, payload_json));
        }

        debug!("Search completed: {} hits returned", out.len());
        Ok(out)
    }

    fn qdrant_distance(&self) -> Distance {
        match self.distance {
            DistanceKind::Cosine => Distance::Cosine,
            DistanceKind::Dot => Distance::Dot,
            DistanceKind::Euclid => Distance::Euclid,
        }
    }
}

/// Converts a Qdrant payload (`HashMap<String, qdrant::Value>`) into JSON.
///
/// Unsupported nested objects/arrays are mapped to `Null`.
fn qpayload_to_json(mut p: std::collections::HashMap<String, QValue>) -> serde_json::Value {
    use qdrant_client::qdrant::value::Kind as K;
    let mut m = serde_json::Map::new();
    for (k, v) in p.drain() {
        let j = match v.kind {
            Some(K::StringValue(s)) => serde_json::Value::String(s),
            Some(K::IntegerValue(i)) => serde_json::Value::Number(i.into()),
            Some(K::DoubleValue(f)) => serde_json::json!(f),
            Some(K::BoolValue(b)) => serde_json::Value::Bool(b),
            None => serde_json::Value::Null,
            // For unsupported nested types, fallback to Null for safety.
            _ => serde_json::Value::Null,
        };
        m.insert(k, j);
    }
    serde_json::Value::Object(m)
}
