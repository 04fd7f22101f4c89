//! Bulk loading of campus locations.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::domain::NewLocation;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Inserts every location in a JSON array of `{name, lat, lng, type}`.
/// Locations whose slug already exists are skipped, so reruns are harmless.
/// An invalid entry aborts the load before anything after it is inserted.
pub async fn seed_locations(store: &dyn Store, raw: &str) -> Result<SeedReport> {
    let locations: Vec<NewLocation> =
        serde_json::from_str(raw).context("locations file must be a JSON array")?;

    let mut report = SeedReport::default();
    for new in locations {
        let name = new.name.clone();
        let location = new
            .into_location()
            .with_context(|| format!("invalid location entry '{name}'"))?;

        match store.insert_location(location).await {
            Ok(location) => {
                info!(slug = %location.slug, "location added");
                report.inserted += 1;
            }
            Err(StoreError::Conflict(reason)) => {
                warn!(%reason, "location skipped");
                report.skipped += 1;
            }
            Err(err) => return Err(err).context("failed to insert location"),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const CAMPUS: &str = r#"[
        {"name": "George Sherman Union", "lat": 42.3510, "lng": -71.1090},
        {"name": "Mugar Library", "lat": 42.3512, "lng": -71.1080, "type": "library"},
        {"name": "george sherman union", "lat": 42.3510, "lng": -71.1090}
    ]"#;

    #[tokio::test]
    async fn duplicate_slugs_are_skipped() {
        let store = MemoryStore::new();

        let report = seed_locations(&store, CAMPUS).await.unwrap();
        assert_eq!(report, SeedReport { inserted: 2, skipped: 1 });

        let locations = store.locations().await.unwrap();
        assert_eq!(locations.len(), 2);
        assert!(locations.iter().any(|location| location.kind == "library"));
    }

    #[tokio::test]
    async fn rerunning_the_same_file_inserts_nothing() {
        let store = MemoryStore::new();
        seed_locations(&store, CAMPUS).await.unwrap();

        let report = seed_locations(&store, CAMPUS).await.unwrap();
        assert_eq!(report, SeedReport { inserted: 0, skipped: 3 });
    }

    #[tokio::test]
    async fn malformed_files_and_entries_are_errors() {
        let store = MemoryStore::new();

        let err = seed_locations(&store, r#"{"name": "GSU"}"#).await.unwrap_err();
        assert!(err.to_string().contains("JSON array"));

        let err = seed_locations(&store, r#"[{"name": "Nowhere", "lat": 120.0, "lng": 0.0}]"#)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Nowhere"));
        assert!(store.locations().await.unwrap().is_empty());
    }
}
