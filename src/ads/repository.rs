use anyhow::{Context, Result};

use super::{seed_ads, Ad};
use crate::storage::{read_json, write_json, SharedStore, ADS_KEY};

/// Ordered ad collection, newest first, written through to the store on every change.
pub struct AdRepository {
    store: SharedStore,
    ads: Vec<Ad>,
}

impl AdRepository {
    /// Loads the stored collection, or the seed listings when nothing usable is stored.
    pub fn initialize(store: SharedStore) -> Self {
        let ads = match read_json::<Vec<Ad>>(store.as_ref(), ADS_KEY) {
            Some(ads) => {
                tracing::debug!(count = ads.len(), "loaded stored ads");
                ads
            }
            None => {
                tracing::info!("no stored ads, starting from seed listings");
                seed_ads()
            }
        };
        Self { store, ads }
    }

    pub fn all(&self) -> &[Ad] {
        &self.ads
    }

    pub fn len(&self) -> usize {
        self.ads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ads.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Ad> {
        self.ads.iter().find(|ad| ad.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn insert_front(&mut self, ad: Ad) -> Result<()> {
        if self.contains(&ad.id) {
            anyhow::bail!("ad {} already exists", ad.id);
        }
        tracing::info!(id = %ad.id, title = %ad.title, "inserting ad");
        self.ads.insert(0, ad);
        self.persist()
    }

    /// Drops the ad with `id`. Returns whether anything was removed.
    pub fn remove_by_id(&mut self, id: &str) -> Result<bool> {
        let before = self.ads.len();
        self.ads.retain(|ad| ad.id != id);
        let removed = self.ads.len() != before;
        if removed {
            tracing::info!(id, "removed ad");
        }
        self.persist()?;
        Ok(removed)
    }

    fn persist(&self) -> Result<()> {
        write_json(self.store.as_ref(), ADS_KEY, &self.ads).context("persisting ad collection")
    }
}
