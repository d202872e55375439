//! Skip-if-cached access to host resources.
//!
//! A resource is only requested from the host when the store knows nothing
//! about its key. Whatever the host answers, data or "not found", is recorded
//! so a later run resolves the same key without touching the network. Failed
//! requests are not recorded and are retried on the next run.

use super::client::ApiClient;
use super::fetch::Fetch;
use super::store::{Lookup, Store, StoreKey};
use ohno::EnrichableExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;

const LOG_TARGET: &str = " snapshots";

/// How a resource is retrieved from the host.
#[derive(Debug, Clone, Copy)]
enum Source<'a> {
    /// A single API resource at this path.
    Resource(&'a str),

    /// A paginated API listing at this path, stored as one concatenated array.
    Listing(&'a str),

    /// A file at an absolute URL.
    Raw(&'a str),
}

/// The store plus the client used to fill it.
#[derive(Debug, Clone)]
pub struct Snapshots {
    client: ApiClient,
    store: Arc<dyn Store>,
}

impl Snapshots {
    #[must_use]
    pub fn new(client: ApiClient, store: Arc<dyn Store>) -> Self {
        Self { client, store }
    }

    #[must_use]
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// A single API resource, e.g. `/repos/foo/bar/issues/42`.
    pub async fn resource(&self, key: &StoreKey, path: &str) -> Fetch<Vec<u8>> {
        self.ensure(key, Source::Resource(path)).await
    }

    /// A paginated listing, e.g. `/repos/foo/bar/issues/42/timeline`.
    pub async fn listing(&self, key: &StoreKey, path: &str) -> Fetch<Vec<u8>> {
        self.ensure(key, Source::Listing(path)).await
    }

    /// A file at an absolute URL, e.g. a changed file's raw link.
    pub async fn raw(&self, key: &StoreKey, url: &str) -> Fetch<Vec<u8>> {
        self.ensure(key, Source::Raw(url)).await
    }

    /// Like [`Self::resource`], parsed.
    pub async fn resource_json<T: DeserializeOwned>(&self, key: &StoreKey, path: &str) -> Fetch<T> {
        parse(key, self.resource(key, path).await)
    }

    /// Like [`Self::listing`], parsed.
    pub async fn listing_json<T: DeserializeOwned>(&self, key: &StoreKey, path: &str) -> Fetch<T> {
        parse(key, self.listing(key, path).await)
    }

    /// A stored resource, without ever contacting the host.
    ///
    /// Keys the store knows nothing about are reported as `Missing`.
    pub fn stored(&self, key: &StoreKey) -> Fetch<Vec<u8>> {
        match self.store.lookup(key) {
            Ok(Lookup::Present(bytes)) => Fetch::Found(bytes),
            Ok(Lookup::Missing(_) | Lookup::Absent) => Fetch::Missing,
            Err(e) => Fetch::Failed(e),
        }
    }

    /// Like [`Self::stored`], parsed.
    pub fn stored_json<T: DeserializeOwned>(&self, key: &StoreKey) -> Fetch<T> {
        parse(key, self.stored(key))
    }

    /// [`Self::resource_json`] when `online`, [`Self::stored_json`] otherwise.
    pub async fn resource_json_if<T: DeserializeOwned>(&self, online: bool, key: &StoreKey, path: &str) -> Fetch<T> {
        if online {
            self.resource_json(key, path).await
        } else {
            self.stored_json(key)
        }
    }

    /// [`Self::listing_json`] when `online`, [`Self::stored_json`] otherwise.
    pub async fn listing_json_if<T: DeserializeOwned>(&self, online: bool, key: &StoreKey, path: &str) -> Fetch<T> {
        if online {
            self.listing_json(key, path).await
        } else {
            self.stored_json(key)
        }
    }

    async fn ensure(&self, key: &StoreKey, source: Source<'_>) -> Fetch<Vec<u8>> {
        match self.store.lookup(key) {
            Ok(Lookup::Present(bytes)) => return Fetch::Found(bytes),
            Ok(Lookup::Missing(reason)) => {
                log::debug!(target: LOG_TARGET, "Skipping {key}, known missing: {reason}");
                return Fetch::Missing;
            }
            Ok(Lookup::Absent) => {}
            Err(e) => return Fetch::Failed(e),
        }

        let fetched = match source {
            Source::Resource(path) => self.client.get_bytes(path).await,
            Source::Listing(path) => match self.client.get_all_pages(path).await {
                Fetch::Found(items) => match serde_json::to_vec(&items) {
                    Ok(bytes) => Fetch::Found(bytes),
                    Err(e) => Fetch::Failed(ohno::AppError::from(e)),
                },
                Fetch::Missing => Fetch::Missing,
                Fetch::Failed(e) => Fetch::Failed(e),
            },
            Source::Raw(url) => self.client.download(url).await,
        };

        match fetched {
            Fetch::Found(bytes) => match self.store.put(key, &bytes) {
                Ok(()) => Fetch::Found(bytes),
                Err(e) => Fetch::Failed(e),
            },
            Fetch::Missing => {
                log::info!(target: LOG_TARGET, "Host has no {key}");
                match self.store.put_missing(key, "not found on host") {
                    Ok(()) => Fetch::Missing,
                    Err(e) => Fetch::Failed(e),
                }
            }
            Fetch::Failed(e) => Fetch::Failed(e.enrich_with(|| format!("fetching {key}"))),
        }
    }
}

fn parse<T: DeserializeOwned>(key: &StoreKey, fetched: Fetch<Vec<u8>>) -> Fetch<T> {
    match fetched {
        Fetch::Found(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => Fetch::Found(value),
            Err(e) => Fetch::Failed(ohno::AppError::from(e).enrich_with(|| format!("parsing {key}"))),
        },
        Fetch::Missing => Fetch::Missing,
        Fetch::Failed(e) => Fetch::Failed(e),
    }
}
