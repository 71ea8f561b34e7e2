//! Sources de polygones de pays (fichier local ou service HTTP)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use super::decode::decode_features;
use super::{AttributeFields, CountryFeature};
use crate::error::CacheError;

/// Fournisseur de la collection de pays
///
/// Appelé au plus une fois par chargement réussi du cache.
pub trait CountrySource: Send + Sync {
    /// Description lisible (URL ou chemin) pour les logs
    fn describe(&self) -> String;

    /// Récupère et décode les pays
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<CountryFeature>, CacheError>>;
}

/// FeatureCollection GeoJSON sur disque
pub struct GeoJsonFileSource {
    path: PathBuf,
    fields: AttributeFields,
}

impl GeoJsonFileSource {
    pub fn new(path: impl Into<PathBuf>, fields: AttributeFields) -> Self {
        Self {
            path: path.into(),
            fields,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CountrySource for GeoJsonFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> BoxFuture<'_, Result<Vec<CountryFeature>, CacheError>> {
        async move {
            let text = tokio::fs::read_to_string(&self.path).await?;
            debug!(path = %self.path.display(), bytes = text.len(), "Country file read");
            decode_features(&text, &self.fields)
        }
        .boxed()
    }
}

/// Service HTTP renvoyant une FeatureCollection GeoJSON
pub struct HttpCountrySource {
    client: reqwest::Client,
    url: String,
    fields: AttributeFields,
}

impl HttpCountrySource {
    pub fn new(
        url: impl Into<String>,
        fields: AttributeFields,
        timeout: Duration,
    ) -> Result<Self, CacheError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("geonames-stats/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            fields,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl CountrySource for HttpCountrySource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self) -> BoxFuture<'_, Result<Vec<CountryFeature>, CacheError>> {
        async move {
            let response = self.client.get(&self.url).send().await?;
            let text = response.error_for_status()?.text().await?;
            debug!(url = %self.url, bytes = text.len(), "Country service answered");
            decode_features(&text, &self.fields)
        }
        .boxed()
    }
}

/// Choisit la source selon l'emplacement : URL http(s) ou chemin local
pub fn source_for(
    location: &str,
    fields: AttributeFields,
    timeout: Duration,
) -> Result<Arc<dyn CountrySource>, CacheError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Arc::new(HttpCountrySource::new(location, fields, timeout)?))
    } else {
        Ok(Arc::new(GeoJsonFileSource::new(location, fields)))
    }
}
