//! Contexte de publication : seul écrivain de l'état visible
//!
//! Les workers lui envoient des messages. Il applique les compteurs, rend les
//! pays visibles et prévient le `PublicationSink`, dans l'ordre de réception.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use geonames::GeonamesRecord;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::aggregate::{HitCountAggregator, IncrementOutcome};
use crate::country::CountrySet;

/// Destinataire des publications (couche de présentation)
///
/// Appelé depuis le contexte de publication, un appel à la fois. Les
/// implémentations ne doivent pas bloquer.
pub trait PublicationSink: Send + Sync {
    /// Un lot d'enregistrements est publié ; il est cédé au destinataire
    fn on_batch_published(&self, records: Vec<GeonamesRecord>);

    /// Un pays reçoit son premier point
    fn on_country_visible(&self, country_id: &str);

    /// Le chargement des pays a échoué pendant un fichier
    fn on_cache_failure(&self, _message: &str) {}
}

/// Destinataire qui ignore tout
#[derive(Debug, Default)]
pub struct NoopSink;

impl PublicationSink for NoopSink {
    fn on_batch_published(&self, _records: Vec<GeonamesRecord>) {}

    fn on_country_visible(&self, _country_id: &str) {}
}

/// Destinataire qui journalise les publications
#[derive(Debug, Default)]
pub struct TracingSink {
    published: AtomicU64,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nombre total d'enregistrements publiés
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl PublicationSink for TracingSink {
    fn on_batch_published(&self, records: Vec<GeonamesRecord>) {
        let total = self.published.fetch_add(records.len() as u64, Ordering::Relaxed)
            + records.len() as u64;
        debug!(batch = records.len(), total, "Batch published");
    }

    fn on_country_visible(&self, country_id: &str) {
        info!(country_id, "Country visible");
    }

    fn on_cache_failure(&self, message: &str) {
        warn!(error = message, "Countries unavailable, records published without attribution");
    }
}

/// Lot attribué, prêt à publier
#[derive(Debug)]
pub(crate) struct PublishedBatch {
    pub path: PathBuf,
    pub sequence: u64,
    pub records: Vec<GeonamesRecord>,
    /// Pays de chaque enregistrement (même ordre que `records`)
    pub hits: Vec<Option<String>>,
}

/// Messages reçus par le contexte de publication
pub(crate) enum Publication {
    /// Pays chargés : enregistrement des compteurs à zéro
    Countries(Arc<CountrySet>),
    Batch(PublishedBatch),
    CacheFailure(String),
    /// Barrière : acquittée quand tout ce qui précède est appliqué
    Flush(oneshot::Sender<()>),
}

/// Boucle du contexte de publication, jusqu'à fermeture du canal
pub(crate) async fn run_publisher(
    mut rx: mpsc::Receiver<Publication>,
    aggregator: Arc<HitCountAggregator>,
    sink: Arc<dyn PublicationSink>,
) {
    while let Some(publication) = rx.recv().await {
        match publication {
            Publication::Countries(countries) => {
                aggregator.register(&countries);
            }
            Publication::Batch(batch) => publish_batch(&aggregator, sink.as_ref(), batch),
            Publication::CacheFailure(message) => sink.on_cache_failure(&message),
            Publication::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("Publisher stopped");
}

fn publish_batch(aggregator: &HitCountAggregator, sink: &dyn PublicationSink, batch: PublishedBatch) {
    let PublishedBatch {
        path,
        sequence,
        records,
        hits,
    } = batch;

    let mut newly_visible = Vec::new();
    for country_id in hits.iter().flatten() {
        if aggregator.increment(country_id) == IncrementOutcome::FirstHit {
            newly_visible.push(country_id.as_str());
        }
    }

    debug!(
        path = %path.display(),
        sequence,
        records = records.len(),
        visible = newly_visible.len(),
        "Applying batch"
    );

    sink.on_batch_published(records);
    for country_id in newly_visible {
        sink.on_country_visible(country_id);
    }
}
