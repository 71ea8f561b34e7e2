//! Pipeline d'ingestion : lecture en tâche de fond, attribution parallèle,
//! publication par un contexte unique
//!
//! ```text
//! submit(fichiers) ──► worker (file FIFO, une requête à la fois)
//!                        │  pour chaque fichier :
//!                        │    lecteur bloquant ──lots──► attribution rayon
//!                        ▼
//!                    publisher (seul écrivain) ──► HitCountAggregator + PublicationSink
//! ```

pub mod publisher;

pub use publisher::{NoopSink, PublicationSink, TracingSink};

use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use geonames::{GeonamesError, GeonamesRecord, LineParser, ParseStats, DEFAULT_BATCH_SIZE};
use rayon::prelude::*;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::{CountryEntry, HitCountAggregator};
use crate::country::{CountryPolygonCache, CountrySet, CountrySource};
use crate::error::PipelineError;
use crate::report::{FileStats, IngestReport};
use publisher::{run_publisher, Publication, PublishedBatch};

/// Nombre de lots en attente entre le lecteur et l'attribution
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4;

/// État observable du pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    CacheLoading,
    Attributing,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::CacheLoading => "loading countries",
            Self::Attributing => "attributing",
        };
        f.write_str(label)
    }
}

/// Réglages du pipeline
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub batch_size: NonZeroUsize,
    pub channel_capacity: usize,
    pub parser: LineParser,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: NonZeroUsize::new(DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            parser: LineParser::default(),
        }
    }
}

struct Shared {
    cache: CountryPolygonCache,
    aggregator: Arc<HitCountAggregator>,
    publisher: mpsc::Sender<Publication>,
    state: watch::Sender<PipelineState>,
    options: PipelineOptions,
}

impl Shared {
    fn set_state(&self, state: PipelineState) {
        self.state.send_replace(state);
    }

    async fn publish(&self, publication: Publication) -> Result<(), PipelineError> {
        self.publisher
            .send(publication)
            .await
            .map_err(|_| PipelineError::PublisherClosed)
    }
}

/// Requête en file d'attente du worker
struct Request {
    paths: Vec<PathBuf>,
    cancel: CancellationToken,
    reply: oneshot::Sender<Result<IngestReport, PipelineError>>,
}

/// Pipeline d'ingestion
///
/// Doit être créé dans un runtime tokio : le worker et le contexte de
/// publication sont lancés à la construction et s'arrêtent quand le pipeline
/// est libéré et que les requêtes en file sont terminées.
pub struct IngestionPipeline {
    shared: Arc<Shared>,
    requests: mpsc::UnboundedSender<Request>,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn CountrySource>,
        sink: Arc<dyn PublicationSink>,
        options: PipelineOptions,
    ) -> Self {
        Self::with_cache(CountryPolygonCache::new(source), sink, options)
    }

    pub fn with_cache(
        cache: CountryPolygonCache,
        sink: Arc<dyn PublicationSink>,
        options: PipelineOptions,
    ) -> Self {
        let aggregator = Arc::new(HitCountAggregator::new());
        let (publisher, publications) = mpsc::channel(options.channel_capacity.max(1));
        tokio::spawn(run_publisher(publications, Arc::clone(&aggregator), sink));

        let (state, _) = watch::channel(PipelineState::Idle);
        let shared = Arc::new(Shared {
            cache,
            aggregator,
            publisher,
            state,
            options,
        });

        let (requests, queue) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(Arc::clone(&shared), queue));

        Self { shared, requests }
    }

    /// Soumet une requête d'ingestion
    ///
    /// La requête est refusée immédiatement si elle est vide ou si un fichier
    /// n'existe pas. Sinon elle est traitée en tâche de fond, après les
    /// requêtes déjà soumises.
    pub fn submit<I, P>(&self, paths: I) -> Result<IngestionHandle, PipelineError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        if paths.is_empty() {
            return Err(PipelineError::EmptyRequest);
        }
        if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
            return Err(PipelineError::MissingFile(missing.clone()));
        }

        let cancel = CancellationToken::new();
        let (reply, result) = oneshot::channel();
        self.requests
            .send(Request {
                paths,
                cancel: cancel.clone(),
                reply,
            })
            .map_err(|_| PipelineError::WorkerStopped)?;

        Ok(IngestionHandle { result, cancel })
    }

    /// Compteurs par pays, triés par nombre de points croissant
    pub fn snapshot(&self) -> Vec<CountryEntry> {
        self.shared.aggregator.snapshot()
    }

    pub fn aggregator(&self) -> &Arc<HitCountAggregator> {
        &self.shared.aggregator
    }

    pub fn cache(&self) -> &CountryPolygonCache {
        &self.shared.cache
    }

    /// Pays chargés, si le cache est rempli
    pub fn countries(&self) -> Option<Arc<CountrySet>> {
        self.shared.cache.get()
    }

    pub fn state(&self) -> PipelineState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.shared.state.subscribe()
    }
}

/// Requête d'ingestion soumise
pub struct IngestionHandle {
    result: oneshot::Receiver<Result<IngestReport, PipelineError>>,
    cancel: CancellationToken,
}

impl IngestionHandle {
    /// Demande l'arrêt entre deux lots. Les lots déjà publiés restent comptés.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Attend la fin de la requête ; tout est publié au retour
    pub async fn wait(self) -> Result<IngestReport, PipelineError> {
        self.result
            .await
            .map_err(|_| PipelineError::WorkerStopped)?
    }
}

/// Worker : traite les requêtes une à une, dans l'ordre de soumission
async fn run_worker(shared: Arc<Shared>, mut queue: mpsc::UnboundedReceiver<Request>) {
    while let Some(request) = queue.recv().await {
        let result = run_request(&shared, &request.paths, &request.cancel).await;
        if request.reply.send(result).is_err() {
            debug!("Ingest result dropped by caller");
        }
    }
    debug!("Ingest worker stopped");
}

async fn run_request(
    shared: &Shared,
    paths: &[PathBuf],
    cancel: &CancellationToken,
) -> Result<IngestReport, PipelineError> {
    let started = Instant::now();
    info!(files = paths.len(), "Ingest request started");

    let result = ingest_files(shared, paths, cancel).await;
    shared.set_state(PipelineState::Idle);

    let mut report = result?;
    report.set_duration(started.elapsed());
    report.finalize();
    info!(
        duration_secs = report.duration_secs,
        summary = %report.summary(),
        "Ingest request finished"
    );
    Ok(report)
}

async fn ingest_files(
    shared: &Shared,
    paths: &[PathBuf],
    cancel: &CancellationToken,
) -> Result<IngestReport, PipelineError> {
    let mut report = IngestReport::new();

    for path in paths {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let stats = ingest_file(shared, path, cancel).await?;
        report.record_file(stats);
    }

    // Barrière : tout ce qui a été envoyé est appliqué au retour
    let (ack, done) = oneshot::channel();
    shared.publish(Publication::Flush(ack)).await?;
    done.await.map_err(|_| PipelineError::PublisherClosed)?;

    Ok(report)
}

/// Attribution d'un fichier
enum Attribution {
    /// Premier lot pas encore reçu
    Pending,
    Ready(Arc<CountrySet>),
    /// Pays indisponibles pour ce fichier
    Disabled,
}

async fn ingest_file(
    shared: &Shared,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<FileStats, PipelineError> {
    let mut stats = FileStats::new(path);
    info!(path = %path.display(), "Reading file");

    let (batch_tx, mut batch_rx) = mpsc::channel(shared.options.channel_capacity.max(1));
    let reader = tokio::task::spawn_blocking({
        let path = path.to_path_buf();
        let options = shared.options;
        let cancel = cancel.clone();
        move || read_batches(&path, options, batch_tx, cancel)
    });

    let mut attribution = Attribution::Pending;
    let mut sequence = 0u64;

    while let Some(records) = batch_rx.recv().await {
        if cancel.is_cancelled() {
            stats.cancelled = true;
            break;
        }

        if matches!(attribution, Attribution::Pending) {
            attribution = resolve_countries(shared, &mut stats).await?;
        }

        let (records, hits) = match &attribution {
            Attribution::Ready(countries) => attribute(Arc::clone(countries), records).await?,
            _ => {
                let hits = vec![None; records.len()];
                (records, hits)
            }
        };

        stats.record_batch(&hits);
        shared
            .publish(Publication::Batch(PublishedBatch {
                path: path.to_path_buf(),
                sequence,
                records,
                hits,
            }))
            .await?;
        sequence += 1;
    }
    drop(batch_rx);

    let outcome = reader.await?;
    // Fin du flux du fichier : Idle jusqu'au premier lot du suivant
    shared.set_state(PipelineState::Idle);
    stats.lines = outcome.stats.lines;
    stats.skipped = outcome.stats.skipped;
    if cancel.is_cancelled() {
        stats.cancelled = true;
    }
    if let Some(e) = outcome.error {
        warn!(path = %path.display(), error = %e, "File read failed, remaining files continue");
        stats.io_error = Some(e.to_string());
    }

    debug!(
        path = %path.display(),
        batches = stats.batches,
        records = stats.records,
        attributed = stats.attributed,
        "File done"
    );
    Ok(stats)
}

/// Charge les pays au premier lot d'un fichier
///
/// Un échec est signalé une fois pour le fichier, qui est alors publié sans
/// attribution. Le fichier suivant retente le chargement.
async fn resolve_countries(
    shared: &Shared,
    stats: &mut FileStats,
) -> Result<Attribution, PipelineError> {
    let loaded = match shared.cache.get() {
        Some(countries) => Ok(countries),
        None => {
            shared.set_state(PipelineState::CacheLoading);
            shared.cache.load().await
        }
    };
    shared.set_state(PipelineState::Attributing);

    match loaded {
        Ok(countries) => {
            shared
                .publish(Publication::Countries(Arc::clone(&countries)))
                .await?;
            Ok(Attribution::Ready(countries))
        }
        Err(e) => {
            let message = e.to_string();
            warn!(path = %stats.path, error = %message, "Attribution disabled for this file");
            stats.cache_failure = Some(message.clone());
            shared.publish(Publication::CacheFailure(message)).await?;
            Ok(Attribution::Disabled)
        }
    }
}

/// Attribue un lot en parallèle (pool rayon), l'ordre des points est conservé
async fn attribute(
    countries: Arc<CountrySet>,
    records: Vec<GeonamesRecord>,
) -> Result<(Vec<GeonamesRecord>, Vec<Option<String>>), PipelineError> {
    let attributed = tokio::task::spawn_blocking(move || {
        let hits = records
            .par_iter()
            .map(|record| countries.locate(record).map(|f| f.country_id.clone()))
            .collect();
        (records, hits)
    })
    .await?;

    Ok(attributed)
}

struct ReadOutcome {
    stats: ParseStats,
    error: Option<GeonamesError>,
}

/// Lecteur bloquant : envoie les lots jusqu'à la fin, une erreur ou l'annulation
fn read_batches(
    path: &Path,
    options: PipelineOptions,
    tx: mpsc::Sender<Vec<GeonamesRecord>>,
    cancel: CancellationToken,
) -> ReadOutcome {
    let mut batches = match geonames::open_batches(path, options.parser, options.batch_size) {
        Ok(batches) => batches,
        Err(e) => {
            return ReadOutcome {
                stats: ParseStats::default(),
                error: Some(e),
            }
        }
    };

    let mut error = None;
    for batch in batches.by_ref() {
        match batch {
            Ok(records) => {
                if cancel.is_cancelled() || tx.blocking_send(records).is_err() {
                    break;
                }
            }
            Err(e) => {
                error = Some(e);
                break;
            }
        }
    }

    ReadOutcome {
        stats: batches.get_ref().stats(),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::country::{AttributeFields, GeoJsonFileSource};
    use std::io::Write;

    const SQUARE: &str = r#"{"type": "FeatureCollection", "features": [{
        "type": "Feature",
        "properties": {"FID": 1, "COUNTRY": "Square"},
        "geometry": {"type": "Polygon", "coordinates": [[[0,40],[20,40],[20,60],[0,60],[0,40]]]}
    }]}"#;

    fn temp_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_options() {
        let options = PipelineOptions::default();
        assert_eq!(options.batch_size.get(), 10_000);
        assert_eq!(options.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::CacheLoading.to_string(), "loading countries");
    }

    #[tokio::test]
    async fn test_state_back_to_idle_after_each_file() {
        let countries = temp_file(SQUARE);
        let cities = temp_file("1\tAlice\t\t\t10.0\t50.0\n");
        let source = Arc::new(GeoJsonFileSource::new(countries.path(), AttributeFields::default()));

        let (publisher, _publications) = mpsc::channel(8);
        let (state, _) = watch::channel(PipelineState::Idle);
        let shared = Shared {
            cache: CountryPolygonCache::new(source),
            aggregator: Arc::new(HitCountAggregator::new()),
            publisher,
            state,
            options: PipelineOptions::default(),
        };
        let mut observed = shared.state.subscribe();

        let stats = ingest_file(&shared, cities.path(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.attributed, 1);
        // Passé par CacheLoading puis Attributing, revenu à Idle sans attendre la fin de la requête
        assert!(observed.has_changed().unwrap());
        assert_eq!(*observed.borrow_and_update(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_read_batches_reports_missing_file() {
        let (tx, _rx) = mpsc::channel(1);
        let outcome = tokio::task::spawn_blocking(|| {
            read_batches(
                Path::new("/nonexistent/cities.txt"),
                PipelineOptions::default(),
                tx,
                CancellationToken::new(),
            )
        })
        .await
        .unwrap();

        assert!(matches!(outcome.error, Some(GeonamesError::NotFound(_))));
        assert_eq!(outcome.stats.lines, 0);
    }
}
