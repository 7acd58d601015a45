use std::sync::Arc;
use std::time::Duration;

use inkstone_pipeline::annotate::KeypointAnnotator;
use inkstone_pipeline::annotation_store::{
    Annotations, CharacterAnnotationStore, FileAnnotationStore,
};
use inkstone_pipeline::artifacts::ArtifactStore;
use inkstone_pipeline::curator::CharacterSetCurator;
use inkstone_pipeline::dispatch::ExternalCallDispatcher;
use inkstone_pipeline::extract::CharacterExtractor;
use inkstone_pipeline::ingest::OcrIngestionService;
use inkstone_recognition::ocr::OcrClient;
use inkstone_recognition::vision::VisionClient;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: inkstone_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    pub ingestion: Arc<OcrIngestionService>,
    pub annotator: Arc<KeypointAnnotator>,
    pub extractor: CharacterExtractor,
    pub annotations: Annotations,
    pub curator: CharacterSetCurator,
}

impl AppState {
    /// Wire the pipeline services from configuration.
    ///
    /// OCR and vision calls share one dispatcher, so together they never
    /// exceed `external_call_concurrency` in-flight requests.
    pub fn new(pool: inkstone_db::DbPool, config: ServerConfig) -> Self {
        let dispatcher = ExternalCallDispatcher::new(config.external_call_concurrency);

        let ingestion = OcrIngestionService::new(
            OcrClient::new(config.ocr.clone()),
            ArtifactStore::new(config.storage.artifact_dir.clone()),
            dispatcher.clone(),
            call_budget(config.ocr.timeout),
        );
        let annotator = KeypointAnnotator::new(
            VisionClient::new(config.vision.clone()),
            dispatcher,
            call_budget(config.vision.timeout),
        );
        let annotations = Annotations::new(
            Arc::new(FileAnnotationStore::new(config.storage.annotation_dir.clone())),
            Arc::new(CharacterAnnotationStore::new(pool.clone())),
        );

        Self {
            extractor: CharacterExtractor::new(pool.clone()),
            curator: CharacterSetCurator::new(pool.clone()),
            pool,
            config: Arc::new(config),
            ingestion: Arc::new(ingestion),
            annotator: Arc::new(annotator),
            annotations,
        }
    }
}

/// Dispatcher deadline for one call: the client timeout plus a grace
/// period, so the transport error wins when the remote side is slow.
fn call_budget(client_timeout: Duration) -> Duration {
    client_timeout + Duration::from_secs(5)
}
