//! Orchestration of the character pipeline.
//!
//! Upload normalization and box extraction are pure and live in
//! `inkstone-core`; this crate wires them to the database, the filesystem
//! and the remote recognition services:
//!
//! - [`ingest::OcrIngestionService`] runs OCR and keeps an audit artifact.
//! - [`extract::CharacterExtractor`] persists boxes as characters.
//! - [`annotate::KeypointAnnotator`] asks the vision model for keypoints.
//! - [`annotation_store::Annotations`] stores keypoint annotations.
//! - [`curator::CharacterSetCurator`] manages user character sets.
//!
//! Remote calls go through one bounded [`dispatch::ExternalCallDispatcher`].

pub mod annotate;
pub mod annotation_store;
pub mod artifacts;
pub mod curator;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod ingest;

pub use error::PipelineError;
