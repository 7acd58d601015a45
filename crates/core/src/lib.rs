//! Domain logic for the calligraphy character pipeline.
//!
//! Everything here is pure: no database access and no network calls. The
//! `db`, `recognition`, `pipeline` and `api` crates build on these types.

pub mod annotation;
pub mod character_set;
pub mod error;
pub mod extraction;
pub mod imaging;
pub mod keypoints;
pub mod ocr;
pub mod pagination;
pub mod types;
