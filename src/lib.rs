//! # lidar-db: Idempotent Lidar Capture Ingestion
//!
//! **Version**: 0.1.0
//!
//! lidar-db stores lidar capture sessions ("experiments") and their raw
//! captures ("measurements"), and derives one aggregated profile per
//! experiment by combining its captures, weighted by shot counts.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Poka-Yoke**: Natural-key uniqueness makes re-ingestion harmless
//! - **Jidoka**: Shape mismatches and empty sets stop aggregation instead
//!   of producing zero-valued results
//! - **Genchi Genbutsu**: Every store call is time-bounded and reported
//!   through an injected event sink
//!
//! ## Modules
//!
//! - [`capture`]: decoded capture payloads
//! - [`experiment`]: records and the averaging algorithm
//! - [`store`]: persistence port and in-memory implementation
//! - [`service`]: find-or-create orchestration
//! - [`events`], [`config`], [`telemetry`]: ambient concerns
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use lidar_db::capture::CapturePack;
//! use lidar_db::service::AggregationService;
//! use lidar_db::store::MemoryStore;
//!
//! # async fn example(pack: CapturePack) -> lidar_db::Result<()> {
//! let service = AggregationService::new(MemoryStore::new());
//!
//! let report = service.ingest_pack("site-A", "clear sky", &pack).await?;
//! let result = service.create_processing_result(report.experiment.id()).await?;
//! println!("{} captures merged", result.measurement_ids().len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod capture;
pub mod config;
pub mod error;
pub mod events;
pub mod experiment;
pub mod service;
pub mod store;
pub mod telemetry;

pub use error::{Error, Result, StoreError, StoreResult};
