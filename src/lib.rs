//! # Cadence
//!
//! An in-memory, read-optimized dataset distribution engine: a producer
//! snapshots a domain model into versioned blobs, and consumers materialize
//! that dataset and advance it one delta at a time.
//!
//! # Quick Start
//!
//! ```no_run
//! use cadence::{
//!     in_memory_blob_store, Announcer, CadenceResult, FieldValue, MemoryReadEngine,
//!     MemoryWriteEngine, ObjectMapper, ProducerBuilder, Version, WriteState,
//! };
//! use std::sync::Arc;
//!
//! struct Movie {
//!     title: String,
//!     year: i64,
//! }
//!
//! impl ObjectMapper for Movie {
//!     fn schema_name(&self) -> &'static str {
//!         "Movie"
//!     }
//!
//!     fn to_fields(&self) -> Vec<FieldValue> {
//!         vec![FieldValue::Str(self.title.clone()), FieldValue::Int(self.year)]
//!     }
//! }
//!
//! struct LogAnnouncer;
//! impl Announcer for LogAnnouncer {
//!     fn announce(&self, version: Version) -> CadenceResult<()> {
//!         println!("now serving version {version}");
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> CadenceResult<()> {
//!     let (_store, stager, publisher, _retriever) = in_memory_blob_store();
//!     let mut producer = ProducerBuilder::new(MemoryWriteEngine::new())
//!         .publisher(Arc::new(publisher))
//!         .announcer(Arc::new(LogAnnouncer))
//!         .blob_stager(Arc::new(stager))
//!         .num_states_between_snapshots(10)
//!         .build()?;
//!
//!     producer.run_cycle(|to_version, engine, prior| {
//!         let mut write_state = WriteState::new(to_version, engine, prior.map(|p| (*p).clone()));
//!         write_state.add(&Movie { title: "Arrival".into(), year: 2016 });
//!         Ok(())
//!     })?;
//!
//!     let current = producer.current().expect("first cycle always commits");
//!     let engine: &MemoryReadEngine = &current.engine;
//!     assert_eq!(engine.len("Movie"), 1);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! [`ProducerBuilder`] is the one recognized way to construct a
//! [`Producer`]; [`Producer::run_cycle`] is the one recognized way to
//! advance a dataset version. The reference write/read engine pair
//! ([`MemoryWriteEngine`]/[`MemoryReadEngine`]) and the filesystem and
//! in-memory blob backends are usable directly, or replaceable: a producer
//! only depends on the narrow capability traits in [`cadence_core`], not on
//! any one implementation of them.
//!
//! Internal crates (`cadence-core`, `cadence-state`, `cadence-durability`,
//! `cadence-producer`) are implementation detail; this crate re-exports
//! their public surface as the one stable entry point.

pub use cadence_core::*;
pub use cadence_durability::*;
pub use cadence_producer::*;
pub use cadence_state::*;
