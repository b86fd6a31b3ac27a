//! # Strata
//!
//! A schema-driven entity-field store on a key-value backend: declare entity
//! and field types, create entities, read and write typed field cells,
//! subscribe to field changes, query by predicate, and coordinate singleton
//! roles with lease-based leader election.

pub use strata_core as core;
pub use strata_proto as proto;
pub use strata_signals as signals;

pub use strata_core::backend::{BackendError, KvBackend, ScoredMember, StreamEntry};
pub use strata_core::config::Config;
pub use strata_core::error::StoreError;
pub use strata_core::leader::{LeaderElectionWorker, LeadershipState};
pub use strata_core::lock::DistributedLock;
pub use strata_core::log_ring::LogRing;
pub use strata_core::notify::Notifier;
pub use strata_core::query::{Condition, EntityFinder, FieldPredicate, SearchCriteria, Where};
pub use strata_core::store::{EntityStore, FieldRequest};
pub use strata_core::store_worker::StoreWorker;
pub use strata_core::worker::{Supervisor, Worker};

pub use strata_proto::{
    Entity, EntityId, EntitySchema, FieldCell, FieldSchema, LogLevel, LogRecord, Notification, StoreSnapshot, SubscriptionConfig,
    Value, ValueType,
};
