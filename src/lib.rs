#![doc = "prism-load: client library for loading data into Workday Prism Analytics."]

//! Authenticates against a tenant, resolves tables, buckets, change tasks
//! and data sources, converts table definitions into load schemas and drives
//! the bucket and file-container upload protocols.
//!
//! # Usage
//! Build a [`ClientConfig`] (from YAML plus environment, or from the
//! environment alone), create one [`PrismClient`] per tenant and use its
//! component handles. The crate emits `tracing` events and leaves the
//! subscriber to the caller.

pub mod changes;
pub mod client;
pub mod collection;
pub mod config;
pub mod error;
pub mod files;
pub mod gateway;
pub mod lister;
pub mod model;
pub mod query;
pub mod report;
pub mod schema;
pub mod tables;
pub mod token;
pub mod transport;
pub mod upload;

pub use changes::{ActionOutcome, PollPolicy};
pub use client::PrismClient;
pub use collection::{Listing, ResourceCollection};
pub use config::{load_config, ClientConfig, Credentials, Endpoints};
pub use error::{Diagnostic, PrismError, Result};
pub use files::UploadSource;
pub use gateway::{ApiResponse, StatusClass};
pub use lister::{DetailLevel, ResourceQuery};
pub use model::{
    Activity, ActivityState, Bucket, BucketOperation, BucketState, ChangeTask, DataSource, Field,
    FileContainer, LoadField, LoadSchema, ParseOptions, Reference, TableSchema,
};
pub use transport::{HttpRequest, RawResponse, Transport, TransportError};
pub use upload::{BucketRequest, BucketTarget, ContainerLoad};
