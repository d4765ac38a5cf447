//! Bucket and file-container loads.
//!
//! # Bucket protocol
//! `create` → `upload_files` (any number of times while the bucket is `New`)
//! → `complete`. Uploading a single zero-byte file to a `TruncateAndInsert`
//! bucket and completing it empties the target table; [`truncate_table`]
//! wraps exactly that.
//!
//! # File-container protocol
//! `load_container` creates a container on the first file when no id is
//! given and reuses that id for every later file of the same call, so all
//! files of one call end up in one container. Containers are never
//! completed; a change-task run references them by id.
//!
//! Files that fail to read or upload are logged and skipped; they never
//! abort the remaining files.
//!
//! [`truncate_table`]: UploadOrchestrator::truncate_table

use crate::client::PrismClient;
use crate::collection::ResourceCollection;
use crate::error::{PrismError, Result};
use crate::files::{prepare_upload, resolve_file_list, UploadSource};
use crate::lister::{Buckets, DetailLevel, ResourceQuery, Tables};
use crate::model::{Bucket, BucketOperation, BucketState, FileContainer, Reference, TableSchema};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Which table a new bucket loads into.
#[derive(Debug, Clone, PartialEq)]
pub enum BucketTarget {
    Id(String),
    /// Exact table name.
    Name(String),
    /// No lookup; the supplied schema must carry the table id.
    SchemaOnly,
}

/// Everything [`UploadOrchestrator::create`] needs for one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketRequest {
    /// Generated as `cli_<uuid>` when absent.
    pub name: Option<String>,
    pub target: BucketTarget,
    /// Overrides the field list of the resolved table.
    pub schema: Option<TableSchema>,
    pub operation: BucketOperation,
}

impl BucketRequest {
    pub fn new(target: BucketTarget, operation: BucketOperation) -> Self {
        Self {
            name: None,
            target,
            schema: None,
            operation,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Outcome of loading files into a file container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerLoad {
    /// Container every uploaded file went into; `None` when nothing was
    /// uploaded and no id was supplied.
    pub id: Option<String>,
    pub uploads: ResourceCollection<Value>,
}

pub fn generate_bucket_name() -> String {
    let name = format!("cli_{}", uuid::Uuid::new_v4().simple());
    debug!(bucket_name = %name, "generated bucket name");
    name
}

/// Bucket and file-container uploads for one client.
pub struct UploadOrchestrator<'a> {
    client: &'a PrismClient,
}

impl<'a> UploadOrchestrator<'a> {
    pub fn new(client: &'a PrismClient) -> Self {
        Self { client }
    }

    fn url(&self, operation: &str) -> String {
        format!("{}{}", self.client.endpoints().prism, operation)
    }

    async fn resolve_table(&self, target: &BucketTarget) -> Option<TableSchema> {
        let lister = self.client.resources();
        match target {
            BucketTarget::Id(id) => {
                let table = lister.get::<Tables>(id, DetailLevel::Full).await;
                if table.is_none() {
                    error!(table_id = %id, "table ID not found");
                }
                table
            }
            BucketTarget::Name(name) => {
                let query = ResourceQuery::by_name(name.clone()).detail(DetailLevel::Full);
                let table = lister
                    .list::<Tables>(&query)
                    .await
                    .into_collection()
                    .into_iter()
                    .next();
                if table.is_none() {
                    error!(table_name = %name, "table not found for bucket operation");
                }
                table
            }
            BucketTarget::SchemaOnly => None,
        }
    }

    /// Creates a bucket in state `New`. Returns `None` (and logs) when the
    /// target can't be resolved, the schema is unusable or the service
    /// rejects the request.
    pub async fn create(&self, request: BucketRequest) -> Option<Bucket> {
        let bucket_name = request.name.unwrap_or_else(generate_bucket_name);

        let table_schema = match &request.target {
            BucketTarget::SchemaOnly => match request.schema {
                Some(schema) => schema,
                None => {
                    error!("schema, target id or target name is required to create a bucket");
                    return None;
                }
            },
            target => {
                let table = self.resolve_table(target).await?;
                match request.schema {
                    Some(mut schema) => {
                        schema.id = table.id.clone();
                        schema
                    }
                    None => table,
                }
            }
        };

        let Some(table_id) = table_schema.id.clone().filter(|id| !id.is_empty()) else {
            error!(table = %table_schema.name, "schema missing \"id\" attribute");
            return None;
        };

        let Some(load_schema) = self.client.transformer().to_load_schema(&table_schema) else {
            error!(table_id = %table_id, "invalid schema for bucket operation");
            return None;
        };

        let body = json!({
            "name": bucket_name,
            "operation": request.operation.to_reference(),
            "targetDataset": Reference::id(table_id.clone()),
            "schema": load_schema,
        });

        info!(
            bucket_name = %bucket_name,
            table_id = %table_id,
            operation = %request.operation,
            "creating bucket"
        );
        let response = self.client.gateway().post_json(&self.url("/buckets"), body).await;
        if response.status != 201 {
            error!(status = response.status, bucket_name = %bucket_name, "bucket creation failed");
            return None;
        }

        let bucket: Bucket = response.json()?;
        info!(bucket_id = %bucket.id, bucket_name = %bucket.name, "successfully created a new wBucket");
        Some(bucket)
    }

    pub async fn bucket(&self, bucket_id: &str) -> Option<Bucket> {
        self.client
            .resources()
            .get::<Buckets>(bucket_id, DetailLevel::Full)
            .await
    }

    /// Every bucket whose target table is `table_name` (case-insensitive).
    pub async fn buckets_for_table(&self, table_name: &str) -> ResourceCollection<Bucket> {
        let wanted = table_name.to_lowercase();
        let mut buckets = self
            .client
            .resources()
            .list::<Buckets>(&ResourceQuery::all())
            .await
            .into_collection();
        buckets.retain(|bucket| {
            bucket
                .target_dataset
                .as_ref()
                .map(|target| target.descriptor().to_lowercase() == wanted)
                .unwrap_or(false)
        });
        buckets
    }

    /// Uploads files to a `New` bucket, one request per file. An empty
    /// `sources` slice uploads one zero-byte file.
    ///
    /// The result holds the service's response for every file that was
    /// accepted.
    pub async fn upload_files(
        &self,
        bucket_id: &str,
        sources: &[UploadSource],
    ) -> ResourceCollection<Value> {
        let url = self.url(&format!("/buckets/{bucket_id}/files"));
        let empty = [UploadSource::Empty];
        let sources = if sources.is_empty() { &empty[..] } else { sources };

        let mut results = ResourceCollection::new();
        for source in sources {
            let part = match prepare_upload(source).await {
                Ok(part) => part,
                Err(e) => {
                    warn!(error = %e, source = ?source, bucket_id, "skipping file that could not be prepared");
                    continue;
                }
            };
            let filename = part.filename.clone();
            let response = self.client.gateway().post_file(&url, part).await;
            if response.status == 201 {
                debug!(file = %filename, bucket_id, "successfully uploaded file to the bucket");
                if let Some(body) = response.json::<Value>() {
                    results.push(body);
                }
            } else {
                warn!(file = %filename, bucket_id, status = response.status, "file upload failed");
            }
        }
        results
    }

    /// Resolves `paths` (existing `.csv`/`.csv.gz` only) and uploads them.
    pub async fn upload_paths<P: AsRef<Path>>(
        &self,
        bucket_id: &str,
        paths: &[P],
    ) -> ResourceCollection<Value> {
        let sources: Vec<UploadSource> = resolve_file_list(paths)
            .into_iter()
            .map(UploadSource::File)
            .collect();
        if sources.is_empty() {
            warn!(bucket_id, "no uploadable files");
            return ResourceCollection::new();
        }
        self.upload_files(bucket_id, &sources).await
    }

    /// Commits the bucket's files to its table.
    ///
    /// The bucket's current state is fetched first. Only a bucket in state
    /// `New` can be completed; any other state is rejected with
    /// [`PrismError::InvalidBucketState`] before the completion request.
    /// `Ok(None)` means the bucket was not found or the service refused the
    /// completion.
    pub async fn complete(&self, bucket_id: &str) -> Result<Option<Bucket>> {
        let Some(bucket) = self.bucket(bucket_id).await else {
            error!(bucket_id, "bucket not found");
            return Ok(None);
        };
        self.complete_bucket(&bucket).await
    }

    /// Completes a bucket fresh from [`create`](Self::create) without
    /// fetching it again.
    async fn complete_bucket(&self, bucket: &Bucket) -> Result<Option<Bucket>> {
        match bucket.state() {
            Some(BucketState::New) => {}
            other => {
                let state = other
                    .map(|state| state.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                error!(bucket_id = %bucket.id, state = %state, "bucket is not in state New");
                return Err(PrismError::InvalidBucketState {
                    bucket_id: bucket.id.clone(),
                    state,
                });
            }
        }

        let url = self.url(&format!("/buckets/{}/complete", bucket.id));
        let response = self.client.gateway().post(&url).await;
        if response.status == 201 {
            info!(bucket_id = %bucket.id, "successfully completed wBucket");
            Ok(response.json())
        } else {
            warn!(bucket_id = %bucket.id, status = response.status, "bucket completion refused");
            Ok(None)
        }
    }

    /// Rows that failed to load, as the delimited text the service returns.
    pub async fn error_file(&self, bucket_id: &str) -> Option<String> {
        if bucket_id.is_empty() {
            error!("bucket id is required");
            return None;
        }
        let url = self.url(&format!("/buckets/{bucket_id}/errorFile"));
        let response = self.client.gateway().get(&url).await;
        (response.status == 200).then(|| response.text())
    }

    /// create → upload → complete in one call.
    pub async fn load_table(
        &self,
        target: BucketTarget,
        files: &[PathBuf],
        operation: BucketOperation,
    ) -> Result<Option<Bucket>> {
        let sources: Vec<UploadSource> = resolve_file_list(files)
            .into_iter()
            .map(UploadSource::File)
            .collect();
        if sources.is_empty() {
            return Err(PrismError::Other("no .csv or .csv.gz files to load".to_string()));
        }
        let Some(bucket) = self.create(BucketRequest::new(target, operation)).await else {
            return Ok(None);
        };
        let uploaded = self.upload_files(&bucket.id, &sources).await;
        info!(bucket_id = %bucket.id, files = uploaded.total(), "files uploaded");
        self.complete_bucket(&bucket).await
    }

    /// Deletes every row of the target table.
    pub async fn truncate_table(&self, target: BucketTarget) -> Result<Option<Bucket>> {
        let request = BucketRequest::new(target, BucketOperation::TruncateAndInsert);
        let Some(bucket) = self.create(request).await else {
            return Ok(None);
        };
        self.upload_files(&bucket.id, &[UploadSource::Empty]).await;
        self.complete_bucket(&bucket).await
    }

    pub async fn create_container(&self) -> Option<FileContainer> {
        let response = self.client.gateway().post(&self.url("/fileContainers")).await;
        if response.status != 201 {
            return None;
        }
        let container: FileContainer = response.json()?;
        debug!(container_id = %container.id, "successfully created file container");
        Some(container)
    }

    /// Files already loaded into a container.
    pub async fn container_files(&self, container_id: &str) -> ResourceCollection<Value> {
        let url = self.url(&format!("/fileContainers/{container_id}/files"));
        let response = self.client.gateway().get(&url).await;
        match response.status {
            200 => response
                .json::<Vec<Value>>()
                .map(ResourceCollection::from)
                .unwrap_or_default(),
            404 => {
                warn!(container_id, "verify: Self-Service: Prism File Container domain in the Prism Analytics functional area");
                ResourceCollection::new()
            }
            _ => ResourceCollection::new(),
        }
    }

    /// Loads files into `container_id`, or into a new container created on
    /// the first file. Returns `None` only when a needed container could not
    /// be created.
    pub async fn load_container<P: AsRef<Path>>(
        &self,
        container_id: Option<&str>,
        files: &[P],
    ) -> Option<ContainerLoad> {
        let mut resolved_id = container_id.map(str::to_string);
        let mut uploads = ResourceCollection::new();

        for path in resolve_file_list(files) {
            let part = match prepare_upload(&UploadSource::File(path.clone())).await {
                Ok(part) => part,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "skipping file that could not be prepared");
                    continue;
                }
            };

            let id = match resolved_id.clone() {
                Some(id) => id,
                None => {
                    let Some(container) = self.create_container().await else {
                        error!("Unable to create fileContainer");
                        return None;
                    };
                    resolved_id = Some(container.id.clone());
                    container.id
                }
            };

            let url = self.url(&format!("/fileContainers/{id}/files"));
            let response = self.client.gateway().post_file(&url, part).await;
            if response.status == 201 {
                debug!(path = %path.display(), container_id = %id, "successfully loaded file");
                if let Some(body) = response.json::<Value>() {
                    uploads.push(body);
                }
            } else {
                warn!(path = %path.display(), container_id = %id, status = response.status, "file load failed");
            }
        }

        Some(ContainerLoad {
            id: resolved_id,
            uploads,
        })
    }
}
