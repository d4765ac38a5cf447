//! One client per tenant: a token manager, an authenticated gateway and the
//! endpoint set, shared by every component handle.
//!
//! Component handles are cheap borrows of the client:
//!
//! - [`PrismClient::resources`]: paginated lookup of tables, buckets,
//!   change tasks and data sources
//! - [`PrismClient::uploads`]: bucket and file-container loads
//! - [`PrismClient::changes`]: change-task validation, runs and polling
//! - [`PrismClient::queries`]: WQL row queries
//! - [`PrismClient::tables`]: table create/update/patch
//! - [`PrismClient::reports`]: report invocation
//!
//! Logging goes to the span given to [`PrismClient::with_span`]; the client
//! installs no subscriber of its own.

use crate::changes::ChangeTasks;
use crate::config::{ClientConfig, Endpoints};
use crate::gateway::HttpGateway;
use crate::lister::ResourceLister;
use crate::query::QueryExecutor;
use crate::report::Reports;
use crate::schema::SchemaTransformer;
use crate::tables::TableAdmin;
use crate::token::TokenManager;
use crate::transport::{ReqwestTransport, Transport};
use crate::upload::UploadOrchestrator;
use std::sync::Arc;
use tracing::{info, Span};

pub struct PrismClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    gateway: HttpGateway,
    tokens: Arc<TokenManager>,
    endpoints: Endpoints,
    transformer: SchemaTransformer,
}

impl PrismClient {
    /// Client over the default reqwest transport.
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let span = tracing::info_span!("prism", tenant = %config.tenant_name);
        Self::build(config.clone(), transport, span)
    }

    /// Rebuilds the client so all of its events are recorded inside `span`.
    /// Any cached bearer token is dropped.
    pub fn with_span(self, span: Span) -> Self {
        let PrismClient {
            config,
            transport,
            transformer,
            ..
        } = self;
        Self::build(config, transport, span).with_schema_transformer(transformer)
    }

    pub fn with_schema_transformer(mut self, transformer: SchemaTransformer) -> Self {
        self.transformer = transformer;
        self
    }

    fn build(config: ClientConfig, transport: Arc<dyn Transport>, span: Span) -> Self {
        let endpoints = config.endpoints();
        let tokens = Arc::new(
            TokenManager::new(
                transport.clone(),
                endpoints.token.clone(),
                config.credentials.clone(),
            )
            .with_span(span.clone()),
        );
        let gateway = HttpGateway::new(transport.clone(), tokens.clone()).with_span(span);
        info!(
            tenant_name = %config.tenant_name,
            version = %config.version,
            "Initialized PrismClient"
        );
        Self {
            config,
            transport,
            gateway,
            tokens,
            endpoints,
            transformer: SchemaTransformer::default(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn gateway(&self) -> &HttpGateway {
        &self.gateway
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn transformer(&self) -> &SchemaTransformer {
        &self.transformer
    }

    pub fn resources(&self) -> ResourceLister<'_> {
        ResourceLister::new(&self.gateway, &self.endpoints)
    }

    pub fn uploads(&self) -> UploadOrchestrator<'_> {
        UploadOrchestrator::new(self)
    }

    pub fn changes(&self) -> ChangeTasks<'_> {
        ChangeTasks::new(self)
    }

    pub fn queries(&self) -> QueryExecutor<'_> {
        QueryExecutor::new(&self.gateway, &self.endpoints)
    }

    pub fn tables(&self) -> TableAdmin<'_> {
        TableAdmin::new(self)
    }

    pub fn reports(&self) -> Reports<'_> {
        Reports::new(&self.gateway, &self.endpoints)
    }
}
