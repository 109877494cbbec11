//! Connection Manager and the client service entry points.
//!
//! `ClientService` owns at most one live connection. `enable` and `disable`
//! replace it under a lifecycle lock; `put` and `scan` clone the current
//! connection out of a read-locked slot, so a concurrent call sees either the
//! old connection or the new one, never a half-built one.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use widecol_core::{Connection, ConnectionFactory, FilterParser, ParseFilter, StoreResult};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::observability::{log_debug, log_info, log_warn};
use crate::put::{group_writes, WriteRequest};
use crate::scan::{self, build_scan, ColumnSelector, ResultHandler};

/// Lifecycle state of a `ClientService`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Disabled,
    Enabling,
    Enabled,
    Disabling,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Disabled => "disabled",
            ServiceState::Enabling => "enabling",
            ServiceState::Enabled => "enabled",
            ServiceState::Disabling => "disabling",
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batched writes and incremental scans against a wide-column store.
pub trait ColumnStoreClient: Send + Sync {
    /// Merge `writes` into one mutation per row and submit them as one batch.
    fn put(&self, table: &str, writes: &[WriteRequest]) -> ClientResult<()>;

    /// Stream every row of `table` holding a cell at or after `min_time`.
    ///
    /// `columns` restricts the scan to families or single columns; a
    /// non-blank `filter` is parsed before anything is read. Rows sharing the
    /// largest timestamp of one scan are returned again by a scan starting at
    /// that timestamp.
    fn scan(
        &self,
        table: &str,
        columns: Option<&[ColumnSelector]>,
        filter: Option<&str>,
        min_time: i64,
        handler: &mut dyn ResultHandler,
    ) -> ClientResult<()>;
}

struct Slot {
    state: ServiceState,
    connection: Option<Arc<dyn Connection>>,
}

/// The client service.
pub struct ClientService {
    factory: Arc<dyn ConnectionFactory>,
    filter_parser: Arc<dyn FilterParser>,
    /// Serializes enable and disable
    lifecycle: Mutex<()>,
    slot: RwLock<Slot>,
}

impl ClientService {
    /// A disabled service that connects through `factory`.
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            factory,
            filter_parser: Arc::new(ParseFilter),
            lifecycle: Mutex::new(()),
            slot: RwLock::new(Slot {
                state: ServiceState::Disabled,
                connection: None,
            }),
        }
    }

    /// Replace the filter-expression parser.
    pub fn with_filter_parser(mut self, parser: Arc<dyn FilterParser>) -> Self {
        self.filter_parser = parser;
        self
    }

    pub fn state(&self) -> ServiceState {
        self.slot.read().state
    }

    pub fn is_enabled(&self) -> bool {
        self.state() == ServiceState::Enabled
    }

    /// Validate `config`, connect, and confirm the cluster answers.
    ///
    /// On any failure the service stays disabled and holds no connection.
    pub fn enable(&self, config: &ClientConfig) -> ClientResult<()> {
        config.validate().map_err(ClientError::ConfigValidation)?;

        let _lifecycle = self.lifecycle.lock();
        {
            let mut slot = self.slot.write();
            if slot.state != ServiceState::Disabled {
                return Err(ClientError::InvalidState {
                    operation: "enable",
                    state: slot.state.as_str(),
                });
            }
            slot.state = ServiceState::Enabling;
        }

        match self.connect(config) {
            Ok(connection) => {
                let mut slot = self.slot.write();
                slot.connection = Some(connection);
                slot.state = ServiceState::Enabled;
                log_info!(component = "service", event = "service_enabled");
                Ok(())
            }
            Err(source) => {
                self.slot.write().state = ServiceState::Disabled;
                log_warn!(
                    component = "service",
                    event = "service_enable_failed",
                    error = %source,
                );
                Err(ClientError::Connection { source })
            }
        }
    }

    fn connect(&self, config: &ClientConfig) -> StoreResult<Arc<dyn Connection>> {
        let conf = config.resolve()?;
        let connection = self.factory.connect(&conf)?;

        match connection.admin().and_then(|admin| admin.list_table_names()) {
            Ok(tables) => {
                log_debug!(
                    component = "service",
                    event = "liveness_checked",
                    tables = tables.len(),
                );
                Ok(connection)
            }
            Err(err) => {
                close_quietly(connection.as_ref());
                Err(err)
            }
        }
    }

    /// Close and drop the connection. Never fails; a close error is logged.
    pub fn disable(&self) {
        let _lifecycle = self.lifecycle.lock();
        let connection = {
            let mut slot = self.slot.write();
            if slot.state == ServiceState::Disabled && slot.connection.is_none() {
                return;
            }
            slot.state = ServiceState::Disabling;
            slot.connection.take()
        };

        if let Some(connection) = connection {
            close_quietly(connection.as_ref());
        }

        self.slot.write().state = ServiceState::Disabled;
        log_info!(component = "service", event = "service_disabled");
    }

    fn connection(&self) -> ClientResult<Arc<dyn Connection>> {
        let slot = self.slot.read();
        match (&slot.state, &slot.connection) {
            (ServiceState::Enabled, Some(connection)) => Ok(Arc::clone(connection)),
            _ => Err(ClientError::NotEnabled),
        }
    }
}

impl ColumnStoreClient for ClientService {
    fn put(&self, table: &str, writes: &[WriteRequest]) -> ClientResult<()> {
        let connection = self.connection()?;
        if writes.is_empty() {
            return Ok(());
        }

        let puts = group_writes(writes);
        let rows = puts.len();
        let write_error = |source| ClientError::Write {
            table: table.to_string(),
            rows,
            source,
        };
        let handle = connection.table(table).map_err(write_error)?;
        handle.put(puts).map_err(write_error)?;

        log_debug!(
            component = "put",
            event = "batch_submitted",
            table = %table,
            writes = writes.len(),
            rows,
        );
        Ok(())
    }

    fn scan(
        &self,
        table: &str,
        columns: Option<&[ColumnSelector]>,
        filter: Option<&str>,
        min_time: i64,
        handler: &mut dyn ResultHandler,
    ) -> ClientResult<()> {
        let filter = match filter.filter(|expr| !expr.trim().is_empty()) {
            Some(expr) => Some(self.filter_parser.parse(expr).map_err(|source| ClientError::FilterParse {
                expression: expr.to_string(),
                source,
            })?),
            None => None,
        };
        let connection = self.connection()?;

        let scan = build_scan(columns, filter, min_time);
        log_debug!(
            component = "scan",
            event = "scan_started",
            table = %table,
            min_time,
            filtered = scan.filter().is_some(),
        );
        let summary = scan::execute(connection.as_ref(), table, &scan, handler)?;
        log_debug!(
            component = "scan",
            event = "scan_finished",
            table = %table,
            rows = summary.rows,
            cells = summary.cells,
            skipped = summary.skipped,
        );
        Ok(())
    }
}

impl Drop for ClientService {
    fn drop(&mut self) {
        if let Some(connection) = self.slot.get_mut().connection.take() {
            close_quietly(connection.as_ref());
        }
    }
}

fn close_quietly(connection: &dyn Connection) {
    if let Err(err) = connection.close() {
        log_warn!(
            component = "service",
            event = "connection_close_failed",
            error = %err,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use widecol_core::{FamilyDescriptor, MemoryCluster, TableDescriptor};

    fn local_config() -> ClientConfig {
        ClientConfig::new()
            .with_quorum("localhost")
            .with_client_port(2181)
            .with_znode_parent("/hbase")
            .with_client_retries(1)
    }

    fn test_service() -> (ClientService, Arc<MemoryCluster>) {
        let cluster = MemoryCluster::local();
        cluster
            .create_table(TableDescriptor::new("t").with_family(FamilyDescriptor::new("f")))
            .unwrap();
        (ClientService::new(Arc::new(cluster.factory())), cluster)
    }

    #[test]
    fn test_lifecycle() {
        let (service, cluster) = test_service();
        assert_eq!(service.state(), ServiceState::Disabled);

        service.enable(&local_config()).unwrap();
        assert!(service.is_enabled());
        assert_eq!(cluster.open_connections(), 1);

        service.disable();
        assert_eq!(service.state(), ServiceState::Disabled);
        assert_eq!(cluster.open_connections(), 0);

        // a second disable is a no-op
        service.disable();
        service.enable(&local_config()).unwrap();
        assert!(service.is_enabled());
    }

    #[test]
    fn test_double_enable_rejected() {
        let (service, cluster) = test_service();
        service.enable(&local_config()).unwrap();
        assert!(matches!(
            service.enable(&local_config()),
            Err(ClientError::InvalidState { operation: "enable", .. })
        ));
        assert_eq!(cluster.open_connections(), 1);
    }

    #[test]
    fn test_liveness_failure_leaves_service_disabled() {
        let (service, cluster) = test_service();
        cluster.fail_liveness_checks(true);
        assert!(matches!(service.enable(&local_config()), Err(ClientError::Connection { .. })));
        assert_eq!(service.state(), ServiceState::Disabled);
        assert_eq!(cluster.open_connections(), 0);

        cluster.fail_liveness_checks(false);
        service.enable(&local_config()).unwrap();
    }

    #[test]
    fn test_calls_require_enabled_service() {
        let (service, _cluster) = test_service();
        let writes = [WriteRequest::new("r", "f", "q", "v")];
        assert!(matches!(service.put("t", &writes), Err(ClientError::NotEnabled)));

        let mut handler = scan::handler_fn(|_, _| Ok(()));
        assert!(matches!(
            service.scan("t", None, None, 0, &mut handler),
            Err(ClientError::NotEnabled)
        ));
    }

    #[test]
    fn test_disable_swallows_close_failure() {
        let (service, cluster) = test_service();
        service.enable(&local_config()).unwrap();
        cluster.fail_next_close();
        service.disable();
        assert_eq!(service.state(), ServiceState::Disabled);
        assert!(matches!(service.put("t", &[]), Err(ClientError::NotEnabled)));
    }

    #[test]
    fn test_drop_closes_connection() {
        let (service, cluster) = test_service();
        service.enable(&local_config()).unwrap();
        drop(service);
        assert_eq!(cluster.open_connections(), 0);
    }
}
