//! In-process cluster, a complete store backend living in RAM.
//!
//! `MemoryCluster` keeps every table in ordered maps behind RwLocks and hands
//! out connections through `MemoryConnectionFactory`. It follows the same
//! contracts a remote cluster does:
//!
//! - **Connect**: the configured quorum, port and parent path must match
//! - **Write path**: whole batch validated, then applied under one write lock,
//!   with the configured number of retries for transient failures
//! - **Read path**: lazy scanners that re-acquire the read lock per row
//!
//! Faults can be injected to exercise the failure paths of callers, and
//! gauges report how many table handles and scanners are still open.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

use crate::cell::{CellType, KeyValue};
use crate::config::{Configuration, CLIENT_PORT_KEY, CLIENT_RETRIES_KEY, QUORUM_KEY, ZNODE_PARENT_KEY};
use crate::connection::{Admin, Connection, ConnectionFactory, Table, TableDescriptor};
use crate::error::{StoreError, StoreResult};
use crate::mutation::Put;
use crate::scan::{ResultScanner, RowResult, Scan};

const LOG_TARGET: &str = "widecol";

/// Port assumed when the configuration leaves it out
pub const DEFAULT_CLIENT_PORT: u16 = 2181;
/// Parent path assumed when the configuration leaves it out
pub const DEFAULT_ZNODE_PARENT: &str = "/hbase";
/// Retries assumed when the configuration leaves them out
pub const DEFAULT_CLIENT_RETRIES: u32 = 35;

/// (family, qualifier) -> versions, newest first
type RowData = BTreeMap<(Vec<u8>, Vec<u8>), Vec<KeyValue>>;

struct TableData {
    descriptor: TableDescriptor,
    rows: RwLock<BTreeMap<Vec<u8>, RowData>>,
}

/// One submitted batch, as the cluster received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRecord {
    pub table: String,
    /// Row key of each Put in the batch, in submission order
    pub rows: Vec<Vec<u8>>,
}

#[derive(Default)]
struct Faults {
    unreachable: AtomicBool,
    fail_liveness: AtomicBool,
    fail_close: AtomicBool,
    /// Remaining put attempts that fail before one succeeds
    put_failures: AtomicU32,
    /// Rows a new scanner delivers before its next fetch fails
    scan_failure_after: Mutex<Option<usize>>,
}

#[derive(Default)]
struct Gauges {
    connections: AtomicUsize,
    tables: AtomicUsize,
    scanners: AtomicUsize,
}

/// A cluster held entirely in memory.
///
/// All methods take `&self`; share it behind an `Arc`.
pub struct MemoryCluster {
    quorum: Vec<String>,
    port: u16,
    parent: String,
    tables: RwLock<HashMap<String, Arc<TableData>>>,
    /// Last sequence id handed out
    sequence: AtomicU64,
    batches: Mutex<Vec<BatchRecord>>,
    faults: Faults,
    gauges: Gauges,
}

impl MemoryCluster {
    /// A cluster answering at the given quorum hosts, port and parent path.
    pub fn new(quorum: &str, port: u16, parent: &str) -> Arc<Self> {
        Arc::new(Self {
            quorum: split_hosts(quorum).map(|(host, _)| host.to_string()).collect(),
            port,
            parent: parent.to_string(),
            tables: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            batches: Mutex::new(Vec::new()),
            faults: Faults::default(),
            gauges: Gauges::default(),
        })
    }

    /// A cluster matching the default configuration.
    pub fn local() -> Arc<Self> {
        Self::new("localhost", DEFAULT_CLIENT_PORT, DEFAULT_ZNODE_PARENT)
    }

    /// Factory producing connections to this cluster.
    pub fn factory(self: &Arc<Self>) -> MemoryConnectionFactory {
        MemoryConnectionFactory { cluster: Arc::clone(self) }
    }

    pub fn create_table(&self, descriptor: TableDescriptor) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(&descriptor.name) {
            return Err(StoreError::TableExists(descriptor.name));
        }
        tracing::debug!(
            target: LOG_TARGET,
            component = "memory",
            event = "table_created",
            table = %descriptor.name,
            families = descriptor.families.len(),
        );
        let name = descriptor.name.clone();
        tables.insert(
            name,
            Arc::new(TableData {
                descriptor,
                rows: RwLock::new(BTreeMap::new()),
            }),
        );
        Ok(())
    }

    pub fn table_names(&self) -> Vec<String> {
        let tables = self.tables.read();
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every stored version of one column, newest first.
    pub fn column_versions(&self, table: &str, row: &[u8], family: &[u8], qualifier: &[u8]) -> Vec<KeyValue> {
        let Ok(data) = self.table_data(table) else {
            return Vec::new();
        };
        let rows = data.rows.read();
        rows.get(row)
            .and_then(|columns| columns.get(&(family.to_vec(), qualifier.to_vec())))
            .cloned()
            .unwrap_or_default()
    }

    /// Every batch received so far, in arrival order.
    pub fn batches(&self) -> Vec<BatchRecord> {
        self.batches.lock().clone()
    }

    pub fn open_connections(&self) -> usize {
        self.gauges.connections.load(Ordering::SeqCst)
    }

    pub fn open_tables(&self) -> usize {
        self.gauges.tables.load(Ordering::SeqCst)
    }

    pub fn open_scanners(&self) -> usize {
        self.gauges.scanners.load(Ordering::SeqCst)
    }

    // -- fault injection ---------------------------------------------------

    /// While unreachable, new connections and admin calls fail.
    pub fn set_reachable(&self, reachable: bool) {
        self.faults.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Make `list_table_names` fail while set.
    pub fn fail_liveness_checks(&self, fail: bool) {
        self.faults.fail_liveness.store(fail, Ordering::SeqCst);
    }

    /// The next connection close reports an error (the connection still closes).
    pub fn fail_next_close(&self) {
        self.faults.fail_close.store(true, Ordering::SeqCst);
    }

    /// The next `attempts` put attempts fail with an I/O error.
    pub fn fail_puts(&self, attempts: u32) {
        self.faults.put_failures.store(attempts, Ordering::SeqCst);
    }

    /// Scanners opened from now on fail after delivering `rows` rows.
    pub fn fail_scans_after(&self, rows: Option<usize>) {
        *self.faults.scan_failure_after.lock() = rows;
    }

    // -- internals ---------------------------------------------------------

    fn table_data(&self, name: &str) -> StoreResult<Arc<TableData>> {
        let tables = self.tables.read();
        tables
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    fn is_reachable(&self) -> bool {
        !self.faults.unreachable.load(Ordering::SeqCst)
    }

    fn answers(&self, quorum: &str, port: u16, parent: &str) -> bool {
        self.is_reachable()
            && parent == self.parent
            && split_hosts(quorum).any(|(host, host_port)| {
                host_port.unwrap_or(port) == self.port && self.quorum.iter().any(|h| h == host)
            })
    }

    fn take_put_failure(&self) -> bool {
        self.faults
            .put_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Encode and stamp every column of the batch, then apply it under one lock.
    fn apply(&self, data: &TableData, puts: &[Put]) -> StoreResult<()> {
        let now = now_millis();
        let mut cells = Vec::with_capacity(puts.iter().map(Put::len).sum());
        for put in puts {
            for col in put.columns() {
                let kv = KeyValue::new(
                    put.row(),
                    &col.family,
                    &col.qualifier,
                    col.timestamp.unwrap_or(now),
                    CellType::Put,
                    &col.value,
                    &col.tags,
                )?;
                cells.push(kv);
            }
        }

        let mut rows = data.rows.write();
        for kv in cells {
            let kv = kv.with_sequence_id(self.next_sequence());
            let max_versions = data
                .descriptor
                .family(kv.family())
                .map_or(1, |f| f.max_versions);
            let versions = rows
                .entry(kv.row().to_vec())
                .or_default()
                .entry((kv.family().to_vec(), kv.qualifier().to_vec()))
                .or_default();
            // Same timestamp: the newer sequence id replaces the older cell.
            versions.retain(|v| v.timestamp() != kv.timestamp());
            let at = versions
                .iter()
                .position(|v| v.timestamp() < kv.timestamp())
                .unwrap_or(versions.len());
            versions.insert(at, kv);
            versions.truncate(max_versions);
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCluster")
            .field("quorum", &self.quorum)
            .field("port", &self.port)
            .field("parent", &self.parent)
            .field("tables", &self.table_names())
            .finish()
    }
}

/// `host[:port]` entries of a comma-separated quorum string.
fn split_hosts(quorum: &str) -> impl Iterator<Item = (&str, Option<u16>)> {
    quorum
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => (host, Some(port)),
                Err(_) => (entry, None),
            },
            None => (entry, None),
        })
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Connection factory and connection
// ---------------------------------------------------------------------------

/// Opens connections to one `MemoryCluster`.
#[derive(Debug, Clone)]
pub struct MemoryConnectionFactory {
    cluster: Arc<MemoryCluster>,
}

impl ConnectionFactory for MemoryConnectionFactory {
    fn connect(&self, conf: &Configuration) -> StoreResult<Arc<dyn Connection>> {
        let quorum = conf
            .get(QUORUM_KEY)
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| StoreError::InvalidConfig {
                key: QUORUM_KEY.to_string(),
                reason: "no quorum hosts configured".into(),
            })?;
        let port = conf.get_u16(CLIENT_PORT_KEY)?.unwrap_or(DEFAULT_CLIENT_PORT);
        let parent = conf.get(ZNODE_PARENT_KEY).unwrap_or(DEFAULT_ZNODE_PARENT);
        let retries = conf.get_u32(CLIENT_RETRIES_KEY)?.unwrap_or(DEFAULT_CLIENT_RETRIES);

        if !self.cluster.answers(quorum, port, parent) {
            return Err(StoreError::Unreachable {
                quorum: quorum.to_string(),
                port,
                parent: parent.to_string(),
            });
        }

        self.cluster.gauges.connections.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            target: LOG_TARGET,
            component = "memory",
            event = "connection_opened",
            quorum = %quorum,
            port,
            retries,
        );
        Ok(Arc::new(MemoryConnection {
            cluster: Arc::clone(&self.cluster),
            retries,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Connection to a `MemoryCluster`.
pub struct MemoryConnection {
    cluster: Arc<MemoryCluster>,
    retries: u32,
    closed: AtomicBool,
}

impl MemoryConnection {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::ConnectionClosed);
        }
        Ok(())
    }
}

impl Connection for MemoryConnection {
    fn table(&self, name: &str) -> StoreResult<Box<dyn Table>> {
        self.ensure_open()?;
        self.cluster.gauges.tables.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryTable {
            cluster: Arc::clone(&self.cluster),
            name: name.to_string(),
            attempts: self.retries.saturating_add(1),
        }))
    }

    fn admin(&self) -> StoreResult<Box<dyn Admin>> {
        self.ensure_open()?;
        Ok(Box::new(MemoryAdmin { cluster: Arc::clone(&self.cluster) }))
    }

    fn close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.cluster.gauges.connections.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(target: LOG_TARGET, component = "memory", event = "connection_closed");
        if self.cluster.faults.fail_close.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Io {
                kind: std::io::ErrorKind::BrokenPipe,
                message: "coordination session did not acknowledge close".into(),
            });
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.cluster.gauges.connections.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

struct MemoryAdmin {
    cluster: Arc<MemoryCluster>,
}

impl MemoryAdmin {
    fn ensure_reachable(&self) -> StoreResult<()> {
        if !self.cluster.is_reachable() {
            return Err(StoreError::Io {
                kind: std::io::ErrorKind::TimedOut,
                message: "master did not respond".into(),
            });
        }
        Ok(())
    }
}

impl Admin for MemoryAdmin {
    fn list_table_names(&self) -> StoreResult<Vec<String>> {
        self.ensure_reachable()?;
        if self.cluster.faults.fail_liveness.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                kind: std::io::ErrorKind::ConnectionRefused,
                message: "master refused metadata request".into(),
            });
        }
        Ok(self.cluster.table_names())
    }

    fn table_exists(&self, name: &str) -> StoreResult<bool> {
        self.ensure_reachable()?;
        Ok(self.cluster.tables.read().contains_key(name))
    }

    fn create_table(&self, descriptor: TableDescriptor) -> StoreResult<()> {
        self.ensure_reachable()?;
        self.cluster.create_table(descriptor)
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

struct MemoryTable {
    cluster: Arc<MemoryCluster>,
    name: String,
    /// First try plus configured retries
    attempts: u32,
}

impl MemoryTable {
    fn check_families<'a>(&self, data: &TableData, families: impl Iterator<Item = &'a [u8]>) -> StoreResult<()> {
        for family in families {
            if data.descriptor.family(family).is_none() {
                return Err(StoreError::NoSuchColumnFamily {
                    table: self.name.clone(),
                    family: String::from_utf8_lossy(family).into_owned(),
                });
            }
        }
        Ok(())
    }
}

impl Table for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(&self, puts: Vec<Put>) -> StoreResult<()> {
        let data = self.cluster.table_data(&self.name)?;
        self.check_families(
            &data,
            puts.iter().flat_map(|p| p.columns().iter().map(|c| c.family.as_slice())),
        )?;

        let mut last = None;
        for _ in 0..self.attempts {
            if self.cluster.take_put_failure() {
                last = Some(StoreError::Io {
                    kind: std::io::ErrorKind::ConnectionReset,
                    message: "region server reset the connection".into(),
                });
                continue;
            }
            self.cluster.apply(&data, &puts)?;
            self.cluster.batches.lock().push(BatchRecord {
                table: self.name.clone(),
                rows: puts.iter().map(|p| p.row().to_vec()).collect(),
            });
            return Ok(());
        }
        Err(StoreError::RetriesExhausted {
            attempts: self.attempts,
            last: Box::new(last.unwrap_or(StoreError::ConnectionClosed)),
        })
    }

    fn scanner(&self, scan: &Scan) -> StoreResult<Box<dyn ResultScanner>> {
        let data = self.cluster.table_data(&self.name)?;
        self.check_families(&data, scan.families().keys().map(Vec::as_slice))?;

        self.cluster.gauges.scanners.fetch_add(1, Ordering::SeqCst);
        let fail_after = *self.cluster.faults.scan_failure_after.lock();
        Ok(Box::new(MemoryScanner {
            cluster: Arc::clone(&self.cluster),
            data,
            scan: scan.clone(),
            position: None,
            delivered: 0,
            fail_after,
            exhausted: false,
            closed: false,
        }))
    }
}

impl Drop for MemoryTable {
    fn drop(&mut self) {
        self.cluster.gauges.tables.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Lazy scanner: remembers the last row key and resumes after it.
struct MemoryScanner {
    cluster: Arc<MemoryCluster>,
    data: Arc<TableData>,
    scan: Scan,
    position: Option<Vec<u8>>,
    delivered: usize,
    fail_after: Option<usize>,
    exhausted: bool,
    closed: bool,
}

impl ResultScanner for MemoryScanner {
    fn next_row(&mut self) -> StoreResult<Option<RowResult>> {
        if self.closed || self.exhausted {
            return Ok(None);
        }
        if self.fail_after.is_some_and(|limit| self.delivered >= limit) {
            return Err(StoreError::Io {
                kind: std::io::ErrorKind::TimedOut,
                message: "scanner lease expired".into(),
            });
        }

        let data = Arc::clone(&self.data);
        let rows = data.rows.read();
        let lower = match self.position.take() {
            Some(last) => Bound::Excluded(last),
            None => Bound::Unbounded,
        };
        let time_range = self.scan.time_range();

        for (key, columns) in rows.range((lower, Bound::Unbounded)) {
            self.position = Some(key.clone());
            let candidates: Vec<KeyValue> = columns
                .iter()
                .filter(|((family, qualifier), _)| self.scan.selects(family, qualifier))
                .filter_map(|(_, versions)| versions.iter().find(|kv| time_range.contains(kv.timestamp())).cloned())
                .collect();
            let cells = match self.scan.filter() {
                Some(filter) => filter.apply(&candidates),
                None => candidates,
            };
            if cells.is_empty() {
                continue;
            }
            self.delivered += 1;
            return Ok(Some(RowResult::new(key.clone(), cells)));
        }
        self.exhausted = true;
        Ok(None)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.cluster.gauges.scanners.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MemoryScanner {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::FamilyDescriptor;
    use crate::filter::{FilterParser, ParseFilter};
    use crate::scan::TimeRange;

    fn connected() -> (Arc<MemoryCluster>, Arc<dyn Connection>) {
        let cluster = MemoryCluster::local();
        cluster
            .create_table(
                TableDescriptor::new("t")
                    .with_family(FamilyDescriptor::new("f"))
                    .with_family(FamilyDescriptor::new("h").with_max_versions(3)),
            )
            .unwrap();
        let conn = cluster.factory().connect(&Configuration::create()).unwrap();
        (cluster, conn)
    }

    fn put_at(conn: &Arc<dyn Connection>, row: &str, family: &str, qualifier: &str, ts: i64, value: &str) {
        let mut put = Put::new(row);
        put.add_column_at(family, qualifier, ts, value);
        conn.table("t").unwrap().put(vec![put]).unwrap();
    }

    fn drain(scanner: &mut dyn ResultScanner) -> Vec<RowResult> {
        let mut rows = Vec::new();
        while let Some(row) = scanner.next_row().unwrap() {
            rows.push(row);
        }
        rows
    }

    #[test]
    fn test_connect_requires_matching_coordinates() {
        let cluster = MemoryCluster::new("zk1,zk2", 2222, "/store");
        let factory = cluster.factory();

        let mut conf = Configuration::create();
        conf.set(QUORUM_KEY, "zk9, zk2");
        conf.set(CLIENT_PORT_KEY, "2222");
        conf.set(ZNODE_PARENT_KEY, "/store");
        assert!(factory.connect(&conf).is_ok());

        conf.set(ZNODE_PARENT_KEY, "/hbase");
        assert!(matches!(factory.connect(&conf), Err(StoreError::Unreachable { .. })));

        // per-host port overrides the client port
        conf.set(ZNODE_PARENT_KEY, "/store");
        conf.set(CLIENT_PORT_KEY, "2181");
        conf.set(QUORUM_KEY, "zk1:2222");
        assert!(factory.connect(&conf).is_ok());

        conf.set(CLIENT_PORT_KEY, "not-a-port");
        assert!(matches!(factory.connect(&conf), Err(StoreError::InvalidConfig { .. })));

        conf.set(CLIENT_PORT_KEY, "2222");
        conf.unset(QUORUM_KEY);
        assert!(matches!(factory.connect(&conf), Err(StoreError::InvalidConfig { .. })));
    }

    #[test]
    fn test_unreachable_cluster() {
        let cluster = MemoryCluster::local();
        cluster.set_reachable(false);
        assert!(matches!(
            cluster.factory().connect(&Configuration::create()),
            Err(StoreError::Unreachable { .. })
        ));
        assert_eq!(cluster.open_connections(), 0);
    }

    #[test]
    fn test_scan_returns_newest_version_in_range() {
        let (_cluster, conn) = connected();
        put_at(&conn, "r1", "h", "q", 90, "old");
        put_at(&conn, "r1", "h", "q", 150, "new");
        put_at(&conn, "r2", "h", "q", 90, "only-old");

        let table = conn.table("t").unwrap();
        let mut scan = Scan::new();
        scan.set_time_range(TimeRange::starting_at(100));
        let rows = drain(table.scanner(&scan).unwrap().as_mut());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row(), b"r1");
        assert_eq!(rows[0].raw_cells()[0].value(), b"new");

        // older version still visible below the newer one's timestamp
        let mut scan = Scan::new();
        scan.set_time_range(TimeRange::between(0, 100).unwrap());
        let rows = drain(table.scanner(&scan).unwrap().as_mut());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].raw_cells()[0].value(), b"old");
    }

    #[test]
    fn test_max_versions_and_same_timestamp_overwrite() {
        let (cluster, conn) = connected();
        for ts in 1..=5 {
            put_at(&conn, "r", "f", "q", ts, "v");
            put_at(&conn, "r", "h", "q", ts, "v");
        }
        assert_eq!(cluster.column_versions("t", b"r", b"f", b"q").len(), 1);
        let kept: Vec<i64> = cluster.column_versions("t", b"r", b"h", b"q").iter().map(KeyValue::timestamp).collect();
        assert_eq!(kept, vec![5, 4, 3]);

        put_at(&conn, "r", "h", "q", 5, "replaced");
        let versions = cluster.column_versions("t", b"r", b"h", b"q");
        assert_eq!(versions.len(), 3);
        assert_eq!(versions[0].value(), b"replaced");
        assert!(versions[0].sequence_id() > versions[1].sequence_id());
    }

    #[test]
    fn test_store_assigns_timestamp_and_sequence() {
        let (cluster, conn) = connected();
        let mut put = Put::new("r");
        put.add_column("f", "a", "1").add_column("f", "b", "2");
        conn.table("t").unwrap().put(vec![put]).unwrap();

        let a = &cluster.column_versions("t", b"r", b"f", b"a")[0];
        let b = &cluster.column_versions("t", b"r", b"f", b"b")[0];
        assert!(a.timestamp() > 0);
        assert_eq!(a.timestamp(), b.timestamp());
        assert!(b.sequence_id() > a.sequence_id());
    }

    #[test]
    fn test_family_restriction_and_filter() {
        let (_cluster, conn) = connected();
        put_at(&conn, "a", "f", "q1", 1, "x");
        put_at(&conn, "a", "f", "q2", 1, "y");
        put_at(&conn, "b", "h", "q1", 1, "z");

        let table = conn.table("t").unwrap();
        let mut scan = Scan::new();
        scan.add_column("f", "q2");
        let rows = drain(table.scanner(&scan).unwrap().as_mut());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].raw_cells().len(), 1);
        assert_eq!(rows[0].raw_cells()[0].qualifier(), b"q2");

        let mut scan = Scan::new();
        scan.set_filter(ParseFilter.parse("ValueFilter(=, 'binary:z')").unwrap());
        let rows = drain(table.scanner(&scan).unwrap().as_mut());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row(), b"b");
    }

    #[test]
    fn test_unknown_table_and_family() {
        let (_cluster, conn) = connected();
        let missing = conn.table("nope").unwrap();
        assert!(matches!(missing.put(vec![Put::new("r")]), Err(StoreError::TableNotFound(_))));

        let table = conn.table("t").unwrap();
        let mut put = Put::new("r");
        put.add_column("f", "q", "v").add_column("zz", "q", "v");
        assert!(matches!(table.put(vec![put]), Err(StoreError::NoSuchColumnFamily { .. })));

        let mut scan = Scan::new();
        scan.add_family("zz");
        assert!(matches!(table.scanner(&scan), Err(StoreError::NoSuchColumnFamily { .. })));
    }

    #[test]
    fn test_put_retries_transient_failures() {
        let cluster = MemoryCluster::local();
        cluster.create_table(TableDescriptor::new("t").with_family(FamilyDescriptor::new("f"))).unwrap();
        let mut conf = Configuration::create();
        conf.set(CLIENT_RETRIES_KEY, "2");
        let conn = cluster.factory().connect(&conf).unwrap();
        let table = conn.table("t").unwrap();

        let mut put = Put::new("r");
        put.add_column("f", "q", "v");

        cluster.fail_puts(2);
        table.put(vec![put.clone()]).unwrap();
        assert_eq!(cluster.batches().len(), 1);

        cluster.fail_puts(3);
        match table.put(vec![put]) {
            Err(StoreError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(cluster.batches().len(), 1);
    }

    #[test]
    fn test_scanner_failure_and_gauges() {
        let (cluster, conn) = connected();
        for row in ["a", "b", "c"] {
            put_at(&conn, row, "f", "q", 1, "v");
        }
        cluster.fail_scans_after(Some(2));

        let table = conn.table("t").unwrap();
        assert_eq!(cluster.open_tables(), 1);
        let mut scanner = table.scanner(&Scan::new()).unwrap();
        assert_eq!(cluster.open_scanners(), 1);
        assert!(scanner.next_row().unwrap().is_some());
        assert!(scanner.next_row().unwrap().is_some());
        assert!(scanner.next_row().is_err());

        drop(scanner);
        drop(table);
        assert_eq!(cluster.open_scanners(), 0);
        assert_eq!(cluster.open_tables(), 0);
    }

    #[test]
    fn test_scanner_stays_exhausted() {
        let (_cluster, conn) = connected();
        put_at(&conn, "a", "f", "q", 1, "v");

        let table = conn.table("t").unwrap();
        let mut scanner = table.scanner(&Scan::new()).unwrap();
        assert_eq!(scanner.next_row().unwrap().map(|r| r.row().to_vec()), Some(b"a".to_vec()));
        for _ in 0..3 {
            assert!(scanner.next_row().unwrap().is_none());
        }

        // nothing in range on the first call
        let mut scan = Scan::new();
        scan.set_time_range(TimeRange::starting_at(100));
        let mut scanner = table.scanner(&scan).unwrap();
        assert!(scanner.next_row().unwrap().is_none());
        put_at(&conn, "b", "f", "q", 200, "late");
        assert!(scanner.next_row().unwrap().is_none());
    }

    #[test]
    fn test_close_connection() {
        let (cluster, conn) = connected();
        assert_eq!(cluster.open_connections(), 1);
        cluster.fail_next_close();
        assert!(conn.close().is_err());
        assert!(conn.is_closed());
        assert_eq!(cluster.open_connections(), 0);
        assert!(conn.close().is_ok());
        assert!(matches!(conn.table("t"), Err(StoreError::ConnectionClosed)));
        assert!(matches!(conn.admin(), Err(StoreError::ConnectionClosed)));
    }

    #[test]
    fn test_admin_operations() {
        let (cluster, conn) = connected();
        let admin = conn.admin().unwrap();
        admin.create_table(TableDescriptor::new("a").with_family(FamilyDescriptor::new("f"))).unwrap();
        assert!(matches!(
            admin.create_table(TableDescriptor::new("a")),
            Err(StoreError::TableExists(_))
        ));
        assert!(admin.table_exists("a").unwrap());
        assert_eq!(admin.list_table_names().unwrap(), vec!["a".to_string(), "t".to_string()]);

        cluster.fail_liveness_checks(true);
        assert!(admin.list_table_names().is_err());
        cluster.fail_liveness_checks(false);
        cluster.set_reachable(false);
        assert!(admin.table_exists("a").is_err());
    }
}
