use std::path::PathBuf;
use std::time::Duration;

/// Process-wide typed configuration, parsed once at startup from CLI flags
/// or environment variables (`clap`'s `env` feature). Everything that can
/// change after startup lives in the feature-flag registry instead -- these
/// are the flags the original treated as immutable per-process state.
#[derive(clap::Parser, Debug, Clone)]
#[clap(about = "Distributed, content-addressed, deduplicated file storage service.")]
pub struct ServerFlags {
    /// This server's operator-assigned, process-unique identifier. Used to
    /// scope private flag updates (`<server-id>.<key>`) from the notice
    /// service and to tag emitted events.
    #[clap(long, env = "DFS_SERVER_ID")]
    pub server_id: String,

    /// URI the server registers itself under with the discovery/registration
    /// service, so peers can resolve it via `GetDfsServers`.
    #[clap(long, env = "DFS_REGISTRATION_URI")]
    pub registration_uri: String,

    /// MetaStore connection URI (Mongo- or Cassandra-style, backend-specific).
    #[clap(long, env = "DFS_DB_URI")]
    pub db_uri: String,

    /// Notice/config-watch service URI, polled or streamed for live feature
    /// flag and shard/segment topology updates.
    #[clap(long, env = "DFS_NOTICE_URI")]
    pub notice_uri: String,

    /// Path to the JSON shard/segment topology seed loaded at startup.
    #[clap(long, env = "DFS_TOPOLOGY_PATH")]
    pub topology_path: PathBuf,

    /// Listen address for the gRPC server.
    #[clap(long, env = "DFS_LISTEN_ADDR", default_value = "0.0.0.0:9876")]
    pub listen_addr: String,

    /// Listen address for the Prometheus metrics endpoint.
    #[clap(long, env = "DFS_METRICS_ADDR", default_value = "0.0.0.0:9877")]
    pub metrics_addr: String,

    /// HTTP path the metrics endpoint is served under.
    #[clap(long, env = "DFS_METRICS_PATH", default_value = "/metrics")]
    pub metrics_path: String,

    /// How long a cached (Tee/BackStore) copy is retained before it's
    /// eligible for the compaction sweep.
    #[clap(long, env = "DFS_CACHE_DURATION", value_parser = humantime::parse_duration, default_value = "72h")]
    pub cache_duration: Duration,

    /// Poll interval for the cache recovery loop.
    #[clap(long, env = "DFS_RECOVERY_INTERVAL", value_parser = humantime::parse_duration, default_value = "30s")]
    pub recovery_interval: Duration,

    /// Number of pending `CacheLog` rows paged per recovery loop iteration.
    #[clap(long, env = "DFS_RECOVERY_BATCH_SIZE", default_value_t = 100)]
    pub recovery_batch_size: u32,

    /// Days a recovered entry is kept in cache storage before the hourly
    /// compaction sweep reclaims it.
    #[clap(long, env = "DFS_DAYS_KEPT_IN_CACHE", default_value_t = 3)]
    pub days_kept_in_cache: u32,

    /// Lower bound accepted by `NegotiateChunkSize`.
    #[clap(long, env = "DFS_MIN_CHUNK_SIZE", default_value_t = 1024)]
    pub min_chunk_size: u32,

    /// Upper bound accepted by `NegotiateChunkSize`.
    #[clap(long, env = "DFS_MAX_CHUNK_SIZE", default_value_t = 1_048_576)]
    pub max_chunk_size: u32,

    /// Heartbeat interval for the `GetDfsServers` discovery stream.
    #[clap(long, env = "DFS_HEARTBEAT_INTERVAL", value_parser = humantime::parse_duration, default_value = "10s")]
    pub heartbeat_interval: Duration,

    /// Per-request deadline applied before dispatching to a FileHandler.
    #[clap(long, env = "DFS_REQUEST_DEADLINE", value_parser = humantime::parse_duration, default_value = "30s")]
    pub request_deadline: Duration,
}

impl ServerFlags {
    /// Clamp a client-requested chunk size into this server's configured
    /// bounds, per `NegotiateChunkSize`.
    pub fn clamp_chunk_size(&self, requested: u32) -> u32 {
        requested.clamp(self.min_chunk_size, self.max_chunk_size)
    }
}
