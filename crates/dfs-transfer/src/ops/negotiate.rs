use dfs_config::ServerFlags;

/// `NegotiateChunkSize`: clamps a client-requested transfer chunk size into
/// this server's configured `[min_chunk_size, max_chunk_size]` bounds
/// (`SPEC_FULL.md` §6). The clamped value becomes the connection's
/// `NegotiatedChunkSize`, used by `GetFile`'s chunking loop.
pub fn negotiate_chunk_size(flags: &ServerFlags, requested: u32) -> u32 {
    flags.clamp_chunk_size(requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn flags() -> ServerFlags {
        ServerFlags::parse_from([
            "dfs-server",
            "--server-id",
            "node-1",
            "--registration-uri",
            "zk://localhost/dfs",
            "--db-uri",
            "mongodb://localhost/dfs",
            "--notice-uri",
            "http://localhost:8500",
            "--topology-path",
            "topology.json",
        ])
    }

    // Testable property #6: negotiate(x) == clamp(x, 1024, 1048576).
    #[test]
    fn clamps_into_the_configured_bounds() {
        let flags = flags();
        assert_eq!(negotiate_chunk_size(&flags, 0), 1024);
        assert_eq!(negotiate_chunk_size(&flags, 512), 1024);
        assert_eq!(negotiate_chunk_size(&flags, 4096), 4096);
        assert_eq!(negotiate_chunk_size(&flags, 5_000_000), 1_048_576);
    }

    #[test]
    fn is_idempotent_once_clamped() {
        let flags = flags();
        for requested in [0u32, 1024, 65536, 1_048_576, 10_000_000] {
            let once = negotiate_chunk_size(&flags, requested);
            let twice = negotiate_chunk_size(&flags, once);
            assert_eq!(once, twice);
        }
    }
}
