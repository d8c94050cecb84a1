fn main() {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile(&["proto/dfs.proto"], &["proto"])
        .unwrap_or_else(|e| panic!("failed to compile dfs.proto: {e}"));
}
