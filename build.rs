fn main() {
    // Exposes package metadata to `crate::built_info` for artifact metadata and /health.
    built::write_built_file().expect("Failed to generate build info");
}
