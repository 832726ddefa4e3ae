use tracing_subscriber::{EnvFilter, fmt};

pub fn init_logging() {
    // russh is chatty at info level during key exchange
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,russh=warn,russh_sftp=warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false) // hides target module paths
        .with_writer(std::io::stderr) // keep stdout for the shell
        .compact()
        .init();
}
