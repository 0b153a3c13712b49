use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use remote_user_auth::server::{self, ServerOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let defaults = ServerOptions::default();
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let config_path = std::env::var("RUA_CONFIG").map(std::path::PathBuf::from).unwrap_or(defaults.config_path);
    let http_port = match std::env::var("RUA_HTTP_PORT") {
        Ok(p) => p.trim().parse::<u16>().with_context(|| format!("RUA_HTTP_PORT='{}' is not a port", p))?,
        Err(_) => defaults.http_port,
    };
    let remote_user_header = std::env::var("RUA_REMOTE_USER_HEADER").unwrap_or(defaults.remote_user_header);
    let admin_group = std::env::var("RUA_ADMIN_GROUP").unwrap_or(defaults.admin_group);
    let opts = ServerOptions { config_path, http_port, remote_user_header, admin_group };
    info!(
        target: "remote_user_auth",
        "remote-user-auth starting: RUST_LOG='{}', http_port={}, config='{}', header='{}', admin_group='{}'",
        rust_log, opts.http_port, opts.config_path.display(), opts.remote_user_header, opts.admin_group
    );

    server::run(opts).await
}
