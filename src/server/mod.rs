pub mod api;

use crate::cli::Args;
use crate::relay::Relay;
use log::{ error, info };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use self::api::AppState;

pub struct Server {
    addr: String,
    relay: Arc<Relay>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, relay: Arc<Relay>, args: Args) -> Self {
        Self { addr, relay, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>().map_err(|e|
            format!("Invalid server address '{}': {}", self.addr, e)
        )?;
        let app = api::router(AppState::new(self.relay.clone()));

        if !self.args.enable_tls {
            info!("TLS not enabled. Serving plain HTTP.");
            return api::serve_http(addr, app).await;
        }

        match (&self.args.tls_cert_path, &self.args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                api::serve_https(addr, app, cert_path, key_path).await
            }
            (Some(_), None) | (None, Some(_)) => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                Err("Missing TLS certificate or key path".into())
            }
            (None, None) => {
                error!("--enable-tls was set but no certificate/key paths provided.");
                Err("TLS enabled without cert/key".into())
            }
        }
    }
}
