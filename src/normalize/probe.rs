use std::time::Duration;

use log::{info, warn};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio::time::timeout;
use url::Url;

/// Checks that a remote input location can be reached
///
/// Probes are attempted once. A failure is reported back as a rejection, never retried.
pub trait InputProbe {
    fn probe(&self, location: &Url) -> Result<(), String>;
}

impl<F> InputProbe for F
where
    F: Fn(&Url) -> Result<(), String>,
{
    fn probe(&self, location: &Url) -> Result<(), String> {
        self(location)
    }
}

/// Opens a TCP connection to the location's host and port within a fixed timeout
pub struct TcpProbe {
    runtime: Runtime,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> std::io::Result<TcpProbe> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(TcpProbe { runtime, timeout })
    }
}

impl InputProbe for TcpProbe {
    fn probe(&self, location: &Url) -> Result<(), String> {
        let host = location.host_str().ok_or_else(|| format!("{location} has no host"))?;
        let port = location.port().ok_or_else(|| format!("{location} has no port"))?;
        info!("Probing {host}:{port} with a {:?} timeout", self.timeout);

        self.runtime.block_on(async {
            match timeout(self.timeout, TcpStream::connect((host, port))).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(err)) => {
                    warn!("Can't connect to {host}:{port}: {err}");
                    Err(format!("Unable to connect to {host}:{port}: {err}"))
                }
                Err(_) => {
                    warn!("Connection to {host}:{port} timed out");
                    Err(format!("Connection to {host}:{port} timed out"))
                }
            }
        })
    }
}
