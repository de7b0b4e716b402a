//! Test server management

use fnstack_runtime::{router, ModuleCatalog, RuntimeState};
use portpicker::pick_unused_port;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use crate::{FnStackClient, STARTUP_TIMEOUT_SECS};

/// A running fnstack test server
pub struct TestServer {
    /// Shared runtime state, for inspecting the registry
    state: Arc<RuntimeState>,
    /// The port the server is running on
    port: u16,
    /// Base URL
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Start a server over `catalog` on a random available port
    pub async fn start(
        catalog: ModuleCatalog,
        default_reference: &str,
    ) -> Result<Self, TestError> {
        let port = pick_unused_port().ok_or(TestError::NoPortAvailable)?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AddrInUse => TestError::PortInUse(port),
                _ => TestError::StartFailed(e.to_string()),
            })?;

        info!(port = port, "Starting fnstack test server");

        let state = Arc::new(RuntimeState::new(catalog, default_reference));
        let app = router(state.clone());
        let (shutdown, signal) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await;
        });

        let server = Self {
            state,
            port,
            base_url: format!("http://127.0.0.1:{}", port),
            shutdown: Some(shutdown),
            task,
        };
        server.wait_ready().await?;
        info!(port = port, "fnstack ready");
        Ok(server)
    }

    /// Start a server with the sample `app` module and its default handler
    pub async fn with_sample() -> Result<Self, TestError> {
        let mut catalog = ModuleCatalog::new();
        fnstack_sample::register(&mut catalog);
        Self::start(catalog, fnstack_sample::DEFAULT_HANDLER).await
    }

    /// Poll until the listener answers. Any HTTP response counts, including 404.
    async fn wait_ready(&self) -> Result<(), TestError> {
        let start = std::time::Instant::now();
        let probe = format!("{}/ready", self.base_url);

        while start.elapsed() < Duration::from_secs(STARTUP_TIMEOUT_SECS) {
            if reqwest::get(&probe).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        Err(TestError::StartupTimeout)
    }

    /// Get the base URL
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Get the port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Runtime state shared with the running server
    pub fn state(&self) -> &Arc<RuntimeState> {
        &self.state
    }

    /// Get a client for the init/invoke routes
    pub fn client(&self) -> FnStackClient {
        FnStackClient::new(self.base_url.clone())
    }

    /// Stop the server and wait for in-flight requests to finish
    pub async fn stop(mut self) {
        info!("Stopping fnstack test server");
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = (&mut self.task).await;
        info!("fnstack test server stopped");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.task.abort();
    }
}

/// Errors that can occur with test server
#[derive(Debug)]
pub enum TestError {
    NoPortAvailable,
    PortInUse(u16),
    StartFailed(String),
    StartupTimeout,
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::NoPortAvailable => write!(f, "No available port found"),
            TestError::PortInUse(port) => write!(f, "Port {} is already in use", port),
            TestError::StartFailed(msg) => write!(f, "Failed to start server: {}", msg),
            TestError::StartupTimeout => write!(f, "Server startup timed out"),
        }
    }
}

impl std::error::Error for TestError {}
