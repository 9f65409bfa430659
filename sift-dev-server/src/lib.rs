use anyhow::Result;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use tokio::sync::broadcast;
use tower_http::services::ServeDir;

/// Configuration for the live development server
#[derive(Debug, Clone)]
pub struct LiveServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to serve on
    pub port: u16,
    /// Built output directory to serve and watch
    pub root: PathBuf,
    /// WebSocket endpoint the injected auto-reload script connects to
    pub ws_path: String,
    /// Auto-open browser
    pub open: bool,
}

impl Default for LiveServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            root: PathBuf::from("./out"),
            ws_path: "/__livereload".to_string(),
            open: false,
        }
    }
}

/// A static file server that closes its WebSocket connections whenever
/// the served output changes. The auto-reload script injected into the
/// built pages reloads shortly after its socket closes, so a rebuild
/// that rewrites the output dir refreshes every open tab.
pub struct LiveServer {
    config: LiveServerConfig,
}

impl LiveServer {
    pub fn new(config: LiveServerConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        if !self.config.root.exists() {
            return Err(anyhow::anyhow!(
                "Output directory does not exist: {}",
                self.config.root.display()
            ));
        }

        // Closing every subscriber is the reload signal.
        let (reload_tx, _) = broadcast::channel::<()>(16);

        let state = AppState {
            reload_tx: reload_tx.clone(),
        };

        let watch_path = self.config.root.clone();
        tokio::spawn(async move {
            if let Err(e) = watch_output(watch_path, reload_tx).await {
                eprintln!("File watcher error: {}", e);
            }
        });

        let app = Router::new()
            .route(&self.config.ws_path, get(websocket_handler))
            .fallback_service(ServeDir::new(&self.config.root))
            .with_state(state);

        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;

        println!("Serving at http://{}", addr);
        println!("Watching: {}", self.config.root.display());
        println!("Live reload enabled at ws://{}{}", addr, self.config.ws_path);

        if self.config.open {
            if let Err(e) = open::that(format!("http://{}", addr)) {
                eprintln!("Failed to open browser: {}", e);
            }
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    reload_tx: broadcast::Sender<()>,
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| websocket_connection(socket, state.reload_tx))
}

async fn websocket_connection(mut socket: WebSocket, reload_tx: broadcast::Sender<()>) {
    let mut rx = reload_tx.subscribe();

    loop {
        tokio::select! {
            changed = rx.recv() => {
                // Dropping the socket closes it; the client reloads.
                let _ = changed;
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            msg = socket.recv() => {
                if msg.is_none() {
                    break;
                }
            }
        }
    }
}

async fn watch_output(watch_path: PathBuf, reload_tx: broadcast::Sender<()>) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(100);

    let mut debouncer = new_debouncer(
        Duration::from_millis(500),
        move |res: DebounceEventResult| {
            if let Ok(events) = res {
                for event in events {
                    let _ = tx.blocking_send(event.path);
                }
            }
        },
    )?;

    debouncer
        .watcher()
        .watch(&watch_path, notify::RecursiveMode::Recursive)?;

    // Collapse change bursts (a full rebuild touches every file) into
    // one reload per second at most.
    let mut last_reload: Option<std::time::Instant> = None;
    while let Some(path) = rx.recv().await {
        let now = std::time::Instant::now();
        if last_reload.is_none_or(|at| now.duration_since(at) >= Duration::from_secs(1)) {
            println!("Output changed: {}", path.display());
            let _ = reload_tx.send(());
            last_reload = Some(now);
        }
    }

    Ok(())
}
