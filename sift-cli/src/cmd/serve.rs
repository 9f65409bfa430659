use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use std::{path::PathBuf, time::Duration};

use sift_dev_server::{LiveServer, LiveServerConfig};

use crate::cmd::build::{add_build_args, build_site};
use crate::config::{password_from, SiftConfig};

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("serve"))
        .about("Build, serve, and rebuild on changes with live reload")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to serve on")
                .default_value("3000"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Host to bind to")
                .default_value("127.0.0.1"),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open browser automatically")
                .action(clap::ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = SiftConfig::load(args)?;
    let password = password_from(args);

    build_site(&config, password.as_deref(), true)?;

    let server_config = LiveServerConfig {
        host: config.build.host.clone(),
        port: config.build.port,
        root: PathBuf::from(&config.build.output),
        ws_path: config.pipeline.reload.ws_path.clone(),
        open: config.build.open,
    };

    let server = LiveServer::new(server_config);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            eprintln!("Dev server error: {}", e);
        }
    });

    let watcher_config = config.clone();
    let watcher_password = password.clone();
    let watcher_handle = tokio::spawn(async move {
        if let Err(e) = watch_source(watcher_config, watcher_password).await {
            eprintln!("Source watcher error: {}", e);
        }
    });

    let _ = tokio::try_join!(server_handle, watcher_handle)?;

    Ok(())
}

/// Rebuild whenever the source tree or the config file changes. The dev
/// server watches the output dir and reloads browsers on its own.
async fn watch_source(config: SiftConfig, password: Option<String>) -> Result<()> {
    let source_dir = PathBuf::from(&config.build.source);
    let config_file = PathBuf::from(&config.build.config);

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

    if source_dir.exists() {
        debouncer
            .watcher()
            .watch(&source_dir, notify::RecursiveMode::Recursive)?;
        println!("Watching source directory: {}", source_dir.display());
    }
    if config_file.exists() {
        debouncer
            .watcher()
            .watch(&config_file, notify::RecursiveMode::NonRecursive)?;
        println!("Watching config file: {}", config_file.display());
    }

    while let Some(path) = rx.recv().await {
        println!("Source changed: {}", path.display());

        match build_site(&config, password.as_deref(), true) {
            Ok(_) => println!("Site rebuilt successfully"),
            Err(e) => eprintln!("Build error: {}", e),
        }
    }

    Ok(())
}
