// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! schmuxd — the schmux daemon binary.
//!
//! Logging goes to `<config-dir>/daemon.log` through a non-blocking
//! appender; `SCHMUX_LOG` controls the filter. Exit code 42 means a restart
//! was requested (the CLI's start loop re-execs on it).

use tracing_subscriber::EnvFilter;

use sx_daemon::lifecycle::{startup, Paths};

fn main() {
    let paths = match Paths::resolve() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("schmuxd: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&paths.config_dir) {
        eprintln!("schmuxd: cannot create {}: {}", paths.config_dir.display(), e);
        std::process::exit(1);
    }

    let file_appender = tracing_appender::rolling::never(
        &paths.config_dir,
        "daemon.log",
    );
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SCHMUX_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("schmuxd: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let restart = runtime.block_on(async {
        match startup(paths).await {
            Ok(daemon) => {
                println!("READY");
                daemon.run().await
            }
            Err(e) => {
                eprintln!("schmuxd: startup failed: {}", e);
                tracing::error!(error = %e, "startup failed");
                std::process::exit(1);
            }
        }
    });

    drop(runtime);
    if restart {
        std::process::exit(sx_daemon::env::RESTART_EXIT_CODE);
    }
}
