//! Typed IPC between host and page code.
//!
//! Demonstrates:
//! - Registering a page-side listener through the load hook
//! - Host to page request/reply
//! - Page to host request answered by a Rust listener
//! - Fire-and-forget notification
//!
//! Usage:
//!   cargo run --example ipc_echo
//!   cargo run --example ipc_echo -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use common::Args;
use chromium_bridge::{Launcher, Result};
use serde_json::json;

// ============================================================================
// Constants
// ============================================================================

/// Page-side listener, installed once per document by the load hook.
const PAGE_LISTENER: &str = r#"
globalThis.chromiumBridge.ipc.on('echo', (data) => ({ echoed: data }));
"#;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== IPC Echo ===\n");

    // ========================================================================
    // Open Window
    // ========================================================================

    println!("[1] Opening window...");

    let launcher = Launcher::builder().build()?;
    let mut builder = launcher
        .window("about:blank")
        .window_size(800, 600)
        .on_load(PAGE_LISTENER);
    if args.headless {
        builder = builder.headless();
    }
    let window = builder.open().await?;

    println!("    ✓ Window open (pid {})\n", window.pid());

    // ========================================================================
    // Host to Page
    // ========================================================================

    println!("[2] Host to page request...");

    let reply = window
        .ipc()
        .request("echo", json!({"greeting": "hello from rust"}))
        .await?;
    println!("    Page replied: {reply}\n");

    // ========================================================================
    // Page to Host
    // ========================================================================

    println!("[3] Page to host request...");

    window.ipc().on("ping", |data| {
        println!("    Rust listener got: {data}");
        Some(json!("pong"))
    });

    window
        .eval(
            "globalThis.chromiumBridge.ipc.send('ping', {from: 'page'})\
             .then((reply) => { globalThis.__pingReply = reply; })",
        )
        .await?;

    // The reply settles through a binding round trip; give it a beat.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let settled = window.eval("globalThis.__pingReply").await?;
    println!("    Page saw reply: {settled}\n");

    // ========================================================================
    // Notification
    // ========================================================================

    println!("[4] Fire-and-forget notification...");

    window.ipc().notify("status", json!({"phase": "done"})).await?;
    println!("    ✓ Sent\n");

    println!("=== Echo complete ===\n");

    common::wait_for_exit(args.no_wait).await;

    // ========================================================================
    // Cleanup
    // ========================================================================

    println!("\n[Cleanup] Closing window...");
    window.close().await?;
    println!("          ✓ Done");

    Ok(())
}
