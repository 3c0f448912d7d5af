//! Basic window open and page inspection.
//!
//! Demonstrates:
//! - Resolving a Chromium binary automatically
//! - Opening an app window over the pipe transport
//! - Reading page state with eval, title and url
//! - Capturing a screenshot
//!
//! Usage:
//!   cargo run --example open_window
//!   cargo run --example open_window -- --headless
//!   cargo run --example open_window -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use common::Args;
use chromium_bridge::{Launcher, Result};

// ============================================================================
// Constants
// ============================================================================

const START_URL: &str = "https://example.com";
const SCREENSHOT_PATH: &str = "./open_window.png";

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
    println!("=== Open Window ===\n");

    // ========================================================================
    // Create Launcher
    // ========================================================================

    println!("[1] Creating launcher...");

    let launcher = Launcher::builder().build()?;
    println!("    Binary: {}", launcher.binary().display());
    println!("    ✓ Launcher ready\n");

    // ========================================================================
    // Open Window
    // ========================================================================

    println!("[2] Opening window at {START_URL}...");

    let mut builder = launcher.window(START_URL).window_size(1280, 800);
    if args.headless {
        builder = builder.headless();
    }
    let window = builder.open().await?;

    println!("    ✓ Window open");
    println!("    PID:      {}", window.pid());
    println!("    Browser:  {}", window.versions().product);
    println!("    Protocol: {}\n", window.versions().protocol_version);

    // ========================================================================
    // Inspect Page
    // ========================================================================

    println!("[3] Inspecting page...");

    let title = window.title().await?;
    let url = window.url().await?;
    println!("    Title: {title}");
    println!("    URL:   {url}");

    let heading = window.eval("document.querySelector('h1')?.textContent").await?;
    println!("    H1:    {heading}\n");

    // ========================================================================
    // Screenshot
    // ========================================================================

    println!("[4] Capturing screenshot...");

    let png = window.screenshot().await?;
    std::fs::write(SCREENSHOT_PATH, &png)?;
    println!("    ✓ {} bytes written to {SCREENSHOT_PATH}\n", png.len());

    println!("=== Window ready ===\n");

    common::wait_for_exit(args.no_wait).await;

    // ========================================================================
    // Cleanup
    // ========================================================================

    println!("\n[Cleanup] Closing window...");
    window.close().await?;
    println!("          ✓ Done");

    Ok(())
}
