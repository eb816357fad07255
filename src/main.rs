//! Console session gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                  CONSOLE GATEWAY                     │
//!                    │                                                      │
//!   Browser          │  ┌─────────┐   ┌──────────┐   ┌─────────┐            │
//!   (cookies) ───────┼─▶│  http   │──▶│ routing  │──▶│  relay  │            │
//!                    │  │ server  │   │  table   │   │ resolve │            │
//!                    │  └────┬────┘   └──────────┘   └────┬────┘            │
//!                    │       │ /api/auth/*                │ refresh/forward │
//!                    │       ▼                            ▼                 │
//!                    │  ┌─────────┐                 ┌──────────┐            │
//!   Set-Cookie ◀─────┼──│ session │◀────────────────│ upstream │◀───────────┼──── Upstream API
//!                    │  │ cookies │                 │  client  │            │
//!                    │  └─────────┘                 └──────────┘            │
//!                    │                                                      │
//!                    │   config (file + env, hot reload) · observability    │
//!                    │   lifecycle (startup, signals, graceful shutdown)    │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "console-gateway", version, about = "Session gateway for the admin console")]
struct Args {
    /// TOML configuration file; defaults plus environment when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    console_gateway::lifecycle::run(args.config.as_deref()).await?;
    Ok(())
}
