//! Rescue Server
//!
//! HTTP front end for the rescue simulation. A viewer picks a map, places a
//! robot start and survivors on it, and receives the run as a Server-Sent
//! Events stream of base64 PNG frames while it pauses, resumes or stops the
//! run through separate requests.
//!
//! # Endpoints
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | GET | `/health` | `{status, service}` |
//! | GET | `/api/get-map?map_name=` | PNG bytes |
//! | POST | `/api/start-simulation` | SSE: `{frame}` … `{status: "completed"}` or `{error}` |
//! | POST | `/api/pause-simulation` | `{status: "paused" \| "resumed"}` |
//! | POST | `/api/stop-simulation` | `{status: "stopped"}` |
//! | GET | `/api/status` | `{active, paused, step, max_steps}` |

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use server::{AppState, RescueServer};
