//! # Safety Copilot
//!
//! Health & safety inspection assistant for your terminal.
//!
//! Safety Copilot walks a site inspector through six ordered steps, each
//! delegating text and image understanding to a completion API:
//!
//! 1. Analyze a new regulation document and ask questions about it
//! 2. Update an inspection checklist against the regulation summary
//! 3. Detect hazards in a worksite photo and promote findings to notes
//! 4. Review a contractor's H&S plan for compliance gaps
//! 5. Draft a safety violations report
//! 6. Draft an urgent email about the critical violations
//!
//! Notable actions are recorded in a durable audit log.
//!
//! ## Quick Start
//!
//! ```bash
//! export API_KEY=...
//! hsc rules load new-regulations.md
//! hsc rules summarize
//! hsc checklist set --file checklist.txt
//! hsc checklist update
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::future_not_send)]
#![allow(clippy::return_self_not_must_use)]

pub mod audit;
pub mod core;
pub mod gateway;
pub mod ingest;
pub mod session;
pub mod workflow;

pub use audit::{AuditLogEntry, AuditStore, AuditTrail, NewAuditEntry, StorageError};
pub use core::{Config, Step};
pub use gateway::{CompletionBackend, CompletionGateway, GatewayError, GeminiBackend};
pub use session::SessionFile;
pub use workflow::{
    Contractor, StateStore, TextField, WorkflowContext, WorkflowError, WorkflowState,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "safety-copilot";

/// Short alias
pub const APP_ALIAS: &str = "hsc";
