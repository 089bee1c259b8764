pub mod antibot;
pub mod core;
pub mod features;
pub mod nlp;
pub mod scraping;
pub mod tools;
pub mod validation;

// --- Primary core exports ---
pub use core::error::{LinkScoutError, NetworkCause};
pub use core::types;
pub use core::types::*;
pub use core::AppState;

// --- Short module paths ---
pub use core::{collaborators, config};
pub use features::{alternatives, replacement};
pub use scraping::rust_scraper;
pub use tools::{batch, query_plan, search, url_parts};
