pub mod rust_scraper;

pub use rust_scraper::{PageScraper, RustScraper};
