pub mod batch;
pub mod query_plan;
pub mod search;
pub mod url_parts;
