pub mod confidence;
pub mod keyword;
pub mod terms;
