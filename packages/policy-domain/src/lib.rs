pub mod audit;
pub mod corpus;
pub mod decision;
pub mod evidence;
pub mod filter;
pub mod metrics;
pub mod text;
pub mod time_serde;
