mod config;
mod context;
mod ingest;
mod search;
mod status;

pub use config::ConfigCommand;
pub use ingest::IngestArgs;
pub use search::SearchArgs;

pub use config::handle_config;
pub use context::AppContext;
pub use ingest::handle_ingest;
pub use search::handle_search;
pub use status::handle_status;
