// ==========================================
// Talhão APEX - application layer
// ==========================================
// Wires store, configuration and APIs for a shell or the CLI
// ==========================================

pub mod state;

pub use state::{get_default_db_path, AppState};
