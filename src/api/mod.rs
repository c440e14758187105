// ==========================================
// Talhão APEX - API layer
// ==========================================
// Facade an operator shell (or the CLI) calls into.
// No evaluation rules here.
// ==========================================

pub mod consistency_api;
pub mod error;
pub mod import_api;
pub mod manejo_api;

pub use consistency_api::ConsistencyApi;
pub use error::{ApiError, ApiResult};
pub use import_api::{FilePreview, ImportApi};
pub use manejo_api::ManejoApi;
