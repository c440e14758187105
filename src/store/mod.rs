// ==========================================
// Talhão APEX - tabular store layer
// ==========================================
// Named tables with dynamically discovered schemas, typed rows,
// and a typed expression interpreter for per-row updates
// ==========================================

pub mod error;
pub mod expr;
pub mod table;
pub mod tabular_store;
pub mod value;

pub use error::{ExprError, StoreError, StoreResult};
pub use expr::Expr;
pub use table::{ColumnDef, Dataset, LoadMode, Row, RowAccess, RowRef, Table};
pub use tabular_store::{
    key_of, quote_ident, Aggregation, ColumnUpdate, FallbackJoin, NullMerge, TabularStore,
};
pub use value::{ColumnType, Value};
