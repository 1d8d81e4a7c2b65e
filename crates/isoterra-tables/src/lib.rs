//! Marching-cubes lookup tables: the built-in set, binary asset loading
//! and consistency validation.

pub mod builtin;
pub mod loader;
pub mod tables;
pub mod validator;

pub use loader::{load_tables, load_tables_or_builtin, write_tables, TableError};
pub use tables::McTables;
