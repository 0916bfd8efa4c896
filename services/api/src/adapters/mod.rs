pub mod db;
pub mod file_store;

pub use db::DbAdapter;
pub use file_store::FileStorage;
