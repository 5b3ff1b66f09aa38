// Concrete implementations of the domain ports: local artifacts, HTTP sessions, product stores.

pub mod http;
pub mod memory;
pub mod sqlite;
pub mod storage;

pub use http::{HttpSession, HttpSessionFactory};
pub use memory::MemoryProductStore;
pub use sqlite::SqliteProductStore;
pub use storage::LocalStorage;
