pub mod lexical;
pub mod manager;
pub mod snapshot;
pub mod vector;

mod error;
pub use error::{Error, Result};
pub use lexical::LexicalIndex;
pub use manager::IndexManager;
pub use vector::VectorIndex;
