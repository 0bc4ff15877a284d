pub mod extract;
pub mod isbn;

pub use extract::extract_isbn;
pub use isbn::Isbn;
