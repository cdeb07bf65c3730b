pub mod fetch_file;
pub mod links;
pub mod release;
pub mod sync;
