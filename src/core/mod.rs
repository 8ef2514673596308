pub mod errors;
pub mod helpers;
pub mod pagination;
pub mod store;
