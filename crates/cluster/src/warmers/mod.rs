//! Warmer actions: named warming queries stored per index.

mod delete;
mod get;
mod put;

pub use delete::{DeleteWarmerAction, DeleteWarmerRequest, DeleteWarmerResponse, delete_warmer, delete_warmer_task};
pub use get::get_warmers;
pub use put::{PutWarmerAction, PutWarmerRequest, PutWarmerResponse, put_warmer, put_warmer_task};
