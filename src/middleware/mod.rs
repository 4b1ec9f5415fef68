pub mod request_id;

pub use request_id::{attach_request_id, span_for_request};
