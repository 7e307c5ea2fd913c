mod http_date;
mod memory;

pub use http_date::{format_http_date, parse_http_date};
pub use memory::resident_set_size;
