//! Shared value layer for the DHT resolver node core: binary node
//! identifiers, address parsing/formatting, and query sanitization
//! (spec.md §3, §4.A).

mod addr;
mod id;
mod query;
mod rand;

pub use addr::{parse_addr, Addr, AddrParseError, Family};
pub use id::{Id, IdParseError, ID_LEN};
pub use query::{is_valid_hostname, sanitize_query, QueryError, MAX_QUERY_LEN};
pub use rand::{random_bytes, random_port};
