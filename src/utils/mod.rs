pub mod domain;
pub mod error;
pub mod json_safety;
pub mod jwt;
pub mod string_ext;

pub use domain::{articles_collection_name, is_valid_domain, CENTROIDS_COLLECTION};
pub use error::{is_connection_error, ApiError, ApiResult};
pub use json_safety::{make_json_serializable, safe_f64};
pub use jwt::{Claims, JwtUtil};
pub use string_ext::{clean_optional_string, StringExt};
