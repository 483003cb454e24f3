//! Bearer-token gate for mutating endpoints, SPEC_FULL A2. Thinned from the
//! teacher's `auth_middleware` (`examples/jlon-stellar/.../middleware/auth.rs`):
//! verifies the JWT's signature and expiry and stops there — there is no
//! user/organization/Casbin layer left to check a permission against, since
//! that subsystem was dropped with the StarRocks admin domain.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::utils::{ApiError, JwtUtil};

pub async fn require_bearer_auth(
    State(jwt_util): State<Arc<JwtUtil>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header =
        req.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).ok_or_else(|| {
            tracing::warn!(path = %req.uri(), "missing authorization header");
            ApiError::Unauthorized
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::warn!(path = %req.uri(), "malformed authorization header");
        ApiError::Unauthorized
    })?;

    jwt_util.verify_token(token)?;

    Ok(next.run(req).await)
}
