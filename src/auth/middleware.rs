//! Authentication Middleware
//! Mission: Verify bearer tokens and gate routes by role

use crate::auth::{
    errors::AuthError,
    jwt::JwtHandler,
    models::{Claims, Role},
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tracing::{error, warn};

/// Verified identity of the caller, valid for one request only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    claims: Arc<Claims>,
}

impl AuthContext {
    pub fn new(claims: Claims) -> Self {
        Self {
            claims: Arc::new(claims),
        }
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }

    pub fn subject(&self) -> &str {
        &self.claims.sub
    }
}

/// Pull the token out of `Authorization: <scheme> <token>`.
pub fn extract_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;
    let value = value.to_str().map_err(|_| AuthError::MalformedCredential)?;
    if value.trim().is_empty() {
        return Err(AuthError::MissingCredential);
    }

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_scheme), Some(token), None) => Ok(token),
        _ => Err(AuthError::MalformedCredential),
    }
}

/// Run the full authentication check against a request's headers.
pub fn authenticate_headers(
    jwt_handler: &JwtHandler,
    headers: &HeaderMap,
) -> Result<AuthContext, AuthError> {
    let token = extract_token(headers).inspect_err(|e| warn!("Rejected request: {}", e))?;

    match jwt_handler.validate_token(token) {
        Ok(claims) => Ok(AuthContext::new(claims)),
        Err(e) if e.is_rejection() => {
            warn!("Rejected token: {}", e);
            Err(AuthError::InvalidOrExpiredCredential)
        }
        Err(e) => {
            error!("Unexpected token verification failure: {}", e);
            Err(AuthError::InternalAuthError(e.to_string()))
        }
    }
}

/// Authentication gate: rejects before the handler runs, otherwise attaches
/// an [`AuthContext`] for the rest of the request.
///
/// The same context is copied onto the response so outer layers (request
/// logging) can see who made the call.
pub async fn authenticate(
    State(jwt_handler): State<Arc<JwtHandler>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let context = authenticate_headers(&jwt_handler, req.headers())?;
    req.extensions_mut().insert(context.clone());
    let mut response = next.run(req).await;
    response.extensions_mut().insert(context);
    Ok(response)
}

/// Pure allow-list check: exact membership, no role implies another.
pub fn check_role(context: Option<&AuthContext>, allowed: &[Role]) -> Result<(), AuthError> {
    let context = context.ok_or_else(|| {
        error!("Authorization gate reached without an authenticated identity");
        AuthError::Unauthenticated
    })?;

    let role = context.role();
    if allowed.contains(&role) {
        Ok(())
    } else {
        let err = AuthError::Forbidden {
            role,
            allowed: allowed.to_vec(),
        };
        warn!(subject = context.subject(), "Access denied: {}", err);
        Err(err)
    }
}

/// Authorization gate for one route's allow-list. Layer it inside
/// [`authenticate`], e.g. `middleware::from_fn(authorize(&[Role::Admin]))`.
pub fn authorize(
    allowed: &[Role],
) -> impl Fn(Request, Next) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
    let allowed: Arc<[Role]> = Arc::from(allowed);
    move |req: Request, next: Next| {
        let allowed = Arc::clone(&allowed);
        Box::pin(async move {
            let verdict = check_role(req.extensions().get::<AuthContext>(), &allowed);
            match verdict {
                Ok(()) => next.run(req).await,
                Err(e) => e.into_response(),
            }
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn context(role: Role) -> AuthContext {
        AuthContext::new(Claims {
            sub: "user-1".to_string(),
            email: "ana@example.com".to_string(),
            role,
            iat: 1_700_000_000,
            exp: 1_700_086_400,
            jti: "jti".to_string(),
        })
    }

    #[test]
    fn test_missing_header() {
        let err = extract_token(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential));

        let err = extract_token(&headers_with("")).unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential));
    }

    #[test]
    fn test_malformed_header() {
        for value in ["Bearer", "Bearer ", "Bearer a b"] {
            let err = extract_token(&headers_with(value)).unwrap_err();
            assert!(matches!(err, AuthError::MalformedCredential), "{value:?}");
        }
    }

    #[test]
    fn test_token_extracted() {
        assert_eq!(extract_token(&headers_with("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_authenticate_valid_and_invalid_tokens() {
        let handler = JwtHandler::new("secret");
        let token = handler.issue("user-1", "ana@example.com", Role::Admin).unwrap();

        let ctx = authenticate_headers(&handler, &headers_with(&format!("Bearer {token}"))).unwrap();
        assert_eq!(ctx.role(), Role::Admin);
        assert_eq!(ctx.subject(), "user-1");

        let err = authenticate_headers(&handler, &headers_with("Bearer not-a-token")).unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredCredential));
    }

    #[test]
    fn test_check_role_is_exact_membership() {
        let roles = [Role::Admin, Role::Manager, Role::Customer];
        let lists: [&[Role]; 4] = [
            &[Role::Admin],
            &[Role::Manager, Role::Admin],
            &[Role::Customer],
            &[],
        ];

        for allowed in lists {
            for role in roles {
                let ctx = context(role);
                let result = check_role(Some(&ctx), allowed);
                assert_eq!(result.is_ok(), allowed.contains(&role), "{role} in {allowed:?}");
            }
        }
    }

    #[test]
    fn test_admin_does_not_inherit_manager() {
        let ctx = context(Role::Admin);
        let err = check_role(Some(&ctx), &[Role::Manager]).unwrap_err();
        assert!(matches!(err, AuthError::Forbidden { role: Role::Admin, .. }));
    }

    #[test]
    fn test_check_role_without_identity() {
        let err = check_role(None, &[Role::Admin]).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
