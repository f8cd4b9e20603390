use crate::api::errors::ApiError;
use crate::snapshot::WebsiteLookup;
use crate::state::AppState;
use crate::storage::users::User;
use crate::store::StoreError;
use axum::extract::{Request, State};
use axum::http::{header, Method};
use axum::middleware::Next;
use axum::response::Response;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying a share token issued for a single website.
pub const SHARE_TOKEN_HEADER: &str = "x-sitepulse-share-token";

/// Who is asking, as resolved from request credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    pub user: Option<User>,
    /// Website granted by a valid share token.
    pub share_website_id: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub const fn for_user(user: User) -> Self {
        Self {
            user: Some(user),
            share_website_id: None,
        }
    }

    pub fn for_share(website_id: &str) -> Self {
        Self {
            user: None,
            share_website_id: Some(website_id.to_string()),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_admin)
    }
}

/// Decide whether `caller` may view `website_id`.
///
/// Admins see everything and a share token opens exactly its website; the
/// website is only loaded when ownership has to be checked.
pub async fn can_view_website(
    caller: &AuthContext,
    website_id: &str,
    websites: &dyn WebsiteLookup,
) -> Result<bool, StoreError> {
    if caller.is_admin() {
        return Ok(true);
    }
    if caller.share_website_id.as_deref() == Some(website_id) {
        return Ok(true);
    }
    let Some(user) = &caller.user else {
        return Ok(false);
    };
    let website = websites.get_website_by_id(website_id).await?;
    Ok(website.is_some_and(|w| w.user_id.as_deref() == Some(user.id.as_str())))
}

/// Sign a share token for `website_id`: `<website_id>.<hex hmac>`.
pub fn sign_share_token(secret: &str, website_id: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(website_id.as_bytes());
    format!("{website_id}.{}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify a share token and return the website it grants, if authentic.
pub fn verify_share_token(secret: &str, token: &str) -> Option<String> {
    let (website_id, signature) = token.rsplit_once('.')?;
    let signature = hex::decode(signature).ok()?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(website_id.as_bytes());
    mac.verify_slice(&signature).ok()?;
    Some(website_id.to_string())
}

/// Resolve request credentials into an [`AuthContext`] request extension.
///
/// Requests without credentials continue as anonymous; presenting a bad
/// API key or a tampered share token is rejected outright. Every protected
/// route is read-only, so other verbs get a 405 before credentials are read.
pub async fn resolve_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let method = request.method();
    if *method != Method::GET && *method != Method::HEAD {
        return Err(ApiError::MethodNotAllowed);
    }

    let mut context = AuthContext::anonymous();

    if let Some(value) = request.headers().get(header::AUTHORIZATION) {
        let key = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Malformed authorization header".to_string()))?;
        let user = state
            .store
            .find_user_by_api_key(key)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid API key".to_string()))?;
        context.user = Some(user);
    }

    if let Some(value) = request.headers().get(SHARE_TOKEN_HEADER) {
        let website_id = value
            .to_str()
            .ok()
            .and_then(|token| verify_share_token(&state.secret, token))
            .ok_or_else(|| ApiError::Unauthorized("Invalid share token".to_string()))?;
        context.share_website_id = Some(website_id);
    }

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}
