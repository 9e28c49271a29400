use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;

use super::auth::bearer_token;
use crate::error::AppError;
use crate::services::auth::TokenKind;
use crate::services::throttle::{ThrottleDecision, ThrottleKey};
use crate::AppState;

/// Rejects clients that used up their daily request budget.
pub async fn throttle(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(throttle) = state.throttle.as_ref() else {
        return Ok(next.run(request).await);
    };

    let key = throttle_key(&state, &request);
    match throttle.hit(&key).await {
        Ok(ThrottleDecision::Allowed { .. }) => Ok(next.run(request).await),
        Ok(ThrottleDecision::Limited { retry_after }) => {
            tracing::info!(?key, retry_after, "Request throttled");
            Err(AppError::Throttled { retry_after })
        }
        Err(e) => {
            // Redis being down must not take the API with it
            tracing::warn!(error = ?e, "Throttle check failed, letting request through");
            Ok(next.run(request).await)
        }
    }
}

fn throttle_key(state: &AppState, request: &Request) -> ThrottleKey {
    let user_id = bearer_token(request.headers())
        .and_then(|token| state.tokens.verify(token, TokenKind::Access).ok())
        .map(|claims| claims.user_id);

    match user_id {
        Some(id) => ThrottleKey::User(id),
        None => {
            let peer = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string());
            ThrottleKey::Anon(client_ip(request.headers(), peer))
        }
    }
}

/// First `X-Forwarded-For` hop, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<String>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or(peer)
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some("10.0.0.1".into())), "203.0.113.7");
    }

    #[test]
    fn peer_is_used_without_forwarded_header() {
        assert_eq!(client_ip(&HeaderMap::new(), Some("127.0.0.1".into())), "127.0.0.1");
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }
}
