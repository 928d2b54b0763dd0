use super::token::{StoredToken, TokenResponse};
use super::{ClientCredentials, AUTH_URL, SCOPES, TOKEN_URL};
use crate::error::{auth_error, other_error, AppResult};
use chrono::Utc;
use reqwest::Client;
use std::future::Future;
use tracing::{info, warn};
use url::Url;

/// Loopback address the authorization callback is received on
pub const CALLBACK_ADDR: &str = "127.0.0.1:8080";
/// Redirect URI registered for the OAuth client
pub const REDIRECT_URI: &str = "http://localhost:8080";

/// Build the consent page URL for offline access to the calendar and drive scopes
pub fn authorization_url(credentials: &ClientCredentials, state: &str) -> AppResult<Url> {
    let mut url = Url::parse(AUTH_URL)
        .map_err(|e| auth_error(&format!("Failed to parse URL: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("client_id", &credentials.client_id)
        .append_pair("redirect_uri", REDIRECT_URI)
        .append_pair("response_type", "code")
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("scope", &SCOPES.join(" "))
        .append_pair("state", state);
    Ok(url)
}

/// Pull the authorization code out of the callback request path
pub fn parse_callback(request_path: &str, expected_state: &str) -> AppResult<String> {
    let url = Url::parse(REDIRECT_URI)
        .and_then(|base| base.join(request_path))
        .map_err(|e| auth_error(&format!("Invalid callback URL {:?}: {}", request_path, e)))?;
    code_from_url(&url, expected_state)
}

/// Read what the operator pasted: either the bare code or the full address
/// the browser was redirected to
pub fn parse_pasted(input: &str, expected_state: &str) -> AppResult<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(auth_error("No authorization code was entered"));
    }
    if input.starts_with("http://") || input.starts_with("https://") {
        let url = Url::parse(input)
            .map_err(|e| auth_error(&format!("Invalid redirect URL {:?}: {}", input, e)))?;
        return code_from_url(&url, expected_state);
    }
    Ok(input.to_string())
}

fn code_from_url(url: &Url, expected_state: &str) -> AppResult<String> {
    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => {
                return Err(auth_error(&format!("Authorization was denied: {}", value)));
            }
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(auth_error("Callback state does not match the authorization request"));
    }
    code.ok_or_else(|| auth_error("No authorization code found in callback"))
}

/// Exchange an authorization code for tokens
pub async fn exchange_code(
    client: &Client,
    credentials: &ClientCredentials,
    code: &str,
) -> AppResult<StoredToken> {
    let response = client
        .post(TOKEN_URL)
        .form(&[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", REDIRECT_URI),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| auth_error(&format!("Failed to get token: {}", e)))?;

    if !response.status().is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error response".to_string());
        return Err(auth_error(&format!("Failed to get token: {}", error_text)));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| auth_error(&format!("Failed to parse token response: {}", e)))?;
    if token.refresh_token.is_none() {
        warn!("Google did not issue a refresh token; the next run will ask again");
    }
    Ok(token.into_stored(None, Utc::now().timestamp()))
}

/// Interactive authorization: print the consent URL and wait for the code.
///
/// The code normally arrives on the loopback listener. With `manual`, or when
/// the listener cannot be bound, the operator pastes it on stdin instead.
pub async fn authorize(
    client: &Client,
    credentials: &ClientCredentials,
    manual: bool,
) -> AppResult<StoredToken> {
    let state = uuid::Uuid::new_v4().to_string();
    let auth_url = authorization_url(credentials, &state)?;

    println!(
        "Go to the following link in your browser to authorize access:\n{}",
        auth_url
    );
    if let Err(e) = webbrowser::open(auth_url.as_str()) {
        warn!("Could not open a browser: {}", e);
    }

    if !manual {
        match tiny_http::Server::http(CALLBACK_ADDR) {
            Ok(server) => {
                info!("Waiting for authorization callback on {}", CALLBACK_ADDR);
                return receive_callback(server, &state, |code| async move {
                    exchange_code(client, credentials, &code).await
                })
                .await;
            }
            Err(e) => warn!("Failed to listen on {}: {}", CALLBACK_ADDR, e),
        }
    }

    let code = read_pasted_code(&state).await?;
    exchange_code(client, credentials, &code).await
}

/// Wait for one callback request, exchange its code and answer the browser
async fn receive_callback<F, Fut>(
    server: tiny_http::Server,
    state: &str,
    exchange: F,
) -> AppResult<StoredToken>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = AppResult<StoredToken>>,
{
    // tiny_http blocks, keep it off the runtime threads
    let (server, request) = tokio::task::spawn_blocking(move || {
        let request = server.recv();
        (server, request)
    })
    .await
    .map_err(|e| other_error(&format!("Callback listener task failed: {}", e)))?;
    let request = request?;

    let token = match parse_callback(request.url(), state) {
        Ok(code) => exchange(code).await,
        Err(e) => Err(e),
    };

    let response = match &token {
        Ok(_) => tiny_http::Response::from_string(
            "Authorization successful! You can close this window.",
        ),
        Err(e) => tiny_http::Response::from_string(format!("Authorization failed: {}", e))
            .with_status_code(400),
    };
    let responded = request.respond(response);
    drop(server);

    let token = token?;
    responded?;
    Ok(token)
}

async fn read_pasted_code(state: &str) -> AppResult<String> {
    println!("Enter the authorization code, or paste the address the browser was redirected to:");
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .map_err(|e| other_error(&format!("Reading the authorization code failed: {}", e)))??;
    parse_pasted(&line, state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url() {
        let credentials = ClientCredentials::new("client-123", "secret");
        let url = authorization_url(&credentials, "state-xyz").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(url.as_str().starts_with(AUTH_URL));
        assert!(pairs.contains(&("client_id".to_string(), "client-123".to_string())));
        assert!(pairs.contains(&("access_type".to_string(), "offline".to_string())));
        assert!(pairs.contains(&("state".to_string(), "state-xyz".to_string())));
        assert!(pairs.contains(&("scope".to_string(), SCOPES.join(" "))));
        assert!(!url.as_str().contains("secret"));
    }

    #[test]
    fn test_parse_callback() {
        let code = parse_callback("/?state=abc&code=4%2F0Ab&scope=x", "abc").unwrap();
        assert_eq!(code, "4/0Ab");
    }

    #[test]
    fn test_parse_callback_rejects_wrong_state() {
        assert!(parse_callback("/?state=other&code=abc", "abc").is_err());
        assert!(parse_callback("/?code=abc", "abc").is_err());
    }

    #[test]
    fn test_parse_callback_reports_denial() {
        assert!(parse_callback("/?error=access_denied&state=abc", "abc").is_err());
        assert!(parse_callback("/?state=abc", "abc").is_err());
    }

    #[test]
    fn test_parse_pasted_code_or_redirect() {
        assert_eq!(parse_pasted("  4/0Ab-code\n", "abc").unwrap(), "4/0Ab-code");
        assert_eq!(
            parse_pasted("http://localhost:8080/?state=abc&code=4%2F0Ab\n", "abc").unwrap(),
            "4/0Ab"
        );
        assert!(parse_pasted("http://localhost:8080/?state=other&code=x", "abc").is_err());
        assert!(parse_pasted("\n", "abc").is_err());
    }

    /// Send one callback to `server` and report the status the browser saw
    fn browse(server: &tiny_http::Server, query: &str) -> tokio::task::JoinHandle<u16> {
        let addr = server.server_addr().to_ip().unwrap();
        let url = format!("http://{}/{}", addr, query);
        tokio::spawn(async move {
            let client = Client::builder().no_proxy().build().unwrap();
            client.get(url).send().await.unwrap().status().as_u16()
        })
    }

    #[tokio::test]
    async fn test_callback_is_exchanged_and_acknowledged() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let browser = browse(&server, "?state=abc&code=the-code");

        let token = receive_callback(server, "abc", |code| async move {
            assert_eq!(code, "the-code");
            Ok(StoredToken {
                access_token: "access".to_string(),
                refresh_token: Some("refresh".to_string()),
                expires_at: Some(0),
            })
        })
        .await
        .unwrap();

        assert_eq!(token.access_token, "access");
        assert_eq!(browser.await.unwrap(), 200);
    }

    #[tokio::test]
    async fn test_failed_exchange_answers_the_browser() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let browser = browse(&server, "?state=abc&code=expired");

        let result = receive_callback(server, "abc", |_| async {
            Err(auth_error("Failed to get token: invalid_grant"))
        })
        .await;

        assert!(matches!(result, Err(crate::error::Error::Auth(_))));
        assert_eq!(browser.await.unwrap(), 400);
    }

    #[tokio::test]
    async fn test_wrong_state_answers_the_browser() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let browser = browse(&server, "?state=forged&code=x");

        let result = receive_callback(server, "abc", |_| async {
            Err(auth_error("exchange must not run"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(browser.await.unwrap(), 400);
    }
}
