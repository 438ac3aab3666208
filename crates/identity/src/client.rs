use crate::error::IdentityError;
use crate::token::AccessToken;
use async_trait::async_trait;
use configuration::Settings;
use serde::Deserialize;

/// Scope requested for every token; grants access to Azure SQL resources.
///
/// The double slash before `.default` is part of the resource URI Azure SQL
/// registers with the identity platform, not a typo.
const DATABASE_SCOPE: &str = "https://database.windows.net//.default";

/// The generic, abstract interface for obtaining an access token.
///
/// This trait is the contract the database crate programs against, allowing
/// the underlying implementation (live or stubbed) to be swapped out.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtains a fresh access token. Implementations must not cache.
    async fn acquire(&self) -> Result<AccessToken, IdentityError>;
}

/// A concrete `TokenProvider` for the Microsoft identity platform,
/// authenticating with the OAuth2 client-credential grant.
#[derive(Clone)]
pub struct EntraIdClient {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl EntraIdClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_url: format!(
                "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
                settings.tenant_id
            ),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
        }
    }
}

#[async_trait]
impl TokenProvider for EntraIdClient {
    async fn acquire(&self) -> Result<AccessToken, IdentityError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", DATABASE_SCOPE),
        ];

        let response = self.client.post(&self.token_url).form(&params).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "Token request rejected");
            return Err(IdentityError::Provider {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| IdentityError::Malformed(e.to_string()))?;

        tracing::debug!("Acquired access token for {DATABASE_SCOPE}");
        Ok(AccessToken::new(parsed.access_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_deserializes_from_provider_json() {
        let body = r#"{
            "token_type": "Bearer",
            "expires_in": 3599,
            "ext_expires_in": 3599,
            "access_token": "eyJ0eXAiOiJKV1Qi"
        }"#;
        let parsed: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.access_token, "eyJ0eXAiOiJKV1Qi");
    }

    #[test]
    fn token_url_targets_the_tenant() {
        let settings = Settings {
            server: "s.database.windows.net".into(),
            database: "db".into(),
            tenant_id: "my-tenant".into(),
            client_id: "my-client".into(),
            client_secret: "shh".into(),
        };
        let client = EntraIdClient::new(&settings);
        assert_eq!(
            client.token_url,
            "https://login.microsoftonline.com/my-tenant/oauth2/v2.0/token"
        );
    }
}
