//! HTTP implementation of the passkey API boundary

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::api::ApiTransport;
use crate::errors::CeremonyError;
use crate::models::{ExchangeToken, Passkey};
use crate::settings::ApiSettings;

/// Which endpoint family a status code came from, for error mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Surface {
    Options,
    RegistrationVerify,
    AuthenticationVerify,
    Inventory,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeTokenResponse {
    exchange_token: String,
}

/// `reqwest`-backed API client
pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpApiClient {
    /// Build a client from API settings
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the underlying HTTP
    /// client cannot be constructed.
    pub fn new(settings: &ApiSettings) -> anyhow::Result<Self> {
        // A trailing slash keeps Url::join from eating the last path segment
        let mut base = settings.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, CeremonyError> {
        self.base_url
            .join(path)
            .map_err(|e| CeremonyError::Transport(format!("invalid endpoint {path}: {e}")))
    }

    fn transport_error(err: &reqwest::Error) -> CeremonyError {
        CeremonyError::Transport(err.to_string())
    }

    /// Map a non-success status to the failure taxonomy
    fn map_rejection(surface: Surface, status: StatusCode, detail: String) -> CeremonyError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                CeremonyError::Unauthorized(detail)
            }
            StatusCode::CONFLICT if surface == Surface::RegistrationVerify => {
                CeremonyError::DuplicateCredential
            }
            StatusCode::NOT_FOUND if surface == Surface::AuthenticationVerify => {
                CeremonyError::NoCredential
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY
                if matches!(
                    surface,
                    Surface::RegistrationVerify | Surface::AuthenticationVerify
                ) =>
            {
                CeremonyError::VerificationFailed(detail)
            }
            _ => CeremonyError::Transport(format!("unexpected status {status}: {detail}")),
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        surface: Surface,
        response: Response,
    ) -> Result<T, CeremonyError> {
        let response = Self::check_status(surface, response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| CeremonyError::Transport(format!("malformed response body: {e}")))
    }

    async fn check_status(surface: Surface, response: Response) -> Result<Response, CeremonyError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(Self::map_rejection(surface, status, detail))
    }
}

#[async_trait]
impl ApiTransport for HttpApiClient {
    async fn registration_options(&self, bearer_token: &str) -> Result<Value, CeremonyError> {
        let url = self.endpoint("passkeys/registration-options")?;
        let response = self
            .http
            .get(url)
            .bearer_auth(bearer_token)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        Self::read_json(Surface::Options, response).await
    }

    async fn verify_registration(
        &self,
        bearer_token: &str,
        credential: &Value,
        device_label: &str,
    ) -> Result<Passkey, CeremonyError> {
        let url = self.endpoint("passkeys/registration-verify")?;
        let response = self
            .http
            .post(url)
            .bearer_auth(bearer_token)
            .json(&json!({ "credential": credential, "deviceLabel": device_label }))
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        Self::read_json(Surface::RegistrationVerify, response).await
    }

    async fn authentication_options(&self) -> Result<Value, CeremonyError> {
        let url = self.endpoint("passkeys/authentication-options")?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        Self::read_json(Surface::Options, response).await
    }

    async fn verify_authentication(
        &self,
        credential: &Value,
    ) -> Result<ExchangeToken, CeremonyError> {
        let url = self.endpoint("passkeys/authentication-verify")?;
        let response = self
            .http
            .post(url)
            .json(&json!({ "credential": credential }))
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        let body: ExchangeTokenResponse =
            Self::read_json(Surface::AuthenticationVerify, response).await?;
        Ok(ExchangeToken(body.exchange_token))
    }

    async fn list_passkeys(&self, bearer_token: &str) -> Result<Vec<Passkey>, CeremonyError> {
        let url = self.endpoint("passkeys")?;
        let response = self
            .http
            .get(url)
            .bearer_auth(bearer_token)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        Self::read_json(Surface::Inventory, response).await
    }

    async fn delete_passkey(&self, bearer_token: &str, id: u64) -> Result<(), CeremonyError> {
        let url = self.endpoint(&format!("passkeys/{id}"))?;
        let response = self
            .http
            .delete(url)
            .bearer_auth(bearer_token)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CeremonyError::NotFound(id));
        }
        Self::check_status(Surface::Inventory, response).await?;
        Ok(())
    }
}
