use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Every directory response is wrapped in this envelope; `code == 200`
/// means success.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, Error> {
        if self.code == 200 {
            return self
                .data
                .ok_or_else(|| Error::Api { code: self.code, msg: self.msg });
        }

        if self.msg.eq_ignore_ascii_case("token not valid") {
            return Err(Error::TokenNotValid);
        }

        Err(Error::Api { code: self.code, msg: self.msg })
    }
}

/// `data` fields read from `GET /api/v1/natproxy/check_token`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckTokenResult {
    #[serde(default)]
    pub disconnect: bool,
    #[serde(default)]
    pub addr: String,
}

#[derive(Serialize)]
struct RegisterAddrBody<'a> {
    token: &'a str,
    addr: &'a str,
}

#[derive(Serialize)]
struct StatusBody<'a> {
    token: &'a str,
    disconnect: bool,
}

#[derive(Serialize)]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResult {
    token: String,
}

/// The operations the core consumes from the directory service, kept as
/// a trait so the broker's address allocator can be exercised against a
/// fake directory in tests without reaching the network.
pub trait DirectoryApi: Send + Sync {
    /// `GET /api/v1/natproxy/check_token`.
    async fn check_token(&self, token: &str) -> Result<CheckTokenResult, Error>;

    /// `GET /api/v1/natproxy/addr` — true iff the address is already taken.
    async fn is_addr_taken(&self, addr: &str) -> Result<bool, Error>;

    /// `POST /api/v1/natproxy/addr`.
    async fn register_addr(&self, token: &str, addr: &str) -> Result<(), Error>;

    /// `POST /api/v1/natproxy/status`.
    async fn report_status(&self, token: &str, disconnect: bool) -> Result<(), Error>;
}

/// Stateless HTTP/JSON client over the directory API (§6.4). Retries are
/// not built in here; callers (the address allocator, the agent's
/// reconnect loop) decide when to retry.
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl DirectoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// `POST /api/v1/register` — account creation; not called by the
    /// session/agent core, only exposed here so the full §6.4 surface is
    /// reachable from a CLI front-end.
    pub async fn register(&self, email: &str, password: &str) -> Result<(), Error> {
        let envelope: Envelope<serde_json::Value> = self
            .http
            .post(self.url("/api/v1/register"))
            .json(&CredentialsBody { email, password })
            .send()
            .await?
            .json()
            .await?;

        envelope.into_data().map(|_| ())
    }

    /// `POST /api/v1/login` — returns the token to use for the agent's
    /// `--token` flag.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, Error> {
        let envelope: Envelope<LoginResult> = self
            .http
            .post(self.url("/api/v1/login"))
            .json(&CredentialsBody { email, password })
            .send()
            .await?
            .json()
            .await?;

        Ok(envelope.into_data()?.token)
    }
}

impl DirectoryApi for DirectoryClient {
    async fn check_token(&self, token: &str) -> Result<CheckTokenResult, Error> {
        let envelope: Envelope<CheckTokenResult> = self
            .http
            .get(self.url("/api/v1/natproxy/check_token"))
            .query(&[("token", token)])
            .send()
            .await?
            .json()
            .await?;

        envelope.into_data()
    }

    async fn is_addr_taken(&self, addr: &str) -> Result<bool, Error> {
        let envelope: Envelope<serde_json::Value> = self
            .http
            .get(self.url("/api/v1/natproxy/addr"))
            .query(&[("addr", addr)])
            .send()
            .await?
            .json()
            .await?;

        Ok(envelope.code == 200)
    }

    async fn register_addr(&self, token: &str, addr: &str) -> Result<(), Error> {
        let envelope: Envelope<serde_json::Value> = self
            .http
            .post(self.url("/api/v1/natproxy/addr"))
            .json(&RegisterAddrBody { token, addr })
            .send()
            .await?
            .json()
            .await?;

        if envelope.code != 200 {
            return Err(Error::RegisterAddrFailed);
        }

        Ok(())
    }

    async fn report_status(&self, token: &str, disconnect: bool) -> Result<(), Error> {
        let envelope: Envelope<serde_json::Value> = self
            .http
            .post(self.url("/api/v1/natproxy/status"))
            .json(&StatusBody { token, disconnect })
            .send()
            .await?
            .json()
            .await?;

        envelope.into_data().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_yields_data() {
        let envelope: Envelope<CheckTokenResult> = serde_json::from_str(
            r#"{"code":200,"msg":"ok","data":{"disconnect":false,"addr":"203.0.113.9:20001"}}"#,
        )
        .unwrap();

        let result = envelope.into_data().unwrap();
        assert!(!result.disconnect);
        assert_eq!(result.addr, "203.0.113.9:20001");
    }

    #[test]
    fn token_not_valid_is_recognized_by_message() {
        let envelope: Envelope<CheckTokenResult> =
            serde_json::from_str(r#"{"code":401,"msg":"token not valid"}"#).unwrap();

        assert!(matches!(envelope.into_data(), Err(Error::TokenNotValid)));
    }

    #[test]
    fn other_failure_codes_surface_as_api_errors() {
        let envelope: Envelope<CheckTokenResult> =
            serde_json::from_str(r#"{"code":500,"msg":"internal error"}"#).unwrap();

        match envelope.into_data() {
            Err(Error::Api { code, msg }) => {
                assert_eq!(code, 500);
                assert_eq!(msg, "internal error");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
