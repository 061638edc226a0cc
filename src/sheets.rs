//! Google-Sheets-backed ledger: one worksheet, one row per event.
//!
//! Auth is the service-account JWT flow: sign an RS256 assertion with the
//! key file's private key, exchange it at the token endpoint for a bearer
//! token, and cache that token until shortly before expiry.

use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::ledger::{Event, LedgerStore};

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
/// Data rows start at row 2; row 1 is the header other tooling expects.
const DATA_RANGE: &str = "A2:E";
/// Refresh the cached token this many seconds before it actually expires.
const TOKEN_SLACK_SECS: u64 = 60;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct SheetsLedger {
    http: reqwest::Client,
    key: ServiceAccountKey,
    spreadsheet_id: String,
    token: Mutex<Option<CachedToken>>,
}

impl SheetsLedger {
    pub fn from_key_file(path: impl AsRef<Path>, spreadsheet_id: &str) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading service account key {}", path.as_ref().display()))?;
        let key: ServiceAccountKey =
            serde_json::from_str(&data).context("parsing service account key")?;
        let http = reqwest::Client::builder()
            .user_agent("advice-patrol/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .context("building Sheets HTTP client")?;
        Ok(Self {
            http,
            key,
            spreadsheet_id: spreadsheet_id.to_string(),
            token: Mutex::new(None),
        })
    }

    async fn bearer_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.access_token.clone());
            }
        }
        let fresh = self.fetch_token().await?;
        let access_token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .context("invalid service account private key")?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .context("signing token assertion")?;

        #[derive(Deserialize)]
        struct TokenResp {
            access_token: String,
            expires_in: u64,
        }

        let resp = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("token request failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("token endpoint returned {}", resp.status()));
        }
        let body: TokenResp = resp.json().await.context("token response body")?;

        debug!("refreshed sheets access token");
        let ttl = body.expires_in.saturating_sub(TOKEN_SLACK_SECS);
        Ok(CachedToken {
            access_token: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(ttl),
        })
    }

    fn values_url(&self, suffix: &str) -> String {
        format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values/{}",
            self.spreadsheet_id, suffix
        )
    }
}

#[async_trait::async_trait]
impl LedgerStore for SheetsLedger {
    async fn append(&self, event: &Event) -> Result<()> {
        #[derive(Serialize)]
        struct AppendReq {
            values: Vec<Vec<String>>,
        }

        let token = self.bearer_token().await?;
        let url = format!("{}:append?valueInputOption=RAW", self.values_url(DATA_RANGE));
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&AppendReq {
                values: vec![event.to_row()],
            })
            .send()
            .await
            .context("ledger append request failed")?;
        resp.error_for_status().context("ledger append rejected")?;

        debug!(
            user_id = event.user_id,
            penalty = event.penalty,
            "appended ledger row"
        );
        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<Event>> {
        #[derive(Deserialize)]
        struct ValuesResp {
            #[serde(default)]
            values: Vec<Vec<String>>,
        }

        let token = self.bearer_token().await?;
        let resp = self
            .http
            .get(self.values_url(DATA_RANGE))
            .bearer_auth(token)
            .send()
            .await
            .context("ledger scan request failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("ledger scan returned {}", resp.status()));
        }
        let body: ValuesResp = resp.json().await.context("ledger scan response body")?;

        let mut events = Vec::with_capacity(body.values.len());
        for (idx, row) in body.values.iter().enumerate() {
            match Event::from_row(row) {
                Some(event) => events.push(event),
                // Row 1 is the header, data starts at row 2.
                None => warn!(row = idx + 2, "skipping malformed ledger row"),
            }
        }
        Ok(events)
    }

    fn name(&self) -> &'static str {
        "sheets"
    }
}
