use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;

use super::{DynoManager, Dyno, ScaleRequest};
use crate::error::{Result, check_status};

const SERVICE: &str = "Heroku";
const API_VERSION: &str = "application/vnd.heroku+json; version=3";

#[derive(Debug, Serialize)]
struct FormationUpdate {
    quantity: u32,
}

/// Heroku Platform API client authenticated with an account API key
pub struct HerokuClient {
    http: reqwest::Client,
    base_url: String,
}

impl HerokuClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(API_VERSION));
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .user_agent(concat!("blitzer/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(HerokuClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DynoManager for HerokuClient {
    async fn scale(&self, request: &ScaleRequest) -> Result<()> {
        let url = format!(
            "{}/apps/{}/formation/{}",
            self.base_url, request.app, request.process
        );
        let response = self
            .http
            .patch(url)
            .json(&FormationUpdate {
                quantity: request.quantity,
            })
            .send()
            .await?;
        check_status(SERVICE, response).await?;

        tracing::debug!(
            app = %request.app,
            process = %request.process,
            quantity = request.quantity,
            "scale request accepted"
        );
        Ok(())
    }

    async fn dynos(&self, app: &str) -> Result<Vec<Dyno>> {
        let url = format!("{}/apps/{app}/dynos", self.base_url);
        let response = self.http.get(url).send().await?;
        Ok(check_status(SERVICE, response).await?.json().await?)
    }
}
