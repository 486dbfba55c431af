use crate::error::{Error, Result};
use crate::reading::ApiPayload;
use reqwest::StatusCode;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::Mutex;
use tower::{
    limit::{ConcurrencyLimit, RateLimit},
    Service, ServiceBuilder, ServiceExt,
};
use tracing::debug;

// Identify ourselves towards the API operator.
const USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION"),
    "(",
    env!("CARGO_PKG_REPOSITORY"),
    ")"
);

/// The day to request sunrise and sunset for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EphemerisDate {
    Today,
    Tomorrow,
}

/// Fetches raw sunrise/sunset data for a fixed location.
pub trait EphemerisClient: Send + Sync {
    fn fetch(&self, date: EphemerisDate) -> impl Future<Output = Result<ApiPayload>> + Send;
}

/// Query parameters understood by the sunrise/sunset API.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
struct Query {
    lat: f64,
    lng: f64,
    date: EphemerisDate,
    // `0` requests ISO-8601 instants instead of localized strings.
    formatted: u8,
}

/// A single request against the API as a tower service.
#[derive(Debug, Clone)]
struct Api {
    client: reqwest::Client,
    url: String,
}

impl Service<Query> for Api {
    type Response = ApiPayload;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<ApiPayload>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, query: Query) -> Self::Future {
        let request = self.client.get(&self.url).query(&query);

        Box::pin(async move {
            let response = request.send().await?;
            let status = response.status();

            if status != StatusCode::OK {
                return Err(Error::new(format!("expected status 200, got {status}")));
            }

            Ok(response.json::<ApiPayload>().await?)
        })
    }
}

#[derive(Debug)]
struct Inner {
    service: ConcurrencyLimit<RateLimit<Api>>,
    latitude: f64,
    longitude: f64,
}

impl Inner {
    async fn fetch(&mut self, date: EphemerisDate) -> Result<ApiPayload> {
        let query = Query {
            lat: self.latitude,
            lng: self.longitude,
            date,
            formatted: 0,
        };

        debug!(?query, "requesting ephemeris");

        self.service.ready().await?.call(query).await
    }
}

/// HTTP client for the sunrise/sunset API.
#[derive(Debug, Clone)]
pub struct Ephemeris {
    inner: Arc<Mutex<Inner>>,
}

impl Ephemeris {
    /// Create a new ephemeris client for the location at `latitude`/`longitude`.
    pub fn new(url: &str, latitude: f64, longitude: f64, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        let api = Api {
            client,
            url: url.to_string(),
        };

        // At most two calls happen per cache refresh, anything beyond that is a bug or abuse.
        let service = ServiceBuilder::new()
            .concurrency_limit(2)
            .rate_limit(10, Duration::from_secs(1))
            .service(api);

        Ok(Ephemeris {
            inner: Arc::new(Mutex::new(Inner {
                service,
                latitude,
                longitude,
            })),
        })
    }
}

impl EphemerisClient for Ephemeris {
    async fn fetch(&self, date: EphemerisDate) -> Result<ApiPayload> {
        self.inner.lock().await.fetch(date).await
    }
}
