//! Tile transport
//!
//! `TileSource` is the seam between the fetcher's retry/validation logic and
//! the wire. Production uses `HttpTileSource`; tests plug in an in-memory
//! source.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER, USER_AGENT};
use reqwest::Url;
use std::time::Duration;

use crate::error::TileError;
use crate::state::data::{SceneId, TileCoord};

/// Public tile endpoint of the panorama service
pub const DEFAULT_ENDPOINT: &str = "https://streetviewpixels-pa.googleapis.com/v1/tile";

const CLIENT_ID: &str = "apiv3";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const MAPS_REFERER: &str = "https://www.google.com/maps/";
const IMAGE_ACCEPT: &str = "image/webp,image/apng,image/*,*/*;q=0.8";

/// Raw answer to a tile request
#[derive(Debug, Clone, PartialEq)]
pub struct TileResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Anything that can answer a tile request
pub trait TileSource: Send + Sync {
    fn get(&self, scene: &SceneId, coord: TileCoord) -> Result<TileResponse, TileError>;
}

/// Build the request URL for one tile
pub fn tile_url(endpoint: &str, scene: &SceneId, coord: TileCoord) -> Result<Url, TileError> {
    Url::parse_with_params(
        endpoint,
        &[
            ("cb_client", CLIENT_ID.to_string()),
            ("panoid", scene.as_str().to_string()),
            ("output", "tile".to_string()),
            ("zoom", coord.zoom.to_string()),
            ("x", coord.x.to_string()),
            ("y", coord.y.to_string()),
        ],
    )
    .map_err(|e| TileError::Network(format!("invalid tile URL: {}", e)))
}

/// Blocking HTTP tile source with a fixed browser-like header set
pub struct HttpTileSource {
    client: Client,
    endpoint: String,
}

impl HttpTileSource {
    /// Create a source with the given per-request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TileError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(REFERER, HeaderValue::from_static(MAPS_REFERER));
        headers.insert(ACCEPT, HeaderValue::from_static(IMAGE_ACCEPT));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| TileError::Network(format!("http client init failed: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl TileSource for HttpTileSource {
    fn get(&self, scene: &SceneId, coord: TileCoord) -> Result<TileResponse, TileError> {
        let url = tile_url(&self.endpoint, scene, coord)?;

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| TileError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| TileError::Network(format!("invalid bytes: {}", e)))?;

        Ok(TileResponse {
            status,
            body: body.to_vec(),
        })
    }
}
