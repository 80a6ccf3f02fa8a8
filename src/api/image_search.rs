use super::ImageSource;
use crate::config::{Credentials, Settings};
use crate::error::{Result, ShortsError};
use crate::slide::decode_image;
use crate::{logi, logw};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// The Custom Search API refuses `num` above this.
const MAX_RESULTS_PER_QUERY: u32 = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
}

pub struct ImageSearchClient {
    client: Client,
    search_url: String,
    api_key: String,
    cse_id: String,
}

impl ImageSearchClient {
    pub fn new(client: Client, settings: &Settings, credentials: &Credentials) -> Self {
        Self {
            client,
            search_url: settings.search_url.clone(),
            api_key: credentials.images_api_key.clone(),
            cse_id: credentials.images_cse_id.clone(),
        }
    }

    async fn download_one(&self, url: &str, dest: &Path) -> Result<bool> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ShortsError::Network(format!("GET {url}: {e}")))?;
        if !resp.status().is_success() {
            logw(format!("Download HTTP {} for {}", resp.status().as_u16(), url));
            return Ok(false);
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ShortsError::Network(format!("reading {url}: {e}")))?;
        fs::write(dest, &bytes).await?;
        Ok(true)
    }
}

#[async_trait]
impl ImageSource for ImageSearchClient {
    async fn fetch_images(&self, query: &str, num: u32) -> Result<Vec<String>> {
        let num = num.clamp(1, MAX_RESULTS_PER_QUERY).to_string();
        let resp = self
            .client
            .get(&self.search_url)
            .query(&[
                ("q", query),
                ("cx", self.cse_id.as_str()),
                ("key", self.api_key.as_str()),
                ("searchType", "image"),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ShortsError::Network(format!("image search: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet = body.chars().take(400).collect::<String>();
            logw(format!("Image search failed HTTP {}: {}", status.as_u16(), snippet));
            return Ok(Vec::new());
        }

        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| ShortsError::Network(format!("image search body: {e}")))?;
        let urls: Vec<String> = parsed.items.into_iter().map(|i| i.link).collect();
        logi(format!("Image search '{}' returned {} urls", query, urls.len()));
        Ok(urls)
    }

    async fn download_images(&self, urls: &[String], dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir).await?;

        let mut valid = Vec::new();
        for (idx, url) in urls.iter().enumerate() {
            let path = dir.join(format!("image_{}.jpg", idx + 1));
            match self.download_one(url, &path).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    logw(format!("Skipping {}: {}", url, e));
                    continue;
                }
            }

            let check = path.clone();
            let decoded = tokio::task::spawn_blocking(move || decode_image(&check).map(|_| ()))
                .await
                .map_err(|e| ShortsError::Network(format!("decode task: {e}")))?;
            match decoded {
                Ok(()) => valid.push(path),
                Err(e) => {
                    logw(format!("Skipping invalid image {}: {}", path.display(), e));
                    fs::remove_file(&path).await.ok();
                }
            }
        }

        logi(format!("{} of {} images valid", valid.len(), urls.len()));
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn client_for(server: &MockServer) -> ImageSearchClient {
        let settings = Settings {
            search_url: format!("{}/customsearch/v1", server.uri()),
            ..Settings::default()
        };
        let creds = Credentials {
            images_api_key: "key".to_string(),
            images_cse_id: "cx".to_string(),
            voice_rss_key: "tts".to_string(),
        };
        ImageSearchClient::new(Client::new(), &settings, &creds)
    }

    #[tokio::test]
    async fn fetch_returns_links_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .and(query_param("q", "sunrise"))
            .and(query_param("searchType", "image"))
            .and(query_param("cx", "cx"))
            .and(query_param("num", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"link": "http://a/1.jpg"}, {"link": "http://a/2.jpg"}]
            })))
            .mount(&server)
            .await;

        let urls = client_for(&server).fetch_images("sunrise", 25).await.unwrap();
        assert_eq!(urls, vec!["http://a/1.jpg", "http://a/2.jpg"]);
    }

    #[tokio::test]
    async fn fetch_http_error_gives_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("quota"))
            .mount(&server)
            .await;

        let urls = client_for(&server).fetch_images("x", 10).await.unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn fetch_without_items_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        assert!(client_for(&server).fetch_images("x", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn download_drops_corrupt_and_failed_entries() {
        let server = MockServer::start().await;
        for name in ["/one.png", "/three.png"] {
            Mock::given(method("GET"))
                .and(path(name))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes()))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/two.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not an image".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/four.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let urls: Vec<String> = ["one", "two", "three", "four"]
            .iter()
            .map(|n| format!("{}/{}.png", server.uri(), n))
            .collect();
        let dir = tempfile::tempdir().unwrap();
        let got = client_for(&server)
            .download_images(&urls, dir.path())
            .await
            .unwrap();

        assert_eq!(
            got,
            vec![dir.path().join("image_1.jpg"), dir.path().join("image_3.jpg")]
        );
        assert!(!dir.path().join("image_2.jpg").exists());
        assert!(!dir.path().join("image_4.jpg").exists());
    }
}
