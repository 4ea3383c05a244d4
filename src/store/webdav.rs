//! WebDAV implementation of the store capability over plain HTTP verbs:
//! `MKCOL` for directories, `PROPFIND` (depth 0) for existence probes,
//! `PUT` for uploads.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, StatusCode};
use tracing::debug;

use super::Store;
use crate::config::StoreConfig;
use crate::error::{HarvestError, Result};

/// Characters escaped inside a path segment when building request URLs.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'[')
    .add(b']')
    .add(b'|')
    .add(b'/')
    .add(b'\\');

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
enum Auth {
    Basic { user: String, pass: String },
    Bearer { token: String },
}

/// Store backed by a WebDAV collection. Constructed fresh for every
/// scheduler tick from the task's destination settings.
pub struct WebdavStore {
    http: Client,
    /// Base collection URL, with a trailing slash.
    base_url: String,
    auth: Auth,
}

impl WebdavStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let base = config.base_url.trim();
        if base.is_empty() {
            return Err(HarvestError::Store("empty base_url".to_string()));
        }
        let auth = match config.auth.trim().to_lowercase().as_str() {
            "" | "basic" => Auth::Basic {
                user: config.user.clone(),
                pass: config.pass.clone(),
            },
            "bearer" => Auth::Bearer {
                token: config.token.clone(),
            },
            other => {
                return Err(HarvestError::Store(format!(
                    "unsupported auth mode \"{other}\""
                )));
            }
        };
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: format!("{}/", base.trim_end_matches('/')),
            auth,
        })
    }

    /// Absolute request URL for a relative remote path.
    fn url_for(&self, path: &str) -> String {
        let encoded = path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|seg| utf8_percent_encode(seg, SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}{encoded}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.http.request(method, self.url_for(path));
        match &self.auth {
            Auth::Basic { user, pass } => req.basic_auth(user, Some(pass)),
            Auth::Bearer { token } => req.bearer_auth(token),
        }
    }

    fn mkcol(&self, dir: &str) -> Result<StatusCode> {
        let method = Method::from_bytes(b"MKCOL").expect("valid method");
        Ok(self.request(method, dir).send()?.status())
    }
}

impl Store for WebdavStore {
    fn ensure_dir(&self, dir: &str) -> Result<()> {
        let dir = dir.trim_matches('/');
        if dir.is_empty() {
            return Ok(());
        }
        // Walk the segments; a collection that already exists is fine.
        let mut cur = String::new();
        for seg in dir.split('/').filter(|s| !s.is_empty()) {
            if !cur.is_empty() {
                cur.push('/');
            }
            cur.push_str(seg);
            let status = self.mkcol(&cur)?;
            if status.is_success() || status == StatusCode::METHOD_NOT_ALLOWED {
                continue;
            }
            if self.exists(&cur)? {
                continue;
            }
            return Err(HarvestError::Store(format!(
                "MKCOL /{cur} failed: {status}"
            )));
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let method = Method::from_bytes(b"PROPFIND").expect("valid method");
        let status = self
            .request(method, path)
            .header("Depth", "0")
            .send()?
            .status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if status.is_success() {
            return Ok(true);
        }
        Err(HarvestError::Store(format!(
            "PROPFIND /{path} failed: {status}"
        )))
    }

    fn put(&self, path: &str, data: &[u8]) -> Result<()> {
        let status = self
            .request(Method::PUT, path)
            .body(data.to_vec())
            .send()?
            .status();
        if !status.is_success() {
            return Err(HarvestError::Store(format!("PUT /{path} failed: {status}")));
        }
        debug!(path, bytes = data.len(), "uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(auth: &str) -> Result<WebdavStore> {
        WebdavStore::new(&StoreConfig {
            base_url: "https://dav.example.com/files/harvest".to_string(),
            auth: auth.to_string(),
            user: "u".to_string(),
            pass: "p".to_string(),
            token: "t".to_string(),
        })
    }

    #[test]
    fn test_url_encoding_and_base_join() {
        let store = store("basic").expect("store");
        assert_eq!(
            store.url_for("archive/Q1 report.pdf"),
            "https://dav.example.com/files/harvest/archive/Q1%20report.pdf"
        );
        assert_eq!(
            store.url_for("/leading/and/trailing/"),
            "https://dav.example.com/files/harvest/leading/and/trailing"
        );
    }

    #[test]
    fn test_auth_modes() {
        assert!(store("").is_ok());
        assert!(store("basic").is_ok());
        assert!(store("Bearer").is_ok());
        assert!(store("digest").is_err());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let err = WebdavStore::new(&StoreConfig {
            base_url: "  ".to_string(),
            auth: String::new(),
            user: String::new(),
            pass: String::new(),
            token: String::new(),
        })
        .unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }
}
