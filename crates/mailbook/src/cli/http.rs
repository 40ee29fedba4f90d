//! HTTP transport for a library published by a web server on the shell
//! account. Requests carry the `x-fsn` session value from a cookie file.

use regex::Regex;
use reqwest::blocking::{Client, Response};
use std::path::Path;
use std::sync::LazyLock;

use mailbook_core::fs::{FileSystem, RealFileSystem};
use mailbook_core::transport::{Transport, remote_path};
use mailbook_core::{MailbookError, Result};

/// The reader's own browser identification
const USER_AGENT: &str =
    "Mozilla/4.0 (compatible; Linux 2.6.22) NetFront/3.4 Kindle/2.5 (screen 824x1200; rotate)";

static XFSN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"x-fsn\s*=\s*(.+)").expect("static regex"));

/// Find the `x-fsn` value in cookie file text
pub fn parse_xfsn(cookies: &str) -> Option<String> {
    XFSN.captures(cookies)
        .map(|caps| caps[1].trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Fetches the registry and documents from a library served over HTTP.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    registry_file: String,
    xfsn: Option<String>,
}

impl HttpTransport {
    /// Client for the library at `url`.
    ///
    /// With a `cookie_file`, its `x-fsn` value is sent with every request and a
    /// file without one is an error. `proxy` is an HTTP proxy URL.
    pub fn new(
        url: &str,
        cookie_file: Option<&Path>,
        proxy: Option<&str>,
        registry_file: &str,
    ) -> Result<Self> {
        let xfsn = match cookie_file {
            Some(path) => {
                let cookies =
                    RealFileSystem
                        .read_to_string(path)
                        .map_err(|source| MailbookError::FileRead {
                            path: path.to_path_buf(),
                            source,
                        })?;
                let value = parse_xfsn(&cookies).ok_or_else(|| MailbookError::Transport {
                    path: path.display().to_string(),
                    message: "no x-fsn value in cookie file".to_string(),
                })?;
                Some(value)
            }
            None => None,
        };

        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::http(proxy).map_err(|e| transport_error(proxy, e))?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|e| transport_error(url, e))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            registry_file: registry_file.to_string(),
            xfsn,
        })
    }

    fn get(&self, relative: &str) -> Result<Response> {
        let url = format!("{}/{}", self.base_url, relative);
        log::info!("Downloading {}", url);

        let mut request = self.client.get(&url);
        if let Some(xfsn) = &self.xfsn {
            request = request.header("x-fsn", xfsn);
        }
        request
            .send()
            .and_then(Response::error_for_status)
            .map_err(|e| transport_error(relative, e))
    }
}

impl Transport for HttpTransport {
    fn fetch_registry(&self) -> Result<String> {
        self.get(&self.registry_file)?
            .text()
            .map_err(|e| transport_error(&self.registry_file, e))
    }

    fn fetch(&self, dir_hint: &str, file_name: &str, destination: &Path) -> Result<()> {
        let relative = remote_path(dir_hint, file_name);
        let body = self
            .get(&relative)?
            .bytes()
            .map_err(|e| transport_error(&relative, e))?;
        RealFileSystem
            .write_atomic(destination, &body)
            .map_err(|source| MailbookError::FileWrite {
                path: destination.to_path_buf(),
                source,
            })
    }
}

fn transport_error(path: &str, e: impl std::fmt::Display) -> MailbookError {
    MailbookError::Transport {
        path: path.to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_xfsn() {
        let cookies = "# Netscape cookie file\nsession-id = 123\nx-fsn=  abc%2Fdef==  \n";
        assert_eq!(parse_xfsn(cookies).as_deref(), Some("abc%2Fdef=="));
        assert_eq!(parse_xfsn("x-fsn = \n"), None);
        assert_eq!(parse_xfsn("nothing here"), None);
    }

    #[test]
    fn test_cookie_file_without_value_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cookie_file = dir.path().join("cookies");
        std::fs::write(&cookie_file, "session-id = 1\n").unwrap();

        let result = HttpTransport::new(
            "http://example.org/library",
            Some(&cookie_file),
            None,
            "FILELIST",
        );
        assert!(matches!(result, Err(MailbookError::Transport { .. })));
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let transport = HttpTransport::new("http://example.org/library/", None, None, "FILELIST")
            .unwrap();
        assert_eq!(transport.base_url, "http://example.org/library");
    }
}
