//! Document identity tokens.
//!
//! The device lists collection members by an identity token rather than by
//! path. Documents bought from the store (or converted by Calibre with an
//! ASIN) are identified by their ASIN and content type; everything else by a
//! SHA-1 of the full on-device path:
//!
//! - `#B00ABCDEFG^EBOK`: known identity
//! - `*3f786850e387550fdab836ed7e6dc881de23001b`: path-derived fallback
//!
//! Because the fallback hashes the path, moving a document to another folder
//! changes its token.

use regex::Regex;
use regex::bytes::Regex as BytesRegex;
use sha1::{Digest, Sha1};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use crate::fs::FileSystem;

/// How much of a `.mobi` file is searched for an embedded ASIN.
pub const MARKER_SCAN_LIMIT: usize = 10_000;

/// `<title>-asin_<ASIN>-type_<TYPE>-v_<N>`, as used by store downloads.
static STORE_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^-]+-asin_(?P<asin>[A-Za-z0-9-]*)-type_(?P<type>[A-Za-z0-9_]{4})-v_(?P<index>[0-9]+)")
        .expect("static regex")
});

/// Calibre's producer signature, then the EXTH ASIN record (type 113,
/// length 44), then the content type. `.` stops at newlines, so the whole
/// marker has to sit on one line.
static CALIBRE_MARKER: LazyLock<BytesRegex> = LazyLock::new(|| {
    BytesRegex::new(
        r"(?-u)\[http://calibre-ebook\.com\].*\x00\x00\x00\x71\x00\x00\x00\x2c([A-Za-z0-9_-]+).*(PDOC|EBOK)",
    )
    .expect("static regex")
});

/// Identity of a document as listed in the collections descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityToken {
    /// ASIN and four-letter content type (`EBOK`, `PDOC`, ...)
    Known {
        /// Store identifier
        asin: String,
        /// Content type code
        kind: String,
    },
    /// Hex SHA-1 of the document's full path
    PathHash(String),
}

impl IdentityToken {
    /// Fallback identity for a path.
    pub fn from_path(path: &Path) -> Self {
        let digest = Sha1::digest(path.to_string_lossy().as_bytes());
        IdentityToken::PathHash(hex::encode(digest))
    }

    /// True for ASIN-based tokens.
    pub fn is_known(&self) -> bool {
        matches!(self, IdentityToken::Known { .. })
    }
}

impl fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityToken::Known { asin, kind } => write!(f, "#{}^{}", asin, kind),
            IdentityToken::PathHash(hex) => write!(f, "*{}", hex),
        }
    }
}

/// Identify the document at `path`.
///
/// Tries the store filename pattern, then (for `.mobi` files) an embedded
/// Calibre ASIN within the first [`MARKER_SCAN_LIMIT`] bytes, then falls back
/// to hashing the path. Read errors during the scan only mean "no marker".
pub fn identify<FS: FileSystem>(fs: &FS, path: &Path) -> IdentityToken {
    if let Some(token) = path
        .file_name()
        .and_then(|name| identify_store_filename(&name.to_string_lossy()))
    {
        return token;
    }

    if has_mobi_extension(path) {
        match fs.read_head(path, MARKER_SCAN_LIMIT) {
            Ok(head) => {
                if let Some(token) = find_calibre_marker(&head) {
                    return token;
                }
            }
            Err(e) => log::debug!("Could not scan {} for an ASIN: {}", path.display(), e),
        }
    }

    IdentityToken::from_path(path)
}

/// Match a store download file name.
pub fn identify_store_filename(file_name: &str) -> Option<IdentityToken> {
    let caps = STORE_FILENAME.captures(file_name)?;
    Some(IdentityToken::Known {
        asin: caps["asin"].to_string(),
        kind: caps["type"].to_string(),
    })
}

/// Search raw file bytes for Calibre's embedded ASIN marker.
pub fn find_calibre_marker(bytes: &[u8]) -> Option<IdentityToken> {
    let caps = CALIBRE_MARKER.captures(bytes)?;
    Some(IdentityToken::Known {
        asin: String::from_utf8_lossy(&caps[1]).to_string(),
        kind: String::from_utf8_lossy(&caps[2]).to_string(),
    })
}

fn has_mobi_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mobi"))
}
