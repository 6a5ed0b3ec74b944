use std::io::Read;

use tracing::debug;
use url::Url;

use crate::error::{DetectError, Result};

pub const GCS_SCHEME: &str = "gs://";
pub const DEFAULT_STORAGE_URL: &str = "https://storage.googleapis.com/";

/// `gs://bucket/object` split into its two parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUri {
    pub bucket: String,
    pub object: String,
}

impl StorageUri {
    /// Accepts `gs://bucket/key` or a bare `bucket/key`. The key may contain
    /// further slashes; bucket and key must both be non-empty.
    ///
    /// Only Cloud Storage is served, so any other `scheme://` (`s3://`,
    /// `https://`) is rejected as `InvalidUri` instead of being handed to the
    /// storage API as a bucket named after the scheme.
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = || DetectError::InvalidUri(uri.to_string());
        let path = match uri.strip_prefix(GCS_SCHEME) {
            Some(path) => path,
            None if uri.contains("://") => return Err(invalid()),
            None => uri,
        };
        let (bucket, object) = path.split_once('/').ok_or_else(invalid)?;
        if bucket.is_empty() || object.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            bucket: bucket.to_string(),
            object: object.to_string(),
        })
    }

    /// Last path segment of the object key.
    pub fn basename(&self) -> &str {
        self.object.rsplit('/').next().unwrap_or(&self.object)
    }
}

impl std::fmt::Display for StorageUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{GCS_SCHEME}{}/{}", self.bucket, self.object)
    }
}

/// Read access to an object store.
pub trait ObjectStore {
    fn download(&self, uri: &StorageUri) -> Result<Vec<u8>>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for &T {
    fn download(&self, uri: &StorageUri) -> Result<Vec<u8>> {
        (**self).download(uri)
    }
}

/// Cloud Storage JSON API client.
pub struct GcsStore {
    agent: ureq::Agent,
    base_url: Url,
    access_token: Option<String>,
}

impl GcsStore {
    pub fn new(base_url: &str, access_token: Option<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| DetectError::backend("storage", format!("bad base URL {base_url}: {e}")))?;
        Ok(Self {
            agent: ureq::AgentBuilder::new().build(),
            base_url,
            access_token,
        })
    }

    /// `storage/v1/b/{bucket}/o/{object}?alt=media`, with the object key as a
    /// single percent-encoded segment.
    pub fn media_url(&self, uri: &StorageUri) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DetectError::backend("storage", "base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", uri.bucket.as_str(), "o", uri.object.as_str()]);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }
}

impl ObjectStore for GcsStore {
    fn download(&self, uri: &StorageUri) -> Result<Vec<u8>> {
        let url = self.media_url(uri)?;
        debug!("Downloading {uri} from {url}");
        let mut request = self.agent.request_url("GET", &url);
        if let Some(token) = &self.access_token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        let response = request
            .call()
            .map_err(|e| DetectError::from_http("storage", e))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| DetectError::backend("storage", format!("reading {uri}: {e}")))?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_and_key() {
        let uri = StorageUri::parse("gs://drawings/site-a/p&id-01.png").unwrap();
        assert_eq!(uri.bucket, "drawings");
        assert_eq!(uri.object, "site-a/p&id-01.png");
        assert_eq!(uri.basename(), "p&id-01.png");
        assert_eq!(uri.to_string(), "gs://drawings/site-a/p&id-01.png");
    }

    #[test]
    fn accepts_bare_bucket_path() {
        let uri = StorageUri::parse("drawings/sheet.jpg").unwrap();
        assert_eq!(uri.bucket, "drawings");
        assert_eq!(uri.object, "sheet.jpg");
    }

    #[test]
    fn rejects_missing_segments() {
        for bad in [
            "gs://",
            "gs://bucket",
            "gs://bucket/",
            "gs:///object",
            "bucket",
            "",
        ] {
            assert!(
                matches!(StorageUri::parse(bad), Err(DetectError::InvalidUri(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn only_cloud_storage_scheme_is_served() {
        for other in ["s3://bucket/object", "https://bucket/object", "file://bucket/object"] {
            assert!(
                matches!(StorageUri::parse(other), Err(DetectError::InvalidUri(u)) if u == other),
                "{other} should be rejected"
            );
        }
    }

    #[test]
    fn media_url_encodes_object_key() {
        let store = GcsStore::new(DEFAULT_STORAGE_URL, None).unwrap();
        let uri = StorageUri::parse("gs://drawings/site a/sheet.png").unwrap();
        let url = store.media_url(&uri).unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/drawings/o/site%20a%2Fsheet.png?alt=media"
        );
    }
}
