//! The remote object interface the traversal consumes.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::models::RemoteObject;

/// Single-pass stream of content bytes.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// An opened content stream plus the extension of the exported format,
/// set only when the object was converted server-side.
pub struct ContentStream {
    pub stream: ByteStream,
    pub extension: Option<&'static str>,
}

impl std::fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStream")
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

/// Access to a hierarchical remote object store.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetch a single object's metadata.
    async fn fetch_object(&self, id: &str) -> Result<RemoteObject>;

    /// List a folder's children. An empty folder yields an empty vec.
    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteObject>>;

    /// Open the object's content, exporting native documents.
    async fn open_content_stream(&self, object: &RemoteObject) -> Result<ContentStream>;

    fn is_folder(&self, object: &RemoteObject) -> bool {
        object.is_folder()
    }
}
