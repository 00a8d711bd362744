//! Recursive walk of a remote tree into an [`ArchiveSink`].
//!
//! Every folder lists its children and visits them concurrently; the
//! visits are joined with `try_join_all`, so results keep listing order
//! and the first failure drops all outstanding siblings.
//!
//! Archive paths are reserved while the listing is walked, before any
//! child starts, so duplicate names are resolved in listing order no
//! matter which download finishes first.
//!
//! Two semaphores of the same size bound the work in flight. Leaves hold a
//! download permit from opening the stream until the sink reports the
//! entry complete, so the number of idle downloads waiting in the sink's
//! queue is bounded too. Folders hold a listing permit only while their
//! children are being listed and release it before recursing, so deep
//! trees cannot starve themselves of permits.

use futures::future::{self, try_join_all, BoxFuture};
use futures::FutureExt;
use log::{debug, info, warn};
use tokio::sync::Semaphore;

use crate::archive::ArchiveSink;
use crate::error::{DriveError, Result};
use crate::gateway::RemoteGateway;
use crate::models::RemoteObject;
use crate::path_namer::{compute_path, UniquePaths};

/// Default number of leaves downloading at the same time.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Outcome of a traversal, mirroring the remote hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalNode {
    File {
        id: String,
        path: String,
        bytes: u64,
    },
    Folder {
        id: String,
        name: String,
        children: Vec<TraversalNode>,
    },
}

impl TraversalNode {
    /// Archive paths of every file below this node, in discovery order.
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::File { path, .. } => out.push(path),
            Self::Folder { children, .. } => {
                for child in children {
                    child.collect_paths(out);
                }
            }
        }
    }

    pub fn file_count(&self) -> usize {
        match self {
            Self::File { .. } => 1,
            Self::Folder { children, .. } => children.iter().map(Self::file_count).sum(),
        }
    }

    /// Uncompressed bytes archived below this node.
    pub fn total_bytes(&self) -> u64 {
        match self {
            Self::File { bytes, .. } => *bytes,
            Self::Folder { children, .. } => children.iter().map(Self::total_bytes).sum(),
        }
    }
}

/// Walks a remote tree and streams every leaf into a sink.
pub struct Traversal<'a, G: RemoteGateway + ?Sized> {
    gateway: &'a G,
    sink: &'a ArchiveSink,
    permits: Semaphore,
    listings: Semaphore,
    paths: UniquePaths,
}

impl<'a, G: RemoteGateway + ?Sized> Traversal<'a, G> {
    /// `max_in_flight` bounds both open downloads and folder listings;
    /// below 1 is treated as 1.
    pub fn new(gateway: &'a G, sink: &'a ArchiveSink, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            gateway,
            sink,
            permits: Semaphore::new(max_in_flight),
            listings: Semaphore::new(max_in_flight),
            paths: UniquePaths::new(),
        }
    }

    /// Archive everything reachable from `root_id`.
    ///
    /// Returns once every entry has been written. The sink is left open;
    /// the caller finalizes it on success and aborts it on failure.
    pub async fn run(&self, root_id: &str) -> Result<TraversalNode> {
        info!("Getting object (id: '{}')", root_id);
        let root = self.gateway.fetch_object(root_id).await?;

        if self.gateway.is_folder(&root) {
            self.visit_folder(root, Vec::new(), Vec::new()).await
        } else {
            let path = self.claim_file(&[], &root);
            self.visit_file(root, path).await
        }
    }

    /// List a folder and visit all children. `ancestry` holds the names
    /// used for paths below this folder, `lineage` the ids of the folders
    /// above it.
    fn visit_folder<'s>(
        &'s self,
        folder: RemoteObject,
        ancestry: Vec<String>,
        mut lineage: Vec<String>,
    ) -> BoxFuture<'s, Result<TraversalNode>> {
        async move {
            let children = {
                let _permit = self.listings.acquire().await.map_err(|e| {
                    DriveError::TransientNetworkError(format!("listing {}: {}", folder.id, e))
                })?;
                self.gateway.list_children(&folder.id).await?
            };
            info!("Folder '{}' files count: {}", folder.name, children.len());

            lineage.push(folder.id.clone());
            let visits = children
                .into_iter()
                .map(|child| self.visit_child(child, &ancestry, &lineage));
            let children = try_join_all(visits).await?;

            Ok(TraversalNode::Folder {
                id: folder.id,
                name: folder.name,
                children,
            })
        }
        .boxed()
    }

    /// Reserve the child's name and start its visit. Runs synchronously for
    /// each child in listing order; only the returned future does I/O.
    fn visit_child<'s>(
        &'s self,
        child: RemoteObject,
        ancestry: &[String],
        lineage: &[String],
    ) -> BoxFuture<'s, Result<TraversalNode>> {
        if !self.gateway.is_folder(&child) {
            let path = self.claim_file(ancestry, &child);
            return self.visit_file(child, path).boxed();
        }

        if lineage.contains(&child.id) {
            return future::ready(Err(DriveError::CycleDetected(child.id))).boxed();
        }

        let mut sub_ancestry = ancestry.to_vec();
        sub_ancestry.push(self.paths.claim_folder(ancestry, &child.name));
        self.visit_folder(child, sub_ancestry, lineage.to_vec())
    }

    fn claim_file(&self, ancestry: &[String], file: &RemoteObject) -> String {
        let extension = file.export_format().map(|format| format.extension);
        self.paths.claim(compute_path(ancestry, &file.name, extension))
    }

    /// Open the leaf's content, hand it to the sink under the reserved
    /// `path` and wait until the sink has written it.
    async fn visit_file(&self, file: RemoteObject, path: String) -> Result<TraversalNode> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| DriveError::DownloadError {
                id: file.id.clone(),
                message: e.to_string(),
            })?;

        debug!("Getting file (fileId: '{}')", file.id);
        let content = self.gateway.open_content_stream(&file).await?;
        if content.extension != file.export_format().map(|format| format.extension) {
            warn!(
                "'{}' was served as {:?}, archiving it as '{}'",
                file.id, content.extension, path
            );
        }

        let handle = self.sink.append(path.clone(), content.stream).await?;
        let bytes = handle.wait().await?;

        Ok(TraversalNode::File {
            id: file.id,
            path,
            bytes,
        })
    }
}
