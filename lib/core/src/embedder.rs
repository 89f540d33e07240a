use std::path::Path;

use crate::vector::Embedding;

/// Maps an image on disk to a fixed-width embedding.
///
/// Implementations never fail: a read, decode or inference error yields a
/// zero vector of width [`ImageEmbedder::dim`] so a batch always stays
/// full-width.
pub trait ImageEmbedder: Send + Sync {
    /// Width of every embedding this embedder returns
    fn dim(&self) -> usize;

    /// Embed the image stored at `path`
    fn embed_path(&self, path: &Path) -> Embedding;

    /// Embed several images, one output per input and in order
    fn embed_paths(&self, paths: &[&Path]) -> Vec<Embedding> {
        paths.iter().map(|p| self.embed_path(p)).collect()
    }
}
