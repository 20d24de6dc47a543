use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use strata_chunk::{ChunkCoord, Voxel};
use strata_geom::Region;

use crate::cancel::CancelToken;
use crate::generator::{GenContext, Generator, generate_chunk};
use crate::persist::{Persister, chunk_file_name, decode_chunk, encode_chunk};

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt chunk data: {0}")]
    Corrupt(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("cancelled")]
    Cancelled,
}

/// Chunk being paged in. `voxels` arrives all-air and is filled in place.
pub struct PageInContext<'a> {
    pub coord: ChunkCoord,
    pub region: Region,
    pub voxels: &'a mut [Voxel],
    pub cancel: Option<&'a CancelToken>,
}

impl PageInContext<'_> {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }
}

/// Chunk leaving the resident set. The borrow ends when `page_out` returns.
pub struct PageOutContext<'a> {
    pub coord: ChunkCoord,
    pub region: Region,
    pub voxels: &'a [Voxel],
    /// Set when the data differs from what persistent storage holds.
    pub dirty: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageInOutcome {
    /// Restored from storage; identical to the persisted copy.
    Loaded,
    /// Freshly produced; not yet persisted anywhere.
    Generated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageOutcome {
    Persisted,
    Discarded,
}

/// Strategy the volume calls on chunk miss and on eviction.
pub trait Pager: Send + Sync {
    fn page_in(&self, ctx: &mut PageInContext<'_>) -> Result<PageInOutcome, PageError>;
    fn page_out(&self, ctx: &PageOutContext<'_>) -> Result<PageOutcome, PageError>;
}

/// Default pager: restores persisted chunks, generates the rest, and
/// persists dirty chunks on the way out while persistence is enabled.
pub struct WorldPager {
    persister: Arc<dyn Persister>,
    generator: Arc<dyn Generator>,
    gen_ctx: GenContext,
    persist: AtomicBool,
}

impl WorldPager {
    pub fn new(
        persister: Arc<dyn Persister>,
        generator: Arc<dyn Generator>,
        gen_ctx: GenContext,
        persist: bool,
    ) -> Self {
        Self {
            persister,
            generator,
            gen_ctx,
            persist: AtomicBool::new(persist),
        }
    }

    pub fn set_persist(&self, persist: bool) {
        self.persist.store(persist, Ordering::Relaxed);
    }

    pub fn persist(&self) -> bool {
        self.persist.load(Ordering::Relaxed)
    }

    pub fn gen_ctx(&self) -> &GenContext {
        &self.gen_ctx
    }
}

impl Pager for WorldPager {
    fn page_in(&self, ctx: &mut PageInContext<'_>) -> Result<PageInOutcome, PageError> {
        if self.persist() {
            let name = chunk_file_name(ctx.coord);
            if let Some(bytes) = self.persister.read(&name)? {
                decode_chunk(&bytes, ctx.region.width(), ctx.voxels)?;
                log::trace!(target: "pager", "loaded {name}");
                return Ok(PageInOutcome::Loaded);
            }
        }
        generate_chunk(self.generator.as_ref(), &self.gen_ctx, ctx)?;
        Ok(PageInOutcome::Generated)
    }

    fn page_out(&self, ctx: &PageOutContext<'_>) -> Result<PageOutcome, PageError> {
        if !self.persist() || !ctx.dirty {
            return Ok(PageOutcome::Discarded);
        }
        let name = chunk_file_name(ctx.coord);
        let bytes = encode_chunk(ctx.voxels, ctx.region.width());
        self.persister.write(&name, &bytes)?;
        log::trace!(target: "pager", "persisted {name} ({} bytes)", bytes.len());
        Ok(PageOutcome::Persisted)
    }
}
