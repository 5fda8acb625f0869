//! Displayable resource handles for encoded thumbnails
//!
//! Thumbnails are handed to the host as revocable handles, the way a browser
//! hands out object URLs. The table's live count is what leak checks read.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::engine::Bitmap;
use crate::error::EngineFault;

/// A revocable reference to an encoded image
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceHandle(u64);

impl ResourceHandle {
    #[must_use]
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blob:pagesurf/{}", self.0)
    }
}

struct Resource {
    mime: &'static str,
    bytes: Arc<[u8]>,
}

/// Registry of live handles
#[derive(Default)]
pub struct ResourceTable {
    next_id: u64,
    live: HashMap<u64, Resource>,
}

impl ResourceTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            live: HashMap::new(),
        }
    }

    pub fn register_png(&mut self, bytes: Vec<u8>) -> ResourceHandle {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.live.insert(
            id,
            Resource {
                mime: "image/png",
                bytes: Arc::from(bytes),
            },
        );
        ResourceHandle(id)
    }

    /// Release a handle. Revoking twice is harmless.
    pub fn revoke(&mut self, handle: ResourceHandle) -> bool {
        self.live.remove(&handle.0).is_some()
    }

    #[must_use]
    pub fn contains(&self, handle: ResourceHandle) -> bool {
        self.live.contains_key(&handle.0)
    }

    #[must_use]
    pub fn bytes(&self, handle: ResourceHandle) -> Option<Arc<[u8]>> {
        self.live.get(&handle.0).map(|r| Arc::clone(&r.bytes))
    }

    /// `data:` URL for hosts that want an inline image
    #[must_use]
    pub fn data_url(&self, handle: ResourceHandle) -> Option<String> {
        self.live
            .get(&handle.0)
            .map(|r| format!("data:{};base64,{}", r.mime, STANDARD.encode(&r.bytes)))
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

/// Encode an RGB raster as PNG
pub fn encode_png(bitmap: &Bitmap) -> Result<Vec<u8>, EngineFault> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, bitmap.width, bitmap.height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| EngineFault::generic(format!("png header: {e}")))?;
        writer
            .write_image_data(&bitmap.pixels)
            .map_err(|e| EngineFault::generic(format!("png data: {e}")))?;
        writer
            .finish()
            .map_err(|e| EngineFault::generic(format!("png finish: {e}")))?;
    }
    Ok(out)
}
