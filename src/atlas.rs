use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;
use sdf_outline_renderer::{DistanceField, GlyphId};

use crate::SdfFontError;

/// Where one glyph's field lives inside an atlas, in texels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A single-channel texture holding many quantised glyph fields, ready for
/// upload.
///
/// Unused texels are 0, which is what [`clamp_to_u8`](sdf_outline_renderer::clamp_to_u8)
/// produces for "fully outside".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldAtlas {
    width: u32,
    height: u32,
    data: Vec<u8>,
    regions: BTreeMap<GlyphId, AtlasRegion>,
}

impl FieldAtlas {
    /// Packs `fields` into a `width x height` texture, leaving `padding`
    /// texels between fields and around the border.
    ///
    /// Fields are placed tallest first, so the layout only depends on the set
    /// of fields and not on their order. See
    /// [`clamp_to_u8`](sdf_outline_renderer::clamp_to_u8) for `cutoff`.
    pub fn build(
        fields: &[(GlyphId, Arc<DistanceField>)],
        width: u32,
        height: u32,
        padding: u32,
        cutoff: f64,
    ) -> Result<FieldAtlas, SdfFontError> {
        let mut order: Vec<&(GlyphId, Arc<DistanceField>)> = fields.iter().collect();
        order.sort_by(|(a_id, a), (b_id, b)| {
            b.height()
                .cmp(&a.height())
                .then(b.width().cmp(&a.width()))
                .then(a_id.cmp(b_id))
        });

        let invalid = |_| SdfFontError::InvalidAtlasSize {
            width,
            height,
            padding,
        };
        let config = rect_packer::Config {
            width: i32::try_from(width).map_err(invalid)?,
            height: i32::try_from(height).map_err(invalid)?,
            border_padding: i32::try_from(padding).map_err(invalid)?,
            rectangle_padding: i32::try_from(padding).map_err(invalid)?,
        };
        let mut packer = rect_packer::Packer::new(config);

        let mut data = vec![0u8; width as usize * height as usize];
        let mut regions = BTreeMap::new();
        for (id, field) in order {
            let full = || SdfFontError::AtlasFull {
                glyph: *id,
                width: field.width(),
                height: field.height(),
                atlas_width: width,
                atlas_height: height,
            };
            let rect = packer
                .pack(field.width() as i32, field.height() as i32, false)
                .ok_or_else(full)?;
            let region = AtlasRegion {
                x: rect.x as u32,
                y: rect.y as u32,
                width: field.width(),
                height: field.height(),
            };

            let texels = field.to_u8(cutoff)?;
            for (row, src) in texels.chunks(region.width as usize).enumerate() {
                let start = (region.y as usize + row) * width as usize + region.x as usize;
                data[start..start + src.len()].copy_from_slice(src);
            }
            regions.insert(*id, region);
        }

        debug!("Packed {} glyph fields into a {width}x{height} atlas", regions.len());
        Ok(FieldAtlas {
            width,
            height,
            data,
            regions,
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major texels, top row first.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn region(&self, id: GlyphId) -> Option<AtlasRegion> {
        self.regions.get(&id).copied()
    }

    pub fn regions(&self) -> impl Iterator<Item = (GlyphId, AtlasRegion)> + '_ {
        self.regions.iter().map(|(id, region)| (*id, *region))
    }
}
