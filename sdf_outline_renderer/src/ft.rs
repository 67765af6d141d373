use freetype::face::LoadFlag;
use freetype::outline::Curve;
use freetype::{Face, Vector};

use crate::{ContourBuilder, Glyph, GlyphId, Point, SdfGlyphError};

fn point_from_ft(v: &Vector) -> Point {
    Point::new(v.x as f64, v.y as f64)
}

/// Loads the vector outline for `char_code` from a FreeType face.
///
/// The outline is loaded unscaled and unhinted, so coordinates (and the
/// advance) are in font units. Any face FreeType can open works, whether its
/// outlines are quadratic (TrueType) or cubic (CFF).
pub fn glyph_from_face(face: &Face, char_code: u32) -> Result<Glyph, SdfGlyphError> {
    let glyph_index = face.get_char_index(char_code as usize);
    if glyph_index == 0 {
        // See also https://github.com/PistonDevelopers/freetype-rs/pull/252
        return Err(SdfGlyphError::FreeTypeError(
            freetype::Error::InvalidGlyphIndex,
        ));
    }

    face.load_glyph(glyph_index, LoadFlag::NO_SCALE | LoadFlag::NO_HINTING)?;

    let slot = face.glyph();
    let outline = slot.outline().ok_or(SdfGlyphError::MissingOutline)?;

    let mut builder = ContourBuilder::new();
    for contour in outline.contours_iter() {
        builder.move_to(point_from_ft(contour.start()))?;
        for curve in contour {
            match curve {
                Curve::Line(p) => builder.line_to(point_from_ft(&p))?,
                Curve::Bezier2(c, p) => builder.quad_to(point_from_ft(&c), point_from_ft(&p))?,
                Curve::Bezier3(c1, c2, p) => {
                    builder.cubic_to(point_from_ft(&c1), point_from_ft(&c2), point_from_ft(&p))?
                }
            };
        }
        builder.close()?;
    }

    Ok(Glyph::new(
        GlyphId(char_code),
        builder.finish()?,
        slot.metrics().horiAdvance as f64,
    ))
}
