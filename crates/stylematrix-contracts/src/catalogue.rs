use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleDescriptor {
    pub id: u32,
    pub name: String,
    pub prompt: String,
}

/// Ordered, immutable list of rendering styles.
///
/// Iteration order is the grid order: it fixes the stage-1 queue, the order
/// stage-2 jobs run in, and the cell index used when exporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleCatalogue {
    styles: Vec<StyleDescriptor>,
}

impl StyleCatalogue {
    pub fn new(styles: Vec<StyleDescriptor>) -> Result<Self, SessionError> {
        let mut seen = HashSet::new();
        for style in &styles {
            if !seen.insert(style.id) {
                return Err(SessionError::DuplicateStyle { id: style.id });
            }
        }
        Ok(Self { styles })
    }

    pub fn reference() -> Self {
        Self {
            styles: REFERENCE_STYLES
                .iter()
                .map(|(id, name, prompt)| StyleDescriptor {
                    id: *id,
                    name: name.to_string(),
                    prompt: prompt.to_string(),
                })
                .collect(),
        }
    }

    pub fn count(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn get(&self, id: u32) -> Result<&StyleDescriptor, SessionError> {
        self.styles
            .iter()
            .find(|style| style.id == id)
            .ok_or(SessionError::NotFound { id })
    }

    /// Zero-based grid position of `id`.
    pub fn position(&self, id: u32) -> Result<usize, SessionError> {
        self.styles
            .iter()
            .position(|style| style.id == id)
            .ok_or(SessionError::NotFound { id })
    }

    pub fn ids(&self) -> Vec<u32> {
        self.styles.iter().map(|style| style.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyleDescriptor> {
        self.styles.iter()
    }
}

/// Two-digit, one-based cell label (`01`, `02`, ...).
pub fn cell_label(position: usize) -> String {
    format!("{:02}", position + 1)
}

const REFERENCE_STYLES: &[(u32, &str, &str)] = &[
    (1, "Monoline Drawing", "clean monoline drawing with constant line weight"),
    (2, "Thick Outline Doodle", "bold thick outline hand-drawn doodle style"),
    (3, "Solid Silhouette", "completely solid filled silhouette shape"),
    (4, "Negative Space", "negative space cutout where the subject is the white space"),
    (5, "Geometric Grid", "geometric construction based on a mathematical grid abstraction"),
    (6, "8-Bit Pixel", "retro 8-bit pixel art style with visible blocks"),
    (7, "Mosaic Blocks", "mosaic pattern made of square blocks of varying density"),
    (8, "Halftone Dots", "classic comic book halftone dot pattern screen"),
    (9, "Airbrush Grain", "soft airbrush spray with heavy grain and stippling"),
    (10, "Pencil Sketch", "rough pencil sketch texture with graphite-like strokes"),
    (11, "Crayon Texture", "waxy crayon texture with thick rough strokes"),
    (12, "Pastel Texture", "soft powdery pastel texture with blended edges"),
    (13, "Ink Bleed", "heavy ink bleed effect with wet edges soaking into paper"),
    (14, "Paper Collage", "cut-paper collage style with sharp distinct layered edges"),
    (15, "Linocut Print", "linocut relief print style with rough hand-carved textures"),
    (16, "Rubber Stamp", "weathered rubber stamp imprint with uneven ink distribution"),
    (17, "Blueprint", "technical diagram with blueprint architectural lines"),
    (18, "Low-Poly", "low-poly wireframe 3D mesh representation"),
    (19, "Dry Brush", "dry brush painting technique with visible bristle streaks"),
    (20, "Hatching Fill", "parallel diagonal hatching line fill"),
    (21, "Scribble Fill", "chaotic scribble and tangle line fill"),
    (22, "Stripe Fill", "horizontal bold stripe fill pattern"),
    (23, "Dither Noise", "ordered dithering noise pattern from retro displays"),
    (24, "Riso Misregistration", "risograph print with two slightly offset layers"),
    (25, "Charcoal Sketch", "dark smudged charcoal drawing style"),
    (26, "Woodcut", "traditional woodcut engraving with vertical grain"),
    (27, "Stencil Art", "street art stencil style with sharp bridges"),
    (28, "Pointillism", "entirely composed of tiny distinct dots"),
    (29, "Watercolor Wash", "translucent watercolor paint wash with blooming edges"),
    (30, "Glitch Art", "digital glitch distortion with horizontal scanline shifts"),
    (31, "ASCII Art", "text-based ASCII character representation"),
    (32, "Origami Lines", "folded paper crease lines and geometric facets"),
    (33, "Neon Glow", "glowing neon tube outline effect"),
    (34, "Chalkboard", "rough chalk drawing on a textured slate background"),
    (35, "Etching", "fine line copperplate engraving style"),
    (36, "Marker Pen", "bold permanent marker sketch with felt tip texture"),
    (37, "Finger Paint", "thick smeary finger paint strokes"),
    (38, "Spray Graffiti", "spray paint graffiti with drips and overspray"),
    (39, "Batik Texture", "wax-resist batik fabric pattern with crackle lines"),
    (40, "Stitch Embroidery", "embroidered thread stitch pattern texture"),
    (41, "Topographic", "topographic contour map lines"),
    (42, "Celtic Knot", "intertwining celtic knotwork patterns"),
    (43, "Art Deco", "1920s Art Deco geometric elegance"),
    (44, "Bauhaus", "minimalist Bauhaus school abstract shapes"),
    (45, "Swiss Graphic", "clean mid-century Swiss international typographic style"),
    (46, "Pop Art", "bold pop art graphics with heavy ben-day dots"),
    (47, "Brutalist", "raw concrete-like brutalist gritty texture"),
    (48, "Cyber Wire", "futuristic cybernetic wireframe glowing grid"),
    (49, "Bio-Organic", "fluid bio-organic curves and cellular patterns"),
    (50, "Fractal", "recursive fractal geometry patterns"),
    (51, "Spirograph", "intricate spirograph mathematical line loops"),
    (52, "Calligraphic", "elegant brush calligraphy with varying pressure"),
    (53, "Comic Inking", "classic 1950s comic book heavy ink shadows"),
    (54, "Newsprint", "grainy low-resolution newspaper print texture"),
    (55, "Sand Drawing", "grainy texture of drawing in wet sand"),
    (56, "Cross-Hatch", "dense layered cross-hatching shade"),
];
