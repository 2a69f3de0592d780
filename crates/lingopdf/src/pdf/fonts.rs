//! Resolution of OCR-reported font families onto the standard 14 fonts.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::types::{FontStyle, FontWeight};

/// A font family resolved to a standard-14 base font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedFont {
    /// PDF base font name, e.g. `Helvetica-BoldOblique`.
    pub base_font: &'static str,
    /// The requested family was unknown and fell back to Helvetica.
    pub is_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StandardFamily {
    Helvetica,
    Times,
    Courier,
    Symbol,
    ZapfDingbats,
}

/// Family aliases seen in OCR output, lowercased.
static FAMILY_ALIASES: Lazy<HashMap<&'static str, StandardFamily>> = Lazy::new(|| {
    HashMap::from([
        ("helvetica", StandardFamily::Helvetica),
        ("arial", StandardFamily::Helvetica),
        ("liberation sans", StandardFamily::Helvetica),
        ("dejavu sans", StandardFamily::Helvetica),
        ("verdana", StandardFamily::Helvetica),
        ("times", StandardFamily::Times),
        ("times new roman", StandardFamily::Times),
        ("times-roman", StandardFamily::Times),
        ("liberation serif", StandardFamily::Times),
        ("georgia", StandardFamily::Times),
        ("garamond", StandardFamily::Times),
        ("courier", StandardFamily::Courier),
        ("courier new", StandardFamily::Courier),
        ("liberation mono", StandardFamily::Courier),
        ("consolas", StandardFamily::Courier),
        ("monaco", StandardFamily::Courier),
        ("symbol", StandardFamily::Symbol),
        ("zapfdingbats", StandardFamily::ZapfDingbats),
    ])
});

/// Map a family name plus weight/style onto a standard-14 base font.
///
/// Unknown families fall back to the Helvetica variant matching the
/// requested weight and style; the caller records the fallback event.
pub fn resolve(family: &str, weight: FontWeight, style: FontStyle) -> ResolvedFont {
    let key = family.trim().to_lowercase();
    let (known, resolved_family) = match FAMILY_ALIASES.get(key.as_str()) {
        Some(f) => (true, *f),
        None => (false, StandardFamily::Helvetica),
    };

    let base_font = variant_name(resolved_family, weight, style);
    ResolvedFont {
        base_font,
        is_fallback: !known,
    }
}

fn variant_name(family: StandardFamily, weight: FontWeight, style: FontStyle) -> &'static str {
    let bold = weight == FontWeight::Bold;
    let italic = style == FontStyle::Italic;
    match family {
        StandardFamily::Helvetica => match (bold, italic) {
            (true, true) => "Helvetica-BoldOblique",
            (true, false) => "Helvetica-Bold",
            (false, true) => "Helvetica-Oblique",
            (false, false) => "Helvetica",
        },
        StandardFamily::Times => match (bold, italic) {
            (true, true) => "Times-BoldItalic",
            (true, false) => "Times-Bold",
            (false, true) => "Times-Italic",
            (false, false) => "Times-Roman",
        },
        StandardFamily::Courier => match (bold, italic) {
            (true, true) => "Courier-BoldOblique",
            (true, false) => "Courier-Bold",
            (false, true) => "Courier-Oblique",
            (false, false) => "Courier",
        },
        // Symbol fonts have no weight/style variants.
        StandardFamily::Symbol => "Symbol",
        StandardFamily::ZapfDingbats => "ZapfDingbats",
    }
}
