//! Page resource lookup and font registration.
//!
//! PDF pages can have Resources as:
//! - An inline dictionary: `/Resources << /Font << ... >> >>`
//! - An indirect reference: `/Resources 5 0 R`
//! - Inherited from a parent Pages node

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId};

use super::source_font::{SourceFont, resolve};
use crate::error::{Error, Result};

/// Depth limit when walking up the Pages tree, guarding against
/// circular Parent references.
const MAX_INHERIT_DEPTH: usize = 10;

/// Resolve the Resources dictionary for a page, handling indirect references
/// and inheritance from parent Pages nodes. Returns an empty dictionary when
/// the page has none.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| Error::DocumentCorrupt(format!("failed to get page: {e}")))?;

    if let Ok(res_obj) = page.get(b"Resources")
        && let Some(dict) = resolve_dict(doc, res_obj)
    {
        return Ok(dict.clone());
    }

    let mut parent = page.get(b"Parent").ok();
    for _ in 0..MAX_INHERIT_DEPTH {
        let Some(Object::Reference(parent_id)) = parent else {
            break;
        };
        let Ok(node) = doc.get_dictionary(*parent_id) else {
            break;
        };
        if let Ok(res_obj) = node.get(b"Resources")
            && let Some(dict) = resolve_dict(doc, res_obj)
        {
            return Ok(dict.clone());
        }
        parent = node.get(b"Parent").ok();
    }

    Ok(Dictionary::new())
}

fn resolve_dict<'d>(doc: &'d Document, obj: &'d Object) -> Option<&'d Dictionary> {
    resolve(doc, obj).and_then(|o| o.as_dict().ok())
}

/// The `/Font` sub-dictionary of a resources dictionary.
fn font_dict(doc: &Document, resources: &Dictionary) -> Dictionary {
    resources
        .get(b"Font")
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
        .cloned()
        .unwrap_or_default()
}

/// Load every font the page's resources name, keyed by resource name.
pub fn page_fonts(doc: &Document, page_id: ObjectId) -> Result<HashMap<Vec<u8>, SourceFont>> {
    let resources = page_resources(doc, page_id)?;
    let fonts = font_dict(doc, &resources);
    Ok(fonts
        .iter()
        .filter_map(|(name, obj)| {
            let dict = resolve_dict(doc, obj)?;
            Some((name.clone(), SourceFont::load(doc, dict)))
        })
        .collect())
}

/// Make `font_id` available to the page under a name starting with
/// `preferred`, returning the name used.
///
/// An existing entry that already points at `font_id` is reused. The page's
/// resources are written back inline, so a Resources dictionary shared with
/// other pages is never modified.
pub fn register_font(doc: &mut Document, page_id: ObjectId, preferred: &str, font_id: ObjectId) -> Result<String> {
    let mut resources = page_resources(doc, page_id)?;
    let mut fonts = font_dict(doc, &resources);

    let existing = fonts.iter().find_map(|(name, obj)| match obj {
        Object::Reference(id) if *id == font_id => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    });
    if let Some(name) = existing {
        return Ok(name);
    }

    let mut name = preferred.to_string();
    let mut suffix = 1;
    while fonts.has(name.as_bytes()) {
        name = format!("{preferred}{suffix}");
        suffix += 1;
    }

    fonts.set(name.as_bytes().to_vec(), Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| Error::DocumentCorrupt(format!("failed to get page: {e}")))?;
    if let Object::Dictionary(page_dict) = page {
        page_dict.set("Resources", Object::Dictionary(resources));
    }

    Ok(name)
}
