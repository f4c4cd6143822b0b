//! Page merging: compositing stamp overlays onto existing pages
//!
//! Works directly on the lopdf object graph. The original content
//! streams are never rewritten; the stamp is appended as a separate
//! stream so existing layers stay underneath and byte-identical.

use lopdf::content::Content;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::error::{Result, StampError};
use super::overlay::Overlay;

/// Cap on `/Parent` walks when resolving inherited page attributes
const INHERIT_DEPTH_LIMIT: usize = 32;

/// Resource name registered for the stamp font on each page
const FONT_RESOURCE_BASE: &str = "BStamp";

/// Effective page media box with a normalized corner order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl MediaBox {
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn origin(&self) -> (f32, f32) {
        (self.x0, self.y0)
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(v) => Some(*v as f32),
        Object::Real(v) => Some(*v),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    if let Object::Reference(id) = obj {
        if let Ok(target) = doc.get_object(*id) {
            return target;
        }
    }
    obj
}

fn media_box_from_values(doc: &Document, values: &[Object]) -> Option<MediaBox> {
    if values.len() != 4 {
        return None;
    }
    let mut n = [0f32; 4];
    for (slot, value) in n.iter_mut().zip(values) {
        *slot = number(resolve(doc, value))?;
    }
    // Corner order is not guaranteed by the format
    let (x0, x1) = if n[0] <= n[2] { (n[0], n[2]) } else { (n[2], n[0]) };
    let (y0, y1) = if n[1] <= n[3] { (n[1], n[3]) } else { (n[3], n[1]) };
    Some(MediaBox { x0, y0, x1, y1 })
}

/// Resolve a page's media box, honoring `/Parent` inheritance
///
/// # Arguments
/// * `doc` - Parsed document
/// * `page_id` - Object id of the page, as returned by `get_pages`
///
/// # Returns
/// The effective box, or a `Document` error when none is declared
pub fn effective_media_box(doc: &Document, page_id: ObjectId) -> Result<MediaBox> {
    let mut current = page_id;
    for _ in 0..INHERIT_DEPTH_LIMIT {
        let dict = doc.get_object(current)?.as_dict()?;
        if let Ok(obj) = dict.get(b"MediaBox") {
            let parsed = match resolve(doc, obj) {
                Object::Array(items) => media_box_from_values(doc, items),
                _ => None,
            };
            return parsed.ok_or_else(|| {
                StampError::Document(format!("object {} has a malformed MediaBox", current.0))
            });
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(id)) => current = *id,
            _ => break,
        }
    }
    Err(StampError::Document(format!(
        "page object {} has no MediaBox",
        page_id.0
    )))
}

/// Stamps pages of one open document
///
/// Construction registers the shared stamp font plus a pair of tiny
/// `q`/`Q` guard streams. Each `stamp_page` call wraps the page's
/// original content in the guards (so unbalanced graphics state in the
/// original cannot displace the stamp) and appends one stamp stream:
/// `/Contents` becomes `[q, original..., Q, stamp]`. Page dimensions and
/// `/Rotate` are left untouched.
pub struct DocumentStamper<'a> {
    doc: &'a mut Document,
    font_id: ObjectId,
    push_id: ObjectId,
    pop_id: ObjectId,
}

impl<'a> DocumentStamper<'a> {
    pub fn new(doc: &'a mut Document) -> Self {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let push_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let pop_id = doc.add_object(Stream::new(dictionary! {}, b"Q\n".to_vec()));
        DocumentStamper {
            doc,
            font_id,
            push_id,
            pop_id,
        }
    }

    /// Composite one overlay onto one page
    ///
    /// # Arguments
    /// * `page_id` - Page to stamp
    /// * `overlay` - Rendered stamp, sized for this exact page
    /// * `media_box` - The page's effective media box
    ///
    /// # Returns
    /// `Merge` error when the overlay was rendered for different
    /// dimensions than the page actually has
    pub fn stamp_page(
        &mut self,
        page_id: ObjectId,
        overlay: &Overlay,
        media_box: MediaBox,
    ) -> Result<()> {
        if (overlay.width - media_box.width()).abs() > 0.1
            || (overlay.height - media_box.height()).abs() > 0.1
        {
            return Err(StampError::Merge(format!(
                "overlay sized {}x{} but page is {}x{}",
                overlay.width,
                overlay.height,
                media_box.width(),
                media_box.height()
            )));
        }

        let font_name = self.ensure_page_font(page_id)?;

        let ops = overlay.content_ops(&font_name, media_box.origin());
        let encoded = Content { operations: ops }.encode()?;
        let stamp_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, encoded));

        self.append_to_contents(page_id, stamp_id)
    }

    /// Rebuild `/Contents` as `[q-guard, original..., Q-guard, stamp]`
    fn append_to_contents(&mut self, page_id: ObjectId, stamp_id: ObjectId) -> Result<()> {
        let existing = {
            let dict = self.doc.get_object(page_id)?.as_dict()?;
            dict.get(b"Contents").ok().cloned()
        };

        let mut chain: Vec<Object> = Vec::new();
        match existing {
            Some(Object::Reference(id)) => {
                // The reference may name a single stream or a whole content
                // array; inline the array so every element of the rebuilt
                // /Contents still resolves to a stream.
                let target = self.doc.get_object(id).ok().cloned();
                chain.push(self.push_id.into());
                match target {
                    Some(Object::Array(items)) => chain.extend(items),
                    _ => chain.push(id.into()),
                }
                chain.push(self.pop_id.into());
            }
            Some(Object::Array(items)) => {
                chain.push(self.push_id.into());
                chain.extend(items);
                chain.push(self.pop_id.into());
            }
            Some(Object::Stream(stream)) => {
                // Direct stream value; hoist it so it can sit in the array
                let id = self.doc.add_object(Object::Stream(stream));
                chain.push(self.push_id.into());
                chain.push(id.into());
                chain.push(self.pop_id.into());
            }
            None => {
                // Blank page: the stamp becomes the only content
            }
            Some(_) => {
                return Err(StampError::Document(format!(
                    "page object {} has an unsupported /Contents structure",
                    page_id.0
                )));
            }
        }
        chain.push(stamp_id.into());

        let dict = self.doc.get_object_mut(page_id)?.as_dict_mut()?;
        dict.set("Contents", Object::Array(chain));
        Ok(())
    }

    /// Register the stamp font in this page's resources
    ///
    /// Inherited or shared resource dictionaries are cloned onto the page
    /// before editing, so sibling pages never see the change. Returns the
    /// resource name the page's content can select the font by.
    fn ensure_page_font(&mut self, page_id: ObjectId) -> Result<String> {
        let mut resources = self.effective_resources(page_id)?;

        let mut fonts = match resources.get(b"Font") {
            Ok(Object::Dictionary(existing)) => existing.clone(),
            Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                Ok(Object::Dictionary(existing)) => existing.clone(),
                _ => Dictionary::new(),
            },
            _ => Dictionary::new(),
        };

        // Pick a name the document is not already using
        let mut name = FONT_RESOURCE_BASE.to_string();
        let mut counter = 0u32;
        loop {
            match fonts.get(name.as_bytes()) {
                Ok(Object::Reference(id)) if *id == self.font_id => break,
                Ok(_) => {
                    name = format!("{}{}", FONT_RESOURCE_BASE, counter);
                    counter += 1;
                }
                Err(_) => {
                    fonts.set(name.clone(), self.font_id);
                    break;
                }
            }
        }

        resources.set("Font", Object::Dictionary(fonts));
        let dict = self.doc.get_object_mut(page_id)?.as_dict_mut()?;
        dict.set("Resources", Object::Dictionary(resources));
        Ok(name)
    }

    /// The resource dictionary this page effectively sees, as a clone
    fn effective_resources(&self, page_id: ObjectId) -> Result<Dictionary> {
        let mut current = page_id;
        for _ in 0..INHERIT_DEPTH_LIMIT {
            let dict = self.doc.get_object(current)?.as_dict()?;
            if let Ok(obj) = dict.get(b"Resources") {
                return Ok(match resolve(self.doc, obj) {
                    Object::Dictionary(existing) => existing.clone(),
                    _ => Dictionary::new(),
                });
            }
            match dict.get(b"Parent") {
                Ok(Object::Reference(id)) => current = *id,
                _ => break,
            }
        }
        Ok(Dictionary::new())
    }
}
