//! Shared helpers for integration tests

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;

/// Write a minimal valid PDF with `pages` pages of `width` x `height`
/// points. Resources and media box sit on the Pages node, exercising
/// attribute inheritance the way scanner-produced files often do.
pub fn build_pdf(path: &Path, pages: usize, width: f32, height: f32) {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::new();
    for index in 0..pages {
        let text = format!("page {}", index + 1);
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Real(24.0)]),
                Operation::new("Td", vec![Object::Real(72.0), Object::Real(height - 100.0)]),
                Operation::new("Tj", vec![Object::string_literal(text.as_str())]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = pages as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(width),
                Object::Real(height),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// Extract the stamp text from each page of a written output, in page
/// order. The stamp is always the last stream in a page's content chain.
pub fn stamped_labels(path: &Path) -> Vec<String> {
    let doc = Document::load(path).unwrap();
    let mut labels = Vec::new();

    for (_number, page_id) in doc.get_pages() {
        let dict = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let last = match dict.get(b"Contents").unwrap() {
            Object::Array(items) => items.last().unwrap().clone(),
            Object::Reference(id) => Object::Reference(*id),
            other => panic!("unexpected /Contents shape: {:?}", other),
        };

        let stream = match doc.get_object(last.as_reference().unwrap()).unwrap() {
            Object::Stream(s) => s.clone(),
            other => panic!("expected content stream, got {:?}", other),
        };
        let bytes = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let content = Content::decode(&bytes).unwrap();
        for op in &content.operations {
            if op.operator == "Tj" {
                if let Object::String(text, _) = &op.operands[0] {
                    labels.push(String::from_utf8_lossy(text).to_string());
                }
            }
        }
    }
    labels
}
