// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF inspection using the `lopdf` crate.

use std::path::Path;

use lopdf::Document;
use tracing::debug;

/// Page count of a PDF document, or `None` when the file is not a readable
/// paginated document.
///
/// The confirmation gate only applies to documents whose page count is
/// knowable, so unreadability is not an error here.
pub fn try_page_count(path: impl AsRef<Path>) -> Option<usize> {
    let path = path.as_ref();
    match Document::load(path) {
        Ok(document) => {
            let pages = document.get_pages().len();
            debug!(path = %path.display(), pages, "PDF page count read");
            Some(pages)
        }
        Err(err) => {
            debug!(path = %path.display(), error = %err, "page count unavailable");
            None
        }
    }
}

/// Build a minimal valid PDF with the given page count. Test fixture shared
/// by this crate's modules.
#[cfg(test)]
pub(crate) fn write_test_pdf(path: &Path, pages: usize) {
    use lopdf::{Object, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
            });
            Object::Reference(page_id)
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(path).expect("save test PDF");
}
