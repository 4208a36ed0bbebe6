use scraper::{ElementRef, Html};

use crate::error::{Result, ScrapeError};

/// Remove the elements with the given ids (subtrees included) from a bill page
/// and return the re-serialized document.
pub fn strip_detail_sections<S: AsRef<str>>(html: &str, ids: &[S]) -> Result<String> {
    let mut doc = Html::parse_document(html);

    for id in ids {
        let id = id.as_ref();
        let node_id = doc
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().id() == Some(id))
            .map(|e| e.id())
            .ok_or_else(|| ScrapeError::DetailSectionMissing(id.to_string()))?;

        if let Some(mut node) = doc.tree.get_mut(node_id) {
            node.detach();
        }
    }

    Ok(doc.html())
}
