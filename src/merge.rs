use crate::types::{Checks, Item};

/// Appends alert-sourced items after the natively probed ones.
///
/// Native items always come first and nothing is deduplicated across the two
/// sources; the count is computed over the merged list.
pub fn merge_items(native: Vec<Item>, resolved: Option<&[Item]>) -> Checks {
    let mut items = native;
    if let Some(extra) = resolved {
        items.extend_from_slice(extra);
    }
    Checks::new(items)
}
