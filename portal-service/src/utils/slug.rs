/// Derive a stable service id from an admin-entered display name.
///
/// Lowercases, maps runs of non-alphanumeric characters to single underscores,
/// and trims leading/trailing separators: "Garbage  Collection Fee" ->
/// "garbage_collection_fee". Uniqueness against the catalog is checked by the
/// settings service; this function is purely lexical.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_separator = true;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator {
            slug.push('_');
            last_was_separator = true;
        }
    }

    while slug.ends_with('_') {
        slug.pop();
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_separators() {
        assert_eq!(slugify("Garbage  Collection Fee"), "garbage_collection_fee");
        assert_eq!(slugify("Mayor's Permit (Renewal)"), "mayor_s_permit_renewal");
    }

    #[test]
    fn trims_edges() {
        assert_eq!(slugify("  Tricycle Franchise  "), "tricycle_franchise");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn keeps_digits() {
        assert_eq!(slugify("Form 137 Request"), "form_137_request");
    }
}
