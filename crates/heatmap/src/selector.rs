//! Selector Builder
//!
//! Turns one serialized element description into the CSS fragment used
//! to find it again in the live document. Pure and deterministic; the
//! resolver decides whether the result is specific enough to trust.

use crate::types::ElementDescription;
use std::fmt::Write as _;

/// Derive a selector fragment for a single element description.
///
/// Output shape: `tag#id.class[href="…"]:nth-child(n):nth-of-type(n)[data-attr="…"]`,
/// with each piece present only when the description carries it. Always
/// syntactically valid, even for descriptions with nothing but a tag.
pub fn build_selector(desc: &ElementDescription) -> String {
    let mut selector = String::new();

    if !desc.tag_name.is_empty() {
        selector.push_str(&desc.tag_name.to_ascii_lowercase());
    }
    if let Some(id) = nonempty(&desc.attr_id) {
        if is_css_identifier(id) {
            let _ = write!(selector, "#{id}");
        } else {
            let _ = write!(selector, "[id=\"{}\"]", escape_attr_value(id));
        }
    }
    if let Some(classes) = &desc.attr_class {
        for class in classes.iter().filter(|c| !c.is_empty()) {
            let _ = write!(selector, ".{class}");
        }
    }
    if let Some(href) = nonempty(&desc.href) {
        let _ = write!(selector, "[href=\"{}\"]", escape_attr_value(href));
    }
    if let Some(n) = desc.nth_child {
        let _ = write!(selector, ":nth-child({n})");
    }
    if let Some(n) = desc.nth_of_type {
        let _ = write!(selector, ":nth-of-type({n})");
    }
    if let Some(value) = desc.data_attr() {
        let _ = write!(selector, "[data-attr=\"{}\"]", escape_attr_value(value));
    }

    selector
}

/// The "too simple selector, bail" rule.
///
/// A leaf description with a tag but no class, id, href or text, sitting
/// at position 1 of 1 and carrying no data-attr marker, matches things
/// like a lone `svg` inside a button. Accepting it would attach counts
/// to the wrong node, so the resolver keeps refining instead. The exact
/// threshold is deliberate; downstream rendering depends on it.
pub fn is_too_generic(desc: &ElementDescription) -> bool {
    // The class check is on field presence, not contents: a recorded
    // class list counts as distinguishing even when it is empty.
    !desc.tag_name.is_empty()
        && desc.attr_class.is_none()
        && nonempty(&desc.attr_id).is_none()
        && nonempty(&desc.href).is_none()
        && nonempty(&desc.text).is_none()
        && desc.nth_child == Some(1)
        && desc.nth_of_type == Some(1)
        && desc.data_attr().is_none()
}

fn nonempty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn is_css_identifier(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit() || c == '-')
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn escape_attr_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DATA_ATTR_KEY;

    fn desc(tag: &str) -> ElementDescription {
        ElementDescription {
            tag_name: tag.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_tag_only() {
        assert_eq!(build_selector(&desc("DIV")), "div");
    }

    #[test]
    fn test_all_pieces() {
        let mut d = desc("a");
        d.attr_id = Some("buy".to_string());
        d.attr_class = Some(vec!["btn".to_string(), "".to_string(), "primary".to_string()]);
        d.href = Some("/checkout".to_string());
        d.nth_child = Some(2);
        d.nth_of_type = Some(1);
        d.attributes
            .insert(DATA_ATTR_KEY.to_string(), "checkout".to_string());

        assert_eq!(
            build_selector(&d),
            r#"a#buy.btn.primary[href="/checkout"]:nth-child(2):nth-of-type(1)[data-attr="checkout"]"#
        );
    }

    #[test]
    fn test_awkward_id_uses_attribute_form() {
        let mut d = desc("div");
        d.attr_id = Some("user:42".to_string());
        assert_eq!(build_selector(&d), r#"div[id="user:42"]"#);
    }

    #[test]
    fn test_href_value_is_escaped() {
        let mut d = desc("a");
        d.href = Some(r#"/q?name="x""#.to_string());
        assert_eq!(build_selector(&d), r#"a[href="/q?name=\"x\""]"#);
    }

    #[test]
    fn test_generic_leaf_detected() {
        let mut d = desc("svg");
        d.nth_child = Some(1);
        d.nth_of_type = Some(1);
        assert!(is_too_generic(&d));

        // any distinguishing feature flips it
        d.attributes
            .insert(DATA_ATTR_KEY.to_string(), "icon".to_string());
        assert!(!is_too_generic(&d));
    }

    #[test]
    fn test_empty_class_list_is_not_generic() {
        // presence of the class field is what counts, even when the
        // recorded list is empty
        let mut d = desc("svg");
        d.nth_child = Some(1);
        d.nth_of_type = Some(1);
        d.attr_class = Some(vec![]);
        assert!(!is_too_generic(&d));

        d.attr_class = Some(vec![String::new()]);
        assert!(!is_too_generic(&d));
    }

    #[test]
    fn test_unknown_position_is_not_generic() {
        // nth positions must be exactly 1; missing does not count
        let d = desc("svg");
        assert!(!is_too_generic(&d));
    }

    #[test]
    fn test_generic_selector_is_still_valid() {
        let mut d = desc("svg");
        d.nth_child = Some(1);
        d.nth_of_type = Some(1);
        assert_eq!(build_selector(&d), "svg:nth-child(1):nth-of-type(1)");
        assert!(dom::Selector::parse(&build_selector(&d)).is_ok());
    }
}
