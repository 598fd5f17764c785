//! Flattening of structured section items into the free text kept alongside them.

use crate::models::resume::SectionItem;

const ITEM_SEPARATOR: &str = "\n---\n";

/// One line per item; missing fields render as empty strings.
pub fn flatten_item(item: &SectionItem) -> String {
    let field = |value: &Option<String>| value.as_deref().unwrap_or("").to_string();
    format!(
        "Title: {}, SubTitle: {}, Period: {} - {}, Description: {}",
        field(&item.title),
        field(&item.sub_title),
        field(&item.start_date),
        field(&item.end_date),
        field(&item.description),
    )
}

pub fn flatten_items(items: &[SectionItem]) -> String {
    items
        .iter()
        .map(flatten_item)
        .collect::<Vec<_>>()
        .join(ITEM_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, description: Option<&str>) -> SectionItem {
        SectionItem {
            title: Some(title.to_string()),
            sub_title: Some("Backend Engineer".to_string()),
            start_date: Some("2021-03".to_string()),
            end_date: Some("2023-08".to_string()),
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn test_flatten_single_item() {
        let text = flatten_items(&[item("Acme", Some("Built the billing service"))]);
        assert_eq!(
            text,
            "Title: Acme, SubTitle: Backend Engineer, Period: 2021-03 - 2023-08, Description: Built the billing service"
        );
    }

    #[test]
    fn test_missing_fields_render_empty() {
        let text = flatten_item(&SectionItem::default());
        assert_eq!(text, "Title: , SubTitle: , Period:  - , Description: ");
    }

    #[test]
    fn test_items_joined_with_separator() {
        let text = flatten_items(&[item("Acme", None), item("Globex", None)]);
        let parts: Vec<&str> = text.split("\n---\n").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("Title: Acme"));
        assert!(parts[1].starts_with("Title: Globex"));
    }

    #[test]
    fn test_no_items_is_empty_text() {
        assert_eq!(flatten_items(&[]), "");
    }
}
