//! Link detection: URL extraction and per-site classification.

pub mod category;
pub mod extract;

pub use category::{categorize_link, Category, CategoryFlags, CategoryPatch};
pub use extract::extract_urls;

/// URLs grouped by category, in order of first appearance.
///
/// Order inside each group follows the order the URLs were posted in.
pub fn group_by_category(urls: &[String]) -> Vec<(Category, Vec<String>)> {
    let mut groups: Vec<(Category, Vec<String>)> = Vec::new();

    for url in urls {
        let category = categorize_link(url);
        match groups.iter_mut().find(|(c, _)| *c == category) {
            Some((_, group)) => group.push(url.clone()),
            None => groups.push((category, vec![url.clone()])),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_preserves_order() {
        let urls: Vec<String> = [
            "https://github.com/a",
            "https://youtu.be/1",
            "https://github.com/b",
            "https://example.com",
            "https://youtu.be/2",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let groups = group_by_category(&urls);
        assert_eq!(
            groups,
            vec![
                (
                    Category::Github,
                    vec!["https://github.com/a".to_string(), "https://github.com/b".to_string()]
                ),
                (
                    Category::Youtube,
                    vec!["https://youtu.be/1".to_string(), "https://youtu.be/2".to_string()]
                ),
                (Category::Other, vec!["https://example.com".to_string()]),
            ]
        );
    }

    #[test]
    fn test_group_empty() {
        assert!(group_by_category(&[]).is_empty());
    }
}
