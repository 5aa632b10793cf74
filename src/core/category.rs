use serde::{Deserialize, Serialize};

use super::article::ArticleId;
use super::query::Query;

/// Curated topical grouping of articles, triggered by keyword presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    /// Optional heading printed above the category's articles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    pub keywords: Vec<String>,
    pub articles: Vec<ArticleId>,
}

impl Category {
    pub fn new<K, A>(name: impl Into<String>, keywords: K, articles: A) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
        A: IntoIterator<Item = ArticleId>,
    {
        Self {
            name: name.into(),
            heading: None,
            keywords: keywords
                .into_iter()
                .map(|k| k.into().trim().to_lowercase())
                .collect(),
            articles: articles.into_iter().collect(),
        }
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }

    pub fn matches(&self, query: &Query) -> bool {
        query.contains_any(&self.keywords)
    }

    /// Configured identifiers in ascending numeric order, deduplicated.
    pub fn ordered_articles(&self) -> Vec<ArticleId> {
        let mut ids = self.articles.clone();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Citizenship provisions, Part II of the Constitution of India.
pub fn default_categories() -> Vec<Category> {
    let ids = (5..=11).filter_map(|n: u32| ArticleId::parse(&n.to_string()));
    vec![Category::new("citizenship", ["citizenship", "citizen", "migrant"], ids)
        .with_heading("Citizenship Articles (Part II of Indian Constitution)")]
}

/// First configured category whose keywords occur in the query.
pub fn match_category<'a>(categories: &'a [Category], query: &Query) -> Option<&'a Category> {
    categories.iter().find(|c| c.matches(query))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<ArticleId> {
        raw.iter().map(|s| ArticleId::parse(s).unwrap()).collect()
    }

    #[test]
    fn test_default_citizenship() {
        let categories = default_categories();
        assert_eq!(categories.len(), 1);
        let citizenship = &categories[0];
        assert_eq!(citizenship.name, "citizenship");
        assert_eq!(
            citizenship.ordered_articles(),
            ids(&["5", "6", "7", "8", "9", "10", "11"])
        );
    }

    #[test]
    fn test_keywords_are_normalized() {
        let category = Category::new("rights", [" Equality ", "LIBERTY"], ids(&["14"]));
        assert_eq!(category.keywords, vec!["equality", "liberty"]);
        assert!(category.matches(&Query::parse("Is there a right to liberty?").unwrap()));
    }

    #[test]
    fn test_ordered_articles_sorts_numerically() {
        let category = Category::new("mixed", ["x"], ids(&["11", "5", "21A", "21", "5"]));
        assert_eq!(category.ordered_articles(), ids(&["5", "11", "21", "21A"]));
    }

    #[test]
    fn test_first_matching_category_wins() {
        let categories = vec![
            Category::new("citizenship", ["citizen"], ids(&["5"])),
            Category::new("migration", ["migrant", "citizen"], ids(&["9"])),
        ];

        let q = Query::parse("rights of a migrant citizen").unwrap();
        assert_eq!(match_category(&categories, &q).unwrap().name, "citizenship");

        let q = Query::parse("banana recipe").unwrap();
        assert!(match_category(&categories, &q).is_none());
    }
}
