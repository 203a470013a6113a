use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::ads::{Ad, Category, City};
use crate::config::Language;

mod history;

pub use history::{SearchHistory, HISTORY_LIMIT};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SortMode {
    /// Repository order, which is newest first.
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CityFilter {
    #[default]
    All,
    Only(City),
}

impl CityFilter {
    /// Resolves user input against the active language. Only that language's
    /// "all cities" label means no filter; city codes and labels are accepted as-is.
    pub fn parse(input: &str, lang: Language) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Some(CityFilter::All);
        }
        if trimmed.to_lowercase() == lang.strings().all_cities.to_lowercase() {
            return Some(CityFilter::All);
        }
        City::parse(trimmed).map(CityFilter::Only)
    }

    pub fn label(&self, lang: Language) -> &'static str {
        match self {
            CityFilter::All => lang.strings().all_cities,
            CityFilter::Only(city) => city.label(lang),
        }
    }

    fn matches(&self, city: City) -> bool {
        match self {
            CityFilter::All => true,
            CityFilter::Only(wanted) => *wanted == city,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub query: String,
    pub category: Option<Category>,
    pub city: CityFilter,
    pub sort: SortMode,
}

impl SearchFilter {
    pub fn is_unfiltered(&self) -> bool {
        self.query.is_empty() && self.category.is_none() && self.city == CityFilter::All
    }

    pub fn matches(&self, ad: &Ad, needle: &str) -> bool {
        let text = needle.is_empty()
            || ad.title.to_lowercase().contains(needle)
            || ad.description.to_lowercase().contains(needle);
        let category = self.category.map_or(true, |wanted| wanted == ad.category);
        text && category && self.city.matches(ad.city)
    }
}

/// Filters `ads` with `filter` and orders the survivors by its sort mode.
/// The input slice is left untouched.
pub fn filter_ads(ads: &[Ad], filter: &SearchFilter) -> Vec<Ad> {
    let needle = filter.query.to_lowercase();
    let mut results: Vec<Ad> = ads
        .iter()
        .filter(|ad| filter.matches(ad, &needle))
        .cloned()
        .collect();
    sort_ads(&mut results, filter.sort);
    results
}

/// Stable: equal prices keep their relative order.
pub fn sort_ads(ads: &mut [Ad], mode: SortMode) {
    match mode {
        SortMode::Newest => {}
        SortMode::PriceAsc => ads.sort_by(|a, b| compare_price(a, b)),
        SortMode::PriceDesc => ads.sort_by(|a, b| compare_price(b, a)),
    }
}

fn compare_price(a: &Ad, b: &Ad) -> Ordering {
    a.price.total_cmp(&b.price)
}

/// Count of ads per category in declaration order, zero counts included.
pub fn category_counts(ads: &[Ad]) -> IndexMap<Category, usize> {
    let mut counts: IndexMap<Category, usize> =
        Category::iter().map(|category| (category, 0)).collect();
    for ad in ads {
        if let Some(count) = counts.get_mut(&ad.category) {
            *count += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::seed_ads;
    use std::str::FromStr;

    fn priced(id: &str, price: f64) -> Ad {
        let mut ad = seed_ads().remove(0);
        ad.id = id.into();
        ad.price = price;
        ad
    }

    fn ids(ads: &[Ad]) -> Vec<&str> {
        ads.iter().map(|ad| ad.id.as_str()).collect()
    }

    #[test]
    fn empty_filter_is_identity() {
        let ads = vec![priced("a", 3.0), priced("b", 1.0), priced("c", 2.0)];
        let results = filter_ads(&ads, &SearchFilter::default());
        assert_eq!(results, ads);
    }

    #[test]
    fn price_sorts_are_monotonic_and_stable() {
        let ads = vec![
            priced("a", 50.0),
            priced("b", 10.0),
            priced("c", 50.0),
            priced("d", 0.0),
            priced("e", 10.0),
        ];
        let mut filter = SearchFilter {
            sort: SortMode::PriceAsc,
            ..SearchFilter::default()
        };
        let asc = filter_ads(&ads, &filter);
        assert_eq!(ids(&asc), vec!["d", "b", "e", "a", "c"]);

        filter.sort = SortMode::PriceDesc;
        let desc = filter_ads(&ads, &filter);
        assert_eq!(ids(&desc), vec!["a", "c", "b", "e", "d"]);
        assert_eq!(ids(&ads), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn seed_prices_sort_both_ways() {
        let ads = seed_ads();
        let mut filter = SearchFilter {
            sort: SortMode::PriceAsc,
            ..SearchFilter::default()
        };
        let prices: Vec<f64> = filter_ads(&ads, &filter).iter().map(|ad| ad.price).collect();
        assert_eq!(prices, vec![12500.0, 340000.0]);

        filter.sort = SortMode::PriceDesc;
        let prices: Vec<f64> = filter_ads(&ads, &filter).iter().map(|ad| ad.price).collect();
        assert_eq!(prices, vec![340000.0, 12500.0]);
    }

    #[test]
    fn query_matches_title_case_insensitively() {
        let ads = seed_ads();
        for query in ["iphone", "IPHONE", "iPhone"] {
            let filter = SearchFilter {
                query: query.into(),
                ..SearchFilter::default()
            };
            let results = filter_ads(&ads, &filter);
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].title, "iPhone 15 Pro Max 256GB");
        }
    }

    #[test]
    fn query_matches_description() {
        let filter = SearchFilter {
            query: "КОМПЛЕКТАЦИЯ".into(),
            ..SearchFilter::default()
        };
        let results = filter_ads(&seed_ads(), &filter);
        assert_eq!(ids(&results), vec!["2"]);
    }

    #[test]
    fn category_and_city_combine_with_and() {
        let ads = seed_ads();
        let filter = SearchFilter {
            category: Some(Category::Auto),
            city: CityFilter::Only(City::Dushanbe),
            ..SearchFilter::default()
        };
        assert!(filter_ads(&ads, &filter).is_empty());

        let filter = SearchFilter {
            category: Some(Category::Auto),
            city: CityFilter::Only(City::Khujand),
            ..SearchFilter::default()
        };
        assert_eq!(ids(&filter_ads(&ads, &filter)), vec!["2"]);
    }

    #[test]
    fn all_cities_label_depends_on_language() {
        assert_eq!(
            CityFilter::parse("Все города", Language::Ru),
            Some(CityFilter::All)
        );
        assert_eq!(
            CityFilter::parse("Ҳамаи шаҳрҳо", Language::Tg),
            Some(CityFilter::All)
        );
        assert_eq!(CityFilter::parse("Ҳамаи шаҳрҳо", Language::Ru), None);
        assert_eq!(
            CityFilter::parse("Худжанд", Language::Tg),
            Some(CityFilter::Only(City::Khujand))
        );
        assert_eq!(CityFilter::All.label(Language::Tg), "Ҳамаи шаҳрҳо");
    }

    #[test]
    fn sort_mode_uses_kebab_case_names() {
        assert_eq!(SortMode::from_str("price-desc").ok(), Some(SortMode::PriceDesc));
        assert_eq!(SortMode::PriceAsc.to_string(), "price-asc");
    }

    #[test]
    fn category_counts_cover_every_category() {
        let counts = category_counts(&seed_ads());
        assert_eq!(counts.len(), Category::iter().count());
        assert_eq!(counts[&Category::Electronics], 1);
        assert_eq!(counts[&Category::Auto], 1);
        assert_eq!(counts[&Category::Jobs], 0);
        assert_eq!(counts.keys().next(), Some(&Category::RealEstate));
    }
}
