use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use time::macros::datetime;
use time::OffsetDateTime;

use crate::config::locale::{category_label, city_label};
use crate::config::Language;

mod repository;

pub use repository::AdRepository;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Category {
    RealEstate,
    Auto,
    Jobs,
    Services,
    Electronics,
    Clothing,
    Animals,
    Free,
    Other,
}

impl Default for Category {
    fn default() -> Self {
        Category::Other
    }
}

impl Category {
    pub fn label(self, lang: Language) -> &'static str {
        category_label(self, lang)
    }

    /// Accepts the stable code or a label in any supported language.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if let Ok(category) = trimmed.parse::<Category>() {
            return Some(category);
        }
        let lowered = trimmed.to_lowercase();
        Category::iter().find(|category| {
            Language::iter().any(|lang| category.label(lang).to_lowercase() == lowered)
        })
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum City {
    Dushanbe,
    Khujand,
    Bokhtar,
    Kulob,
    Istaravshan,
    Tursunzoda,
    Kanibadam,
    Isfara,
}

impl Default for City {
    fn default() -> Self {
        City::Dushanbe
    }
}

impl City {
    pub fn label(self, lang: Language) -> &'static str {
        city_label(self, lang)
    }

    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if let Ok(city) = trimmed.parse::<City>() {
            return Some(city);
        }
        let lowered = trimmed.to_lowercase();
        City::iter()
            .find(|city| Language::iter().any(|lang| city.label(lang).to_lowercase() == lowered))
    }
}

/// A single listing. Never mutated after creation.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ad {
    pub id: String,
    pub title: String,
    pub price: f64,
    pub currency: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    pub city: City,
    pub image_url: String,
    pub video_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub phone: String,
    pub whatsapp: Option<String>,
    #[serde(default)]
    pub is_vip: bool,
    /// Session identity that posted the ad; only it may delete the ad.
    pub owner: Option<String>,
}

impl Ad {
    pub fn is_free(&self) -> bool {
        self.price == 0.0
    }

    pub fn whatsapp_number(&self) -> &str {
        self.whatsapp
            .as_deref()
            .filter(|number| !number.is_empty())
            .unwrap_or(&self.phone)
    }

    pub fn is_owned_by(&self, identity: Option<&str>) -> bool {
        matches!((self.owner.as_deref(), identity), (Some(owner), Some(who)) if owner == who)
    }
}

pub fn seed_ads() -> Vec<Ad> {
    vec![
        Ad {
            id: "1".into(),
            title: "iPhone 15 Pro Max 256GB".into(),
            price: 12500.0,
            currency: "TJS".into(),
            description: "Новый, запечатанный. Цвет Natural Titanium.".into(),
            category: Category::Electronics,
            city: City::Dushanbe,
            image_url: "https://picsum.photos/seed/iphone/400/300".into(),
            video_url: None,
            created_at: datetime!(2024-05-20 10:30 +05:00),
            phone: "900112233".into(),
            whatsapp: Some("900112233".into()),
            is_vip: true,
            owner: None,
        },
        Ad {
            id: "2".into(),
            title: "Toyota Camry 2022".into(),
            price: 340000.0,
            currency: "TJS".into(),
            description: "Идеальное состояние, полная комплектация.".into(),
            category: Category::Auto,
            city: City::Khujand,
            image_url: "https://picsum.photos/seed/car/400/300".into(),
            video_url: None,
            created_at: datetime!(2024-05-20 09:15 +05:00),
            phone: "900445566".into(),
            whatsapp: None,
            is_vip: false,
            owner: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_codes_and_labels() {
        assert_eq!(Category::parse("ELECTRONICS"), Some(Category::Electronics));
        assert_eq!(Category::parse("real_estate"), Some(Category::RealEstate));
        assert_eq!(Category::parse("Авто"), Some(Category::Auto));
        assert_eq!(Category::parse("мошинҳо"), Some(Category::Auto));
        assert_eq!(Category::parse("spaceships"), None);
    }

    #[test]
    fn city_parses_labels_from_either_language() {
        assert_eq!(City::parse("Худжанд"), Some(City::Khujand));
        assert_eq!(City::parse("Хуҷанд"), Some(City::Khujand));
        assert_eq!(City::parse("isfara"), Some(City::Isfara));
        assert_eq!(City::default(), City::iter().next().unwrap());
    }

    #[test]
    fn stored_form_uses_stable_codes_and_rfc3339() -> anyhow::Result<()> {
        let ad = seed_ads().remove(1);
        let json = serde_json::to_value(&ad)?;
        assert_eq!(json["category"], "AUTO");
        assert_eq!(json["city"], "KHUJAND");
        assert_eq!(json["createdAt"], "2024-05-20T09:15:00+05:00");
        assert!(json.get("whatsapp").is_none());
        assert!(json.get("videoUrl").is_none());
        Ok(())
    }

    #[test]
    fn whatsapp_falls_back_to_phone() {
        let ads = seed_ads();
        assert_eq!(ads[0].whatsapp_number(), "900112233");
        assert_eq!(ads[1].whatsapp_number(), "900445566");
    }

    #[test]
    fn ownership_requires_exact_identity() {
        let mut ad = seed_ads().remove(0);
        assert!(!ad.is_owned_by(Some("+992 900112233")));
        ad.owner = Some("+992 900112233".into());
        assert!(ad.is_owned_by(Some("+992 900112233")));
        assert!(!ad.is_owned_by(Some("+992 900112234")));
        assert!(!ad.is_owned_by(None));
    }
}
