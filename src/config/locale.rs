use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::ads::{Category, City};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Language {
    #[default]
    Ru,
    Tg,
}

impl Language {
    pub fn strings(self) -> &'static Strings {
        match self {
            Language::Ru => &RU,
            Language::Tg => &TG,
        }
    }

    /// Language name as written inside generation prompts.
    pub fn prompt_name(self) -> &'static str {
        match self {
            Language::Ru => "русском",
            Language::Tg => "тоҷикӣ",
        }
    }
}

/// Fixed UI strings the core needs to produce on its own.
#[derive(Debug)]
pub struct Strings {
    pub all_cities: &'static str,
    pub all_ads: &'static str,
    pub free: &'static str,
    pub found_results: &'static str,
    pub nothing_found: &'static str,
    pub ai_failed: &'static str,
    pub ai_empty: &'static str,
    pub ad_published: &'static str,
    pub ad_deleted: &'static str,
    pub delete_forbidden: &'static str,
    pub video_too_large: &'static str,
    pub login_required: &'static str,
    pub logged_in: &'static str,
    pub storage_failed: &'static str,
    pub just_now: &'static str,
    pub minutes_ago: &'static str,
    pub hours_ago: &'static str,
    pub days_ago: &'static str,
}

impl Strings {
    pub fn found(&self, count: usize) -> String {
        self.found_results.replace("{count}", &count.to_string())
    }

    /// Rejection message for a video over `limit_bytes`, rounded up to whole megabytes.
    pub fn video_limit(&self, limit_bytes: u64) -> String {
        let megabytes = limit_bytes.div_ceil(1024 * 1024);
        self.video_too_large.replace("{limit}", &megabytes.to_string())
    }
}

static RU: Strings = Strings {
    all_cities: "Все города",
    all_ads: "Все объявления",
    free: "Бесплатно",
    found_results: "Найдено {count} объявлений",
    nothing_found: "Ничего не найдено",
    ai_failed: "Произошла ошибка при генерации описания.",
    ai_empty: "Не удалось сгенерировать описание.",
    ad_published: "Объявление опубликовано",
    ad_deleted: "Объявление удалено",
    delete_forbidden: "Удалять можно только свои объявления",
    video_too_large: "Видео слишком большое (максимум {limit} МБ)",
    login_required: "Войдите, чтобы подать объявление",
    logged_in: "Вы вошли как {identity}",
    storage_failed: "Не удалось сохранить изменения",
    just_now: "Только что",
    minutes_ago: "{n} мин. назад",
    hours_ago: "{n} ч. назад",
    days_ago: "{n} дн. назад",
};

static TG: Strings = Strings {
    all_cities: "Ҳамаи шаҳрҳо",
    all_ads: "Ҳамаи эълонҳо",
    free: "Ройгон",
    found_results: "{count} эълон ёфт шуд",
    nothing_found: "Ҳеҷ чиз ёфт нашуд",
    ai_failed: "Ҳангоми тавлиди тавсиф хатогӣ рух дод.",
    ai_empty: "Тавлиди тавсиф имконнопазир шуд.",
    ad_published: "Эълон нашр шуд",
    ad_deleted: "Эълон нест карда шуд",
    delete_forbidden: "Танҳо эълонҳои худро нест карда метавонед",
    video_too_large: "Видео хеле калон аст (ҳадди аксар {limit} МБ)",
    login_required: "Барои додани эълон ворид шавед",
    logged_in: "Шумо ҳамчун {identity} ворид шудед",
    storage_failed: "Нигоҳ доштани тағйирот имконнопазир шуд",
    just_now: "Ҳозир",
    minutes_ago: "{n} дақ. пеш",
    hours_ago: "{n} соат пеш",
    days_ago: "{n} рӯз пеш",
};

pub fn category_label(category: Category, lang: Language) -> &'static str {
    use Category::*;
    match (category, lang) {
        (RealEstate, Language::Ru) => "Недвижимость",
        (RealEstate, Language::Tg) => "Хонаҳо",
        (Auto, Language::Ru) => "Авто",
        (Auto, Language::Tg) => "Мошинҳо",
        (Jobs, Language::Ru) => "Работа",
        (Jobs, Language::Tg) => "Кор",
        (Services, Language::Ru) => "Услуги",
        (Services, Language::Tg) => "Хизматрасонӣ",
        (Electronics, _) => "Электроника",
        (Clothing, Language::Ru) => "Вещи",
        (Clothing, Language::Tg) => "Либос",
        (Animals, Language::Ru) => "Животные",
        (Animals, Language::Tg) => "Ҳайвонот",
        (Free, Language::Ru) => "Бесплатные",
        (Free, Language::Tg) => "Ройгон",
        (Other, Language::Ru) => "Прочее",
        (Other, Language::Tg) => "Дигар",
    }
}

pub fn city_label(city: City, lang: Language) -> &'static str {
    use City::*;
    match (city, lang) {
        (Dushanbe, _) => "Душанбе",
        (Khujand, Language::Ru) => "Худжанд",
        (Khujand, Language::Tg) => "Хуҷанд",
        (Bokhtar, _) => "Бохтар",
        (Kulob, Language::Ru) => "Куляб",
        (Kulob, Language::Tg) => "Кӯлоб",
        (Istaravshan, _) => "Истаравшан",
        (Tursunzoda, Language::Ru) => "Турсунзаде",
        (Tursunzoda, Language::Tg) => "Турсунзода",
        (Kanibadam, Language::Ru) => "Канибадам",
        (Kanibadam, Language::Tg) => "Конибодом",
        (Isfara, _) => "Исфара",
    }
}
