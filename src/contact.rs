use once_cell::sync::Lazy;
use regex::Regex;

use crate::ads::Ad;
use crate::config::AuthConfig;

static NON_DIGIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9]").expect("valid non-digit pattern"));

/// Strips everything but ASCII digits and keeps at most `max` of them.
pub fn digits_only(input: &str, max: Option<usize>) -> String {
    let mut digits = NON_DIGIT.replace_all(input, "").into_owned();
    if let Some(max) = max {
        digits.truncate(max);
    }
    digits
}

/// Display identity stored for a logged-in user, e.g. `+992 900112233`.
pub fn format_identity(auth: &AuthConfig, phone: &str) -> String {
    format!("{} {}", auth.country_prefix, phone)
}

pub fn call_link(auth: &AuthConfig, ad: &Ad) -> String {
    format!("tel:{}{}", auth.country_prefix, ad.phone)
}

pub fn whatsapp_link(auth: &AuthConfig, ad: &Ad) -> String {
    format!("https://wa.me/{}{}", auth.dial_code(), ad.whatsapp_number())
}
