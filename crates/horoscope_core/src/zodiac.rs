//! crates/horoscope_core/src/zodiac.rs
//!
//! Pure calendar-date → zodiac-sign calculation.

use crate::domain::ZodiacSign;

/// Maps a `YYYY-MM-DD` date to its tropical zodiac sign.
///
/// The string is split manually instead of going through a date-time type:
/// a timezone-aware constructor can shift the day across midnight and land
/// a boundary birthday in the wrong sign. Empty or malformed input yields
/// `None` - callers must not assume a default sign.
pub fn sign_for_date(dob: &str) -> Option<ZodiacSign> {
    if dob.is_empty() {
        return None;
    }

    let parts: Vec<&str> = dob.split('-').collect();
    if parts.len() != 3 {
        return None;
    }

    let month: u32 = parts[1].parse().ok()?;
    let day: u32 = parts[2].parse().ok()?;

    let sign = match (month, day) {
        (3, 21..=31) | (4, 1..=19) => ZodiacSign::Aries,
        (4, 20..=30) | (5, 1..=20) => ZodiacSign::Taurus,
        (5, 21..=31) | (6, 1..=20) => ZodiacSign::Gemini,
        (6, 21..=30) | (7, 1..=22) => ZodiacSign::Cancer,
        (7, 23..=31) | (8, 1..=22) => ZodiacSign::Leo,
        (8, 23..=31) | (9, 1..=22) => ZodiacSign::Virgo,
        (9, 23..=30) | (10, 1..=22) => ZodiacSign::Libra,
        (10, 23..=31) | (11, 1..=21) => ZodiacSign::Scorpio,
        (11, 22..=30) | (12, 1..=21) => ZodiacSign::Sagittarius,
        (12, 22..=31) | (1, 1..=19) => ZodiacSign::Capricorn,
        (1, 20..=31) | (2, 1..=18) => ZodiacSign::Aquarius,
        (2, 19..=29) | (3, 1..=20) => ZodiacSign::Pisces,
        _ => return None,
    };
    Some(sign)
}

/// The glyph rendered next to a sign name.
pub fn symbol(sign: ZodiacSign) -> &'static str {
    match sign {
        ZodiacSign::Aries => "♈",
        ZodiacSign::Taurus => "♉",
        ZodiacSign::Gemini => "♊",
        ZodiacSign::Cancer => "♋",
        ZodiacSign::Leo => "♌",
        ZodiacSign::Virgo => "♍",
        ZodiacSign::Libra => "♎",
        ZodiacSign::Scorpio => "♏",
        ZodiacSign::Sagittarius => "♐",
        ZodiacSign::Capricorn => "♑",
        ZodiacSign::Aquarius => "♒",
        ZodiacSign::Pisces => "♓",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_mid_range_dates() {
        assert_eq!(sign_for_date("1990-06-15"), Some(ZodiacSign::Gemini));
        assert_eq!(sign_for_date("2000-01-01"), Some(ZodiacSign::Capricorn));
        assert_eq!(sign_for_date("1985-11-30"), Some(ZodiacSign::Sagittarius));
    }

    #[test]
    fn boundary_pairs_fall_on_opposite_sides() {
        // Each cusp: last day of one sign, first day of the next.
        let cusps = [
            ("2024-04-19", ZodiacSign::Aries, "2024-04-20", ZodiacSign::Taurus),
            ("2024-05-20", ZodiacSign::Taurus, "2024-05-21", ZodiacSign::Gemini),
            ("2024-06-20", ZodiacSign::Gemini, "2024-06-21", ZodiacSign::Cancer),
            ("2024-07-22", ZodiacSign::Cancer, "2024-07-23", ZodiacSign::Leo),
            ("2024-08-22", ZodiacSign::Leo, "2024-08-23", ZodiacSign::Virgo),
            ("2024-09-22", ZodiacSign::Virgo, "2024-09-23", ZodiacSign::Libra),
            ("2024-10-22", ZodiacSign::Libra, "2024-10-23", ZodiacSign::Scorpio),
            ("2024-11-21", ZodiacSign::Scorpio, "2024-11-22", ZodiacSign::Sagittarius),
            ("2024-12-21", ZodiacSign::Sagittarius, "2024-12-22", ZodiacSign::Capricorn),
            ("2024-01-19", ZodiacSign::Capricorn, "2024-01-20", ZodiacSign::Aquarius),
            ("2024-02-18", ZodiacSign::Aquarius, "2024-02-19", ZodiacSign::Pisces),
            ("2024-03-20", ZodiacSign::Pisces, "2024-03-21", ZodiacSign::Aries),
        ];
        for (before, sign_before, after, sign_after) in cusps {
            assert_eq!(sign_for_date(before), Some(sign_before), "{before}");
            assert_eq!(sign_for_date(after), Some(sign_after), "{after}");
        }
    }

    #[test]
    fn malformed_input_yields_none() {
        assert_eq!(sign_for_date(""), None);
        assert_eq!(sign_for_date("abc"), None);
        assert_eq!(sign_for_date("2024-13-40"), None);
        assert_eq!(sign_for_date("2024-06"), None);
        assert_eq!(sign_for_date("2024-xx-15"), None);
        assert_eq!(sign_for_date("2024-06-00"), None);
    }

    #[test]
    fn is_idempotent() {
        assert_eq!(sign_for_date("1990-06-15"), sign_for_date("1990-06-15"));
    }

    #[test]
    fn every_valid_day_has_exactly_one_sign() {
        let days_in_month = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
        for (m, days) in days_in_month.iter().enumerate() {
            for d in 1..=*days {
                let dob = format!("2024-{:02}-{:02}", m + 1, d);
                assert!(sign_for_date(&dob).is_some(), "{dob} has no sign");
            }
        }
    }
}
