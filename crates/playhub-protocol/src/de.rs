//! Lenient field deserializers.
//!
//! Record ids are decimal strings, but clients written against older
//! front ends send them as JSON numbers. Both forms are accepted.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Num(u64),
}

/// Accepts `"12"` or `12`, yielding `"12"`.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Str(s) => s,
        StringOrNumber::Num(n) => n.to_string(),
    })
}

/// Accepts `12` or `"12"`, yielding `12`.
pub fn number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Num(n) => Ok(n),
        StringOrNumber::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected a numeric id, got {s:?}"))),
    }
}

/// Treats an explicit `null` like a missing field.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Ids {
        #[serde(deserialize_with = "string_or_number")]
        text: String,
        #[serde(deserialize_with = "number_or_string")]
        num: u64,
    }

    #[test]
    fn test_ids_accept_both_forms() {
        let a: Ids = serde_json::from_str(r#"{"text": 3, "num": "4"}"#).unwrap();
        assert_eq!(a.text, "3");
        assert_eq!(a.num, 4);

        let b: Ids = serde_json::from_str(r#"{"text": "7", "num": 8}"#).unwrap();
        assert_eq!(b.text, "7");
        assert_eq!(b.num, 8);
    }

    #[test]
    fn test_non_numeric_room_id_rejected() {
        let r: Result<Ids, _> = serde_json::from_str(r#"{"text": "1", "num": "abc"}"#);
        assert!(r.is_err());
    }
}
