//! `application/x-www-form-urlencoded` body construction.

use url::form_urlencoded;

/// Encodes the given pairs as an `x-www-form-urlencoded` body
/// (`key=value` joined by `&`, percent-encoded, spaces as `+`).
///
/// Output order follows input iteration order; callers must not rely on a
/// particular ordering across map-backed inputs.
pub fn encode<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn encodes_pairs_with_form_escaping() {
        let mut params = HashMap::new();
        params.insert("a", "1");
        params.insert("b c", "2");

        let body = encode(params.iter().map(|(k, v)| (*k, *v)));
        let mut parts: Vec<&str> = body.split('&').collect();
        parts.sort_unstable();
        assert_eq!(parts, vec!["a=1", "b+c=2"]);
    }

    #[test]
    fn percent_encodes_reserved_characters() {
        let body = encode([("grant_type", "client_credentials"), ("scope", "PRINCIPAL_ROLE:ALL")]);
        assert_eq!(body, "grant_type=client_credentials&scope=PRINCIPAL_ROLE%3AALL");
    }

    #[test]
    fn empty_input_yields_empty_body() {
        assert_eq!(encode([]), "");
    }
}
