use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use uuid::Uuid;

/// Opaque identifier embedded in pixel and click URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackingToken(String);

impl TrackingToken {
    /// URL-safe base64 of `"{lead_id}_{campaign_id}"`.
    pub fn issue(lead_id: Uuid, campaign_id: Uuid) -> Self {
        let raw = format!("{lead_id}_{campaign_id}");
        Self(URL_SAFE.encode(raw.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Recovers `(lead_id, campaign_id)` from a token, if it was issued by [`TrackingToken::issue`].
    pub fn decode(token: &str) -> Option<(Uuid, Uuid)> {
        let bytes = URL_SAFE.decode(token.as_bytes()).ok()?;
        let raw = String::from_utf8(bytes).ok()?;
        let (lead, campaign) = raw.split_once('_')?;
        Some((Uuid::parse_str(lead).ok()?, Uuid::parse_str(campaign).ok()?))
    }

    pub fn open_url(&self, public_url: &str) -> String {
        format!("{public_url}/api/v1/track/open/{}", self.0)
    }

    pub fn click_url(&self, public_url: &str, target: &str) -> String {
        let mut url = format!("{public_url}/api/v1/track/click/{}", self.0);
        url.push_str("?url=");
        url.push_str(&url::form_urlencoded::byte_serialize(target.as_bytes()).collect::<String>());
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_decodes_to_its_ids() {
        let lead = Uuid::new_v4();
        let campaign = Uuid::new_v4();
        let token = TrackingToken::issue(lead, campaign);

        assert!(!token.as_str().contains('/'));
        assert_eq!(TrackingToken::decode(token.as_str()), Some((lead, campaign)));
    }

    #[test]
    fn garbage_tokens_do_not_decode() {
        assert_eq!(TrackingToken::decode("not-a-token"), None);
        assert_eq!(TrackingToken::decode(&URL_SAFE.encode("a_b")), None);
    }

    #[test]
    fn click_url_encodes_target() {
        let token = TrackingToken("abc=".to_string());
        assert_eq!(
            token.click_url("http://localhost:8000", "https://example.com/a?b=c"),
            "http://localhost:8000/api/v1/track/click/abc=?url=https%3A%2F%2Fexample.com%2Fa%3Fb%3Dc"
        );
        assert_eq!(
            token.open_url("http://localhost:8000"),
            "http://localhost:8000/api/v1/track/open/abc="
        );
    }
}
