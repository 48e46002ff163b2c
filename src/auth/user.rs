use serde::{de, Deserialize, Deserializer, Serialize};

/// Twitch user profile of the signed-in account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Numeric user identifier
    #[serde(deserialize_with = "deserialize_user_id")]
    pub id: u64,
    /// Display name
    pub display_name: String,
    /// Email address (empty when the email scope was not granted)
    #[serde(default)]
    pub email: String,
    /// Profile image URL
    #[serde(default)]
    pub profile_image_url: String,
}

/// Body of the `GET /users` response
#[derive(Debug, Clone, Deserialize)]
pub struct UsersResponse {
    pub data: Vec<User>,
}

// Helix sends ids as strings, older payloads and fixtures use numbers
fn deserialize_user_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid user id '{}'", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_users_response() {
        let body = r#"{"data":[
            {"id":"141981764","login":"twitchdev","display_name":"TwitchDev","email":"dev@twitch.tv","profile_image_url":"https://img/1.png","broadcaster_type":"partner"},
            {"id":2,"display_name":"second","email":"s@x.com","profile_image_url":"url"}
        ]}"#;

        let response: UsersResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[0].id, 141981764);
        assert_eq!(response.data[0].display_name, "TwitchDev");
        assert_eq!(response.data[1].id, 2);
    }

    #[test]
    fn test_missing_email_defaults_to_empty() {
        let user: User =
            serde_json::from_str(r#"{"id":"7","display_name":"noemail"}"#).unwrap();
        assert_eq!(user.email, "");
        assert_eq!(user.profile_image_url, "");
    }

    #[test]
    fn test_non_numeric_id_is_rejected() {
        let result: Result<User, _> =
            serde_json::from_str(r#"{"id":"abc","display_name":"x"}"#);
        assert!(result.is_err());
    }
}
