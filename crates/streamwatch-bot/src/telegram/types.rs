use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    /// `@username` when the account has one, otherwise the first name.
    pub fn display_name(&self) -> String {
        match self.username.as_deref() {
            Some(username) => format!("@{username}"),
            None => self.first_name.clone(),
        }
    }
}
