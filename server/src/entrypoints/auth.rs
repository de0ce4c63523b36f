use gitrats_server::github_pull::is_valid_login;
use rocket::{
    http::Status,
    request::{self, FromRequest, Outcome},
    Request,
};

/// Set by the OAuth proxy in front of the API once the GitHub login is verified.
pub const LOGIN_HEADER: &str = "X-Github-Login";

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub login: String,
}

impl AuthenticatedUser {
    pub fn is(&self, login: &str) -> bool {
        self.login.eq_ignore_ascii_case(login)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = &'static str;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match request.headers().get_one(LOGIN_HEADER).map(str::trim) {
            Some(login) if is_valid_login(login) => Outcome::Success(Self {
                login: login.to_string(),
            }),
            _ => Outcome::Error((Status::Unauthorized, "missing or invalid login header")),
        }
    }
}
