use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{self, request},
};
use komento_api::Uuid;

use crate::{service::Service, Error};

#[derive(Clone, axum::extract::FromRef)]
pub struct AppState {
    pub service: Service,
    pub moderator_token: Option<ModeratorToken>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ModeratorToken(pub Uuid);

/// Bearer-token gate on the moderation routes. Who hands out the token is
/// someone else's problem; the server only compares it to the one configured
/// at startup.
pub struct ModeratorAuth;

#[async_trait]
impl FromRequestParts<AppState> for ModeratorAuth {
    type Rejection = Error;

    async fn from_request_parts(
        req: &mut request::Parts,
        state: &AppState,
    ) -> Result<ModeratorAuth, Error> {
        let token = bearer_token(req)?;
        if Some(ModeratorToken(token)) == state.moderator_token {
            Ok(ModeratorAuth)
        } else {
            Err(Error::permission_denied())
        }
    }
}

fn bearer_token(req: &request::Parts) -> Result<Uuid, Error> {
    let auth = req
        .headers
        .get(http::header::AUTHORIZATION)
        .ok_or_else(Error::permission_denied)?;
    let auth = auth.to_str().map_err(|_| Error::permission_denied())?;
    let mut auth = auth.split(' ');
    if !auth
        .next()
        .ok_or_else(Error::permission_denied)?
        .eq_ignore_ascii_case("bearer")
    {
        return Err(Error::permission_denied());
    }
    let token = auth.next().ok_or_else(Error::permission_denied)?;
    if auth.next().is_some() {
        return Err(Error::permission_denied());
    }
    Uuid::try_from(token).map_err(|_| Error::permission_denied())
}
