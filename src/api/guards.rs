//! Identity comes from the upstream gateway; this service only reads it.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::api::errors::ApiError;
use crate::core::state::AppState;

const ACTOR_ID_HEADER: &str = "x-actor-id";
const ACTOR_ROLE_HEADER: &str = "x-actor-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActorRole {
    Student,
    Teacher,
    Admin,
}

impl ActorRole {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "teacher" => Some(Self::Teacher),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Actor {
    pub(crate) id: String,
    pub(crate) role: ActorRole,
}

pub(crate) struct CurrentStudent(pub(crate) Actor);
pub(crate) struct CurrentStaff(pub(crate) Actor);

#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(ApiError::Unauthorized("Missing actor identity"))?;

        let role = parts
            .headers
            .get(ACTOR_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(ActorRole::parse)
            .ok_or(ApiError::Unauthorized("Missing or unknown actor role"))?;

        Ok(Actor { id: id.to_string(), role })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentStudent {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let actor = Actor::from_request_parts(parts, state).await?;
        if actor.role == ActorRole::Student {
            Ok(CurrentStudent(actor))
        } else {
            Err(ApiError::Forbidden("Student access required"))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentStaff {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let actor = Actor::from_request_parts(parts, state).await?;
        match actor.role {
            ActorRole::Teacher | ActorRole::Admin => Ok(CurrentStaff(actor)),
            ActorRole::Student => Err(ApiError::Forbidden("Teacher access required")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ActorRole;

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!(ActorRole::parse("Student"), Some(ActorRole::Student));
        assert_eq!(ActorRole::parse(" admin "), Some(ActorRole::Admin));
        assert_eq!(ActorRole::parse("guest"), None);
    }
}
