use std::sync::Arc;

use gitrats_server::{
    db::{
        types::{JoinResult, MySquadRecord, NewSquad, SquadRole},
        Storage,
    },
    types::{
        CreateSquadRequest, JoinSquadRequest, JoinSquadResponse, MySquadResponse,
        SquadDetailsResponse, SquadResponse,
    },
};
use rocket::{http::Status, serde::json::Json, State};

use super::auth::AuthenticatedUser;

pub const MAX_SQUAD_NAME_LENGTH: usize = 64;

#[utoipa::path(context_path = "/api/squads", request_body = CreateSquadRequest, responses(
    (status = 200, description = "Create a squad owned by the caller", body = MySquadResponse),
    (status = 400, description = "Empty or too long name"),
    (status = 401, description = "Missing login header"),
    (status = 404, description = "Caller is not registered")
))]
#[post("/", data = "<squad>")]
pub async fn create_squad(
    caller: AuthenticatedUser,
    squad: Json<CreateSquadRequest>,
    storage: &State<Arc<dyn Storage>>,
) -> Result<Json<MySquadResponse>, Status> {
    let squad = squad.into_inner();
    let name = squad.name.trim();
    if name.is_empty() || name.chars().count() > MAX_SQUAD_NAME_LENGTH {
        return Err(Status::BadRequest);
    }
    let new_squad = NewSquad {
        name: name.to_string(),
        description: squad.description.filter(|d| !d.trim().is_empty()),
        is_private: squad.is_private,
    };

    match storage.create_squad(&caller.login, &new_squad).await {
        Ok(Some(record)) => {
            rocket::info!("{} created squad {}", caller.login, record.name);
            Ok(Json(
                MySquadRecord {
                    squad: record,
                    role: SquadRole::Admin.to_string(),
                }
                .into(),
            ))
        }
        Ok(None) => Err(Status::NotFound),
        Err(e) => {
            rocket::error!("Failed to create squad for {}: {e}", caller.login);
            Err(Status::InternalServerError)
        }
    }
}

#[utoipa::path(context_path = "/api/squads", responses(
    (status = 200, description = "Get public squads, newest first", body = [SquadResponse])
))]
#[get("/public")]
pub async fn get_public_squads(
    storage: &State<Arc<dyn Storage>>,
) -> Option<Json<Vec<SquadResponse>>> {
    let squads = match storage.get_public_squads().await {
        Err(e) => {
            rocket::error!("Failed to get public squads: {e}");
            return None;
        }
        Ok(value) => value,
    };
    Some(Json(squads.into_iter().map(Into::into).collect()))
}

#[utoipa::path(context_path = "/api/squads", responses(
    (status = 200, description = "Get squads the caller belongs to", body = [MySquadResponse]),
    (status = 401, description = "Missing login header")
))]
#[get("/my")]
pub async fn get_my_squads(
    caller: AuthenticatedUser,
    storage: &State<Arc<dyn Storage>>,
) -> Option<Json<Vec<MySquadResponse>>> {
    let squads = match storage.get_user_squads(&caller.login).await {
        Err(e) => {
            rocket::error!("Failed to get squads of {}: {e}", caller.login);
            return None;
        }
        Ok(value) => value,
    };
    Some(Json(squads.into_iter().map(Into::into).collect()))
}

#[utoipa::path(context_path = "/api/squads", request_body = JoinSquadRequest, responses(
    (status = 200, description = "Join a squad by invite code", body = JoinSquadResponse),
    (status = 400, description = "Caller is already a member"),
    (status = 401, description = "Missing login header"),
    (status = 404, description = "Unknown invite code or caller is not registered")
))]
#[post("/join", data = "<request>")]
pub async fn join_squad(
    caller: AuthenticatedUser,
    request: Json<JoinSquadRequest>,
    storage: &State<Arc<dyn Storage>>,
) -> Result<Json<JoinSquadResponse>, Status> {
    let code = request.code.trim().to_ascii_uppercase();
    match storage.join_squad(&caller.login, &code).await {
        Ok(JoinResult::Joined { squad_id, role }) => {
            rocket::info!("{} joined squad {squad_id}", caller.login);
            Ok(Json(JoinSquadResponse {
                squad_id: squad_id as u32,
                role: role.to_string(),
            }))
        }
        Ok(JoinResult::AlreadyMember) => Err(Status::BadRequest),
        Ok(JoinResult::InvalidCode | JoinResult::UnknownUser) => Err(Status::NotFound),
        Err(e) => {
            rocket::error!("Failed to join squad for {}: {e}", caller.login);
            Err(Status::InternalServerError)
        }
    }
}

/// Private squads are only visible to their members.
#[utoipa::path(context_path = "/api/squads", responses(
    (status = 200, description = "Get squad details with members ordered by XP", body = SquadDetailsResponse),
    (status = 404, description = "Unknown squad, or a private squad the caller is not in")
))]
#[get("/<id>")]
pub async fn get_squad(
    id: i32,
    caller: Option<AuthenticatedUser>,
    storage: &State<Arc<dyn Storage>>,
) -> Option<Json<SquadDetailsResponse>> {
    let squad = match storage.get_squad(id).await {
        Err(e) => {
            rocket::error!("Failed to get squad {id}: {e}");
            return None;
        }
        Ok(value) => value?,
    };
    if squad.squad.is_private {
        let caller = caller?;
        if !squad.members.iter().any(|member| caller.is(&member.login)) {
            return None;
        }
    }
    Some(Json(squad.into()))
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing squad entrypoints", |rocket| async {
        rocket.mount(
            "/api/squads",
            rocket::routes![
                create_squad,
                get_public_squads,
                get_my_squads,
                join_squad,
                get_squad
            ],
        )
    })
}
