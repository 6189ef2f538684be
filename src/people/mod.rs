use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use diesel::prelude::*;
use std::sync::Arc;

use crate::aggregation::normalize_registration_number;
use crate::core::shared::error::ApiResult;
use crate::core::shared::models::{people_data, Person};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::security::auth::AuthenticatedUser;

/// People recorded for a company, ordered by role then name.
pub async fn list_people(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(registration_number): Path<String>,
) -> ApiResult<Json<Vec<Person>>> {
    let Some(registration_number) = normalize_registration_number(&registration_number) else {
        return Ok(Json(Vec::new()));
    };

    let mut conn = state.conn.get()?;
    let people = people_data::table
        .filter(people_data::registration_number.eq(&registration_number))
        .order((people_data::role.asc(), people_data::name.asc()))
        .select(Person::as_select())
        .load(&mut conn)?;

    Ok(Json(people))
}

pub fn configure_people_routes() -> Router<Arc<AppState>> {
    Router::new().route(ApiUrls::PEOPLE, get(list_people))
}
