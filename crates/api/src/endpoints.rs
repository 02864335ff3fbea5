use stride_session::{ApiRequest, RequestDispatcher, SessionError};

use crate::models::{
    ActivityPage, CalendarEvent, CalendarEventUpsert, RecommendRequest, RecommendResponse,
    UserProfile, UserProfileUpsert,
};

/// `GET /users/{userId}/profile`
pub async fn fetch_profile(
    dispatcher: &RequestDispatcher,
    user_id: &str,
) -> Result<UserProfile, SessionError> {
    dispatcher
        .send_json(ApiRequest::get(format!("/users/{user_id}/profile")))
        .await
}

/// `PUT /users/{userId}/profile`
pub async fn save_profile(
    dispatcher: &RequestDispatcher,
    user_id: &str,
    profile: &UserProfileUpsert,
) -> Result<UserProfile, SessionError> {
    dispatcher
        .send_json(ApiRequest::put(format!("/users/{user_id}/profile")).json(profile)?)
        .await
}

/// `GET /users/{userId}/calendar/events`
pub async fn list_calendar_events(
    dispatcher: &RequestDispatcher,
    user_id: &str,
) -> Result<Vec<CalendarEvent>, SessionError> {
    dispatcher
        .send_json(ApiRequest::get(format!("/users/{user_id}/calendar/events")))
        .await
}

/// `POST /users/{userId}/calendar/events`
pub async fn create_calendar_event(
    dispatcher: &RequestDispatcher,
    user_id: &str,
    event: &CalendarEventUpsert,
) -> Result<CalendarEvent, SessionError> {
    dispatcher
        .send_json(ApiRequest::post(format!("/users/{user_id}/calendar/events")).json(event)?)
        .await
}

/// `POST /recommend`
pub async fn recommend(
    dispatcher: &RequestDispatcher,
    request: &RecommendRequest,
) -> Result<RecommendResponse, SessionError> {
    dispatcher
        .send_json(ApiRequest::post("/recommend").json(request)?)
        .await
}

/// `GET /activities?page=&size=`
pub async fn list_activities(
    dispatcher: &RequestDispatcher,
    page: u32,
    size: u32,
) -> Result<ActivityPage, SessionError> {
    dispatcher
        .send_json(
            ApiRequest::get("/activities")
                .query("page", page.to_string())
                .query("size", size.to_string()),
        )
        .await
}
