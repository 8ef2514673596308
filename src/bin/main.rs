//! HTTP wiring: JSON routes over the coordinator operations plus a
//! server-sent-events stream carrying the live broadcast. Routing and
//! bearer-token plumbing live here and only here; everything below this
//! file speaks `(actor, params) -> Result<_, ApiError>`.

use actix_web::{delete, get, post, put, web, App, HttpRequest, HttpResponse, HttpServer};
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use ripple::auth::TokenRegistry;
use ripple::comments;
use ripple::config::posts_per_page;
use ripple::core::errors::ApiError;
use ripple::core::store::Store;
use ripple::events::Publisher;
use ripple::follow;
use ripple::posts;
use ripple::session::SubscriptionSession;
use ripple::users;

struct AppState {
    store: Store,
    publisher: Publisher,
    tokens: TokenRegistry,
}

type State = web::Data<AppState>;

fn actor(req: &HttpRequest, state: &AppState) -> Result<String, ApiError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;
    state.tokens.resolve(token).ok_or(ApiError::Unauthorized)
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<usize>,
    limit: Option<usize>,
}

impl PageQuery {
    fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    fn limit(&self) -> usize {
        self.limit.unwrap_or_else(posts_per_page).max(1)
    }
}

// === Users ===

#[derive(Deserialize)]
struct SignupBody {
    username: Option<String>,
    email: Option<String>,
    #[serde(rename = "firstName")]
    first_name: Option<String>,
    #[serde(rename = "lastName")]
    last_name: Option<String>,
}

#[post("/api/users/signup")]
async fn signup(state: State, body: web::Json<SignupBody>) -> Result<HttpResponse, ApiError> {
    let user = users::create_user(
        &state.store,
        users::NewUser {
            username: body.username.as_deref().unwrap_or_default(),
            email: body.email.as_deref().unwrap_or_default(),
            first_name: body.first_name.as_deref(),
            last_name: body.last_name.as_deref(),
        },
    )?;
    // Credential checks are the auth collaborator's concern; the demo
    // surface hands out a session token directly at signup.
    let token = state.tokens.issue(&user.id);
    Ok(HttpResponse::Created().json(serde_json::json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "token": token,
    })))
}

#[delete("/api/users")]
async fn delete_account(req: HttpRequest, state: State) -> Result<HttpResponse, ApiError> {
    let actor_id = actor(&req, &state)?;
    users::delete_user(&state.store, &state.publisher, &state.tokens, &actor_id)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Account and linked data deleted." })))
}

#[derive(Deserialize)]
struct BioBody {
    bio: String,
}

#[put("/api/users/bio")]
async fn put_bio(
    req: HttpRequest,
    state: State,
    body: web::Json<BioBody>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = actor(&req, &state)?;
    let user = users::update_bio(&state.store, &actor_id, &body.bio)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": user.id,
        "username": user.username,
        "bio": user.bio,
    })))
}

#[get("/api/users/id/{id}")]
async fn user_by_id(state: State, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(users::get_user_by_id(&state.store, &path)?))
}

#[get("/api/users/{username}")]
async fn user_by_username(state: State, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(users::get_user_by_username(&state.store, &path)?))
}

// === Posts ===

#[derive(Deserialize)]
struct PostBody {
    body: Option<String>,
}

#[get("/api/posts")]
async fn list_posts(state: State, query: web::Query<PageQuery>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(posts::get_posts(&state.store, query.page(), query.limit())))
}

#[get("/api/posts/following")]
async fn following_posts(
    req: HttpRequest,
    state: State,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = actor(&req, &state)?;
    Ok(HttpResponse::Ok().json(posts::get_following_posts(
        &state.store,
        &actor_id,
        query.page(),
        query.limit(),
    )))
}

#[get("/api/posts/user/{username}")]
async fn user_posts(
    state: State,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(posts::get_users_posts(
        &state.store,
        &path,
        query.page(),
        query.limit(),
    )?))
}

#[get("/api/posts/{id}")]
async fn get_post(state: State, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(posts::get_post(&state.store, &path)?))
}

#[post("/api/posts")]
async fn create_post(
    req: HttpRequest,
    state: State,
    body: web::Json<PostBody>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = actor(&req, &state)?;
    let view = posts::create_post(&state.store, &state.publisher, &actor_id, body.body.as_deref())?;
    Ok(HttpResponse::Created().json(view))
}

#[put("/api/posts/{id}")]
async fn update_post(
    req: HttpRequest,
    state: State,
    path: web::Path<String>,
    body: web::Json<PostBody>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = actor(&req, &state)?;
    let view = posts::update_post(
        &state.store,
        &state.publisher,
        &actor_id,
        &path,
        body.body.as_deref(),
    )?;
    Ok(HttpResponse::Ok().json(view))
}

#[delete("/api/posts/{id}")]
async fn delete_post(
    req: HttpRequest,
    state: State,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = actor(&req, &state)?;
    let post = posts::delete_post(&state.store, &state.publisher, &actor_id, &path)?;
    Ok(HttpResponse::Ok().json(post))
}

#[post("/api/posts/{id}/like")]
async fn like_post(
    req: HttpRequest,
    state: State,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = actor(&req, &state)?;
    let view = posts::toggle_like(&state.store, &state.publisher, &actor_id, &path)?;
    Ok(HttpResponse::Ok().json(view))
}

// === Comments ===

#[derive(Deserialize)]
struct CommentBody {
    post_id: Option<String>,
    body: Option<String>,
}

#[get("/api/posts/{id}/comments")]
async fn list_comments(state: State, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(comments::get_comments(&state.store, &path)?))
}

#[post("/api/comments")]
async fn create_comment(
    req: HttpRequest,
    state: State,
    body: web::Json<CommentBody>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = actor(&req, &state)?;
    let view = comments::create_comment(
        &state.store,
        &state.publisher,
        &actor_id,
        body.post_id.as_deref(),
        body.body.as_deref(),
    )?;
    Ok(HttpResponse::Created().json(view))
}

#[put("/api/comments/{id}")]
async fn update_comment(
    req: HttpRequest,
    state: State,
    path: web::Path<String>,
    body: web::Json<PostBody>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = actor(&req, &state)?;
    let comment =
        comments::update_comment(&state.store, &actor_id, &path, body.body.as_deref())?;
    Ok(HttpResponse::Ok().json(comment))
}

#[delete("/api/comments/{id}")]
async fn delete_comment(
    req: HttpRequest,
    state: State,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = actor(&req, &state)?;
    let comment = comments::delete_comment(&state.store, &state.publisher, &actor_id, &path)?;
    Ok(HttpResponse::Ok().json(comment))
}

// === Relationships ===

#[post("/api/relationships/{targetUserId}")]
async fn follow_user(
    req: HttpRequest,
    state: State,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = actor(&req, &state)?;
    let edge = follow::follow(&state.store, &state.publisher, &actor_id, &path)?;
    Ok(HttpResponse::Created().json(edge))
}

#[delete("/api/relationships/{targetUserId}")]
async fn unfollow_user(
    req: HttpRequest,
    state: State,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = actor(&req, &state)?;
    let edge = follow::unfollow(&state.store, &state.publisher, &actor_id, &path)?;
    Ok(HttpResponse::Ok().json(edge))
}

#[get("/api/relationships/{username}/followers")]
async fn followers(state: State, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(follow::list_followers(&state.store, &path)?))
}

#[get("/api/relationships/{username}/following")]
async fn following(state: State, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(follow::list_following(&state.store, &path)?))
}

// === Live events ===

#[derive(Deserialize)]
struct EventsQuery {
    token: Option<String>,
}

/// One subscription session per connection, streamed out as SSE frames.
/// Dropping the connection drops the session.
#[get("/api/events")]
async fn events(state: State, query: web::Query<EventsQuery>) -> HttpResponse {
    let session =
        SubscriptionSession::connect(&state.publisher, &state.tokens, query.token.as_deref());

    let stream = BroadcastStream::new(session.into_receiver()).filter_map(|item| match item {
        Ok(event) => {
            let data = serde_json::to_string(&event).ok()?;
            Some(Ok::<_, std::convert::Infallible>(web::Bytes::from(format!(
                "event: {}\ndata: {}\n\n",
                event.name(),
                data
            ))))
        }
        // A lagged subscriber just misses events; the client catches up on
        // its next fetch.
        Err(BroadcastStreamRecvError::Lagged(_)) => None,
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ripple=info,actix_web=info".into()),
        )
        .init();

    let state = web::Data::new(AppState {
        store: Store::new(),
        publisher: Publisher::new(),
        tokens: TokenRegistry::new(),
    });

    let port: u16 = std::env::var("RIPPLE_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    tracing::info!(port, "listening");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(signup)
            .service(delete_account)
            .service(put_bio)
            .service(user_by_id)
            .service(user_by_username)
            .service(list_posts)
            .service(following_posts)
            .service(user_posts)
            .service(list_comments)
            .service(get_post)
            .service(create_post)
            .service(update_post)
            .service(delete_post)
            .service(like_post)
            .service(create_comment)
            .service(update_comment)
            .service(delete_comment)
            .service(follow_user)
            .service(unfollow_user)
            .service(followers)
            .service(following)
            .service(events)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}
