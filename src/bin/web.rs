//! Single binary web server exposing the tournament engine as a JSON API.
//! Run with: cargo run --bin web
//! Listens on 0.0.0.0:8080 by default. Override with env: HOST, PORT; see `ServerConfig`
//! for the engine settings (ready timeout, map pool, relay URL).
//!
//! Every write carries its actor, and every match write carries the state and version the
//! client last saw; a stale request gets 409 and should re-read.

use actix_web::{
    get, post, put,
    web::{Data, Json, Path, Query},
    App, HttpResponse, HttpServer, Responder,
};
use chrono::Utc;
use esports_tournament_engine::logic::setup::{generate_test_teams, MAX_TEST_TEAMS};
use esports_tournament_engine::{
    Actor, BracketKind, DisputeDecision, Engine, EngineError, Expected, LogNotifier, MatchAction,
    MatchId, MemoryStore, NewTournament, Notifier, RelayNotifier, ServerConfig, Team, TeamId,
    TeamRegistry, TournamentId, UserId,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

struct AppContext {
    engine: Engine,
    teams: Arc<TeamRegistry>,
}

type AppState = Data<AppContext>;

#[derive(serde::Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Deserialize)]
struct GenerateTeamsBody {
    count: usize,
    #[serde(default)]
    seed: u64,
}

#[derive(Deserialize)]
struct CreateTournamentBody {
    actor: Actor,
    #[serde(flatten)]
    tournament: NewTournament,
}

#[derive(Deserialize)]
struct RegisterTeamBody {
    actor: Actor,
    team_id: TeamId,
}

#[derive(Deserialize)]
struct StartBody {
    actor: Actor,
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize)]
struct ActionBody {
    actor: Actor,
    expected: Expected,
    action: MatchAction,
}

#[derive(Deserialize)]
struct ResolveBody {
    actor: Actor,
    expected: Expected,
    decision: DisputeDecision,
    #[serde(default)]
    note: String,
}

#[derive(Deserialize)]
struct ActorBody {
    actor: Actor,
}

#[derive(Deserialize)]
struct RoundQuery {
    bracket: Option<BracketKind>,
    round: Option<u32>,
}

#[derive(Deserialize)]
struct AdminQuery {
    admin: UserId,
}

/// Path segment: tournament id (e.g. /api/tournaments/{id})
#[derive(Deserialize)]
struct TournamentPath {
    id: TournamentId,
}

/// Path segment: match id (e.g. /api/matches/{id})
#[derive(Deserialize)]
struct MatchPath {
    id: MatchId,
}

fn error_response(e: EngineError) -> HttpResponse {
    let body = serde_json::json!({ "error": e.to_string() });
    match e {
        EngineError::StaleState { .. } => HttpResponse::Conflict().json(body),
        EngineError::Unauthorized => HttpResponse::Forbidden().json(body),
        EngineError::Storage(_) => HttpResponse::InternalServerError().json(body),
        e if e.is_not_found() => HttpResponse::NotFound().json(body),
        _ => HttpResponse::BadRequest().json(body),
    }
}

fn respond<T: serde::Serialize>(result: Result<T, EngineError>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Ok().json(value),
        Err(e) => error_response(e),
    }
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "esports-tournament-engine",
    })
}

/// Create or replace a team record (stands in for the registration service).
#[put("/api/teams")]
async fn api_upsert_team(state: AppState, body: Json<Team>) -> HttpResponse {
    let team = body.into_inner();
    respond(state.teams.upsert(team.clone()).map(|()| team))
}

/// Generate registered teams with full lineups, for trying out brackets.
#[post("/api/teams/generate")]
async fn api_generate_teams(state: AppState, body: Json<GenerateTeamsBody>) -> HttpResponse {
    if body.count > MAX_TEST_TEAMS {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("at most {} teams can be generated at once", MAX_TEST_TEAMS)
        }));
    }
    let teams = generate_test_teams(body.count, body.seed);
    for team in &teams {
        if let Err(e) = state.teams.upsert(team.clone()) {
            return error_response(e);
        }
    }
    HttpResponse::Ok().json(teams)
}

#[get("/api/tournaments")]
async fn api_list_tournaments(state: AppState) -> HttpResponse {
    respond(state.engine.tournaments())
}

#[post("/api/tournaments")]
async fn api_create_tournament(state: AppState, body: Json<CreateTournamentBody>) -> HttpResponse {
    let body = body.into_inner();
    respond(
        state
            .engine
            .create_tournament(&body.actor, body.tournament, Utc::now()),
    )
}

/// Get a tournament by id (404 if not found).
#[get("/api/tournaments/{id}")]
async fn api_get_tournament(state: AppState, path: Path<TournamentPath>) -> HttpResponse {
    respond(state.engine.tournament(path.id))
}

#[post("/api/tournaments/{id}/teams")]
async fn api_register_team(
    state: AppState,
    path: Path<TournamentPath>,
    body: Json<RegisterTeamBody>,
) -> HttpResponse {
    respond(state.engine.register_team(&body.actor, path.id, body.team_id))
}

/// Build the bracket and open round 1.
#[post("/api/tournaments/{id}/start")]
async fn api_start_tournament(
    state: AppState,
    path: Path<TournamentPath>,
    body: Json<StartBody>,
) -> HttpResponse {
    respond(
        state
            .engine
            .start_tournament(&body.actor, path.id, body.force, Utc::now()),
    )
}

/// Matches in bracket order; `?bracket=winners&round=2` narrows to one round.
#[get("/api/tournaments/{id}/matches")]
async fn api_list_matches(
    state: AppState,
    path: Path<TournamentPath>,
    query: Query<RoundQuery>,
) -> HttpResponse {
    let round = match (query.bracket, query.round) {
        (Some(bracket), Some(round)) => Some((bracket, round)),
        _ => None,
    };
    respond(state.engine.matches(path.id, round))
}

#[get("/api/tournaments/{id}/standings")]
async fn api_standings(state: AppState, path: Path<TournamentPath>) -> HttpResponse {
    respond(state.engine.standings(path.id))
}

#[get("/api/matches/{id}")]
async fn api_get_match(state: AppState, path: Path<MatchPath>) -> HttpResponse {
    respond(state.engine.get_match(path.id))
}

/// Whose ban it is and which maps are left.
#[get("/api/matches/{id}/veto")]
async fn api_veto_turn(state: AppState, path: Path<MatchPath>) -> HttpResponse {
    respond(state.engine.next_veto_action(path.id))
}

#[post("/api/matches/{id}/actions")]
async fn api_match_action(
    state: AppState,
    path: Path<MatchPath>,
    body: Json<ActionBody>,
) -> HttpResponse {
    let body = body.into_inner();
    respond(
        state
            .engine
            .apply(path.id, body.expected, &body.actor, body.action, Utc::now()),
    )
}

#[post("/api/matches/{id}/dispute/resolve")]
async fn api_resolve_dispute(
    state: AppState,
    path: Path<MatchPath>,
    body: Json<ResolveBody>,
) -> HttpResponse {
    let body = body.into_inner();
    respond(state.engine.resolve_dispute(
        path.id,
        body.expected,
        &body.actor,
        body.decision,
        body.note,
        Utc::now(),
    ))
}

/// Re-run advancement for a finished match (admin recovery).
#[post("/api/matches/{id}/advance")]
async fn api_advance(state: AppState, path: Path<MatchPath>, body: Json<ActorBody>) -> HttpResponse {
    match state.engine.advance(&body.actor, path.id, Utc::now()) {
        Ok(effects) => HttpResponse::Ok().json(serde_json::json!({ "effects": effects.len() })),
        Err(e) => error_response(e),
    }
}

/// Disputed matches awaiting an admin: /api/disputes?admin={user id}
#[get("/api/disputes")]
async fn api_open_disputes(state: AppState, query: Query<AdminQuery>) -> HttpResponse {
    respond(
        state
            .engine
            .open_disputes(&Actor::Admin { user: query.admin }),
    )
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ServerConfig::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let bind = (config.host.clone(), config.port);
    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    let teams = Arc::new(TeamRegistry::new());
    let notifier: Arc<dyn Notifier> = match &config.relay_url {
        Some(url) => {
            log::info!("Forwarding notifications to {}", url);
            Arc::new(RelayNotifier::spawn(url, teams.clone()))
        }
        None => Arc::new(LogNotifier),
    };
    let engine = Engine::new(
        Arc::new(MemoryStore::new()),
        teams.clone(),
        notifier,
        config.engine.clone(),
    );
    let state = Data::new(AppContext { engine, teams });

    // Background task: forfeit matches whose ready-up window has run out.
    let state_sweep = state.clone();
    let sweep_every = Duration::from_secs(config.ready_sweep_secs.max(1));
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(sweep_every);
        loop {
            interval.tick().await;
            match state_sweep.engine.expire_ready_checks(Utc::now()) {
                Ok(0) => {}
                Ok(n) => log::info!("Ready sweep forfeited {} match(es)", n),
                Err(e) => log::warn!("Ready sweep failed: {}", e),
            }
        }
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(api_health)
            .service(api_upsert_team)
            .service(api_generate_teams)
            .service(api_list_tournaments)
            .service(api_create_tournament)
            .service(api_get_tournament)
            .service(api_register_team)
            .service(api_start_tournament)
            .service(api_list_matches)
            .service(api_standings)
            .service(api_get_match)
            .service(api_veto_turn)
            .service(api_match_action)
            .service(api_resolve_dispute)
            .service(api_advance)
            .service(api_open_disputes)
    })
    .bind(bind)?
    .run()
    .await
}
