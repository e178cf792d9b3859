use axum::extract::{Multipart, Query, State};
use axum::response::Html;
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{info, warn};

use crate::api::error::ApiError;
use crate::chain::{load_straddles, AtmResolution, OptionChain, Session, StraddleSeries};
use crate::constants::PREVIEW_LIMIT;
use crate::dashboard::render;
use crate::dashboard::{build_view, chain_at, ChainQuery, ChainRequest};
use crate::db::{MigrationReport, TableCounts, TickStore};
use crate::ingest::{ingest_upload, UploadKind, UploadedFile};
use crate::market::ExpiryOffset;
use crate::state::AppState;

pub async fn home() -> Html<String> {
    Html(render::home_page(None))
}

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Html<String>, ApiError> {
    let mut upload_type = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("multipart error: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "upload_type" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("reading upload_type: {e}")))?;
                upload_type = Some(value);
            }
            "file" => {
                let name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("reading {name}: {e}")))?;
                if !name.is_empty() {
                    files.push(UploadedFile {
                        name,
                        data: data.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    if files.is_empty() {
        let message = render::alert("alert-danger", "No files selected!");
        return Ok(Html(render::home_page(Some(&message))));
    }

    let kind = match UploadKind::parse(upload_type.as_deref().unwrap_or("index")) {
        Ok(kind) => kind,
        Err(e) => {
            let message = render::alert("alert-danger", &e.to_string());
            return Ok(Html(render::home_page(Some(&message))));
        }
    };

    info!("Upload of {} {:?} file(s)", files.len(), kind);
    let summary = ingest_upload(&state.db, kind, files).await;
    let message = render::upload_message(&summary);
    Ok(Html(render::home_page(Some(&message))))
}

pub async fn view_data(State(state): State<AppState>) -> Html<String> {
    let index_html = match state.db.latest_index_rows(PREVIEW_LIMIT).await {
        Ok(rows) => render::index_preview(&rows),
        Err(e) => {
            warn!("Index preview failed: {}", e);
            "<p>Error reading preview</p>".to_string()
        }
    };
    let option_html = match state.db.latest_option_rows(PREVIEW_LIMIT).await {
        Ok(rows) => render::option_preview(&rows),
        Err(e) => {
            warn!("Option preview failed: {}", e);
            "<p>Error reading preview</p>".to_string()
        }
    };
    Html(render::preview_page(&index_html, &option_html))
}

pub async fn options_chain(
    State(state): State<AppState>,
    Query(query): Query<ChainQuery>,
) -> Result<Html<String>, ApiError> {
    let request = ChainRequest::from_query(&query, state.session.max_strike_steps);
    let view = build_view(state.db.as_ref(), &state.session, &request).await?;
    Ok(Html(render::chain_page(&view, &state.session)))
}

#[derive(Debug, Serialize)]
pub struct DatesResponse {
    pub dates: Vec<NaiveDate>,
}

pub async fn api_dates(State(state): State<AppState>) -> Result<Json<DatesResponse>, ApiError> {
    let dates = state.db.session_dates().await?;
    Ok(Json(DatesResponse { dates }))
}

#[derive(Debug, Serialize)]
pub struct ChainResponse {
    pub date: NaiveDate,
    pub minute: NaiveDateTime,
    pub expiry: ExpiryOffset,
    pub atm: AtmResolution,
    pub chain: OptionChain,
}

/// Resolve the requested date, defaulting to the latest session.
async fn requested_session(state: &AppState, date: Option<NaiveDate>) -> Result<Session, ApiError> {
    let date = match date {
        Some(date) => date,
        None => state
            .db
            .session_dates()
            .await?
            .first()
            .copied()
            .ok_or_else(|| ApiError::NotFound("No index data loaded".to_string()))?,
    };
    Ok(Session::load(state.db.as_ref(), date).await?)
}

pub async fn api_chain(
    State(state): State<AppState>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<ChainResponse>, ApiError> {
    let request = ChainRequest::from_query_strict(&query, state.session.max_strike_steps)?;
    let session = requested_session(&state, request.date).await?;
    // A requested minute is used as is so that a gap in the index is a 404.
    let minute = match request.time {
        Some(minute) => minute,
        None => session.select_minute(None, &state.session.window).minute,
    };
    let (atm, chain) = chain_at(
        state.db.as_ref(),
        &session,
        minute,
        request.expiry,
        request.steps,
    )
    .await?;

    Ok(Json(ChainResponse {
        date: session.date,
        minute,
        expiry: request.expiry,
        atm,
        chain,
    }))
}

#[derive(Debug, Serialize)]
pub struct StraddlesResponse {
    pub date: NaiveDate,
    pub minutes: Vec<NaiveDateTime>,
    pub series: Vec<StraddleSeries>,
}

pub async fn api_straddles(
    State(state): State<AppState>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<StraddlesResponse>, ApiError> {
    let request = ChainRequest::from_query_strict(&query, state.session.max_strike_steps)?;
    let session = requested_session(&state, request.date).await?;
    let trading = session.trading_minutes(&state.session.window);
    let series = load_straddles(state.db.as_ref(), session.date, &trading).await?;

    Ok(Json(StraddlesResponse {
        date: session.date,
        minutes: trading.iter().map(|t| t.minute).collect(),
        series,
    }))
}

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub database: String,
    pub schema_version: i32,
    pub migrations: MigrationReport,
    pub counts: Option<TableCounts>,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let (database, counts) = match state.db.ping().await {
        Ok(()) => ("ok".to_string(), state.db.table_counts().await.ok()),
        Err(e) => (format!("unreachable: {}", e), None),
    };

    Json(StatusResponse {
        database,
        schema_version: state.migrations.schema_version(),
        migrations: state.migrations.as_ref().clone(),
        counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::db::Db;
    use crate::ingest::IndexRecord;
    use crate::market::{OptionQuote, OptionType};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn minute(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    async fn state() -> AppState {
        let db = Db::new("sqlite::memory:", 1).await.unwrap();
        let report = db.migrate().await.unwrap();

        let record = |at, open| IndexRecord {
            minute: at,
            open,
            high: None,
            low: None,
            close: None,
            volume: None,
        };
        db.insert_index_records(&[
            record(minute(13, 30), dec!(500.25)),
            record(minute(13, 31), dec!(500.75)),
        ])
        .await
        .unwrap();

        let quote = |option_type, bid, ask| OptionQuote {
            minute: minute(13, 31),
            strike: dec!(501),
            option_type,
            expiry: minute(13, 31).date(),
            bid: Some(bid),
            ask: Some(ask),
        };
        db.insert_option_quotes(&[
            quote(OptionType::Call, dec!(1.25), dec!(1.75)),
            quote(OptionType::Put, dec!(1.5), dec!(2.5)),
        ])
        .await
        .unwrap();

        AppState::new(Arc::new(db), SessionConfig::default(), report)
    }

    fn query(time: Option<&str>) -> ChainQuery {
        ChainQuery {
            time: time.map(str::to_string),
            steps: Some("1".into()),
            ..ChainQuery::default()
        }
    }

    #[tokio::test]
    async fn test_api_chain_defaults_to_latest_session() {
        let state = state().await;
        let Json(resp) = api_chain(State(state), Query(query(Some("2024-03-01 13:31"))))
            .await
            .unwrap();

        assert_eq!(resp.date, minute(0, 0).date());
        assert_eq!(resp.atm.strike, 501);
        let strikes: Vec<i64> = resp.chain.rows.iter().map(|r| r.strike).collect();
        assert_eq!(strikes, vec![500, 501, 502]);
        assert_eq!(resp.chain.rows[1].put_ask, Some(dec!(2.5)));
    }

    #[tokio::test]
    async fn test_api_chain_minute_without_tick_is_not_found() {
        let state = state().await;
        let q = ChainQuery {
            date: Some("2024-03-01".into()),
            ..query(Some("2024-03-01 14:07"))
        };
        match api_chain(State(state), Query(q)).await {
            Err(ApiError::NotFound(msg)) => assert!(msg.contains("14:07")),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_api_rejects_unparseable_params() {
        let state = state().await;
        let bad_date = ChainQuery {
            date: Some("garbage".into()),
            ..ChainQuery::default()
        };
        let bad_steps = ChainQuery {
            steps: Some("abc".into()),
            ..ChainQuery::default()
        };

        for q in [bad_date.clone(), bad_steps.clone(), query(Some("13:31"))] {
            assert!(matches!(
                api_chain(State(state.clone()), Query(q)).await,
                Err(ApiError::BadRequest(_))
            ));
        }
        for q in [bad_date, bad_steps] {
            assert!(matches!(
                api_straddles(State(state.clone()), Query(q)).await,
                Err(ApiError::BadRequest(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_api_chain_unknown_date_is_not_found() {
        let state = state().await;
        let q = ChainQuery {
            date: Some("2023-01-02".into()),
            ..ChainQuery::default()
        };
        match api_chain(State(state), Query(q)).await {
            Err(ApiError::NotFound(msg)) => assert!(msg.contains("2023-01-02")),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_api_straddles() {
        let state = state().await;
        let Json(resp) = api_straddles(State(state), Query(ChainQuery::default()))
            .await
            .unwrap();

        assert_eq!(resp.minutes, vec![minute(13, 30), minute(13, 31)]);
        assert_eq!(resp.series.len(), 3);
        assert_eq!(resp.series[0].points[1].price, Some(dec!(3.5)));
        assert_eq!(resp.series[0].points[0].price, None);
    }

    #[tokio::test]
    async fn test_options_chain_page() {
        let state = state().await;
        let Html(page) = options_chain(State(state), Query(query(None))).await.unwrap();

        assert!(page.contains("ATM Strike: 500"));
        assert!(page.contains(r#"<option value="2024-03-01" selected>01 Mar 2024</option>"#));
        assert!(page.contains("No options found for this minute."));
        assert!(page.contains("price-chart"));
    }

    #[tokio::test]
    async fn test_status_and_preview() {
        let state = state().await;
        let Json(status) = status(State(state.clone())).await;
        assert_eq!(status.database, "ok");
        assert_eq!(status.schema_version, 6);
        assert_eq!(status.counts.map(|c| c.option_rows), Some(2));

        let Html(page) = view_data(State(state)).await;
        assert!(page.contains("<td>2024-03-01 13:31</td>"));
        assert!(page.contains("<td>P</td>"));
    }
}
