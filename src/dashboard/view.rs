//! Request-scoped assembly of the options chain dashboard.
//!
//! Every request reloads the session from the store and recomputes the
//! chain and straddle series; nothing is cached between requests.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chain::{
    atm_at, load_chain, load_straddles, AtmResolution, MinuteSelection, OptionChain, Session,
    SessionWindow, StraddleSeries,
};
use crate::config::SessionConfig;
use crate::constants::{DATE_FORMAT, DEFAULT_STRIKE_STEPS, MINUTE_FORMAT};
use crate::db::{QuoteStore, TickStore};
use crate::error::{Error, Result};
use crate::market::{Comparison, ExpiryOffset, IndexTick};

/// Raw query string of the dashboard and the JSON endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainQuery {
    pub date: Option<String>,
    pub time: Option<String>,
    pub expiry: Option<String>,
    pub steps: Option<String>,
    pub compare: Option<String>,
}

/// Query parameters after defaults and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRequest {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveDateTime>,
    pub expiry: ExpiryOffset,
    pub steps: u32,
    pub compare: Comparison,
}

impl ChainRequest {
    /// Unparseable dates, times and radii are treated as absent; the
    /// dashboard then falls back to its defaults.
    pub fn from_query(query: &ChainQuery, max_steps: u32) -> Self {
        Self {
            date: query.date.as_deref().and_then(parse_date_param),
            time: query.time.as_deref().and_then(parse_minute_param),
            expiry: parse_expiry(query),
            steps: query
                .steps
                .as_deref()
                .and_then(parse_steps_param)
                .unwrap_or(DEFAULT_STRIKE_STEPS)
                .min(max_steps),
            compare: parse_compare(query),
        }
    }

    /// Like `from_query`, but a present value that does not parse is an
    /// `InvalidRequest` instead of a silent default.
    pub fn from_query_strict(query: &ChainQuery, max_steps: u32) -> Result<Self> {
        let date = strict(query.date.as_deref(), "date", parse_date_param)?;
        let time = strict(query.time.as_deref(), "time", parse_minute_param)?;
        let steps = strict(query.steps.as_deref(), "steps", parse_steps_param)?;

        Ok(Self {
            date,
            time,
            expiry: parse_expiry(query),
            steps: steps.unwrap_or(DEFAULT_STRIKE_STEPS).min(max_steps),
            compare: parse_compare(query),
        })
    }
}

fn strict<T>(raw: Option<&str>, name: &str, parse: fn(&str) -> Option<T>) -> Result<Option<T>> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(r) => parse(r)
            .map(Some)
            .ok_or_else(|| Error::InvalidRequest(format!("invalid {}: {}", name, r))),
    }
}

fn parse_expiry(query: &ChainQuery) -> ExpiryOffset {
    query
        .expiry
        .as_deref()
        .and_then(ExpiryOffset::from_label)
        .unwrap_or_default()
}

fn parse_compare(query: &ChainQuery) -> Comparison {
    query
        .compare
        .as_deref()
        .map(Comparison::parse)
        .unwrap_or_default()
}

pub fn parse_steps_param(raw: &str) -> Option<u32> {
    raw.trim().parse().ok()
}

pub fn parse_date_param(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

pub fn parse_minute_param(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), MINUTE_FORMAT).ok()
}

/// Everything derived from one session at one minute.
#[derive(Debug, Clone, Serialize)]
pub struct SessionAnalysis {
    pub atm: AtmResolution,
    pub expiry_date: NaiveDate,
    pub chain: OptionChain,
    pub trading_minutes: Vec<IndexTick>,
    pub straddles: Vec<StraddleSeries>,
}

#[derive(Debug, Clone)]
pub enum ViewState {
    /// No dates available, or the requested date has no data.
    NoDate,
    /// The session or the selected minute is missing.
    Missing { message: String },
    Ready(Box<SessionAnalysis>),
}

#[derive(Debug, Clone)]
pub struct DashboardView {
    pub dates: Vec<NaiveDate>,
    pub selected_date: Option<NaiveDate>,
    pub expiry: ExpiryOffset,
    pub steps: u32,
    pub compare: Comparison,
    pub times: Vec<NaiveDateTime>,
    pub trading_times: Vec<NaiveDateTime>,
    pub selection: Option<MinuteSelection>,
    pub state: ViewState,
}

impl DashboardView {
    pub fn analysis(&self) -> Option<&SessionAnalysis> {
        match &self.state {
            ViewState::Ready(analysis) => Some(analysis),
            _ => None,
        }
    }
}

/// ATM and chain ladder for one minute of a loaded session.
pub async fn chain_at<S>(
    store: &S,
    session: &Session,
    minute: NaiveDateTime,
    expiry: ExpiryOffset,
    steps: u32,
) -> Result<(AtmResolution, OptionChain)>
where
    S: QuoteStore + ?Sized,
{
    let atm = atm_at(session.ticks(), minute)?;
    let expiry_date = expiry.expiry_for(session.date);
    let chain = load_chain(store, atm.strike, steps, minute, expiry_date).await?;
    Ok((atm, chain))
}

pub async fn analyze_session<S>(
    store: &S,
    session: &Session,
    window: &SessionWindow,
    minute: NaiveDateTime,
    expiry: ExpiryOffset,
    steps: u32,
) -> Result<SessionAnalysis>
where
    S: QuoteStore + ?Sized,
{
    let (atm, chain) = chain_at(store, session, minute, expiry, steps).await?;
    let trading_minutes = session.trading_minutes(window);
    let straddles = load_straddles(store, session.date, &trading_minutes).await?;

    Ok(SessionAnalysis {
        atm,
        expiry_date: expiry.expiry_for(session.date),
        chain,
        trading_minutes,
        straddles,
    })
}

/// Build the dashboard for one request. Missing data becomes a view state;
/// only store failures are returned as errors.
pub async fn build_view<S>(
    store: &S,
    settings: &SessionConfig,
    request: &ChainRequest,
) -> Result<DashboardView>
where
    S: TickStore + QuoteStore + ?Sized,
{
    let dates = store.session_dates().await?;
    let selected_date = request.date.or_else(|| dates.first().copied());

    let mut view = DashboardView {
        dates,
        selected_date,
        expiry: request.expiry,
        steps: request.steps,
        compare: request.compare,
        times: Vec::new(),
        trading_times: Vec::new(),
        selection: None,
        state: ViewState::NoDate,
    };

    let Some(date) = selected_date.filter(|d| view.dates.contains(d)) else {
        return Ok(view);
    };

    let session = match Session::load(store, date).await {
        Ok(session) => session,
        Err(e) if e.is_missing_data() => {
            view.state = ViewState::Missing {
                message: e.to_string(),
            };
            return Ok(view);
        }
        Err(e) => return Err(e),
    };

    let window = &settings.window;
    let selection = session.select_minute(request.time, window);
    view.times = session.ticks().iter().map(|t| t.minute).collect();
    view.trading_times = view
        .times
        .iter()
        .copied()
        .filter(|m| window.contains(*m))
        .collect();
    view.selection = Some(selection);

    view.state = match analyze_session(
        store,
        &session,
        window,
        selection.minute,
        request.expiry,
        request.steps,
    )
    .await
    {
        Ok(analysis) => {
            debug!(
                "Dashboard for {} at {}: ATM {}, {} quotes",
                date, selection.minute, analysis.atm.strike, analysis.chain.quote_count
            );
            ViewState::Ready(Box::new(analysis))
        }
        Err(e @ Error::NoReferenceTick(_)) => ViewState::Missing {
            message: e.to_string(),
        },
        Err(e) => return Err(e),
    };

    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::memory::MemoryStore;
    use crate::market::{OptionQuote, OptionType};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn minute(h: u32, m: u32) -> NaiveDateTime {
        date().and_hms_opt(h, m, 0).unwrap()
    }

    fn quote(at: NaiveDateTime, strike: i64, option_type: OptionType, bid: Decimal, ask: Decimal) -> OptionQuote {
        OptionQuote {
            minute: at,
            strike: strike.into(),
            option_type,
            expiry: date(),
            bid: Some(bid),
            ask: Some(ask),
        }
    }

    fn store() -> MemoryStore {
        MemoryStore {
            ticks: vec![
                IndexTick::new(minute(13, 30), dec!(500.2)),
                IndexTick::new(minute(13, 31), dec!(500.6)),
                IndexTick::new(
                    NaiveDate::from_ymd_opt(2024, 2, 29)
                        .unwrap()
                        .and_hms_opt(13, 30, 0)
                        .unwrap(),
                    dec!(498),
                ),
            ],
            quotes: vec![
                quote(minute(13, 30), 498, OptionType::Call, dec!(3.0), dec!(3.2)),
                quote(minute(13, 30), 502, OptionType::Put, dec!(2.5), dec!(2.7)),
                quote(minute(13, 31), 501, OptionType::Call, dec!(1.0), dec!(1.2)),
                quote(minute(13, 31), 501, OptionType::Put, dec!(1.4), dec!(1.6)),
            ],
        }
    }

    fn request(date: Option<NaiveDate>, time: Option<NaiveDateTime>, steps: u32) -> ChainRequest {
        ChainRequest {
            date,
            time,
            expiry: ExpiryOffset::ZeroDte,
            steps,
            compare: Comparison::All,
        }
    }

    #[test]
    fn test_request_defaults() {
        let req = ChainRequest::from_query(&ChainQuery::default(), 200);
        assert_eq!(req, request(None, None, 10));

        let query = ChainQuery {
            date: Some("2024-03-01".into()),
            time: Some("2024-03-01 13:31".into()),
            expiry: Some("2DTE".into()),
            steps: Some("500".into()),
            compare: Some("1v2".into()),
        };
        let req = ChainRequest::from_query(&query, 200);
        assert_eq!(req.date, Some(date()));
        assert_eq!(req.time, Some(minute(13, 31)));
        assert_eq!(req.expiry, ExpiryOffset::TwoDte);
        assert_eq!(req.steps, 200);
        assert_eq!(req.compare, Comparison::OneVsTwo);
    }

    #[test]
    fn test_lenient_request_ignores_bad_values() {
        let query = ChainQuery {
            date: Some("yesterday".into()),
            time: Some("13h30".into()),
            steps: Some("-1".into()),
            ..ChainQuery::default()
        };
        assert_eq!(ChainRequest::from_query(&query, 200), request(None, None, 10));
    }

    #[test]
    fn test_strict_request_rejects_bad_values() {
        for (date, time, steps) in [
            (Some("2024-13-01"), None, None),
            (None, Some("2024-03-01 25:00"), None),
            (None, None, Some("abc")),
            (None, None, Some("-1")),
        ] {
            let query = ChainQuery {
                date: date.map(str::to_string),
                time: time.map(str::to_string),
                steps: steps.map(str::to_string),
                ..ChainQuery::default()
            };
            assert!(matches!(
                ChainRequest::from_query_strict(&query, 200),
                Err(Error::InvalidRequest(_))
            ));
        }

        let blank = ChainQuery {
            date: Some(" ".into()),
            steps: Some("300".into()),
            ..ChainQuery::default()
        };
        let req = ChainRequest::from_query_strict(&blank, 200).unwrap();
        assert_eq!(req.date, None);
        assert_eq!(req.steps, 200);
    }

    #[tokio::test]
    async fn test_default_view_uses_latest_session() {
        let view = build_view(&store(), &SessionConfig::default(), &request(None, None, 2))
            .await
            .unwrap();

        assert_eq!(view.dates[0], date());
        assert_eq!(view.selected_date, Some(date()));
        assert_eq!(view.selection.unwrap().minute, minute(13, 30));
        assert_eq!(view.trading_times.len(), 2);

        let analysis = view.analysis().unwrap();
        assert_eq!(analysis.atm.strike, 500);
        let strikes: Vec<i64> = analysis.chain.rows.iter().map(|r| r.strike).collect();
        assert_eq!(strikes, vec![498, 499, 500, 501, 502]);
        assert_eq!(analysis.chain.rows[0].call_bid, Some(dec!(3.0)));

        assert_eq!(analysis.straddles.len(), 3);
        let zero_dte = &analysis.straddles[0];
        assert_eq!(zero_dte.points[0].strike, Some(dec!(502)));
        assert_eq!(zero_dte.points[0].price, None);
        assert_eq!(zero_dte.points[1].strike, Some(dec!(501)));
        assert_eq!(zero_dte.points[1].price, Some(dec!(2.6)));
        assert!(analysis.straddles[1].points.iter().all(|p| p.price.is_none()));
    }

    #[tokio::test]
    async fn test_unknown_date_has_no_session() {
        let other = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let view = build_view(&store(), &SessionConfig::default(), &request(Some(other), None, 2))
            .await
            .unwrap();
        assert!(matches!(view.state, ViewState::NoDate));
        assert!(view.times.is_empty());
    }

    #[tokio::test]
    async fn test_empty_store() {
        let view = build_view(
            &MemoryStore::default(),
            &SessionConfig::default(),
            &request(None, None, 2),
        )
        .await
        .unwrap();
        assert!(view.dates.is_empty());
        assert!(matches!(view.state, ViewState::NoDate));
    }

    #[tokio::test]
    async fn test_minute_without_tick_outside_window() {
        let mut settings = SessionConfig::default();
        settings.window = SessionWindow::new(
            chrono::NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            chrono::NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
        )
        .unwrap();

        let view = build_view(
            &store(),
            &settings,
            &request(Some(date()), Some(minute(15, 0)), 2),
        )
        .await
        .unwrap();

        match &view.state {
            ViewState::Missing { message } => assert!(message.contains("No index tick")),
            other => panic!("unexpected state: {:?}", other),
        }
        assert_eq!(view.times.len(), 2);
    }

    #[tokio::test]
    async fn test_chain_at_reports_missing_tick() {
        let session = Session::load(&store(), date()).await.unwrap();
        let err = chain_at(&store(), &session, minute(14, 0), ExpiryOffset::ZeroDte, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoReferenceTick(_)));
    }
}
