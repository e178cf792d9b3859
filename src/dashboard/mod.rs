//! Options chain dashboard: view assembly, chart specs and HTML pages.

pub mod charts;
pub mod render;
pub mod view;

pub use view::{
    analyze_session, build_view, chain_at, ChainQuery, ChainRequest, DashboardView,
    SessionAnalysis, ViewState,
};
