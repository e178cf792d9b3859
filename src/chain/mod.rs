//! Option chain and straddle reconstruction for a trading session.

pub mod atm;
pub mod ladder;
pub mod session;
pub mod straddle;

pub use atm::{atm_at, resolve_atm, AtmResolution};
pub use ladder::{assemble_chain, load_chain, ChainRow, OptionChain};
pub use session::{MinuteSelection, Session, SessionWindow};
pub use straddle::{
    build_straddle_series, load_straddles, nearest_strike, PointStatus, StraddlePoint,
    StraddleSeries,
};
