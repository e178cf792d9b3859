use sea_orm::entity::prelude::*;

use crate::market::{OptionQuote, OptionType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "option_data")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = true)]
    pub id: i64,

    /// Calendar date of `minute`; quotes may expire on a later date.
    pub session_date: Date,

    pub minute: DateTime,

    #[sea_orm(column_type = "Decimal(Some((12, 4)))")]
    pub strike: Decimal,

    /// `C` or `P`.
    pub option_type: String,

    pub expiry_date: Date,

    #[sea_orm(column_type = "Decimal(Some((12, 4)))", nullable)]
    pub bid_open: Option<Decimal>,

    #[sea_orm(column_type = "Decimal(Some((12, 4)))", nullable)]
    pub ask_open: Option<Decimal>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// `None` when the stored option type is not a call or put code.
    pub fn into_quote(self) -> Option<OptionQuote> {
        let option_type = OptionType::parse(&self.option_type)?;
        Some(OptionQuote {
            minute: self.minute,
            strike: self.strike,
            option_type,
            expiry: self.expiry_date,
            bid: self.bid_open,
            ask: self.ask_open,
        })
    }
}
