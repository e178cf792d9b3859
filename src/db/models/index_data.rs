use sea_orm::entity::prelude::*;

use crate::market::IndexTick;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "index_data")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = true)]
    pub id: i64,

    /// Calendar date of `minute`, the session key.
    pub session_date: Date,

    pub minute: DateTime,

    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub open: Decimal,

    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub high: Option<Decimal>,

    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub low: Option<Decimal>,

    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub close: Option<Decimal>,

    #[sea_orm(nullable)]
    pub volume: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for IndexTick {
    fn from(model: Model) -> Self {
        IndexTick::new(model.minute, model.open)
    }
}
