pub mod accounts;
pub mod cell;
pub mod dates;
pub mod encoding;
pub mod error;
pub mod grouping;
pub mod mapping;
pub mod sheet;
pub mod snapshot;
pub mod split;

// Re-export commonly used items
pub use crate::accounts::{match_accounts, AccountDirectory, BalanceRow, JsonAccountDirectory};
pub use crate::cell::CellValue;
pub use crate::encoding::{decode_bytes, detect_encoding};
pub use crate::error::ParseError;
pub use crate::grouping::{group_trades, GroupKey, GroupedTrade, TradeRow};
pub use crate::mapping::{FieldMapping, MappedTable, DROP_FIELD};
pub use crate::sheet::{data_region, find_header_row, load_grid, Grid};
pub use crate::split::{quoted_fields, split_records, RawTable};
