/*
[INPUT]:  Upstream feed schemas (Pyth Hermes, PumpPortal)
[OUTPUT]: Typed subscription frames and inbound messages
[POS]:    Data layer - wire models of the two upstream feeds
[UPDATE]: When an upstream feed changes its message format
*/

pub mod pump;
pub mod pyth;

pub use pump::{PumpMessage, PumpRequest, PumpTradeEvent, TxType};
pub use pyth::{PriceFeed, PythMessage, PythPrice, PythRequest};
