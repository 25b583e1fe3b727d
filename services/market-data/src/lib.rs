pub mod types;
pub mod sources {
    pub mod binance;
}

pub use sources::binance::BinanceKlinesClient;
pub use types::*;
